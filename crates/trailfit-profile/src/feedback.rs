//! Rule-table feedback extractor.
//!
//! Free text is lowercased, split into sentences, and tokenized. Each cue in
//! [`RULES`] emits one signal unless a negator sits within the two tokens
//! before it. Brand signals come from known brand names sharing a sentence
//! with lexicon-weighted sentiment words.

use regex::Regex;
use trailfit_core::{Direction, FeedbackSignal, SignalKind};

use Direction::{Avoid, Lower, Prefer, Raise};
use SignalKind::{Budget, Color, Fit};

/// Words that cancel a cue when they appear within [`NEGATION_WINDOW`]
/// tokens before it.
const NEGATORS: &[&str] = &[
    "not", "never", "no", "isn't", "wasn't", "aren't", "weren't", "hardly", "don't", "doesn't",
    "didn't", "isnt", "wasnt", "arent", "werent", "dont", "doesnt", "didnt",
];

const NEGATION_WINDOW: usize = 2;

/// Words that mark the number after them as a price ceiling ("under 150").
/// A `$` prefix does the same on its own.
const AMOUNT_CUES: &[&str] = &["under", "below", "max", "maximum", "budget", "within"];

const INTENSIFIERS: &[&str] = &["too", "so", "very", "overly", "way"];

struct Rule {
    cue: &'static str,
    kind: SignalKind,
    direction: Direction,
    value: Option<&'static str>,
    /// The cue only fires after "too", "so", "very", etc. ("too bright",
    /// not "a bright color").
    needs_intensifier: bool,
}

const fn rule(
    cue: &'static str,
    kind: SignalKind,
    direction: Direction,
    value: Option<&'static str>,
    needs_intensifier: bool,
) -> Rule {
    Rule {
        cue,
        kind,
        direction,
        value,
        needs_intensifier,
    }
}

const RULES: &[Rule] = &[
    // Budget
    rule("expensive", Budget, Lower, None, false),
    rule("pricey", Budget, Lower, None, false),
    rule("overpriced", Budget, Lower, None, false),
    rule("costly", Budget, Lower, None, false),
    rule("cheap", Budget, Raise, None, true),
    rule("flimsy", Budget, Raise, None, false),
    // Color
    rule("flashy", Color, Avoid, Some("bright"), false),
    rule("garish", Color, Avoid, Some("bright"), false),
    rule("neon", Color, Avoid, Some("bright"), true),
    rule("bright", Color, Avoid, Some("bright"), true),
    rule("loud", Color, Avoid, Some("bright"), true),
    rule("boring", Color, Prefer, Some("colorful"), false),
    rule("plain", Color, Prefer, Some("colorful"), true),
    rule("dull", Color, Prefer, Some("colorful"), true),
    // Fit
    rule("tight", Fit, Raise, Some("relaxed"), false),
    rule("snug", Fit, Raise, Some("relaxed"), true),
    rule("small", Fit, Raise, Some("relaxed"), true),
    rule("loose", Fit, Lower, Some("slim"), false),
    rule("baggy", Fit, Lower, Some("slim"), false),
    rule("big", Fit, Lower, Some("slim"), true),
];

/// Colors recognised in "I prefer / like / love <color>" statements.
const COLORS: &[&str] = &[
    "black", "white", "gray", "grey", "blue", "navy", "green", "olive", "red", "orange", "yellow",
    "purple", "pink", "brown", "tan", "beige", "teal",
];

const LIKE_WORDS: &[&str] = &["prefer", "like", "love"];
const DISLIKE_WORDS: &[&str] = &["hate", "dislike"];

/// Sentiment weights for brand feedback. Negative below zero, positive above.
pub(crate) const LEXICON: &[(&str, f32)] = &[
    // Positive signals
    ("love", 0.5),
    ("loved", 0.5),
    ("great", 0.4),
    ("good", 0.3),
    ("excellent", 0.5),
    ("best", 0.5),
    ("favorite", 0.5),
    ("like", 0.3),
    ("comfortable", 0.4),
    ("durable", 0.4),
    ("quality", 0.3),
    ("recommend", 0.4),
    // Negative signals
    ("hate", -0.6),
    ("hated", -0.6),
    ("bad", -0.4),
    ("terrible", -0.6),
    ("awful", -0.6),
    ("worst", -0.6),
    ("poor", -0.4),
    ("disappointing", -0.5),
    ("disappointed", -0.5),
    ("uncomfortable", -0.5),
    ("ripped", -0.5),
    ("broke", -0.5),
    ("leaked", -0.5),
    ("avoid", -0.6),
];

/// Maps free-text feedback to [`FeedbackSignal`]s.
pub struct FeedbackExtractor {
    brands: Vec<String>,
    sentence_re: Regex,
    token_re: Regex,
}

impl FeedbackExtractor {
    /// Build an extractor that recognises `brands` (matched case-insensitively).
    pub fn new<I, S>(brands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut brands: Vec<String> = brands
            .into_iter()
            .map(Into::into)
            .filter(|b| !b.trim().is_empty())
            .collect();
        // Longer names first so "Trail Co Pro" wins over "Trail Co".
        brands.sort_by_key(|b| std::cmp::Reverse(b.len()));
        brands.dedup_by(|a, b| a.eq_ignore_ascii_case(b));
        Self {
            brands,
            sentence_re: Regex::new(r"[.!?;\n]+|\bbut\b").expect("valid regex"),
            token_re: Regex::new(r"\$?[a-z0-9']+(?:\.[0-9]+)?").expect("valid regex"),
        }
    }

    /// Extract every signal in `text`. Unmatched text yields an empty list.
    ///
    /// Identical signals are reported once, in order of first appearance.
    #[must_use]
    pub fn extract(&self, text: &str) -> Vec<FeedbackSignal> {
        let lowered = text.to_lowercase();
        let mut signals: Vec<FeedbackSignal> = Vec::new();
        let mut push = |signal: FeedbackSignal| {
            if !signals.contains(&signal) {
                signals.push(signal);
            }
        };

        for sentence in self.sentence_re.split(&lowered) {
            let tokens: Vec<&str> = self
                .token_re
                .find_iter(sentence)
                .map(|m| m.as_str())
                .collect();
            if tokens.is_empty() {
                continue;
            }

            for signal in rule_signals(&tokens) {
                push(signal);
            }
            for signal in color_statements(&tokens) {
                push(signal);
            }
            for signal in self.brand_signals(sentence, &tokens) {
                push(signal);
            }
        }

        if !signals.is_empty() {
            tracing::info!(count = signals.len(), "feedback signals extracted");
        }
        signals
    }

    fn brand_signals(&self, sentence: &str, tokens: &[&str]) -> Vec<FeedbackSignal> {
        let mut out = Vec::new();
        let mut remaining = sentence.to_owned();
        for brand in &self.brands {
            let needle = brand.to_lowercase();
            if !contains_phrase(&remaining, &needle) {
                continue;
            }
            // Blank out the match so a shorter brand name inside it is not
            // reported again.
            remaining = remaining.replace(&needle, " ");
            let score = sentiment(tokens);
            if score < 0.0 {
                out.push(FeedbackSignal::new(
                    SignalKind::Brand,
                    Direction::Avoid,
                    Some(brand.as_str()),
                ));
            } else if score > 0.0 {
                out.push(FeedbackSignal::new(
                    SignalKind::Brand,
                    Direction::Prefer,
                    Some(brand.as_str()),
                ));
            }
        }
        out
    }
}

fn rule_signals(tokens: &[&str]) -> Vec<FeedbackSignal> {
    let mut out = Vec::new();
    for (i, token) in tokens.iter().enumerate() {
        let Some(rule) = RULES.iter().find(|r| r.cue == *token) else {
            continue;
        };
        if negated(tokens, i) {
            continue;
        }
        if rule.needs_intensifier && !intensified(tokens, i) {
            continue;
        }
        let value = match (rule.kind, rule.direction) {
            (SignalKind::Budget, Direction::Lower) => stated_ceiling(tokens),
            _ => rule.value.map(str::to_owned),
        };
        out.push(FeedbackSignal {
            kind: rule.kind,
            direction: rule.direction,
            value,
        });
    }
    out
}

/// "i prefer blue", "i love the navy one", "i don't like red", "i hate orange".
fn color_statements(tokens: &[&str]) -> Vec<FeedbackSignal> {
    let mut out = Vec::new();
    for (i, token) in tokens.iter().enumerate() {
        if !COLORS.contains(token) {
            continue;
        }
        let start = i.saturating_sub(4);
        let Some(verb_at) = (start..i).rev().find(|&j| {
            LIKE_WORDS.contains(&tokens[j]) || DISLIKE_WORDS.contains(&tokens[j])
        }) else {
            continue;
        };
        let verb = tokens[verb_at];
        let likes = LIKE_WORDS.contains(&verb);
        let direction = match (likes, negated(tokens, verb_at)) {
            (true, false) | (false, true) => Direction::Prefer,
            (true, true) | (false, false) => Direction::Avoid,
        };
        out.push(FeedbackSignal::new(SignalKind::Color, direction, Some(*token)));
    }
    out
}

fn negated(tokens: &[&str], index: usize) -> bool {
    let start = index.saturating_sub(NEGATION_WINDOW);
    tokens[start..index].iter().any(|t| NEGATORS.contains(t))
}

fn intensified(tokens: &[&str], index: usize) -> bool {
    let start = index.saturating_sub(NEGATION_WINDOW);
    tokens[start..index].iter().any(|t| INTENSIFIERS.contains(t))
}

/// The first amount written as a price: `$180`, `under 150`, `less than 90`.
/// Bare numbers ("size 10 boots") are not amounts.
fn stated_ceiling(tokens: &[&str]) -> Option<String> {
    tokens.iter().enumerate().find_map(|(i, token)| {
        let (digits, priced) = match token.strip_prefix('$') {
            Some(rest) => (rest, true),
            None => (*token, false),
        };
        let amount = digits.parse::<f64>().ok().filter(|n| n.is_finite() && *n > 0.0)?;
        let cued = (i >= 1 && AMOUNT_CUES.contains(&tokens[i - 1]))
            || (i >= 2 && tokens[i - 1] == "than" && tokens[i - 2] == "less");
        (priced || cued).then(|| amount.to_string())
    })
}

/// Sum of lexicon weights, with negated words flipped, clamped to `[-1, 1]`.
fn sentiment(tokens: &[&str]) -> f32 {
    let mut score = 0.0_f32;
    for (i, token) in tokens.iter().enumerate() {
        for &(word, weight) in LEXICON {
            if *token == word {
                score += if negated(tokens, i) { -weight } else { weight };
                break;
            }
        }
    }
    score.clamp(-1.0, 1.0)
}

/// Whole-word phrase match.
fn contains_phrase(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(at, _)| {
        let before = haystack[..at].chars().next_back();
        let after = haystack[at + needle.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}
