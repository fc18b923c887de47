//! Rule-based intent classification over lexical cues.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    Styling,
    ProductSearch,
    Comparison,
    Info,
    Unknown,
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Intent::Styling => "STYLING",
            Intent::ProductSearch => "PRODUCT_SEARCH",
            Intent::Comparison => "COMPARISON",
            Intent::Info => "INFO",
            Intent::Unknown => "UNKNOWN",
        };
        f.write_str(label)
    }
}

/// Cue phrases per intent, checked in priority order. Phrases match whole
/// words only, so "wear" does not fire on "outerwear".
const CUES: &[(Intent, &[&str])] = &[
    (
        Intent::Comparison,
        &[
            "compare",
            "comparing",
            "comparison",
            "versus",
            "vs",
            "difference",
            "differences",
            "better",
            "which is better",
            "which one",
        ],
    ),
    (
        Intent::Styling,
        &[
            "outfit",
            "outfits",
            "wear",
            "wearing",
            "dress",
            "style",
            "styling",
            "look",
            "fashion",
            "matching",
            "coordinate",
            "wardrobe",
            "what should i",
            "help me dress",
            "put together",
        ],
    ),
    (
        Intent::Info,
        &[
            "what brands",
            "which brands",
            "list brands",
            "brands do you",
            "what categories",
            "which categories",
            "how many",
            "statistics",
            "stats",
            "catalog",
            "price range",
            "do you carry",
            "do you sell",
        ],
    ),
    (
        Intent::ProductSearch,
        &[
            // Clothing and gear
            "jacket",
            "jackets",
            "coat",
            "coats",
            "parka",
            "parkas",
            "shell",
            "shells",
            "vest",
            "fleece",
            "hoodie",
            "pants",
            "shorts",
            "leggings",
            "shirt",
            "base layer",
            "midlayer",
            "boots",
            "boot",
            "shoes",
            "shoe",
            "sneakers",
            "runners",
            "sandals",
            "gloves",
            "mittens",
            "hat",
            "beanie",
            "socks",
            "backpack",
            "pack",
            "gear",
            "apparel",
            "footwear",
            "outerwear",
            // Activities
            "hiking",
            "hike",
            "skiing",
            "ski",
            "snowboarding",
            "camping",
            "running",
            "trail",
            "climbing",
            "backpacking",
            "trekking",
            // Weather
            "warm",
            "cold",
            "winter",
            "summer",
            "rain",
            "snow",
            "waterproof",
            "windproof",
            "insulated",
            // Shopping verbs
            "looking for",
            "show me",
            "find me",
            "recommend",
            "buy",
        ],
    ),
];

/// Label `query` with exactly one [`Intent`].
///
/// Total and deterministic. When cues for several intents are present the
/// first in `COMPARISON > STYLING > INFO > PRODUCT_SEARCH` wins; text with no
/// cue at all is `UNKNOWN`.
#[must_use]
pub fn classify(query: &str) -> Intent {
    let normalized = normalize(query);
    CUES.iter()
        .find(|(_, cues)| cues.iter().any(|cue| mentions(&normalized, cue)))
        .map_or(Intent::Unknown, |&(intent, _)| intent)
}

/// Lowercased words joined by single spaces and padded with a space on each
/// side, ready for whole-word phrase lookup.
pub(crate) fn normalize(text: &str) -> String {
    let words: Vec<String> = text
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();
    format!(" {} ", words.join(" "))
}

/// Whole-word lookup of `phrase` in text produced by [`normalize`].
pub(crate) fn mentions(normalized: &str, phrase: &str) -> bool {
    normalized.contains(&format!(" {phrase} "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warm_jacket_for_skiing_is_a_product_search() {
        assert_eq!(classify("warm jacket for skiing"), Intent::ProductSearch);
    }

    #[test]
    fn comparison_cues() {
        assert_eq!(
            classify("Compare the NorthPeak shell vs the Ridgeline one"),
            Intent::Comparison
        );
        assert_eq!(
            classify("which is better for rain, gore-tex or eVent?"),
            Intent::Comparison
        );
    }

    #[test]
    fn comparison_outranks_styling_and_search() {
        assert_eq!(
            classify("which outfit is better for hiking"),
            Intent::Comparison
        );
    }

    #[test]
    fn styling_outranks_info_and_search() {
        assert_eq!(classify("what should I wear hiking in the rain"), Intent::Styling);
        assert_eq!(classify("an outfit from your top brands"), Intent::Styling);
    }

    #[test]
    fn info_cues() {
        assert_eq!(classify("How many brands do you carry?"), Intent::Info);
        assert_eq!(classify("what categories are in the catalog"), Intent::Info);
        assert_eq!(classify("Which brands make rain shells?"), Intent::Info);
    }

    #[test]
    fn naming_brands_in_a_search_is_not_an_info_question() {
        assert_eq!(
            classify("show me jackets from your best brands"),
            Intent::ProductSearch
        );
    }

    #[test]
    fn cues_match_whole_words_only() {
        assert_eq!(classify("outerwear"), Intent::ProductSearch);
        assert_eq!(classify("I'm looking for boots"), Intent::ProductSearch);
    }

    #[test]
    fn unmatched_text_is_unknown() {
        assert_eq!(classify(""), Intent::Unknown);
        assert_eq!(classify("hello there"), Intent::Unknown);
    }

    #[test]
    fn display_uses_wire_labels() {
        assert_eq!(Intent::ProductSearch.to_string(), "PRODUCT_SEARCH");
        assert_eq!(
            serde_json::to_string(&Intent::Comparison).unwrap(),
            "\"COMPARISON\""
        );
    }
}
