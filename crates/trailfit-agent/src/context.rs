//! Preference snapshots and query rewriting.
//!
//! Lexical preferences (colors, fit, weather terms) are appended to the
//! semantic query text. Structural preferences (budget ceiling, avoided
//! brands) become filter constraints.

use serde::{Deserialize, Serialize};
use trailfit_core::{Attribute, Climate, UserProfile};
use trailfit_retrieval::{Constraint, Predicate};

use crate::climate;
use crate::intent::{mentions, normalize};

/// Nouns that pin a query to a product category. Keys match the lowercase
/// category names used in `category_preferences`.
const CATEGORY_NOUNS: &[(&str, &[&str])] = &[
    (
        "outerwear",
        &[
            "jacket",
            "jackets",
            "coat",
            "coats",
            "parka",
            "parkas",
            "shell",
            "shells",
            "anorak",
            "windbreaker",
            "softshell",
            "vest",
            "outerwear",
        ],
    ),
    (
        "footwear",
        &[
            "boot", "boots", "shoe", "shoes", "sneakers", "runners", "sandals", "footwear",
        ],
    ),
    (
        "apparel",
        &[
            "pants",
            "shirt",
            "shirts",
            "base layer",
            "midlayer",
            "fleece",
            "hoodie",
            "leggings",
            "shorts",
            "tights",
            "apparel",
        ],
    ),
    (
        "accessories/gear",
        &[
            "gloves", "mittens", "hat", "beanie", "socks", "backpack", "gaiters", "goggles",
        ],
    ),
];

const COLOR_WORDS: &[&str] = &[
    "black", "blue", "red", "green", "gray", "grey", "white", "orange", "yellow", "purple",
    "navy", "brown", "pink", "teal", "olive", "tan",
];

/// Copy of the preferences relevant to one request, taken at dispatch time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreferenceSnapshot {
    #[serde(default)]
    pub fit: Option<String>,
    /// Colors for the request's category, or general colors when the
    /// category is unknown or has none.
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(default)]
    pub avoid_colors: Vec<String>,
    #[serde(default)]
    pub budget_max: Option<f64>,
    /// Liked brands nudge semantic ranking; they never filter.
    #[serde(default)]
    pub brands_liked: Vec<String>,
    #[serde(default)]
    pub brands_avoided: Vec<String>,
    #[serde(default)]
    pub climate: Option<Climate>,
}

impl PreferenceSnapshot {
    #[must_use]
    pub fn from_profile(profile: &UserProfile, category: Option<&str>) -> Self {
        let category_prefs = category.and_then(|c| profile.category(c));
        let colors = category_prefs
            .map(|p| p.colors.clone())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| profile.general.colors.clone());
        let avoid_colors = category_prefs
            .map(|p| p.avoid_colors.clone())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| profile.general.avoid_colors.clone());
        let location = &profile.location;
        let climate = location.climate.or_else(|| {
            climate::infer(location.city.as_deref(), location.region.as_deref())
        });

        Self {
            fit: profile.sizing.fit.clone(),
            colors,
            avoid_colors,
            budget_max: profile.general.budget_max,
            brands_liked: profile.general.brands_liked.clone(),
            brands_avoided: profile.general.brands_avoided.clone(),
            climate,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fit.is_none()
            && self.colors.is_empty()
            && self.avoid_colors.is_empty()
            && self.budget_max.is_none()
            && self.brands_liked.is_empty()
            && self.brands_avoided.is_empty()
            && self.climate.is_none()
    }
}

/// What personalization did to a request, for the formatter.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AppliedContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Terms appended to the semantic query.
    pub lexical_terms: Vec<String>,
    /// Constraints added to the filter predicate.
    pub constraints: Vec<Constraint>,
}

impl AppliedContext {
    #[must_use]
    pub fn is_personalized(&self) -> bool {
        !self.lexical_terms.is_empty() || !self.constraints.is_empty()
    }
}

/// A query after personalization.
#[derive(Debug, Clone, PartialEq)]
pub struct Rewrite {
    pub text: String,
    pub predicate: Predicate,
    pub applied: AppliedContext,
}

/// Product category a query is about, if its nouns say so.
#[must_use]
pub fn infer_category(query: &str) -> Option<&'static str> {
    let normalized = normalize(query);
    CATEGORY_NOUNS
        .iter()
        .find(|(_, nouns)| nouns.iter().any(|n| mentions(&normalized, n)))
        .map(|&(category, _)| category)
}

/// Merge a snapshot into a query.
///
/// Explicit caller filters always win: a snapshot budget is not added when
/// the caller already set a price ceiling, and avoided brands are not
/// excluded when the caller asked for a specific brand. Colors are appended
/// only when the query names no color of its own.
#[must_use]
pub fn rewrite(query: &str, explicit: &Predicate, snapshot: Option<&PreferenceSnapshot>) -> Rewrite {
    let mut text = query.trim().to_owned();
    let mut predicate = explicit.clone();
    let mut applied = AppliedContext::default();

    let Some(snapshot) = snapshot else {
        return Rewrite {
            text,
            predicate,
            applied,
        };
    };

    let normalized = normalize(query);
    let mut terms: Vec<String> = Vec::new();
    let mut push_term = |term: &str| {
        if !mentions(&normalized, &term.to_lowercase()) && !terms.iter().any(|t| t == term) {
            terms.push(term.to_owned());
        }
    };

    let names_color = COLOR_WORDS.iter().any(|c| mentions(&normalized, c));
    if !names_color {
        for color in &snapshot.colors {
            push_term(color);
        }
    }
    if snapshot.avoid_colors.iter().any(|c| c == "bright") {
        push_term("neutral");
    }
    if let Some(fit) = &snapshot.fit {
        push_term(&format!("{fit} fit"));
    }
    if let Some(climate) = snapshot.climate {
        for term in climate.weather_terms() {
            push_term(term);
        }
    }

    let names_brand = explicit
        .constraints
        .iter()
        .any(|c| matches!(c, Constraint::Equals { attribute: Attribute::Brand, .. }));
    if !names_brand {
        for brand in &snapshot.brands_liked {
            push_term(brand);
        }
    }

    if let Some(budget) = snapshot.budget_max {
        if explicit.max_price().is_none() {
            let constraint = Constraint::MaxPrice { value: budget };
            predicate.push(constraint.clone());
            applied.constraints.push(constraint);
        }
    }
    if !snapshot.brands_avoided.is_empty() && !names_brand {
        let constraint = Constraint::ExcludeBrands {
            brands: snapshot.brands_avoided.clone(),
        };
        predicate.push(constraint.clone());
        applied.constraints.push(constraint);
    }

    if !terms.is_empty() {
        if !text.is_empty() {
            text.push(' ');
        }
        text.push_str(&terms.join(" "));
    }
    applied.lexical_terms = terms;

    Rewrite {
        text,
        predicate,
        applied,
    }
}

#[cfg(test)]
mod tests {
    use trailfit_core::CategoryPreferences;

    use super::*;

    fn profile() -> UserProfile {
        let mut profile = UserProfile::empty();
        profile.category_preferences.insert(
            "outerwear".to_owned(),
            CategoryPreferences {
                colors: vec!["blue".to_owned()],
                ..CategoryPreferences::default()
            },
        );
        profile.general.budget_max = Some(300.0);
        profile
    }

    #[test]
    fn category_from_nouns() {
        assert_eq!(infer_category("a warm jacket"), Some("outerwear"));
        assert_eq!(infer_category("waterproof hiking boots"), Some("footwear"));
        assert_eq!(infer_category("merino base layer"), Some("apparel"));
        assert_eq!(infer_category("something for skiing"), None);
    }

    #[test]
    fn snapshot_uses_category_colors_only_for_that_category() {
        let profile = profile();
        let outerwear = PreferenceSnapshot::from_profile(&profile, Some("outerwear"));
        assert_eq!(outerwear.colors, vec!["blue"]);
        let footwear = PreferenceSnapshot::from_profile(&profile, Some("footwear"));
        assert!(footwear.colors.is_empty());
        assert_eq!(footwear.budget_max, Some(300.0));
    }

    #[test]
    fn snapshot_infers_climate_from_city() {
        let mut profile = UserProfile::empty();
        profile.location.city = Some("Fargo".to_owned());
        let snapshot = PreferenceSnapshot::from_profile(&profile, None);
        assert_eq!(snapshot.climate, Some(Climate::Cold));
    }

    #[test]
    fn budget_goes_to_predicate_and_colors_to_text() {
        let snapshot = PreferenceSnapshot::from_profile(&profile(), Some("outerwear"));
        let rewrite = rewrite("jacket", &Predicate::new(), Some(&snapshot));

        assert_eq!(rewrite.text, "jacket blue");
        assert_eq!(
            rewrite.predicate.constraints,
            vec![Constraint::MaxPrice { value: 300.0 }]
        );
        assert_eq!(rewrite.applied.lexical_terms, vec!["blue"]);
        assert!(rewrite.applied.is_personalized());
    }

    #[test]
    fn explicit_ceiling_and_color_win() {
        let snapshot = PreferenceSnapshot::from_profile(&profile(), Some("outerwear"));
        let explicit = Predicate::new().with(Constraint::MaxPrice { value: 150.0 });
        let rewrite = rewrite("red jacket", &explicit, Some(&snapshot));

        assert_eq!(rewrite.text, "red jacket");
        assert_eq!(rewrite.predicate.max_price(), Some(150.0));
        assert_eq!(rewrite.predicate.constraints.len(), 1);
        assert!(!rewrite.applied.is_personalized());
    }

    #[test]
    fn climate_fit_and_avoidances() {
        let snapshot = PreferenceSnapshot {
            fit: Some("relaxed".to_owned()),
            avoid_colors: vec!["bright".to_owned()],
            brands_avoided: vec!["NorthPeak".to_owned()],
            climate: Some(Climate::Cold),
            ..PreferenceSnapshot::default()
        };
        let rewrite = rewrite("warm parka", &Predicate::new(), Some(&snapshot));

        assert_eq!(rewrite.text, "warm parka neutral relaxed fit insulated");
        assert_eq!(
            rewrite.predicate.constraints,
            vec![Constraint::ExcludeBrands {
                brands: vec!["NorthPeak".to_owned()]
            }]
        );
    }

    #[test]
    fn liked_brands_are_lexical_unless_a_brand_is_filtered() {
        let snapshot = PreferenceSnapshot {
            brands_liked: vec!["Ridgeline".to_owned()],
            ..PreferenceSnapshot::default()
        };
        let rewrite = rewrite("rain shell", &Predicate::new(), Some(&snapshot));
        assert_eq!(rewrite.text, "rain shell Ridgeline");
        assert!(rewrite.predicate.is_empty());

        let explicit = Predicate::new().with(Constraint::Equals {
            attribute: Attribute::Brand,
            value: "NorthPeak".to_owned(),
        });
        let rewrite = super::rewrite("rain shell", &explicit, Some(&snapshot));
        assert_eq!(rewrite.text, "rain shell");
    }

    #[test]
    fn no_snapshot_leaves_query_untouched() {
        let rewrite = rewrite("  jacket ", &Predicate::new(), None);
        assert_eq!(rewrite.text, "jacket");
        assert!(rewrite.predicate.is_empty());
        assert_eq!(rewrite.applied, AppliedContext::default());
    }
}
