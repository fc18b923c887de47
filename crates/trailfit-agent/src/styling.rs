//! Outfit planning for styling requests.
//!
//! An activity decides which product categories an outfit needs. Weather,
//! gender, and a stated budget in the request become structural filters on
//! each category search.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use trailfit_core::Attribute;
use trailfit_retrieval::{Constraint, SearchResult};

use crate::intent::{mentions, normalize};

/// Pieces shown per outfit category.
pub const PIECES_PER_CATEGORY: usize = 2;

static BUDGET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:\$\s*|\b(?:under|below|max|maximum|budget|within|less than)\s+\$?)(\d[\d,]*(?:\.\d+)?)",
    )
    .expect("valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Activity {
    Hiking,
    Skiing,
    Camping,
    Running,
    Climbing,
    Casual,
    Travel,
    Everyday,
}

impl Activity {
    const ALL: [Activity; 8] = [
        Activity::Hiking,
        Activity::Skiing,
        Activity::Camping,
        Activity::Running,
        Activity::Climbing,
        Activity::Casual,
        Activity::Travel,
        Activity::Everyday,
    ];

    /// First activity whose cues the query mentions.
    #[must_use]
    pub fn detect(query: &str) -> Option<Self> {
        let normalized = normalize(query);
        Self::ALL
            .into_iter()
            .find(|a| a.cues().iter().any(|c| mentions(&normalized, c)))
    }

    fn cues(self) -> &'static [&'static str] {
        match self {
            Activity::Hiking => &["hiking", "hike", "trekking", "trail"],
            Activity::Skiing => &["skiing", "ski", "slopes", "snowboarding"],
            Activity::Camping => &["camping", "camp", "tent"],
            Activity::Running => &["running", "run", "jogging", "marathon"],
            Activity::Climbing => &["climbing", "climb", "bouldering"],
            Activity::Casual => &["casual", "relaxed"],
            Activity::Travel => &["travel", "trip", "vacation", "flying"],
            Activity::Everyday => &["everyday", "daily", "commute", "commuting"],
        }
    }

    /// Terms added to the search text for this activity.
    #[must_use]
    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            Activity::Hiking => &["hiking", "trail"],
            Activity::Skiing => &["ski", "insulated", "waterproof"],
            Activity::Camping => &["camping", "layering"],
            Activity::Running => &["running", "lightweight"],
            Activity::Climbing => &["climbing", "durable"],
            Activity::Casual => &["casual"],
            Activity::Travel => &["travel", "packable"],
            Activity::Everyday => &[],
        }
    }

    /// Categories an outfit must cover, then ones it may add.
    fn categories(self) -> (&'static [&'static str], &'static [&'static str]) {
        match self {
            Activity::Hiking => (&["Footwear", "Outerwear"], &["Apparel", "Accessories/Gear"]),
            Activity::Skiing => (&["Outerwear", "Footwear"], &["Accessories/Gear", "Apparel"]),
            Activity::Camping | Activity::Travel => {
                (&["Outerwear", "Footwear"], &["Apparel", "Accessories/Gear"])
            }
            Activity::Running => (&["Footwear", "Apparel"], &["Accessories/Gear"]),
            Activity::Climbing => (&["Footwear", "Outerwear"], &["Accessories/Gear"]),
            Activity::Casual | Activity::Everyday => (&["Outerwear"], &["Footwear", "Apparel"]),
        }
    }

    fn label(self) -> &'static str {
        match self {
            Activity::Hiking => "hiking",
            Activity::Skiing => "skiing",
            Activity::Camping => "camping",
            Activity::Running => "running",
            Activity::Climbing => "climbing",
            Activity::Casual => "casual wear",
            Activity::Travel => "travel",
            Activity::Everyday => "everyday wear",
        }
    }
}

impl std::fmt::Display for Activity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Weather {
    Snowy,
    Rainy,
    Cold,
    Cool,
    Mild,
    Warm,
    Windy,
}

impl Weather {
    /// Checked in order: precipitation wins over temperature.
    const ALL: [Weather; 7] = [
        Weather::Snowy,
        Weather::Rainy,
        Weather::Cold,
        Weather::Cool,
        Weather::Mild,
        Weather::Warm,
        Weather::Windy,
    ];

    #[must_use]
    pub fn detect(query: &str) -> Option<Self> {
        let normalized = normalize(query);
        Self::ALL
            .into_iter()
            .find(|w| w.cues().iter().any(|c| mentions(&normalized, c)))
    }

    // "warm" is left out: a "warm jacket" is a cold-weather request.
    fn cues(self) -> &'static [&'static str] {
        match self {
            Weather::Snowy => &["snow", "snowy", "blizzard", "powder"],
            Weather::Rainy => &["rain", "rainy", "wet", "drizzle", "showers"],
            Weather::Cold => &["cold", "freezing", "winter", "frigid", "subzero"],
            Weather::Cool => &["cool", "chilly", "brisk", "fall", "autumn", "spring"],
            Weather::Mild => &["mild", "moderate", "pleasant", "temperate"],
            Weather::Warm => &["hot", "summer", "heat", "humid"],
            Weather::Windy => &["wind", "windy", "breezy", "gusty"],
        }
    }

    #[must_use]
    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            Weather::Snowy => &["snow", "winter", "warm"],
            Weather::Rainy => &["rain", "waterproof", "sealed seams"],
            Weather::Cold => &["warm", "insulated", "thermal"],
            Weather::Cool => &["layering", "mid-weight"],
            Weather::Mild => &["breathable", "lightweight"],
            Weather::Warm => &["ventilated", "moisture-wicking", "cooling"],
            Weather::Windy => &["windproof", "shell"],
        }
    }

    /// Seasons a product may be rated for. All-season gear always fits.
    fn seasons(self) -> &'static [&'static str] {
        match self {
            Weather::Snowy | Weather::Cold => &["Winter", "All-season"],
            Weather::Cool => &["Fall", "Spring", "All-season"],
            Weather::Mild => &["Spring", "Fall", "All-season"],
            Weather::Warm => &["Summer", "All-season"],
            Weather::Rainy | Weather::Windy => &[],
        }
    }

    fn waterproofing(self) -> &'static [&'static str] {
        match self {
            Weather::Snowy => &["Waterproof"],
            Weather::Rainy => &["Waterproof", "Water-resistant"],
            _ => &[],
        }
    }
}

impl std::fmt::Display for Weather {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Weather::Snowy => "snowy",
            Weather::Rainy => "rainy",
            Weather::Cold => "cold",
            Weather::Cool => "cool",
            Weather::Mild => "mild",
            Weather::Warm => "warm",
            Weather::Windy => "windy",
        };
        f.write_str(label)
    }
}

/// What a styling request asks for, read from its text.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OutfitPlan {
    pub activity: Option<Activity>,
    pub weather: Option<Weather>,
    /// `Men` or `Women`; unisex products always qualify.
    pub gender: Option<String>,
    pub budget_max: Option<f64>,
}

impl OutfitPlan {
    #[must_use]
    pub fn from_query(query: &str) -> Self {
        Self {
            activity: Activity::detect(query),
            weather: Weather::detect(query),
            gender: stated_gender(query).map(str::to_owned),
            budget_max: stated_budget(query),
        }
    }

    /// Categories to search, each with whether the outfit requires it.
    /// Without a recognised activity the everyday set is used.
    #[must_use]
    pub fn categories(&self) -> Vec<(&'static str, bool)> {
        let (required, optional) = self.activity.unwrap_or(Activity::Everyday).categories();
        required
            .iter()
            .map(|c| (*c, true))
            .chain(optional.iter().map(|c| (*c, false)))
            .collect()
    }

    /// Search terms for one category. Weather terms go to required pieces
    /// only.
    #[must_use]
    pub fn keywords(&self, required: bool) -> Vec<&'static str> {
        let mut terms: Vec<&'static str> = Vec::new();
        if required {
            if let Some(weather) = self.weather {
                terms.extend(weather.keywords());
            }
        }
        if let Some(activity) = self.activity {
            terms.extend(activity.keywords());
        }
        let mut seen = Vec::new();
        terms.retain(|t| {
            let fresh = !seen.contains(t);
            seen.push(*t);
            fresh
        });
        terms
    }

    /// Filters for one category. Weather filters apply to required pieces
    /// only; gender and budget apply to every piece.
    #[must_use]
    pub fn constraints(&self, required: bool) -> Vec<Constraint> {
        let mut out = Vec::new();
        if required {
            if let Some(weather) = self.weather {
                push_one_of(&mut out, Attribute::Season, weather.seasons());
                push_one_of(&mut out, Attribute::Waterproofing, weather.waterproofing());
            }
        }
        if let Some(gender) = &self.gender {
            out.push(Constraint::OneOf {
                attribute: Attribute::Gender,
                values: vec![gender.clone(), "Unisex".to_owned()],
            });
        }
        if let Some(budget) = self.budget_max {
            out.push(Constraint::MaxPrice { value: budget });
        }
        out
    }
}

/// Search results for one outfit category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutfitPiece {
    pub category: String,
    pub required: bool,
    pub result: SearchResult,
}

fn push_one_of(out: &mut Vec<Constraint>, attribute: Attribute, values: &[&str]) {
    if values.is_empty() {
        return;
    }
    out.push(Constraint::OneOf {
        attribute,
        values: values.iter().map(|v| (*v).to_owned()).collect(),
    });
}

fn stated_gender(query: &str) -> Option<&'static str> {
    let normalized = normalize(query);
    let said = |words: &[&str]| words.iter().any(|w| mentions(&normalized, w));
    if said(&["women", "women's", "womens", "woman", "female", "ladies"]) {
        Some("Women")
    } else if said(&["men", "men's", "mens", "man", "male"]) {
        Some("Men")
    } else {
        None
    }
}

/// A price ceiling written as `$120` or cued by "under", "max", or "less
/// than". Bare numbers are sizes or counts, not budgets.
fn stated_budget(query: &str) -> Option<f64> {
    BUDGET_RE.captures_iter(query).find_map(|caps| {
        caps.get(1)?
            .as_str()
            .replace(',', "")
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite() && *n > 0.0)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activity_and_weather_from_cues() {
        let plan = OutfitPlan::from_query("what should I wear skiing in a blizzard");
        assert_eq!(plan.activity, Some(Activity::Skiing));
        assert_eq!(plan.weather, Some(Weather::Snowy));
        assert_eq!(OutfitPlan::from_query("an outfit please"), OutfitPlan::default());
    }

    #[test]
    fn warm_clothing_is_not_warm_weather() {
        assert_eq!(Weather::detect("a warm outfit for winter hiking"), Some(Weather::Cold));
        assert_eq!(Weather::detect("a warm outfit"), None);
    }

    #[test]
    fn activity_keywords() {
        assert_eq!(
            Activity::detect("what should I wear skiing").map(Activity::keywords),
            Some(&["ski", "insulated", "waterproof"][..])
        );
        assert_eq!(Activity::detect("what should I wear"), None);
    }

    #[test]
    fn categories_follow_the_activity() {
        let plan = OutfitPlan::from_query("running outfit");
        assert_eq!(
            plan.categories(),
            vec![("Footwear", true), ("Apparel", true), ("Accessories/Gear", false)]
        );
        assert_eq!(
            OutfitPlan::default().categories(),
            vec![("Outerwear", true), ("Footwear", false), ("Apparel", false)]
        );
    }

    #[test]
    fn rainy_required_pieces_filter_on_waterproofing() {
        let plan = OutfitPlan::from_query("women's hiking outfit for rainy weather under $250");
        assert_eq!(plan.gender.as_deref(), Some("Women"));
        assert_eq!(plan.budget_max, Some(250.0));

        let gender = Constraint::OneOf {
            attribute: Attribute::Gender,
            values: vec!["Women".into(), "Unisex".into()],
        };
        assert_eq!(
            plan.constraints(true),
            vec![
                Constraint::OneOf {
                    attribute: Attribute::Waterproofing,
                    values: vec!["Waterproof".into(), "Water-resistant".into()],
                },
                gender.clone(),
                Constraint::MaxPrice { value: 250.0 },
            ]
        );
        assert_eq!(
            plan.constraints(false),
            vec![gender, Constraint::MaxPrice { value: 250.0 }]
        );
        assert_eq!(
            plan.keywords(true),
            vec!["rain", "waterproof", "sealed seams", "hiking", "trail"]
        );
        assert_eq!(plan.keywords(false), vec!["hiking", "trail"]);
    }

    #[test]
    fn cold_weather_filters_on_season() {
        let plan = OutfitPlan::from_query("men's outfit for cold weather camping");
        assert_eq!(plan.gender.as_deref(), Some("Men"));
        assert_eq!(
            plan.constraints(true)[0],
            Constraint::OneOf {
                attribute: Attribute::Season,
                values: vec!["Winter".into(), "All-season".into()],
            }
        );
    }

    #[test]
    fn budgets_need_a_dollar_sign_or_a_cue() {
        assert_eq!(stated_budget("ski outfit under 300"), Some(300.0));
        assert_eq!(stated_budget("outfit for less than $1,200.50"), Some(1200.5));
        assert_eq!(stated_budget("size 10 boots for hiking"), None);
        assert_eq!(stated_budget("a $80 max"), Some(80.0));
    }

    #[test]
    fn womens_is_not_read_as_mens() {
        assert_eq!(stated_gender("womens rain outfit"), Some("Women"));
        assert_eq!(stated_gender("outfit for a man"), Some("Men"));
        assert_eq!(stated_gender("unisex layers"), None);
    }
}
