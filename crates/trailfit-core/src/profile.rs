use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::climate::Climate;
use crate::feedback::FeedbackSignal;

/// Normalize a user identifier: trimmed and lowercased.
#[must_use]
pub fn normalize_user_id(user_id: &str) -> String {
    user_id.trim().to_lowercase()
}

/// Durable per-user preference profile.
///
/// Every section deserializes with defaults so a partially written document
/// still yields a usable profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub sizing: Sizing,
    /// Attribute preferences keyed by lowercase product category. Colors for
    /// outerwear never apply to footwear.
    #[serde(default, alias = "preferences")]
    pub category_preferences: BTreeMap<String, CategoryPreferences>,
    #[serde(default)]
    pub general: GeneralPreferences,
    #[serde(default)]
    pub location: Location,
    #[serde(default, alias = "feedback")]
    pub feedback_history: Vec<FeedbackEntry>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub last_seen: DateTime<Utc>,
}

impl UserProfile {
    /// An empty profile created at `now`.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            sizing: Sizing::default(),
            category_preferences: BTreeMap::new(),
            general: GeneralPreferences::default(),
            location: Location::default(),
            feedback_history: Vec::new(),
            created_at: now,
            last_seen: now,
        }
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::new(Utc::now())
    }

    /// Advance `last_seen`, never letting it fall behind `created_at`.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_seen = now.max(self.created_at).max(self.last_seen);
    }

    /// Preferences for one category, if any were recorded.
    #[must_use]
    pub fn category(&self, category: &str) -> Option<&CategoryPreferences> {
        self.category_preferences.get(&category.trim().to_lowercase())
    }

    /// Mutable preferences for one category, creating the entry if needed.
    pub fn category_mut(&mut self, category: &str) -> &mut CategoryPreferences {
        self.category_preferences
            .entry(category.trim().to_lowercase())
            .or_default()
    }

    /// Merge another profile's category map into this one, category by
    /// category.
    pub fn merge_categories(&mut self, other: &BTreeMap<String, CategoryPreferences>) {
        for (category, prefs) in other {
            self.category_mut(category).merge_from(prefs);
        }
    }

    /// True when no preference section carries data.
    #[must_use]
    pub fn has_preferences(&self) -> bool {
        !self.sizing.is_empty()
            || self.category_preferences.values().any(|c| !c.is_empty())
            || !self.general.is_empty()
            || !self.location.is_empty()
    }
}

impl Default for UserProfile {
    fn default() -> Self {
        Self::empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sizing {
    /// Preferred fit, e.g. `slim`, `classic`, `relaxed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shoe_size: Option<String>,
}

impl Sizing {
    /// Overwrite fields that are set in `other`.
    pub fn merge_from(&mut self, other: &Sizing) {
        merge_opt(&mut self.fit, &other.fit);
        merge_opt(&mut self.size, &other.size);
        merge_opt(&mut self.shoe_size, &other.shoe_size);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fit.is_none() && self.size.is_none() && self.shoe_size.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryPreferences {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub colors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub avoid_colors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

impl CategoryPreferences {
    /// Overwrite fields that are set (non-empty) in `other`.
    pub fn merge_from(&mut self, other: &CategoryPreferences) {
        merge_vec(&mut self.colors, &other.colors);
        merge_vec(&mut self.avoid_colors, &other.avoid_colors);
        merge_opt(&mut self.style, &other.style);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty() && self.avoid_colors.is_empty() && self.style.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneralPreferences {
    /// Budget ceiling in USD.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_max: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub brands_liked: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub brands_avoided: Vec<String>,
    /// Colors wanted when no category is known.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub colors: Vec<String>,
    /// Color families to steer away from when no category is known.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub avoid_colors: Vec<String>,
}

impl GeneralPreferences {
    /// Overwrite fields that are set (non-empty) in `other`.
    pub fn merge_from(&mut self, other: &GeneralPreferences) {
        if other.budget_max.is_some() {
            self.budget_max = other.budget_max;
        }
        merge_vec(&mut self.brands_liked, &other.brands_liked);
        merge_vec(&mut self.brands_avoided, &other.brands_avoided);
        merge_vec(&mut self.colors, &other.colors);
        merge_vec(&mut self.avoid_colors, &other.avoid_colors);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.budget_max.is_none()
            && self.brands_liked.is_empty()
            && self.brands_avoided.is_empty()
            && self.colors.is_empty()
            && self.avoid_colors.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Inferred from city/region when the location is saved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub climate: Option<Climate>,
}

impl Location {
    /// Overwrite fields that are set in `other`.
    pub fn merge_from(&mut self, other: &Location) {
        merge_opt(&mut self.city, &other.city);
        merge_opt(&mut self.region, &other.region);
        if other.climate.is_some() {
            self.climate = other.climate;
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.city.is_none() && self.region.is_none() && self.climate.is_none()
    }
}

/// One recorded piece of free-text feedback and the signals it produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackEntry {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default)]
    pub signals: Vec<FeedbackSignal>,
    pub timestamp: DateTime<Utc>,
}

fn merge_opt(dst: &mut Option<String>, src: &Option<String>) {
    if let Some(v) = src {
        *dst = Some(v.clone());
    }
}

fn merge_vec(dst: &mut Vec<String>, src: &[String]) {
    if !src.is_empty() {
        *dst = src.to_vec();
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn normalize_trims_and_lowercases() {
        assert_eq!(normalize_user_id("  Sarah "), "sarah");
    }

    #[test]
    fn touch_never_moves_last_seen_before_created_at() {
        let now = Utc::now();
        let mut profile = UserProfile::new(now);
        profile.touch(now - Duration::hours(1));
        assert!(profile.last_seen >= profile.created_at);
        profile.touch(now + Duration::hours(1));
        assert_eq!(profile.last_seen, now + Duration::hours(1));
    }

    #[test]
    fn sizing_merge_only_overwrites_set_fields() {
        let mut sizing = Sizing {
            fit: Some("slim".into()),
            size: Some("M".into()),
            shoe_size: None,
        };
        sizing.merge_from(&Sizing {
            fit: Some("relaxed".into()),
            ..Sizing::default()
        });
        assert_eq!(sizing.fit.as_deref(), Some("relaxed"));
        assert_eq!(sizing.size.as_deref(), Some("M"));
    }

    #[test]
    fn category_keys_are_case_insensitive() {
        let mut profile = UserProfile::empty();
        profile.category_mut("Outerwear").colors = vec!["blue".into()];
        assert_eq!(profile.category("outerwear").unwrap().colors, vec!["blue"]);
        assert!(profile.category("footwear").is_none());
    }

    #[test]
    fn partial_document_deserializes_with_defaults() {
        let json = r#"{"sizing": {"fit": "classic"}, "preferences": {"outerwear": {"colors": ["navy"]}}}"#;
        let profile: UserProfile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.sizing.fit.as_deref(), Some("classic"));
        assert_eq!(profile.category("outerwear").unwrap().colors, vec!["navy"]);
        assert!(profile.feedback_history.is_empty());
        assert!(profile.has_preferences());
    }

    #[test]
    fn empty_profile_has_no_preferences() {
        assert!(!UserProfile::empty().has_preferences());
    }
}
