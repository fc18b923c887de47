use serde::{Deserialize, Serialize};

/// Coarse climate category attached to a user's location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Climate {
    VeryCold,
    Cold,
    Cool,
    Mild,
    Rainy,
    Warm,
    Hot,
}

impl Climate {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Climate::VeryCold => "very_cold",
            Climate::Cold => "cold",
            Climate::Cool => "cool",
            Climate::Mild => "mild",
            Climate::Rainy => "rainy",
            Climate::Warm => "warm",
            Climate::Hot => "hot",
        }
    }

    /// Lexical terms appended to semantic queries for users in this climate.
    #[must_use]
    pub fn weather_terms(self) -> &'static [&'static str] {
        match self {
            Climate::VeryCold => &["warm", "insulated", "thermal", "extreme cold"],
            Climate::Cold => &["warm", "insulated"],
            Climate::Cool => &["layering", "mid-weight"],
            Climate::Mild => &["breathable", "lightweight"],
            Climate::Rainy => &["waterproof", "rain"],
            Climate::Warm => &["breathable", "moisture-wicking"],
            Climate::Hot => &["ventilated", "lightweight", "cooling"],
        }
    }
}

impl std::fmt::Display for Climate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
