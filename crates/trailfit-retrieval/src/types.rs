use serde::{Deserialize, Serialize};
use trailfit_core::Product;

use crate::predicate::{Constraint, Predicate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    Semantic,
    Filter,
    Hybrid,
}

impl std::fmt::Display for SearchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchMode::Semantic => write!(f, "semantic"),
            SearchMode::Filter => write!(f, "filter"),
            SearchMode::Hybrid => write!(f, "hybrid"),
        }
    }
}

/// Explicit marker for an empty result, so callers never treat "nothing
/// matched" as a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStatus {
    Found,
    NoResults,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredProduct {
    pub product: Product,
    /// Similarity for semantic and hybrid hits, `1.0` for pure-filter hits.
    /// Not comparable across modes.
    pub score: f64,
}

/// Ordered search output plus the mode and predicate that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub mode: SearchMode,
    pub hits: Vec<ScoredProduct>,
    /// The predicate actually applied (the relaxed one after relaxation).
    pub predicate: Option<Predicate>,
    /// Constraint dropped by predicate relaxation, if relaxation ran.
    pub relaxed: Option<Constraint>,
    pub status: SearchStatus,
}

impl SearchResult {
    #[must_use]
    pub fn new(mode: SearchMode, hits: Vec<ScoredProduct>, predicate: Option<Predicate>) -> Self {
        let status = if hits.is_empty() {
            SearchStatus::NoResults
        } else {
            SearchStatus::Found
        };
        Self {
            mode,
            hits,
            predicate,
            relaxed: None,
            status,
        }
    }

    /// An empty result in `mode`, used when the oracle stays unavailable.
    #[must_use]
    pub fn empty(mode: SearchMode, predicate: Option<Predicate>) -> Self {
        Self::new(mode, Vec::new(), predicate)
    }

    #[must_use]
    pub fn ids(&self) -> Vec<&str> {
        self.hits.iter().map(|h| h.product.id.as_str()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}
