//! The similarity-oracle contract.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::error::OracleError;
use crate::predicate::Predicate;

/// One ranked oracle match.
#[derive(Debug, Clone, PartialEq)]
pub struct OracleHit {
    pub product_id: String,
    /// Cosine distance in `[0, 2]`; lower is more similar.
    pub distance: f64,
}

/// Black-box nearest-neighbour capability over the catalog.
///
/// Every query accepts an optional `within` id set; when present the oracle
/// ranks only those products (filter-then-search). Results come back ordered
/// by ascending distance.
#[async_trait]
pub trait SimilarityOracle: Send + Sync {
    async fn query_text(
        &self,
        text: &str,
        k: usize,
        within: Option<&HashSet<String>>,
    ) -> Result<Vec<OracleHit>, OracleError>;

    async fn query_vector(
        &self,
        vector: &[f32],
        k: usize,
        within: Option<&HashSet<String>>,
    ) -> Result<Vec<OracleHit>, OracleError>;

    /// The stored embedding for a product, or `None` if the oracle has none.
    async fn embedding(&self, product_id: &str) -> Result<Option<Vec<f32>>, OracleError>;

    /// Ids of every product satisfying `predicate`.
    async fn filter_ids(&self, predicate: &Predicate) -> Result<Vec<String>, OracleError>;
}
