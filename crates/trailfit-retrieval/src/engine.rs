//! The hybrid retrieval engine.
//!
//! Every oracle call runs under a timeout and is retried once on transient
//! failure; all searches are idempotent reads. Ranking, filtering, and
//! relaxation are synchronous over the in-memory catalog.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use trailfit_core::{AppConfig, Catalog, Product};

use crate::error::{OracleError, RetrievalError};
use crate::oracle::{OracleHit, SimilarityOracle};
use crate::predicate::{Predicate, SortKey};
use crate::retry::retry_with_backoff;
use crate::types::{ScoredProduct, SearchMode, SearchResult};

/// Similarity scores closer than this are treated as equal when ranking.
pub const SCORE_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub oracle_timeout: Duration,
    /// Additional attempts after a transient oracle failure.
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            oracle_timeout: Duration::from_millis(5000),
            max_retries: 1,
            retry_backoff_ms: 250,
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            oracle_timeout: Duration::from_millis(config.oracle_timeout_ms),
            max_retries: 1,
            retry_backoff_ms: config.retry_backoff_ms,
        }
    }
}

pub struct HybridEngine {
    catalog: Arc<Catalog>,
    oracle: Arc<dyn SimilarityOracle>,
    config: EngineConfig,
}

impl HybridEngine {
    #[must_use]
    pub fn new(
        catalog: Arc<Catalog>,
        oracle: Arc<dyn SimilarityOracle>,
        config: EngineConfig,
    ) -> Self {
        Self {
            catalog,
            oracle,
            config,
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    #[must_use]
    pub fn product(&self, id: &str) -> Option<&Product> {
        self.catalog.get(id)
    }

    /// Top-`k` products by similarity to `query`, with `score = 1 − distance`.
    ///
    /// `min_similarity` is clamped to `[0, 1]`; hits scoring below it are
    /// dropped. Equal scores keep the oracle's order.
    ///
    /// # Errors
    ///
    /// [`RetrievalError::InvalidInput`] for `k == 0` or a blank query;
    /// [`RetrievalError::Oracle`] once the retry is exhausted.
    pub async fn search_semantic(
        &self,
        query: &str,
        k: usize,
        min_similarity: f64,
    ) -> Result<SearchResult, RetrievalError> {
        validate_k(k)?;
        let query = non_blank(query)?;
        let min = clamp_similarity(min_similarity);

        let hits = self
            .call("query_text", || self.oracle.query_text(query, k, None))
            .await?;
        let scored = self.rank_hits(hits, None, Some(min));

        tracing::debug!(mode = "semantic", k, hits = scored.len(), "search complete");
        Ok(SearchResult::new(SearchMode::Semantic, scored, None))
    }

    /// Every product satisfying `predicate`, up to `k`, each scored `1.0`.
    ///
    /// Natural catalog order unless the predicate carries a sort key.
    ///
    /// # Errors
    ///
    /// [`RetrievalError::InvalidInput`] for `k == 0`;
    /// [`RetrievalError::Oracle`] once the retry is exhausted.
    pub async fn search_filtered(
        &self,
        predicate: &Predicate,
        k: usize,
    ) -> Result<SearchResult, RetrievalError> {
        validate_k(k)?;

        let ids = self
            .call("filter_ids", || self.oracle.filter_ids(predicate))
            .await?;

        let mut products: Vec<(usize, &Product)> = ids
            .iter()
            .filter_map(|id| {
                let position = self.catalog.position(id)?;
                let product = self.catalog.get(id)?;
                predicate.matches(product).then_some((position, product))
            })
            .collect();
        products.sort_by_key(|(position, _)| *position);
        products.dedup_by_key(|(position, _)| *position);

        if predicate.sort == Some(SortKey::TopRated) {
            products.sort_by(|(_, a), (_, b)| {
                b.rating
                    .total_cmp(&a.rating)
                    .then_with(|| a.price.total_cmp(&b.price))
            });
        }

        let hits: Vec<ScoredProduct> = products
            .into_iter()
            .take(k)
            .map(|(_, product)| ScoredProduct {
                product: product.clone(),
                score: 1.0,
            })
            .collect();

        tracing::debug!(mode = "filter", k, predicate = %predicate, hits = hits.len(), "search complete");
        Ok(SearchResult::new(
            SearchMode::Filter,
            hits,
            Some(predicate.clone()),
        ))
    }

    /// Filter-then-search: restrict the oracle to products satisfying
    /// `predicate`, then rank that subset by similarity to `query`.
    ///
    /// When the predicate matches nothing, the least selective constraint is
    /// dropped once and the relaxed predicate runs as a pure filter search.
    /// The dropped constraint is recorded on the result and logged.
    ///
    /// # Errors
    ///
    /// [`RetrievalError::InvalidInput`] for `k == 0` or a blank query;
    /// [`RetrievalError::Oracle`] once the retry is exhausted.
    pub async fn search_hybrid(
        &self,
        query: &str,
        predicate: &Predicate,
        k: usize,
    ) -> Result<SearchResult, RetrievalError> {
        validate_k(k)?;
        let query = non_blank(query)?;

        let ids = self
            .call("filter_ids", || self.oracle.filter_ids(predicate))
            .await?;
        let within: HashSet<String> = ids
            .into_iter()
            .filter(|id| self.catalog.get(id).is_some_and(|p| predicate.matches(p)))
            .collect();

        if within.is_empty() {
            return self.relax(predicate, k).await;
        }

        let hits = self
            .call("query_text", || {
                self.oracle.query_text(query, k, Some(&within))
            })
            .await?;
        let scored = self.rank_hits(hits, Some(&within), None);

        tracing::debug!(
            mode = "hybrid",
            k,
            predicate = %predicate,
            candidates = within.len(),
            hits = scored.len(),
            "search complete"
        );
        Ok(SearchResult::new(
            SearchMode::Hybrid,
            scored,
            Some(predicate.clone()),
        ))
    }

    /// Products most similar to `product_id`, excluding the product itself.
    ///
    /// # Errors
    ///
    /// [`RetrievalError::InvalidInput`] for `k == 0` or an id not in the
    /// catalog; [`RetrievalError::MissingEmbedding`] when the oracle holds no
    /// vector for it; [`RetrievalError::Oracle`] once the retry is exhausted.
    pub async fn find_similar(
        &self,
        product_id: &str,
        k: usize,
    ) -> Result<SearchResult, RetrievalError> {
        validate_k(k)?;
        let id = product_id.trim();
        if self.catalog.get(id).is_none() {
            return Err(RetrievalError::InvalidInput(format!(
                "unknown product id '{id}'"
            )));
        }

        let vector = self
            .call("embedding", || self.oracle.embedding(id))
            .await?
            .ok_or_else(|| RetrievalError::MissingEmbedding(id.to_owned()))?;

        let hits = self
            .call("query_vector", || {
                self.oracle.query_vector(&vector, k.saturating_add(1), None)
            })
            .await?;
        let others: Vec<OracleHit> = hits.into_iter().filter(|h| h.product_id != id).collect();
        let mut scored = self.rank_hits(others, None, None);
        scored.truncate(k);

        Ok(SearchResult::new(SearchMode::Semantic, scored, None))
    }

    async fn relax(&self, predicate: &Predicate, k: usize) -> Result<SearchResult, RetrievalError> {
        let Some(index) = self.least_selective(predicate) else {
            return Ok(SearchResult::empty(
                SearchMode::Hybrid,
                Some(predicate.clone()),
            ));
        };

        let dropped = predicate.constraints[index].clone();
        let relaxed = predicate.without(index);
        tracing::warn!(
            dropped = %dropped,
            original = %predicate,
            relaxed = %relaxed,
            "hybrid predicate matched no products, relaxing once"
        );

        let mut result = self.search_filtered(&relaxed, k).await?;
        result.relaxed = Some(dropped);
        Ok(result)
    }

    /// Index of the constraint that on its own matches the most products.
    /// The first one wins a tie.
    fn least_selective(&self, predicate: &Predicate) -> Option<usize> {
        predicate
            .constraints
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let matched = self.catalog.products().iter().filter(|p| c.matches(p)).count();
                (i, matched)
            })
            .fold(None, |best: Option<(usize, usize)>, (i, matched)| match best {
                Some((_, best_matched)) if best_matched >= matched => best,
                _ => Some((i, matched)),
            })
            .map(|(i, _)| i)
    }

    /// Convert oracle hits to scored products, dropping unknown ids, ids
    /// outside `within`, and scores below `min`; then order by score.
    fn rank_hits(
        &self,
        hits: Vec<OracleHit>,
        within: Option<&HashSet<String>>,
        min: Option<f64>,
    ) -> Vec<ScoredProduct> {
        let mut seen = HashSet::new();
        let scored: Vec<ScoredProduct> = hits
            .into_iter()
            .filter(|hit| within.is_none_or(|set| set.contains(&hit.product_id)))
            .filter(|hit| seen.insert(hit.product_id.clone()))
            .filter_map(|hit| {
                let Some(product) = self.catalog.get(&hit.product_id) else {
                    tracing::debug!(product_id = %hit.product_id, "oracle returned id not in catalog");
                    return None;
                };
                let score = 1.0 - hit.distance;
                if min.is_some_and(|m| score < m - SCORE_EPSILON) {
                    return None;
                }
                Some(ScoredProduct {
                    product: product.clone(),
                    score,
                })
            })
            .collect();
        order_by_score(scored)
    }

    async fn call<T, F, Fut>(&self, operation: &'static str, f: F) -> Result<T, OracleError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, OracleError>>,
    {
        retry_with_backoff(
            operation,
            self.config.oracle_timeout,
            self.config.max_retries,
            self.config.retry_backoff_ms,
            f,
        )
        .await
    }
}

fn validate_k(k: usize) -> Result<(), RetrievalError> {
    if k == 0 {
        return Err(RetrievalError::InvalidInput(
            "k must be at least 1".to_owned(),
        ));
    }
    Ok(())
}

fn non_blank(query: &str) -> Result<&str, RetrievalError> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(RetrievalError::InvalidInput("query is empty".to_owned()));
    }
    Ok(trimmed)
}

fn clamp_similarity(min_similarity: f64) -> f64 {
    if min_similarity.is_nan() {
        return 0.0;
    }
    min_similarity.clamp(0.0, 1.0)
}

/// Stable descending insertion: an item moves ahead of an earlier one only
/// when its score is higher by more than [`SCORE_EPSILON`], so near-equal
/// scores keep oracle order.
fn order_by_score(scored: Vec<ScoredProduct>) -> Vec<ScoredProduct> {
    let mut ordered: Vec<ScoredProduct> = Vec::with_capacity(scored.len());
    for item in scored {
        let at = ordered
            .iter()
            .position(|placed| item.score > placed.score + SCORE_EPSILON)
            .unwrap_or(ordered.len());
        ordered.insert(at, item);
    }
    ordered
}

#[cfg(test)]
#[path = "engine_test.rs"]
mod tests;
