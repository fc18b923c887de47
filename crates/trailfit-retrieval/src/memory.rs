//! In-process similarity oracle over feature-hashed term vectors.
//!
//! Each product document is tokenized, every token is hashed with SHA-256 into
//! one of [`DIMENSIONS`] buckets, and the counts are L2-normalised. Vectors are
//! non-negative, so cosine similarity stays in `[0, 1]` and distance
//! `1 − cosine` stays in `[0, 1]`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use trailfit_core::Catalog;

use crate::error::OracleError;
use crate::oracle::{OracleHit, SimilarityOracle};
use crate::predicate::Predicate;

pub const DIMENSIONS: usize = 512;

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "the", "for", "of", "to", "in", "on", "with", "or", "me", "my", "i", "is",
    "it", "some", "show", "find", "need", "want",
];

pub struct MemoryOracle {
    catalog: Arc<Catalog>,
    vectors: HashMap<String, Vec<f32>>,
}

impl MemoryOracle {
    /// Embed every catalog document up front.
    #[must_use]
    pub fn new(catalog: Arc<Catalog>) -> Self {
        let vectors = catalog
            .products()
            .iter()
            .map(|p| (p.id.clone(), embed_text(&p.document())))
            .collect();
        Self { catalog, vectors }
    }

    fn rank(&self, query: &[f32], k: usize, within: Option<&HashSet<String>>) -> Vec<OracleHit> {
        let mut hits: Vec<OracleHit> = self
            .catalog
            .products()
            .iter()
            .filter(|p| within.is_none_or(|set| set.contains(&p.id)))
            .filter_map(|p| {
                self.vectors.get(&p.id).map(|v| OracleHit {
                    product_id: p.id.clone(),
                    distance: 1.0 - f64::from(cosine(query, v)),
                })
            })
            .collect();
        // Stable: equal distances keep catalog order.
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(k);
        hits
    }
}

#[async_trait]
impl SimilarityOracle for MemoryOracle {
    async fn query_text(
        &self,
        text: &str,
        k: usize,
        within: Option<&HashSet<String>>,
    ) -> Result<Vec<OracleHit>, OracleError> {
        Ok(self.rank(&embed_text(text), k, within))
    }

    async fn query_vector(
        &self,
        vector: &[f32],
        k: usize,
        within: Option<&HashSet<String>>,
    ) -> Result<Vec<OracleHit>, OracleError> {
        Ok(self.rank(vector, k, within))
    }

    async fn embedding(&self, product_id: &str) -> Result<Option<Vec<f32>>, OracleError> {
        Ok(self.vectors.get(product_id).cloned())
    }

    async fn filter_ids(&self, predicate: &Predicate) -> Result<Vec<String>, OracleError> {
        Ok(self
            .catalog
            .products()
            .iter()
            .filter(|p| predicate.matches(p))
            .map(|p| p.id.clone())
            .collect())
    }
}

/// Lowercase alphanumeric tokens with stop words removed.
fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .filter(|t| !STOP_WORDS.contains(&t.as_str()))
}

fn bucket(token: &str) -> usize {
    let hash = Sha256::digest(token.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash[..8]);
    #[allow(clippy::cast_possible_truncation)]
    let index = (u64::from_be_bytes(bytes) % DIMENSIONS as u64) as usize;
    index
}

/// Feature-hashed, L2-normalised term-frequency vector. Text without any
/// indexable token yields the zero vector.
#[must_use]
pub fn embed_text(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0_f32; DIMENSIONS];
    for token in tokenize(text) {
        vector[bucket(&token)] += 1.0;
    }
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut vector {
            *x /= norm;
        }
    }
    vector
}

/// Cosine similarity; zero when either vector has no magnitude.
fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    (dot / (na * nb)).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use trailfit_core::Product;

    use super::*;

    fn product(id: &str, name: &str, purpose: &str) -> Product {
        Product {
            id: id.to_owned(),
            name: name.to_owned(),
            brand: "NorthPeak".to_owned(),
            category: "Outerwear".to_owned(),
            subcategory: "Jackets".to_owned(),
            price: 200.0,
            rating: 4.0,
            gender: "Unisex".to_owned(),
            season: "Winter".to_owned(),
            waterproofing: "Waterproof".to_owned(),
            insulation: "Down".to_owned(),
            material: "Nylon".to_owned(),
            color: "Black".to_owned(),
            purpose: purpose.to_owned(),
            terrain: "Alpine".to_owned(),
            description: String::new(),
        }
    }

    fn oracle() -> MemoryOracle {
        let catalog = Catalog::from_products(vec![
            product("p1", "Trail Runner Shorts", "Running"),
            product("p2", "Powder Ski Jacket", "Skiing"),
            product("p3", "Summit Belay Parka", "Climbing"),
        ])
        .unwrap();
        MemoryOracle::new(Arc::new(catalog))
    }

    #[test]
    fn embedding_is_normalised_and_non_negative() {
        let v = embed_text("warm insulated jacket");
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
        assert!(v.iter().all(|x| *x >= 0.0));
    }

    #[test]
    fn text_without_tokens_is_zero_vector() {
        assert!(embed_text("  ,.;  the ").iter().all(|x| *x == 0.0));
    }

    #[tokio::test]
    async fn query_ranks_best_match_first() {
        let hits = oracle().query_text("ski jacket", 3, None).await.unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].product_id, "p2");
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
        assert!(hits.iter().all(|h| (0.0..=1.0).contains(&h.distance)));
    }

    #[tokio::test]
    async fn within_restricts_candidates() {
        let within: HashSet<String> = ["p1".to_owned(), "p3".to_owned()].into_iter().collect();
        let hits = oracle()
            .query_text("ski jacket", 10, Some(&within))
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.product_id != "p2"));
    }

    #[tokio::test]
    async fn stored_embedding_finds_itself_first() {
        let oracle = oracle();
        let v = oracle.embedding("p3").await.unwrap().unwrap();
        let hits = oracle.query_vector(&v, 1, None).await.unwrap();
        assert_eq!(hits[0].product_id, "p3");
        assert!(hits[0].distance.abs() < 1e-6);
        assert!(oracle.embedding("missing").await.unwrap().is_none());
    }
}
