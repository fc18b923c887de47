//! Hybrid retrieval for the trailfit recommender.
//!
//! The [`HybridEngine`] runs semantic, filtered, and hybrid (filter-then-search)
//! queries against a [`SimilarityOracle`]. Two oracles ship with the crate: an
//! in-process [`MemoryOracle`] over hashed term vectors, and a [`QdrantOracle`]
//! that embeds query text through TEI and searches a Qdrant collection.

pub mod engine;
pub mod error;
pub mod memory;
pub mod oracle;
pub mod predicate;
pub mod qdrant;
pub mod types;

mod embeddings;
mod retry;

pub use engine::{EngineConfig, HybridEngine, SCORE_EPSILON};
pub use error::{OracleError, RetrievalError};
pub use memory::MemoryOracle;
pub use oracle::{OracleHit, SimilarityOracle};
pub use predicate::{Constraint, Predicate, SortKey};
pub use qdrant::QdrantOracle;
pub use types::{ScoredProduct, SearchMode, SearchResult, SearchStatus};
