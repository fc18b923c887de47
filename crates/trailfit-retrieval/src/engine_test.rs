use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use trailfit_core::Attribute;

use super::*;
use crate::memory::MemoryOracle;
use crate::predicate::Constraint;
use crate::types::SearchStatus;

#[allow(clippy::too_many_arguments)]
fn product(
    id: &str,
    name: &str,
    brand: &str,
    category: &str,
    price: f64,
    rating: f64,
    color: &str,
    purpose: &str,
    description: &str,
) -> Product {
    Product {
        id: id.to_owned(),
        name: name.to_owned(),
        brand: brand.to_owned(),
        category: category.to_owned(),
        subcategory: "General".to_owned(),
        price,
        rating,
        gender: "Unisex".to_owned(),
        season: "All-season".to_owned(),
        waterproofing: "Water-resistant".to_owned(),
        insulation: "None".to_owned(),
        material: "Nylon".to_owned(),
        color: color.to_owned(),
        purpose: purpose.to_owned(),
        terrain: "Mountain".to_owned(),
        description: description.to_owned(),
    }
}

fn catalog() -> Arc<Catalog> {
    Arc::new(
        Catalog::from_products(vec![
            product("alpine-ski-shell", "Powder Ski Jacket", "NorthPeak", "Outerwear", 349.0, 4.7, "Blue", "Skiing", "Warm insulated jacket for resort skiing"),
            product("trail-rain-shell", "Storm Rain Jacket", "Ridgeline", "Outerwear", 189.0, 4.4, "Red", "Hiking", "Packable waterproof shell"),
            product("down-parka", "Summit Down Parka", "NorthPeak", "Outerwear", 289.0, 4.8, "Blue", "Camping", "Warm down parka for cold camps"),
            product("fleece-midlayer", "Trail Fleece", "Cascade", "Outerwear", 99.0, 4.2, "Green", "Hiking", "Light fleece midlayer"),
            product("hiking-boot", "Granite Hiking Boots", "Ridgeline", "Footwear", 219.0, 4.5, "Brown", "Hiking", "Supportive leather boots"),
            product("trail-runner", "Swift Trail Shoes", "Cascade", "Footwear", 139.0, 4.1, "Orange", "Running", "Fast trail running shoes"),
            product("softshell-pants", "Traverse Softshell Pants", "NorthPeak", "Apparel", 129.0, 4.3, "Black", "Hiking", "Stretch pants for scrambling"),
            product("merino-base", "Merino Base Layer", "Cascade", "Apparel", 89.0, 4.6, "Gray", "Skiing", "Soft merino top for cold days"),
        ])
        .unwrap(),
    )
}

fn fast_config() -> EngineConfig {
    EngineConfig {
        oracle_timeout: Duration::from_millis(50),
        max_retries: 1,
        retry_backoff_ms: 1,
    }
}

fn engine() -> HybridEngine {
    let catalog = catalog();
    let oracle = Arc::new(MemoryOracle::new(Arc::clone(&catalog)));
    HybridEngine::new(catalog, oracle, fast_config())
}

/// Fails the first `failures` calls of every kind, then delegates.
struct FlakyOracle {
    inner: MemoryOracle,
    failures: u32,
    calls: AtomicU32,
}

impl FlakyOracle {
    fn check(&self) -> Result<(), OracleError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
            return Err(OracleError::Unavailable("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl SimilarityOracle for FlakyOracle {
    async fn query_text(
        &self,
        text: &str,
        k: usize,
        within: Option<&HashSet<String>>,
    ) -> Result<Vec<OracleHit>, OracleError> {
        self.check()?;
        self.inner.query_text(text, k, within).await
    }

    async fn query_vector(
        &self,
        vector: &[f32],
        k: usize,
        within: Option<&HashSet<String>>,
    ) -> Result<Vec<OracleHit>, OracleError> {
        self.check()?;
        self.inner.query_vector(vector, k, within).await
    }

    async fn embedding(&self, product_id: &str) -> Result<Option<Vec<f32>>, OracleError> {
        self.check()?;
        self.inner.embedding(product_id).await
    }

    async fn filter_ids(&self, predicate: &Predicate) -> Result<Vec<String>, OracleError> {
        self.check()?;
        self.inner.filter_ids(predicate).await
    }
}

fn flaky_engine(failures: u32) -> (HybridEngine, Arc<FlakyOracle>) {
    let catalog = catalog();
    let oracle = Arc::new(FlakyOracle {
        inner: MemoryOracle::new(Arc::clone(&catalog)),
        failures,
        calls: AtomicU32::new(0),
    });
    let engine = HybridEngine::new(catalog, oracle.clone(), fast_config());
    (engine, oracle)
}

/// Never answers a text query in time.
struct StalledOracle;

#[async_trait]
impl SimilarityOracle for StalledOracle {
    async fn query_text(
        &self,
        _text: &str,
        _k: usize,
        _within: Option<&HashSet<String>>,
    ) -> Result<Vec<OracleHit>, OracleError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(Vec::new())
    }

    async fn query_vector(
        &self,
        _vector: &[f32],
        _k: usize,
        _within: Option<&HashSet<String>>,
    ) -> Result<Vec<OracleHit>, OracleError> {
        Ok(Vec::new())
    }

    async fn embedding(&self, _product_id: &str) -> Result<Option<Vec<f32>>, OracleError> {
        Ok(None)
    }

    async fn filter_ids(&self, _predicate: &Predicate) -> Result<Vec<String>, OracleError> {
        Ok(Vec::new())
    }
}

#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl LogBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

// --- semantic -----------------------------------------------------------

#[tokio::test]
async fn semantic_results_sorted_descending() {
    let result = engine()
        .search_semantic("warm jacket for skiing", 5, 0.0)
        .await
        .unwrap();
    assert_eq!(result.mode, SearchMode::Semantic);
    assert_eq!(result.status, SearchStatus::Found);
    assert_eq!(result.len(), 5);
    assert_eq!(result.hits[0].product.id, "alpine-ski-shell");
    assert!(result.hits[0].score >= result.hits[1].score);
    assert!(result
        .hits
        .windows(2)
        .all(|w| w[0].score + SCORE_EPSILON >= w[1].score));
}

#[test]
fn near_equal_scores_keep_oracle_order() {
    let hit = |id: &str, distance: f64| OracleHit {
        product_id: id.to_owned(),
        distance,
    };
    let ranked = engine().rank_hits(
        vec![
            hit("fleece-midlayer", 0.499_999_6),
            hit("trail-runner", 0.499_999_4),
            hit("down-parka", 0.3),
            hit("merino-base", 0.6),
        ],
        None,
        None,
    );
    let ids: Vec<&str> = ranked.iter().map(|s| s.product.id.as_str()).collect();
    assert_eq!(
        ids,
        vec!["down-parka", "fleece-midlayer", "trail-runner", "merino-base"]
    );
}

#[tokio::test]
async fn semantic_rejects_zero_k() {
    let err = engine().search_semantic("jacket", 0, 0.0).await.unwrap_err();
    assert!(matches!(err, RetrievalError::InvalidInput(_)));
}

#[tokio::test]
async fn semantic_rejects_blank_query() {
    let err = engine().search_semantic("   ", 3, 0.0).await.unwrap_err();
    assert!(matches!(err, RetrievalError::InvalidInput(_)));
}

#[tokio::test]
async fn min_similarity_is_clamped_not_rejected() {
    let engine = engine();
    let low = engine.search_semantic("jacket", 8, -3.0).await.unwrap();
    assert_eq!(low.len(), 8);

    let high = engine.search_semantic("jacket", 8, 7.0).await.unwrap();
    assert!(high.hits.iter().all(|h| h.score >= 1.0 - SCORE_EPSILON));
}

#[tokio::test]
async fn always_true_filter_covers_same_ids_as_full_semantic() {
    let engine = engine();
    let n = engine.catalog().len();
    let filtered = engine.search_filtered(&Predicate::new(), n).await.unwrap();
    let semantic = engine.search_semantic("jacket", n, 0.0).await.unwrap();

    let filtered_ids: HashSet<&str> = filtered.ids().into_iter().collect();
    let semantic_ids: HashSet<&str> = semantic.ids().into_iter().collect();
    assert_eq!(filtered_ids.len(), n);
    assert_eq!(filtered_ids, semantic_ids);
}

// --- filtered -----------------------------------------------------------

#[tokio::test]
async fn filtered_keeps_catalog_order_and_unit_scores() {
    let predicate = Predicate::new().with(Constraint::equals(Attribute::Category, "outerwear"));
    let result = engine().search_filtered(&predicate, 10).await.unwrap();
    assert_eq!(result.mode, SearchMode::Filter);
    assert_eq!(
        result.ids(),
        vec![
            "alpine-ski-shell",
            "trail-rain-shell",
            "down-parka",
            "fleece-midlayer"
        ]
    );
    assert!(result.hits.iter().all(|h| (h.score - 1.0).abs() < f64::EPSILON));
    assert_eq!(result.predicate, Some(predicate));
}

#[tokio::test]
async fn filtered_sort_key_orders_by_rating_then_price() {
    let predicate = Predicate::new()
        .with(Constraint::equals(Attribute::Category, "Outerwear"))
        .sorted_by(SortKey::TopRated);
    let result = engine().search_filtered(&predicate, 10).await.unwrap();
    assert_eq!(
        result.ids(),
        vec![
            "down-parka",
            "alpine-ski-shell",
            "trail-rain-shell",
            "fleece-midlayer"
        ]
    );
}

#[tokio::test]
async fn filtered_truncates_to_k() {
    let result = engine().search_filtered(&Predicate::new(), 3).await.unwrap();
    assert_eq!(
        result.ids(),
        vec!["alpine-ski-shell", "trail-rain-shell", "down-parka"]
    );
}

#[tokio::test]
async fn filtered_with_no_match_is_marked_not_thrown() {
    let predicate = Predicate::new().with(Constraint::equals(Attribute::Color, "Purple"));
    let result = engine().search_filtered(&predicate, 5).await.unwrap();
    assert_eq!(result.status, SearchStatus::NoResults);
    assert!(result.relaxed.is_none());
}

// --- hybrid -------------------------------------------------------------

#[tokio::test]
async fn hybrid_only_returns_products_satisfying_predicate() {
    let engine = engine();
    let predicates = [
        Predicate::new().with(Constraint::MaxPrice { value: 300.0 }),
        Predicate::new().with(Constraint::equals(Attribute::Category, "Footwear")),
        Predicate::new()
            .with(Constraint::equals(Attribute::Color, "Blue"))
            .with(Constraint::MaxPrice { value: 300.0 }),
        Predicate::new().with(Constraint::ExcludeBrands {
            brands: vec!["NorthPeak".into()],
        }),
    ];
    for predicate in &predicates {
        let result = engine
            .search_hybrid("warm jacket", predicate, 10)
            .await
            .unwrap();
        assert_eq!(result.mode, SearchMode::Hybrid, "predicate {predicate}");
        assert!(result.relaxed.is_none());
        assert!(!result.is_empty(), "predicate {predicate}");
        for hit in &result.hits {
            assert!(
                predicate.matches(&hit.product),
                "{} violates {predicate}",
                hit.product.id
            );
        }
    }
}

#[tokio::test]
async fn hybrid_ranks_restricted_set_by_similarity() {
    let predicate = Predicate::new().with(Constraint::MaxPrice { value: 300.0 });
    let result = engine()
        .search_hybrid("blue warm parka", &predicate, 3)
        .await
        .unwrap();
    assert_eq!(result.hits[0].product.id, "down-parka");
    assert!(result.ids().iter().all(|id| *id != "alpine-ski-shell"));
    assert!(result
        .hits
        .windows(2)
        .all(|w| w[0].score + SCORE_EPSILON >= w[1].score));
}

#[tokio::test]
async fn hybrid_relaxes_least_selective_constraint_once() {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    // Blue matches 2 products, Cascade matches 3, together none.
    let predicate = Predicate::new()
        .with(Constraint::equals(Attribute::Color, "Blue"))
        .with(Constraint::equals(Attribute::Brand, "Cascade"));
    let result = engine()
        .search_hybrid("warm jacket", &predicate, 10)
        .await
        .unwrap();

    assert_eq!(result.mode, SearchMode::Filter);
    assert_eq!(
        result.relaxed,
        Some(Constraint::equals(Attribute::Brand, "Cascade"))
    );
    assert_eq!(result.ids(), vec!["alpine-ski-shell", "down-parka"]);
    assert_eq!(
        result.predicate,
        Some(Predicate::new().with(Constraint::equals(Attribute::Color, "Blue")))
    );

    let logs = buffer.contents();
    assert!(logs.contains("relaxing once"), "logs: {logs}");
    assert!(logs.contains("brand = Cascade"), "logs: {logs}");
}

#[tokio::test]
async fn hybrid_relaxation_with_nothing_left_marks_no_results() {
    let predicate = Predicate::new()
        .with(Constraint::equals(Attribute::Color, "Purple"))
        .with(Constraint::equals(Attribute::Brand, "Nobody"));
    let result = engine()
        .search_hybrid("jacket", &predicate, 10)
        .await
        .unwrap();
    assert_eq!(result.status, SearchStatus::NoResults);
    assert_eq!(
        result.relaxed,
        Some(Constraint::equals(Attribute::Color, "Purple"))
    );
}

// --- find_similar -------------------------------------------------------

#[tokio::test]
async fn find_similar_excludes_the_product_itself() {
    let result = engine().find_similar("down-parka", 3).await.unwrap();
    assert_eq!(result.len(), 3);
    assert!(result.ids().iter().all(|id| *id != "down-parka"));
}

#[tokio::test]
async fn find_similar_unknown_id_is_input_error() {
    let err = engine().find_similar("nope", 3).await.unwrap_err();
    assert!(matches!(err, RetrievalError::InvalidInput(ref m) if m.contains("nope")));
}

// --- external failures --------------------------------------------------

#[tokio::test]
async fn transient_oracle_failure_is_retried_once() {
    let (engine, oracle) = flaky_engine(1);
    let result = engine.search_semantic("jacket", 3, 0.0).await.unwrap();
    assert_eq!(result.len(), 3);
    assert_eq!(oracle.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn persistent_oracle_failure_surfaces_after_one_retry() {
    let (engine, oracle) = flaky_engine(5);
    let err = engine.search_semantic("jacket", 3, 0.0).await.unwrap_err();
    assert!(err.is_external());
    assert_eq!(oracle.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn oracle_timeout_becomes_retriable_error() {
    let engine = HybridEngine::new(catalog(), Arc::new(StalledOracle), fast_config());
    let err = engine.search_semantic("jacket", 3, 0.0).await.unwrap_err();
    assert!(matches!(
        err,
        RetrievalError::Oracle(OracleError::Timeout(_))
    ));
}
