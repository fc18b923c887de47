//! Qdrant-backed similarity oracle with TEI query embeddings.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use trailfit_core::{Attribute, Catalog, Product};

use crate::embeddings::TeiClient;
use crate::error::OracleError;
use crate::oracle::{OracleHit, SimilarityOracle};
use crate::predicate::{Constraint, Predicate};

/// Points per upsert request and per scroll page.
const PAGE_SIZE: usize = 256;

pub struct QdrantOracle {
    client: reqwest::Client,
    base_url: String,
    collection: String,
    tei: TeiClient,
}

#[derive(Deserialize)]
struct QdrantResponse<T> {
    result: T,
}

#[derive(Deserialize)]
struct PointPayload {
    product_id: String,
}

#[derive(Deserialize)]
struct ScoredPoint {
    score: f64,
    #[serde(default)]
    payload: Option<PointPayload>,
}

#[derive(Deserialize)]
struct RecordPoint {
    #[serde(default)]
    payload: Option<PointPayload>,
    #[serde(default)]
    vector: Option<Vec<f32>>,
}

#[derive(Deserialize)]
struct ScrollPage {
    points: Vec<RecordPoint>,
    #[serde(default)]
    next_page_offset: Option<Value>,
}

impl QdrantOracle {
    /// Create a client for `collection` on the Qdrant instance at
    /// `qdrant_url`, embedding query text through TEI at `tei_url`.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError::Http`] if the HTTP client cannot be built.
    pub fn new(
        qdrant_url: &str,
        collection: &str,
        tei_url: &str,
        timeout: Duration,
    ) -> Result<Self, OracleError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            tei: TeiClient::new(client.clone(), tei_url),
            client,
            base_url: qdrant_url.trim_end_matches('/').to_string(),
            collection: collection.to_string(),
        })
    }

    fn collection_url(&self, suffix: &str) -> String {
        format!("{}/collections/{}{suffix}", self.base_url, self.collection)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, OracleError> {
        let resp = request.send().await?;
        if !resp.status().is_success() {
            return Err(OracleError::Status {
                service: "qdrant",
                status: resp.status().as_u16(),
            });
        }
        let body: QdrantResponse<T> = resp.json().await.map_err(|e| OracleError::Decode {
            service: "qdrant",
            reason: e.to_string(),
        })?;
        Ok(body.result)
    }

    async fn search(
        &self,
        vector: &[f32],
        k: usize,
        within: Option<&HashSet<String>>,
    ) -> Result<Vec<OracleHit>, OracleError> {
        let mut body = json!({
            "vector": vector,
            "limit": k,
            "with_payload": ["product_id"],
        });
        if let Some(filter) = build_filter(&Predicate::new(), within) {
            body["filter"] = filter;
        }

        let points: Vec<ScoredPoint> = self
            .send_json(
                self.client
                    .post(self.collection_url("/points/search"))
                    .json(&body),
            )
            .await?;

        Ok(points
            .into_iter()
            .filter_map(|p| {
                p.payload.map(|payload| OracleHit {
                    product_id: payload.product_id,
                    distance: 1.0 - p.score,
                })
            })
            .collect())
    }

    /// Ensure the collection exists, creating it with cosine distance and
    /// `dimensions`-sized vectors if absent.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError`] on network or API failure.
    pub async fn ensure_collection(&self, dimensions: usize) -> Result<(), OracleError> {
        let url = self.collection_url("");
        if let Ok(resp) = self.client.get(&url).send().await {
            if resp.status().is_success() {
                return Ok(());
            }
        }

        let body = json!({ "vectors": { "size": dimensions, "distance": "Cosine" } });
        let resp = self.client.put(&url).json(&body).send().await?;
        if !resp.status().is_success() {
            return Err(OracleError::Status {
                service: "qdrant",
                status: resp.status().as_u16(),
            });
        }
        Ok(())
    }

    /// Embed every catalog document through TEI and upsert it, with its
    /// filterable payload, at a stable point id. Returns the number of
    /// products indexed.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError`] if embedding or any Qdrant request fails.
    pub async fn index_catalog(&self, catalog: &Catalog) -> Result<usize, OracleError> {
        if catalog.is_empty() {
            return Ok(0);
        }

        let documents: Vec<String> = catalog.products().iter().map(Product::document).collect();
        let refs: Vec<&str> = documents.iter().map(String::as_str).collect();
        let vectors = self.tei.embed(&refs).await?;
        let dimensions = vectors.first().map_or(0, Vec::len);
        self.ensure_collection(dimensions).await?;

        let points: Vec<Value> = catalog
            .products()
            .iter()
            .zip(vectors)
            .map(|(product, vector)| {
                json!({
                    "id": product_point_id(&product.id),
                    "vector": vector,
                    "payload": point_payload(product),
                })
            })
            .collect();

        for chunk in points.chunks(PAGE_SIZE) {
            let _: Value = self
                .send_json(
                    self.client
                        .put(self.collection_url("/points?wait=true"))
                        .json(&json!({ "points": chunk })),
                )
                .await?;
        }

        tracing::info!(
            collection = %self.collection,
            products = catalog.len(),
            dimensions,
            "catalog indexed"
        );
        Ok(catalog.len())
    }
}

#[async_trait]
impl SimilarityOracle for QdrantOracle {
    async fn query_text(
        &self,
        text: &str,
        k: usize,
        within: Option<&HashSet<String>>,
    ) -> Result<Vec<OracleHit>, OracleError> {
        let vector = self.tei.embed_one(text).await?;
        self.search(&vector, k, within).await
    }

    async fn query_vector(
        &self,
        vector: &[f32],
        k: usize,
        within: Option<&HashSet<String>>,
    ) -> Result<Vec<OracleHit>, OracleError> {
        self.search(vector, k, within).await
    }

    async fn embedding(&self, product_id: &str) -> Result<Option<Vec<f32>>, OracleError> {
        let body = json!({
            "ids": [product_point_id(product_id)],
            "with_payload": false,
            "with_vector": true,
        });
        let points: Vec<RecordPoint> = self
            .send_json(self.client.post(self.collection_url("/points")).json(&body))
            .await?;
        Ok(points.into_iter().next().and_then(|p| p.vector))
    }

    async fn filter_ids(&self, predicate: &Predicate) -> Result<Vec<String>, OracleError> {
        let mut ids = Vec::new();
        let mut offset: Option<Value> = None;
        loop {
            let mut body = json!({
                "limit": PAGE_SIZE,
                "with_payload": ["product_id"],
                "with_vector": false,
            });
            if let Some(filter) = build_filter(predicate, None) {
                body["filter"] = filter;
            }
            if let Some(offset) = offset.take() {
                body["offset"] = offset;
            }

            let page: ScrollPage = self
                .send_json(
                    self.client
                        .post(self.collection_url("/points/scroll"))
                        .json(&body),
                )
                .await?;

            ids.extend(
                page.points
                    .into_iter()
                    .filter_map(|p| p.payload.map(|payload| payload.product_id)),
            );

            match page.next_page_offset {
                Some(next) if !next.is_null() => offset = Some(next),
                _ => break,
            }
        }
        Ok(ids)
    }
}

/// Derive a stable Qdrant point ID (u64) from a product id.
///
/// Takes the first 8 bytes of SHA-256(id) as a big-endian u64.
#[must_use]
pub fn product_point_id(product_id: &str) -> u64 {
    let hash = Sha256::digest(product_id.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash[..8]);
    u64::from_be_bytes(bytes)
}

/// Payload stored with each point. Categorical values are lowercased so that
/// exact-match filters behave case-insensitively.
fn point_payload(product: &Product) -> Value {
    let mut payload = serde_json::Map::new();
    payload.insert("product_id".into(), json!(product.id));
    payload.insert("name".into(), json!(product.name));
    payload.insert("price".into(), json!(product.price));
    payload.insert("rating".into(), json!(product.rating));
    for attribute in Attribute::ALL {
        payload.insert(
            attribute.field_name().into(),
            json!(product.attribute(attribute).trim().to_lowercase()),
        );
    }
    Value::Object(payload)
}

/// Translate a predicate (plus an optional id restriction) into a Qdrant
/// filter. Returns `None` when nothing constrains the query.
fn build_filter(predicate: &Predicate, within: Option<&HashSet<String>>) -> Option<Value> {
    let mut must = Vec::new();
    let mut must_not = Vec::new();

    if let Some(ids) = within {
        let mut point_ids: Vec<u64> = ids.iter().map(|id| product_point_id(id)).collect();
        point_ids.sort_unstable();
        must.push(json!({ "has_id": point_ids }));
    }

    for constraint in &predicate.constraints {
        match constraint {
            Constraint::Equals { attribute, value } => must.push(json!({
                "key": attribute.field_name(),
                "match": { "value": value.trim().to_lowercase() },
            })),
            Constraint::OneOf { attribute, values } => {
                let lowered: Vec<String> =
                    values.iter().map(|v| v.trim().to_lowercase()).collect();
                must.push(json!({ "key": attribute.field_name(), "match": { "any": lowered } }));
            }
            Constraint::MinPrice { value } => {
                must.push(json!({ "key": "price", "range": { "gte": value } }));
            }
            Constraint::MaxPrice { value } => {
                must.push(json!({ "key": "price", "range": { "lte": value } }));
            }
            Constraint::MinRating { value } => {
                must.push(json!({ "key": "rating", "range": { "gte": value } }));
            }
            Constraint::ExcludeBrands { brands } => {
                let lowered: Vec<String> =
                    brands.iter().map(|b| b.trim().to_lowercase()).collect();
                must_not.push(json!({ "key": "brand", "match": { "any": lowered } }));
            }
        }
    }

    if must.is_empty() && must_not.is_empty() {
        return None;
    }
    let mut filter = serde_json::Map::new();
    if !must.is_empty() {
        filter.insert("must".into(), Value::Array(must));
    }
    if !must_not.is_empty() {
        filter.insert("must_not".into(), Value::Array(must_not));
    }
    Some(Value::Object(filter))
}
