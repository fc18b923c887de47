//! TEI (Text Embeddings Inference) client for query and catalog vectors.

use serde::Serialize;

use crate::error::OracleError;

/// Maximum number of texts per /embed call.
const BATCH_SIZE: usize = 64;

pub(crate) struct TeiClient {
    client: reqwest::Client,
    url: String,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    inputs: &'a [&'a str],
}

impl TeiClient {
    #[must_use]
    pub(crate) fn new(client: reqwest::Client, tei_url: &str) -> Self {
        Self {
            client,
            url: format!("{}/embed", tei_url.trim_end_matches('/')),
        }
    }

    /// Generate embeddings for a batch of texts, one vector per input in
    /// input order. Texts are sent in groups of [`BATCH_SIZE`].
    ///
    /// # Errors
    ///
    /// Returns [`OracleError`] if a request fails, TEI answers with a
    /// non-success status, or the vector count does not match the input.
    pub(crate) async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, OracleError> {
        let mut all_embeddings = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(BATCH_SIZE) {
            let request = EmbedRequest { inputs: chunk };
            let response = self.client.post(&self.url).json(&request).send().await?;

            if !response.status().is_success() {
                return Err(OracleError::Status {
                    service: "tei",
                    status: response.status().as_u16(),
                });
            }

            let embeddings: Vec<Vec<f32>> =
                response.json().await.map_err(|e| OracleError::Decode {
                    service: "tei",
                    reason: e.to_string(),
                })?;

            if embeddings.len() != chunk.len() {
                return Err(OracleError::Decode {
                    service: "tei",
                    reason: format!(
                        "returned {} embeddings for {} inputs",
                        embeddings.len(),
                        chunk.len()
                    ),
                });
            }

            all_embeddings.extend(embeddings);
        }

        Ok(all_embeddings)
    }

    /// Embed a single text.
    pub(crate) async fn embed_one(&self, text: &str) -> Result<Vec<f32>, OracleError> {
        self.embed(&[text])
            .await?
            .pop()
            .ok_or_else(|| OracleError::Decode {
                service: "tei",
                reason: "empty embedding batch".to_owned(),
            })
    }
}
