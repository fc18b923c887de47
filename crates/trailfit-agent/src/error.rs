use std::time::Duration;

use thiserror::Error;
use trailfit_profile::StoreError;
use trailfit_retrieval::RetrievalError;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("language model returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("language model response could not be decoded: {0}")]
    Decode(String),

    #[error("language model call timed out after {0:?}")]
    Timeout(Duration),

    #[error("language model API key is not configured")]
    MissingApiKey,
}

impl LlmError {
    /// Whether another attempt could succeed: timeouts, connection failures,
    /// rate limiting, and server errors.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        match self {
            LlmError::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e
                        .status()
                        .is_some_and(|s| s.is_server_error() || s.as_u16() == 429)
            }
            LlmError::Status { status, .. } => *status >= 500 || *status == 429,
            LlmError::Timeout(_) => true,
            LlmError::Decode(_) | LlmError::MissingApiKey => false,
        }
    }
}

/// Errors that reject a request outright. External failures never surface
/// here; they become notices on the response.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
