use std::time::Duration;

use thiserror::Error;

/// Failures raised by a similarity oracle implementation.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} returned status {status}")]
    Status { service: &'static str, status: u16 },

    #[error("{service} response could not be decoded: {reason}")]
    Decode {
        service: &'static str,
        reason: String,
    },

    #[error("oracle call timed out after {0:?}")]
    Timeout(Duration),

    #[error("oracle unavailable: {0}")]
    Unavailable(String),
}

impl OracleError {
    /// Returns `true` for errors worth retrying after a back-off delay.
    ///
    /// Timeouts, connection failures, HTTP 5xx and 429 are transient.
    /// Decode failures and other 4xx responses are not: retrying won't fix them.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        match self {
            OracleError::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e
                        .status()
                        .is_some_and(|s| s.is_server_error() || s.as_u16() == 429)
            }
            OracleError::Status { status, .. } => *status >= 500 || *status == 429,
            OracleError::Timeout(_) | OracleError::Unavailable(_) => true,
            OracleError::Decode { .. } => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum RetrievalError {
    /// Malformed caller input: zero `k`, empty query, unknown predicate key,
    /// unknown product id.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("no embedding stored for product '{0}'")]
    MissingEmbedding(String),

    #[error("similarity oracle error: {0}")]
    Oracle(#[from] OracleError),
}

impl RetrievalError {
    /// True when the failure came from the oracle rather than the caller.
    #[must_use]
    pub fn is_external(&self) -> bool {
        matches!(self, RetrievalError::Oracle(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_and_server_errors_are_retriable() {
        assert!(OracleError::Timeout(Duration::from_millis(10)).is_retriable());
        assert!(OracleError::Status {
            service: "qdrant",
            status: 503
        }
        .is_retriable());
        assert!(OracleError::Status {
            service: "tei",
            status: 429
        }
        .is_retriable());
    }

    #[test]
    fn client_errors_are_not_retriable() {
        assert!(!OracleError::Status {
            service: "qdrant",
            status: 404
        }
        .is_retriable());
        assert!(!OracleError::Decode {
            service: "qdrant",
            reason: "missing result".to_owned()
        }
        .is_retriable());
    }

    #[test]
    fn only_oracle_errors_are_external() {
        assert!(RetrievalError::Oracle(OracleError::Unavailable("down".into())).is_external());
        assert!(!RetrievalError::InvalidInput("k must be positive".into()).is_external());
    }
}
