use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Which similarity oracle backs the retrieval engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OracleBackend {
    /// In-process hashed term vectors over the catalog file.
    Memory,
    /// Qdrant vector store with TEI query embeddings.
    Qdrant {
        qdrant_url: String,
        collection: String,
        tei_url: String,
    },
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub log_level: String,
    pub catalog_path: PathBuf,
    pub preferences_path: PathBuf,
    pub oracle: OracleBackend,
    pub oracle_timeout_ms: u64,
    pub llm_timeout_ms: u64,
    pub retry_backoff_ms: u64,
    pub default_k: usize,
    pub llm_base_url: String,
    pub llm_model: String,
    pub llm_api_key: Option<String>,
    /// Whether budget feedback is written to the durable profile.
    pub feedback_budget_permanent: bool,
    /// Whether brand feedback is written to the durable profile.
    pub feedback_brand_permanent: bool,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("catalog_path", &self.catalog_path)
            .field("preferences_path", &self.preferences_path)
            .field("oracle", &self.oracle)
            .field("oracle_timeout_ms", &self.oracle_timeout_ms)
            .field("llm_timeout_ms", &self.llm_timeout_ms)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("default_k", &self.default_k)
            .field("llm_base_url", &self.llm_base_url)
            .field("llm_model", &self.llm_model)
            .field(
                "llm_api_key",
                &self.llm_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("feedback_budget_permanent", &self.feedback_budget_permanent)
            .field("feedback_brand_permanent", &self.feedback_brand_permanent)
            .finish()
    }
}
