use crate::app_config::{AppConfig, Environment, OracleBackend};
use crate::ConfigError;

/// Read `TRAILFIT_*` settings, after merging a `.env` file if one exists.
///
/// # Errors
///
/// [`ConfigError::MissingEnvVar`] when the Qdrant backend is selected without
/// its URLs, [`ConfigError::InvalidEnvVar`] for values that do not parse.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Same as [`load_app_config`] without touching `.env`.
///
/// # Errors
///
/// See [`load_app_config`].
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Assemble an [`AppConfig`] from an arbitrary variable lookup. Tests pass a
/// `HashMap`-backed closure.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let raw = or_default(var, default);
        let value = raw
            .parse::<usize>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })?;
        if value == 0 {
            return Err(ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(value)
    };

    let parse_bool = |var: &str, default: &str| -> Result<bool, ConfigError> {
        let raw = or_default(var, default);
        match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: format!("expected a boolean, got '{other}'"),
            }),
        }
    };

    let env = parse_environment(&or_default("TRAILFIT_ENV", "development"))?;
    let log_level = or_default("TRAILFIT_LOG_LEVEL", "info");
    let catalog_path = PathBuf::from(or_default("TRAILFIT_CATALOG_PATH", "./data/catalog.yaml"));
    let preferences_path = PathBuf::from(or_default(
        "TRAILFIT_PREFERENCES_PATH",
        "./data/user_preferences.json",
    ));

    let oracle = match or_default("TRAILFIT_ORACLE", "memory").as_str() {
        "memory" => OracleBackend::Memory,
        "qdrant" => OracleBackend::Qdrant {
            qdrant_url: require("TRAILFIT_QDRANT_URL")?,
            collection: or_default("TRAILFIT_QDRANT_COLLECTION", "outdoor_products"),
            tei_url: require("TRAILFIT_TEI_URL")?,
        },
        other => {
            return Err(ConfigError::InvalidEnvVar {
                var: "TRAILFIT_ORACLE".to_string(),
                reason: format!("expected 'memory' or 'qdrant', got '{other}'"),
            })
        }
    };

    let oracle_timeout_ms = parse_u64("TRAILFIT_ORACLE_TIMEOUT_MS", "5000")?;
    let llm_timeout_ms = parse_u64("TRAILFIT_LLM_TIMEOUT_MS", "20000")?;
    let retry_backoff_ms = parse_u64("TRAILFIT_RETRY_BACKOFF_MS", "250")?;
    let default_k = parse_usize("TRAILFIT_DEFAULT_K", "10")?;

    let llm_base_url = or_default(
        "TRAILFIT_LLM_BASE_URL",
        "https://api.openai.com/v1/chat/completions",
    );
    let llm_model = or_default("TRAILFIT_LLM_MODEL", "gpt-4o-mini");
    let llm_api_key = lookup("OPENAI_API_KEY").ok().filter(|k| !k.is_empty());

    let feedback_budget_permanent = parse_bool("TRAILFIT_FEEDBACK_BUDGET_PERMANENT", "false")?;
    let feedback_brand_permanent = parse_bool("TRAILFIT_FEEDBACK_BRAND_PERMANENT", "false")?;

    Ok(AppConfig {
        env,
        log_level,
        catalog_path,
        preferences_path,
        oracle,
        oracle_timeout_ms,
        llm_timeout_ms,
        retry_backoff_ms,
        default_k,
        llm_base_url,
        llm_model,
        llm_api_key,
        feedback_budget_permanent,
        feedback_brand_permanent,
    })
}

/// `TRAILFIT_ENV`: `development`, `test` or `production`; anything else is
/// rejected.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "TRAILFIT_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
