mod catalog;
mod prefs;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use trailfit_agent::{OpenAiClient, Orchestrator, OrchestratorConfig, Request};
use trailfit_core::{AppConfig, Catalog, OracleBackend};
use trailfit_profile::{FeedbackExtractor, FeedbackPolicy, PreferenceStore};
use trailfit_retrieval::{
    EngineConfig, HybridEngine, MemoryOracle, Predicate, QdrantOracle, SimilarityOracle,
};

use crate::catalog::CatalogCommands;
use crate::prefs::PrefsCommands;

#[derive(Debug, Parser)]
#[command(name = "trailfit")]
#[command(about = "Personalized outdoor-apparel recommendations")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Search the catalog with a natural-language request
    Query {
        text: String,
        /// Personalize with this user's saved preferences
        #[arg(long)]
        user: Option<String>,
        /// Number of results
        #[arg(long)]
        k: Option<usize>,
        /// Structured filter, e.g. `max_price=300` or `brand=NorthPeak`
        #[arg(long = "filter", value_parser = parse_filter)]
        filters: Vec<(String, String)>,
    },
    /// Record free-text feedback about recommendations
    Feedback {
        #[arg(long)]
        user: String,
        text: String,
        /// Product category the feedback is about (e.g. outerwear)
        #[arg(long)]
        category: Option<String>,
    },
    /// Show, set, or reset saved preferences
    Prefs {
        #[command(subcommand)]
        command: PrefsCommands,
    },
    /// Products similar to a catalog product
    Similar {
        product_id: String,
        #[arg(long)]
        k: Option<usize>,
    },
    /// Catalog overview and vector indexing
    Catalog {
        #[command(subcommand)]
        command: CatalogCommands,
    },
}

/// Split a `key=value` filter argument.
fn parse_filter(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("filter '{raw}' has no key"));
    }
    Ok((key.to_owned(), value.trim().to_owned()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = trailfit_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let catalog = Arc::new(trailfit_core::load_catalog(&config.catalog_path)?);
    tracing::debug!(
        env = %config.env,
        products = catalog.len(),
        path = %config.catalog_path.display(),
        "catalog loaded"
    );

    let orchestrator = build_orchestrator(&config, catalog)?;
    run(cli.command, &config, &orchestrator).await
}

async fn run(
    command: Commands,
    config: &AppConfig,
    orchestrator: &Arc<Orchestrator>,
) -> anyhow::Result<()> {
    match command {
        Commands::Query {
            text,
            user,
            k,
            filters,
        } => {
            let mut request = Request::new(text).with_filters(Predicate::parse_pairs(filters)?);
            if let Some(k) = k {
                request = request.with_k(k);
            }
            let mut session = orchestrator.session(user.as_deref());
            let response = session.handle(request).await?;
            print_json(&response)
        }
        Commands::Feedback {
            user,
            text,
            category,
        } => print_json(&orchestrator.record_feedback(&user, &text, category.as_deref())?),
        Commands::Prefs { command } => prefs::run_prefs(command, orchestrator),
        Commands::Similar { product_id, k } => {
            print_json(&orchestrator.find_similar(&product_id, k).await?)
        }
        Commands::Catalog { command } => catalog::run_catalog(command, config, orchestrator).await,
    }
}

/// Wire the engine, preference store, and optional language model from
/// config.
fn build_orchestrator(config: &AppConfig, catalog: Arc<Catalog>) -> anyhow::Result<Arc<Orchestrator>> {
    let oracle: Arc<dyn SimilarityOracle> = match &config.oracle {
        OracleBackend::Memory => Arc::new(MemoryOracle::new(Arc::clone(&catalog))),
        OracleBackend::Qdrant {
            qdrant_url,
            collection,
            tei_url,
        } => Arc::new(QdrantOracle::new(
            qdrant_url,
            collection,
            tei_url,
            std::time::Duration::from_millis(config.oracle_timeout_ms),
        )?),
    };

    let store = Arc::new(PreferenceStore::open(
        &config.preferences_path,
        FeedbackPolicy::from_app_config(config),
        FeedbackExtractor::new(catalog.brands()),
    ));
    let engine = HybridEngine::new(catalog, oracle, EngineConfig::from_app_config(config));

    let mut orchestrator =
        Orchestrator::new(engine, store, OrchestratorConfig::from_app_config(config));
    match OpenAiClient::from_app_config(config)? {
        Some(client) => orchestrator = orchestrator.with_language_model(Arc::new(client)),
        None => tracing::debug!("no language model configured, using template messages"),
    }
    Ok(Arc::new(orchestrator))
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests;
