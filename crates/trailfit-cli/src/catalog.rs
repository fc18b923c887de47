//! Catalog command handlers for the CLI.

use clap::Subcommand;
use trailfit_agent::Orchestrator;
use trailfit_core::{AppConfig, Catalog, OracleBackend};
use trailfit_retrieval::QdrantOracle;

use crate::print_json;

/// Sub-commands available under `catalog`.
#[derive(Debug, Subcommand)]
pub enum CatalogCommands {
    /// Product counts per brand and category with price and rating ranges
    Info,
    /// Embed the catalog and upsert it into the Qdrant collection
    Index,
}

pub(crate) async fn run_catalog(
    command: CatalogCommands,
    config: &AppConfig,
    orchestrator: &Orchestrator,
) -> anyhow::Result<()> {
    match command {
        CatalogCommands::Info => print_json(&orchestrator.catalog_info()),
        CatalogCommands::Index => run_catalog_index(config, orchestrator.engine().catalog()).await,
    }
}

/// Index the catalog into Qdrant. The in-process oracle needs no index.
///
/// # Errors
///
/// Returns an error when the configured oracle is not Qdrant, or if
/// embedding or upserting fails.
async fn run_catalog_index(config: &AppConfig, catalog: &Catalog) -> anyhow::Result<()> {
    let OracleBackend::Qdrant {
        qdrant_url,
        collection,
        tei_url,
    } = &config.oracle
    else {
        anyhow::bail!("catalog index requires TRAILFIT_ORACLE=qdrant");
    };

    let oracle = QdrantOracle::new(
        qdrant_url,
        collection,
        tei_url,
        std::time::Duration::from_millis(config.oracle_timeout_ms),
    )?;
    let indexed = oracle.index_catalog(catalog).await?;
    tracing::info!(indexed, collection = %collection, "catalog indexed");
    print_json(&serde_json::json!({ "collection": collection, "indexed": indexed }))
}
