//! masterbook server entry point.
//!
//! Loads configuration, opens the relational store, warms the table cache,
//! runs a forced bootstrap sync, and then serves MCP over stdio. Logging goes
//! to stderr to keep stdout free for JSON-RPC.

use std::sync::Arc;

use anyhow::Result;
use masterbook_client::{CatalogClient, CatalogConfig, TableCache};
use masterbook_core::{AppConfig, MasterDb};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod handler;
mod sync;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(base_url = %config.base_url, db_path = %config.db_path.display(), "starting masterbook on stdio transport");

    let db = MasterDb::open(&config.db_path).await?;
    let client = CatalogClient::new(CatalogConfig::from(&config))?;
    let cache = Arc::new(TableCache::with_concurrency(Arc::new(client), config.max_concurrent_fetches));

    if config.preload {
        match cache.preload(&config.preload_excluded_set()).await {
            Ok(loaded) => tracing::info!(tables = loaded.len(), "table cache preloaded"),
            Err(e) => tracing::warn!(error = %e, "preload failed; tables will load on demand"),
        }
    }

    let sync = Arc::new(sync::MasterSync::new(cache, db));
    if let Err(e) = sync.run(true).await {
        tracing::warn!(error = %e, "bootstrap sync failed; run master_sync to retry");
    }

    let handler = handler::MasterbookServer::new(sync);
    let server = serve_server(handler, stdio()).await?;
    server.waiting().await?;

    Ok(())
}
