//! dispatch-mcp server entry point.
//!
//! Boots the MCP server on stdio transport. Logging goes to stderr to avoid
//! interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use dispatch_client::DataContext;
use dispatch_core::config::StoreKind;
use dispatch_core::{AppConfig, MemoryStore, SqliteStore, TabularStore};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod handler;
mod tools;

async fn open_store(config: &AppConfig) -> Result<Arc<dyn TabularStore>> {
    let store: Arc<dyn TabularStore> = match config.store {
        StoreKind::Sqlite => {
            tracing::info!(path = %config.db_path.display(), "opening sqlite store");
            Arc::new(SqliteStore::open(&config.db_path).await?)
        }
        StoreKind::Memory => {
            tracing::warn!("using in-memory store; data is lost on exit");
            Arc::new(MemoryStore::new())
        }
    };
    Ok(store)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(
        store = ?config.store,
        ttl_secs = config.cache.default_ttl_secs,
        batch_threshold = config.write.batch_threshold,
        strategy = ?config.write.strategy,
        "loaded configuration"
    );

    let store = open_store(&config).await?;
    let mut ctx = DataContext::new(store, config);
    let created = ctx.ensure_sheets().await?;
    if !created.is_empty() {
        tracing::info!(sheets = ?created, "initialized missing sheets");
    }

    tracing::info!("Starting dispatch-mcp server on stdio transport");

    let handler = handler::McpDispatchServer::new(ctx);
    let server = serve_server(handler, stdio()).await?;
    server.waiting().await?;

    Ok(())
}
