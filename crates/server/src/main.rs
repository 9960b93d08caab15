//! shellcache server entry point.
//!
//! Loads configuration, opens the cache, builds one worker generation and
//! serves it over MCP on stdio. Logging goes to stderr to avoid interfering
//! with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::{Context, Result};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use shellcache_client::{ClientRegistry, FetchClient, FetchConfig, Worker};
use shellcache_core::{AppConfig, CacheDb};
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("loading configuration")?;
    tracing::info!(
        generation = %config.worker.generation,
        scope = %config.worker.scope,
        db_path = %config.db_path.display(),
        "Starting shellcache server on stdio transport"
    );

    let db = CacheDb::open(&config.db_path).await.context("opening cache database")?;
    let network = FetchClient::new(FetchConfig {
        user_agent: config.user_agent.clone(),
        max_bytes: config.max_bytes,
        timeout: config.timeout(),
        scope: config.worker.scope.clone(),
        ..Default::default()
    })
    .context("building http client")?;

    let worker = Worker::new(config.worker, db, Arc::new(network), ClientRegistry::new())
        .context("building worker")?;

    let handler = handler::ShellcacheServer::new(Arc::new(worker));
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
