//! Strongbox file-submission server.
//!
//! Binds a TCP listener, accepts connections, and spawns an independent
//! session task per connection. A session reads one request frame at a
//! time, dispatches it through the handler registry, and writes exactly one
//! response frame before reading the next.

mod config;
mod handlers;
mod session;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use strongbox_common::catalog::Catalog;
use strongbox_common::protocol::Services;
use strongbox_common::store::BlobStore;
use tokio::net::TcpListener;
use tracing::{error, info};

use config::Config;
use session::Session;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting strongbox server v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load().context("failed to load configuration")?;

    let catalog = Catalog::connect(&config.database_url).context("failed to open catalog")?;
    catalog
        .initialize()
        .await
        .context("failed to initialize catalog schema")?;

    let (clients, files) = catalog.snapshot().await;
    info!(
        clients = clients.len(),
        files = files.len(),
        "catalog warm state loaded"
    );

    let blob_store = BlobStore::new(config.storage_root.clone());
    let services = Services { catalog, blob_store };
    let registry = Arc::new(handlers::build_registry());
    let idle_timeout = Duration::from_secs(config.idle_timeout_secs);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.listen_port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(%addr, "strongbox server listening");

    loop {
        match listener.accept().await {
            Ok((stream, peer_addr)) => {
                info!(addr = %peer_addr, "accepted connection");
                let registry = Arc::clone(&registry);
                let services = services.clone();

                tokio::spawn(async move {
                    Session::new(stream, peer_addr, registry, services, idle_timeout)
                        .run()
                        .await;
                });
            }
            Err(e) => {
                error!(error = %e, "failed to accept connection");
            }
        }
    }
}
