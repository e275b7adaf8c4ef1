//! Multi-target daemon bootstrap.

use crate::catalog::Catalog;
use crate::config::ServeConfig;
use crate::server::{self, AppState};

use super::registry::Registry;
use super::shutdown_channel;

/// Run the daemon: reload the catalog, supervise every persisted target,
/// serve the control plane, and block until an interrupt signal.
pub fn run_serve(config: ServeConfig) -> crate::Result<()> {
    let catalog = Catalog::open(Some(config.storage_file.clone()), None)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let registry = Registry::new(config.repos_dir.clone(), runtime.handle().clone());

    // Register everything persisted before accepting new targets. Per-target
    // failures are not fatal: the entry stays in the catalog for the next
    // restart.
    let targets = catalog.load()?;
    tracing::info!(count = targets.len(), "loaded sync targets from catalog");
    for target in targets {
        if let Err(error) = registry.register(target) {
            tracing::error!(%error, "failed to start persisted target");
        }
    }

    let state = AppState::new(catalog, registry.clone());
    let router = server::router(state, &config.static_dir);
    let listener =
        runtime.block_on(tokio::net::TcpListener::bind(config.listen_addr.as_str()))?;
    tracing::info!(addr = %config.listen_addr, "control plane listening");
    let _server = runtime.spawn(async move {
        if let Err(error) = axum::serve(listener, router).await {
            tracing::error!(%error, "http server terminated");
        }
    });

    let shutdown = shutdown_channel()?;
    let _ = shutdown.recv();
    tracing::info!("shutdown signal received, stopping supervisors");
    registry.stop_all();
    Ok(())
}
