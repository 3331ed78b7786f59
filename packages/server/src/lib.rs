//! # mediasrv-server
//!
//! Serves a [`mediasrv_registry::Registry`] over HTTP.
//!
//! Startup binds the registry to its base directory and walks it before the
//! listener accepts anything; a failure at either step stops the process.
//! While running, SIGHUP triggers a rebuild on the blocking pool, and
//! Ctrl-C or SIGTERM drains in-flight requests and closes the registry.

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod routes;

use std::sync::Arc;

use mediasrv_registry::{CancellationToken, Registry};
use tokio::net::TcpListener;

pub use config::ServerConfig;
pub use error::{Error, Result};
pub use routes::{app, router};

/// Run the server until a termination signal arrives.
pub async fn run(config: ServerConfig) -> Result<()> {
    let registry = Arc::new(Registry::new(&config.base_path, config.registry.clone())?);
    lifecycle::initial_walk(&registry, config.rebuild_timeout()).await?;

    let shutdown = CancellationToken::new();

    #[cfg(unix)]
    tokio::spawn(lifecycle::rebuild_on_hangup(
        Arc::clone(&registry),
        config.rebuild_timeout(),
        shutdown.clone(),
    ));

    let listener = TcpListener::bind(config.listen)
        .await
        .map_err(|source| Error::Bind {
            addr: config.listen,
            source,
        })?;
    tracing::info!(
        addr = %listener.local_addr()?,
        base_path = %registry.base_path().display(),
        "serving"
    );

    let served = axum::serve(
        listener,
        app(Arc::clone(&registry), config.request_timeout()),
    )
    .with_graceful_shutdown(lifecycle::shutdown_signal())
    .await;

    shutdown.cancel();
    registry.close();
    served?;

    tracing::info!("done");
    Ok(())
}
