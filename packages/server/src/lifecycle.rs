//! Startup walk, administrative rebuilds, and shutdown signals.

use std::sync::Arc;
use std::time::Duration;

use mediasrv_registry::{CancellationToken, Registry, WalkError, WalkReport};

use crate::error::{Error, Result};

/// Walk `registry` on the blocking pool, giving up after `timeout`.
///
/// On timeout the walk is cancelled and awaited. If it was cancelled in time
/// it published nothing and the registry keeps the snapshot it had before;
/// if it had already published, its report is returned as a success.
pub async fn rebuild(registry: &Arc<Registry>, timeout: Duration) -> Result<WalkReport> {
    let cancel = CancellationToken::new();
    let mut task = tokio::task::spawn_blocking({
        let registry = Arc::clone(registry);
        let cancel = cancel.clone();
        move || registry.walk_with_cancel(None, &cancel)
    });

    if let Ok(joined) = tokio::time::timeout(timeout, &mut task).await {
        return Ok(joined??);
    }

    cancel.cancel();
    match task.await? {
        Ok(report) if report.published => {
            tracing::warn!(
                generation = report.generation,
                "registry walk published after its {:?} deadline",
                timeout
            );
            Ok(report)
        }
        Ok(_) | Err(WalkError::Cancelled) => Err(Error::WalkTimeout(timeout)),
        Err(error) => Err(error.into()),
    }
}

fn log_report(report: &WalkReport) {
    for failure in &report.failures {
        tracing::warn!(
            path = %failure.path.display(),
            kind = %failure.kind,
            "{}",
            failure.message
        );
    }
    tracing::info!(
        generation = report.generation,
        files = report.files,
        bytes = report.bytes,
        failures = report.failures.len(),
        published = report.published,
        "registry walk finished"
    );
}

/// Walk once before serving; any failure here is fatal.
pub(crate) async fn initial_walk(registry: &Arc<Registry>, timeout: Duration) -> Result<()> {
    let report = rebuild(registry, timeout).await?;
    log_report(&report);
    Ok(())
}

/// Rebuild the registry every time the process receives SIGHUP, until
/// `shutdown` fires.
#[cfg(unix)]
pub(crate) async fn rebuild_on_hangup(
    registry: Arc<Registry>,
    timeout: Duration,
    shutdown: CancellationToken,
) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(hangup) => hangup,
        Err(error) => {
            tracing::error!(%error, "cannot listen for SIGHUP; rebuilds disabled");
            return;
        }
    };

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            received = hangup.recv() => {
                if received.is_none() {
                    return;
                }
            }
        }

        tracing::info!("SIGHUP received, rebuilding registry");
        match rebuild(&registry, timeout).await {
            Ok(report) => log_report(&report),
            Err(error) => {
                tracing::error!(%error, "rebuild failed; previous content is still served")
            }
        }
    }
}

/// Resolves on Ctrl-C or, on unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(%error, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(error) => {
                tracing::error!(%error, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("termination signal received, shutting down");
}
