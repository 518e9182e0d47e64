//! `promptgate serve` command handler.

use anyhow::{Context, Result};
use tracing::info;

use promptgate::api::{start_server, AppState};
use promptgate::health::start_periodic_usage_flush;

use super::CommonArgs;

/// Run the gateway until Ctrl-C or SIGTERM.
pub(crate) async fn cmd_serve(
    common: CommonArgs,
    bind: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    let mut config = common.load()?;
    if let Some(bind) = bind {
        config.server.bind = bind;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    info!(
        model = %config.gemini.model,
        cache_ttl_secs = config.cache.ttl_secs,
        timeout_secs = config.gemini.timeout_secs,
        "Starting prompt gateway"
    );

    let state = AppState::from_config(&config).context("failed to build gateway state")?;
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let flush = start_periodic_usage_flush(state.invoker.metrics().clone(), shutdown_rx);

    let shutdown = async move {
        wait_for_signal().await;
        info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    };

    start_server(&config.server, state, shutdown)
        .await
        .context("gateway server failed")?;
    let _ = flush.await;
    Ok(())
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {}", e);
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
}
