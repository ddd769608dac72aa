//! Panel server setup and lifecycle.
//!
//! Loads `panel.json`, opens the registry over `servers.json` in the data
//! directory and serves the API until shutdown. Live bots are stopped and
//! their records persisted before returning.

use afkbot::registry::{JsonFileStore, SessionRegistry};
use afkbot::transport::Transport;
use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::api::{self, AppState};
use crate::config::{Config, PanelSettings};

/// Open the registry described by `config` and `settings`.
pub fn build_state(
    config: &Config,
    settings: &PanelSettings,
    transport: Arc<dyn Transport>,
) -> anyhow::Result<AppState> {
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("failed to create data dir {}", config.data_dir.display()))?;

    let store = Arc::new(JsonFileStore::in_dir(&config.data_dir));
    let registry = SessionRegistry::open(settings.registry_config(), transport, store)?;
    Ok(AppState { registry })
}

/// Serve the API on an already bound listener.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    mut shutdown_rx: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let registry = state.registry.clone();

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
            tracing::info!("Shutdown signal received, stopping panel");
        })
        .await?;

    tracing::info!(live = registry.live_count(), "Stopping live bots");
    registry.shutdown()?;
    Ok(())
}

/// Run the panel until `shutdown_rx` changes.
pub async fn run_panel(
    config: Config,
    transport: Arc<dyn Transport>,
    shutdown_rx: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", config.host, config.port))?;

    let settings = PanelSettings::load(&config.settings)?;
    let state = build_state(&config, &settings, transport)?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(
        address = %addr,
        admin = settings.admin_id.is_some(),
        max_servers_per_user = settings.max_servers_per_user,
        "Starting panel"
    );

    serve(listener, state, shutdown_rx).await?;

    tracing::info!("Panel stopped");
    Ok(())
}
