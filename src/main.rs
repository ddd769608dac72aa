//! afkbot: keeps one Minecraft account online on one server.
//!
//! # Usage
//!
//! ```bash
//! afkbot --settings settings.json --log-level info
//! ```
//!
//! Environment variables can also be used:
//! - `AFKBOT_SETTINGS`: Path to the settings file
//! - `AFKBOT_WEB_ADDR`: Status page address
//! - `RUST_LOG`: Log filter (wins over `--log-level`)

use afkbot::config::{Config, Settings};
use afkbot::observability::http::{bind_status_server, serve_status, StatusState};
use afkbot::observability::metrics::init_metrics;
use afkbot::observability::tracing::init_tracing;
use afkbot::reconnect::Controller;
use afkbot::shutdown::shutdown_on_signal;
use afkbot::transport::dry_run::DryRunTransport;
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;

/// How long shutdown waits for the controller to close its session.
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Print startup banner with version and configuration.
fn print_banner(config: &Config, settings: &Settings) {
    let version = env!("CARGO_PKG_VERSION");
    let web = if config.no_web {
        "disabled".to_string()
    } else {
        config.web_addr.to_string()
    };
    eprintln!(
        r#"
      _    _____ _  __  ____        _
     / \  |  ___| |/ / | __ )  ___ | |_
    / _ \ | |_  | ' /  |  _ \ / _ \| __|
   / ___ \|  _| | . \  | |_) | (_) | |_
  /_/   \_\_|   |_|\_\ |____/ \___/ \__|

  afkbot v{}

  Configuration:
    Server:     {} ({})
    Version:    {}
    Username:   {}
    Status:     {}
    Log Level:  {}

  Press Ctrl+C to shutdown gracefully.
"#,
        version,
        settings.address(),
        settings.server.edition,
        settings.version(),
        settings.bot_account.username,
        web,
        config.log_level
    );
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse_args();

    init_tracing("afkbot", &config.log_level);
    init_metrics();

    let settings = Settings::load(&config.settings)
        .with_context(|| format!("failed to load settings from {}", config.settings.display()))?;

    print_banner(&config, &settings);

    let mut shutdown_rx = shutdown_on_signal();

    let listener = if config.no_web {
        None
    } else {
        let listener = bind_status_server(config.web_addr)
            .await
            .with_context(|| format!("failed to bind status page on {}", config.web_addr))?;
        Some(listener)
    };

    let transport = Arc::new(DryRunTransport::new(Duration::from_millis(config.dry_run_handshake_ms)));
    let handle = Controller::spawn(settings.controller_config(), transport);

    let mut web = listener.map(|listener| {
        let state = StatusState {
            server: settings.address(),
            version: settings.version(),
            status: handle.watch(),
        };
        tokio::spawn(serve_status(listener, state, shutdown_rx.clone()))
    });

    handle.start();

    // Run until a signal arrives or the status page dies.
    let web_result = match web.as_mut() {
        Some(task) => tokio::select! {
            _ = shutdown_rx.changed() => None,
            result = task => Some(result),
        },
        None => {
            let _ = shutdown_rx.changed().await;
            None
        }
    };

    handle.stop();
    if tokio::time::timeout(STOP_TIMEOUT, handle.wait_for(|s| s.phase.is_terminal()))
        .await
        .is_err()
    {
        tracing::warn!("Controller did not stop in time");
    }

    match web_result {
        Some(result) => {
            let served = result.context("status page task panicked")?;
            if let Err(e) = &served {
                tracing::error!(error = %e, "Status page failed");
            }
            served.context("status page failed")?;
        }
        None => {
            if let Some(task) = web {
                task.await
                    .context("status page task panicked")?
                    .context("status page failed")?;
            }
        }
    }

    tracing::info!("afkbot shutdown complete");
    Ok(())
}
