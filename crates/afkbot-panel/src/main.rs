//! afkpanel: HTTP panel for managing AFK bots.
//!
//! # Usage
//!
//! ```bash
//! afkpanel --port 8080 --data-dir ./data --settings panel.json
//! ```
//!
//! Environment variables can also be used:
//! - `AFKPANEL_PORT`: Port to listen on
//! - `AFKPANEL_DATA_DIR`: Directory holding servers.json
//! - `RUST_LOG`: Log filter (wins over `--log-level`)

use afkbot::observability::metrics::init_metrics;
use afkbot::observability::tracing::init_tracing;
use afkbot::shutdown::shutdown_on_signal;
use afkbot::transport::dry_run::DryRunTransport;
use afkbot_panel::config::Config;
use afkbot_panel::server::run_panel;
use std::sync::Arc;
use std::time::Duration;

/// Print startup banner with version and configuration.
fn print_banner(config: &Config) {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!(
        r#"
  afkpanel v{} - AFK bot panel

  Configuration:
    Address:    {}:{}
    Data Dir:   {}
    Settings:   {}
    Log Level:  {}

  Press Ctrl+C to shutdown gracefully.
"#,
        version,
        config.host,
        config.port,
        config.data_dir.display(),
        config.settings.display(),
        config.log_level
    );
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse_args();

    init_tracing("afkpanel", &config.log_level);
    init_metrics();

    print_banner(&config);

    let shutdown_rx = shutdown_on_signal();

    let transport = Arc::new(DryRunTransport::new(Duration::from_millis(config.dry_run_handshake_ms)));
    run_panel(config, transport, shutdown_rx).await?;

    tracing::info!("afkpanel shutdown complete");
    Ok(())
}
