//! afkctl: Command-line interface for the afkbot panel.
//!
//! Registers servers, starts and stops their bots and shows stats from the
//! terminal.

mod client;
mod commands;

use afkbot::registry::EditionChoice;
use anyhow::Result;
use clap::{Parser, Subcommand};

use client::PanelClient;

/// Command-line interface for the afkbot panel.
#[derive(Parser)]
#[command(name = "afkctl")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Panel endpoint (e.g., http://localhost:8080)
    #[arg(short, long, env = "AFKCTL_ENDPOINT", default_value = "http://localhost:8080")]
    endpoint: String,

    /// Caller id sent to the panel
    #[arg(short, long, env = "AFKCTL_USER")]
    user: String,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("unknown output format: {}", s)),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Register a server
    Add {
        /// Server address, host[:port]
        address: String,
        /// Edition: auto, bedrock or java
        #[arg(long, default_value = "auto")]
        edition: EditionChoice,
    },
    /// List your servers
    List,
    /// Show one server
    Status {
        /// Server id
        id: String,
    },
    /// Start the bot for a server
    Start {
        /// Server id
        id: String,
    },
    /// Stop the bot for a server
    Stop {
        /// Server id
        id: String,
    },
    /// Remove a server, stopping its bot first
    Remove {
        /// Server id
        id: String,
    },
    /// Show panel-wide stats (admin only)
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing for debug output
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();
    let client = PanelClient::new(&cli.endpoint, &cli.user)?;

    match cli.command {
        Commands::Add { address, edition } => {
            commands::servers::add(&client, &address, edition, cli.output).await?;
        }
        Commands::List => commands::servers::list(&client, cli.output).await?,
        Commands::Status { id } => commands::servers::status(&client, &id, cli.output).await?,
        Commands::Start { id } => commands::servers::start(&client, &id, cli.output).await?,
        Commands::Stop { id } => commands::servers::stop(&client, &id, cli.output).await?,
        Commands::Remove { id } => commands::servers::remove(&client, &id, cli.output).await?,
        Commands::Stats => commands::stats::show(&client, cli.output).await?,
    }

    Ok(())
}
