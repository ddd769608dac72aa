//! Configuration for the standalone bot.
//!
//! Supports:
//! - CLI arguments via clap, with environment variable overrides
//! - A JSON settings file describing the account, target server and features
//! - Sensible defaults for every optional setting

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::features::{AntiAfkConfig, ChatConfig, FeatureConfig, PositionConfig};
use crate::reconnect::{BackoffPolicy, ControllerConfig, RetryPolicy};
use crate::transport::{ConnectOptions, Edition};

/// afkbot: keeps a Minecraft account online on one server.
#[derive(Parser, Debug, Clone)]
#[command(name = "afkbot")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Path to the bot settings file
    #[arg(short, long, env = "AFKBOT_SETTINGS", default_value = "settings.json")]
    pub settings: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "AFKBOT_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Address of the status page
    #[arg(long, env = "AFKBOT_WEB_ADDR", default_value = "0.0.0.0:3000")]
    pub web_addr: SocketAddr,

    /// Do not serve the status page
    #[arg(long)]
    pub no_web: bool,

    /// Handshake delay of the bundled dry-run transport, in milliseconds
    #[arg(long, env = "AFKBOT_DRY_RUN_HANDSHAKE_MS", default_value_t = 500)]
    pub dry_run_handshake_ms: u64,
}

impl Config {
    /// Parse configuration from CLI arguments and environment.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// Account the bot logs in with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotAccount {
    pub username: String,
    /// `offline` or an online auth mode understood by the transport.
    #[serde(rename = "type", default = "default_account_type")]
    pub kind: String,
}

fn default_account_type() -> String {
    "offline".to_string()
}

/// Target server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSettings {
    pub ip: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default = "default_edition")]
    pub edition: Edition,
}

fn default_edition() -> Edition {
    Edition::Bedrock
}

/// Reconnect and feature settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct UtilSettings {
    pub auto_reconnect: bool,
    /// Base reconnect delay in milliseconds.
    pub auto_reconnect_delay: u64,
    pub max_reconnect_attempts: u32,
    /// Ceiling of the delay after a disconnect, in milliseconds.
    pub disconnect_delay_cap: u64,
    /// Ceiling of the delay after a transport error, in milliseconds.
    pub error_delay_cap: u64,
    pub chat_log: bool,
    pub anti_afk: AntiAfkConfig,
    pub chat_messages: ChatConfig,
}

impl Default for UtilSettings {
    fn default() -> Self {
        Self {
            auto_reconnect: true,
            auto_reconnect_delay: RetryPolicy::DEFAULT_BASE_DELAY.as_millis() as u64,
            max_reconnect_attempts: RetryPolicy::DEFAULT_MAX_ATTEMPTS,
            disconnect_delay_cap: RetryPolicy::DEFAULT_DISCONNECT_CAP.as_millis() as u64,
            error_delay_cap: RetryPolicy::DEFAULT_ERROR_CAP.as_millis() as u64,
            chat_log: true,
            anti_afk: AntiAfkConfig::default(),
            chat_messages: ChatConfig::default(),
        }
    }
}

impl UtilSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        let base = Duration::from_millis(self.auto_reconnect_delay);
        RetryPolicy {
            auto_reconnect: self.auto_reconnect,
            max_attempts: self.max_reconnect_attempts,
            on_disconnect: BackoffPolicy::fixed(base, Duration::from_millis(self.disconnect_delay_cap)),
            on_error: BackoffPolicy::linear(base, Duration::from_millis(self.error_delay_cap)),
        }
    }
}

/// Contents of the bot settings file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Settings {
    pub bot_account: BotAccount,
    pub server: ServerSettings,
    #[serde(default)]
    pub position: PositionConfig,
    #[serde(default)]
    pub utils: UtilSettings,
}

impl Settings {
    /// Read, parse and validate a settings file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.ip.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "server.ip",
                reason: "must not be empty".into(),
            });
        }
        if self.server.port == Some(0) {
            return Err(ConfigError::Invalid {
                field: "server.port",
                reason: "must be between 1 and 65535".into(),
            });
        }
        if self.bot_account.username.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "bot-account.username",
                reason: "must not be empty".into(),
            });
        }
        self.feature_config().validate()
    }

    pub fn port(&self) -> u16 {
        self.server
            .port
            .unwrap_or_else(|| self.server.edition.default_port())
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.server.ip, self.port())
    }

    pub fn version(&self) -> String {
        self.server
            .version
            .clone()
            .unwrap_or_else(|| self.server.edition.default_version().to_string())
    }

    fn feature_config(&self) -> FeatureConfig {
        FeatureConfig {
            anti_afk: self.utils.anti_afk.clone(),
            chat: self.utils.chat_messages.clone(),
            position: self.position.clone(),
            ..FeatureConfig::default()
        }
    }

    /// Immutable controller inputs derived from these settings.
    pub fn controller_config(&self) -> ControllerConfig {
        let mut connect = ConnectOptions::new(
            self.server.ip.trim(),
            self.port(),
            self.bot_account.username.trim(),
            self.server.edition,
        );
        connect.offline = self.bot_account.kind == "offline";
        connect.version = self.version();

        ControllerConfig {
            connect,
            retry: self.utils.retry_policy(),
            features: self.feature_config(),
            grace_delay: Duration::from_secs(2),
            chat_log: self.utils.chat_log,
        }
    }
}
