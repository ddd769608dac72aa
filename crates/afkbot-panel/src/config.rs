//! Configuration for the panel.
//!
//! Supports:
//! - CLI arguments via clap
//! - Environment variable overrides
//! - A JSON settings file (`panel.json`) with registry policy and bot defaults

use afkbot::error::ConfigError;
use afkbot::features::{AntiAfkConfig, ChatConfig, FeatureConfig};
use afkbot::reconnect::{BackoffPolicy, RetryPolicy};
use afkbot::registry::{DefaultPorts, RegistryConfig, SessionDefaults};
use afkbot::transport::Edition;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// afkpanel: manage AFK bots for many servers over HTTP.
#[derive(Parser, Debug, Clone)]
#[command(name = "afkpanel")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Host address to bind to
    #[arg(long, env = "AFKPANEL_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "AFKPANEL_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Directory holding servers.json
    #[arg(short, long, env = "AFKPANEL_DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// Panel settings file
    #[arg(short, long, env = "AFKPANEL_SETTINGS", default_value = "panel.json")]
    pub settings: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "AFKPANEL_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Handshake delay of the bundled dry-run transport, in milliseconds
    #[arg(long, env = "AFKPANEL_DRY_RUN_HANDSHAKE_MS", default_value_t = 500)]
    pub dry_run_handshake_ms: u64,
}

impl Config {
    /// Parse configuration from CLI arguments and environment.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// A configuration bound to a random local port.
    pub fn test_config(data_dir: PathBuf) -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            settings: data_dir.join("panel.json"),
            data_dir,
            log_level: "debug".into(),
            dry_run_handshake_ms: 50,
        }
    }
}

/// Protocol versions announced per edition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Versions {
    pub bedrock: String,
    pub java: String,
}

impl Default for Versions {
    fn default() -> Self {
        Self {
            bedrock: Edition::Bedrock.default_version().to_string(),
            java: Edition::Java.default_version().to_string(),
        }
    }
}

/// Feature toggles applied to every bot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Features {
    pub anti_afk: AntiAfkConfig,
    pub chat_messages: ChatConfig,
    pub chat_log: bool,
}

/// Reconnect policy applied to every bot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Reconnect {
    pub enabled: bool,
    pub delay_ms: u64,
    pub max_attempts: u32,
    pub disconnect_delay_cap_ms: u64,
    pub error_delay_cap_ms: u64,
}

impl Default for Reconnect {
    fn default() -> Self {
        Self {
            enabled: true,
            delay_ms: RetryPolicy::DEFAULT_BASE_DELAY.as_millis() as u64,
            max_attempts: RetryPolicy::DEFAULT_MAX_ATTEMPTS,
            disconnect_delay_cap_ms: RetryPolicy::DEFAULT_DISCONNECT_CAP.as_millis() as u64,
            error_delay_cap_ms: RetryPolicy::DEFAULT_ERROR_CAP.as_millis() as u64,
        }
    }
}

impl Reconnect {
    pub fn retry_policy(&self) -> RetryPolicy {
        let base = Duration::from_millis(self.delay_ms);
        RetryPolicy {
            auto_reconnect: self.enabled,
            max_attempts: self.max_attempts,
            on_disconnect: BackoffPolicy::fixed(base, Duration::from_millis(self.disconnect_delay_cap_ms)),
            on_error: BackoffPolicy::linear(base, Duration::from_millis(self.error_delay_cap_ms)),
        }
    }
}

/// Contents of `panel.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PanelSettings {
    pub admin_id: Option<String>,
    pub max_servers_per_user: usize,
    pub offline: bool,
    pub default_ports: DefaultPorts,
    pub versions: Versions,
    pub features: Features,
    pub reconnect: Reconnect,
}

impl Default for PanelSettings {
    fn default() -> Self {
        Self {
            admin_id: None,
            max_servers_per_user: 3,
            offline: true,
            default_ports: DefaultPorts::default(),
            versions: Versions::default(),
            features: Features::default(),
            reconnect: Reconnect::default(),
        }
    }
}

impl PanelSettings {
    /// Read `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "Panel settings not found, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let settings: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_servers_per_user == 0 {
            return Err(ConfigError::Invalid {
                field: "max-servers-per-user",
                reason: "must be at least 1".into(),
            });
        }
        if self.default_ports.bedrock == 0 || self.default_ports.java == 0 {
            return Err(ConfigError::Invalid {
                field: "default-ports",
                reason: "ports must be between 1 and 65535".into(),
            });
        }
        if self.admin_id.as_deref().is_some_and(|id| id.trim().is_empty()) {
            return Err(ConfigError::Invalid {
                field: "admin-id",
                reason: "must not be blank".into(),
            });
        }
        self.feature_config().validate()
    }

    fn feature_config(&self) -> FeatureConfig {
        FeatureConfig {
            anti_afk: self.features.anti_afk.clone(),
            chat: self.features.chat_messages.clone(),
            ..FeatureConfig::default()
        }
    }

    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            admin_id: self.admin_id.clone(),
            max_servers_per_user: self.max_servers_per_user,
            default_ports: self.default_ports,
            session: SessionDefaults {
                retry: self.reconnect.retry_policy(),
                features: self.feature_config(),
                grace_delay: Duration::from_secs(2),
                chat_log: self.features.chat_log,
                offline: self.offline,
                bedrock_version: self.versions.bedrock.clone(),
                java_version: self.versions.java.clone(),
            },
        }
    }
}
