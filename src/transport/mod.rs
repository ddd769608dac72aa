//! Seam to the external protocol client.
//!
//! The controller never speaks a wire protocol itself. A [`Transport`] opens
//! a [`Session`] and reports what happens to it through an [`EventSink`];
//! feature drivers push [`Action`]s back through [`Session::send`]. Bedrock
//! and Java clients are adapted to these two traits.

pub mod dry_run;

pub use dry_run::DryRunTransport;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::error::{SendError, TransportError};

/// Game edition of a target server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Edition {
    Bedrock,
    Java,
}

impl Edition {
    /// Port used when an address omits one.
    pub fn default_port(self) -> u16 {
        match self {
            Self::Bedrock => 19132,
            Self::Java => 25565,
        }
    }

    /// Protocol version the bundled clients negotiate by default.
    pub fn default_version(self) -> &'static str {
        match self {
            Self::Bedrock => "1.21.90",
            Self::Java => "1.21",
        }
    }
}

impl fmt::Display for Edition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bedrock => f.write_str("bedrock"),
            Self::Java => f.write_str("java"),
        }
    }
}

impl std::str::FromStr for Edition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bedrock" => Ok(Self::Bedrock),
            "java" => Ok(Self::Java),
            _ => Err(format!("unknown edition: {s}")),
        }
    }
}

/// Everything a transport needs to open one session.
///
/// Treated as an immutable snapshot for the lifetime of an attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectOptions {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub offline: bool,
    pub version: String,
    pub edition: Edition,
    /// Handshake bound enforced by the transport, not by the controller.
    pub connect_timeout: Duration,
    pub ping_interval: Duration,
    pub keep_alive: bool,
}

impl ConnectOptions {
    /// Options with the client defaults for `edition`.
    pub fn new(host: impl Into<String>, port: u16, username: impl Into<String>, edition: Edition) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            offline: true,
            version: edition.default_version().to_string(),
            edition,
            connect_timeout: Duration::from_secs(45),
            ping_interval: Duration::from_secs(15),
            keep_alive: true,
        }
    }

    /// `host:port` form used in logs.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// A position in the world.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Look direction in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rotation {
    pub yaw: f32,
    pub pitch: f32,
}

/// Player actions issued by feature drivers.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Normal movement update carrying the current look direction.
    Look { position: Vec3, rotation: Rotation },
    /// Start (`true`) or stop (`false`) sneaking.
    Sneak(bool),
    Jump,
    Chat(String),
    /// Teleport-mode movement to an absolute coordinate.
    Teleport { position: Vec3, rotation: Rotation },
}

impl Action {
    /// Short name used as a metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Look { .. } => "look",
            Self::Sneak(_) => "sneak",
            Self::Jump => "jump",
            Self::Chat(_) => "chat",
            Self::Teleport { .. } => "teleport",
        }
    }
}

/// Data delivered with the handshake-complete notification.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpawnInfo {
    pub world: Option<String>,
    pub position: Option<Vec3>,
}

/// Notifications a session reports back to its controller.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Handshake finished and the player spawned.
    Connected(SpawnInfo),
    /// Server closed the session.
    Disconnected { reason: String },
    /// Transport-level failure during connect or while connected.
    Error(TransportError),
    /// Server moved our own player.
    Moved { position: Vec3, rotation: Rotation },
    /// Chat line received.
    Chat { source: String, message: String },
}

/// Tagged sender handed to a transport for one session.
///
/// Every notification carries the generation of the attempt that opened the
/// session so the controller can drop events from superseded sessions.
#[derive(Debug, Clone)]
pub struct EventSink {
    generation: u64,
    tx: mpsc::UnboundedSender<(u64, SessionEvent)>,
}

impl EventSink {
    pub(crate) fn new(generation: u64, tx: mpsc::UnboundedSender<(u64, SessionEvent)>) -> Self {
        Self { generation, tx }
    }

    /// Report a notification. Returns false once the controller is gone.
    pub fn emit(&self, event: SessionEvent) -> bool {
        self.tx.send((self.generation, event)).is_ok()
    }
}

/// A live network session.
pub trait Session: Send + Sync {
    /// Send one player action.
    fn send(&self, action: &Action) -> Result<(), SendError>;

    /// Close the session. Must be idempotent.
    fn stop(&self);
}

/// Factory for sessions.
///
/// `connect` returns as soon as the session object exists; the handshake
/// outcome arrives later as [`SessionEvent::Connected`] or
/// [`SessionEvent::Error`] on the sink.
pub trait Transport: Send + Sync {
    fn connect(
        &self,
        options: &ConnectOptions,
        events: EventSink,
    ) -> Result<Arc<dyn Session>, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edition_defaults() {
        assert_eq!(Edition::Bedrock.default_port(), 19132);
        assert_eq!(Edition::Java.default_port(), 25565);
        assert_eq!("JAVA".parse::<Edition>(), Ok(Edition::Java));
        assert!("pocket".parse::<Edition>().is_err());
    }

    #[test]
    fn test_edition_serde_lowercase() {
        let json = serde_json::to_string(&Edition::Bedrock).unwrap();
        assert_eq!(json, "\"bedrock\"");
    }

    #[test]
    fn test_connect_options_defaults() {
        let opts = ConnectOptions::new("play.example.net", 19132, "Bot", Edition::Bedrock);
        assert_eq!(opts.address(), "play.example.net:19132");
        assert_eq!(opts.version, "1.21.90");
        assert_eq!(opts.connect_timeout, Duration::from_secs(45));
        assert!(opts.offline);
    }

    #[tokio::test]
    async fn test_event_sink_tags_generation() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(7, tx);
        assert!(sink.emit(SessionEvent::Disconnected {
            reason: "kicked".into()
        }));
        let (generation, event) = rx.recv().await.unwrap();
        assert_eq!(generation, 7);
        assert!(matches!(event, SessionEvent::Disconnected { .. }));

        drop(rx);
        assert!(!sink.emit(SessionEvent::Error(TransportError::Dropped("x".into()))));
    }
}
