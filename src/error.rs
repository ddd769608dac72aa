//! Error taxonomy.
//!
//! Transport errors are recoverable through backoff, a failed action send is
//! swallowed by the driver that issued it, and `MaxAttemptsExceeded` is the
//! only terminal outcome that needs an operator to restart the bot.

use std::path::PathBuf;
use thiserror::Error;

/// The transport could not establish or keep a session.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("connection dropped: {0}")]
    Dropped(String),
}

/// A feature driver failed to send an action on a live session.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SendError {
    #[error("session closed")]
    Closed,

    #[error("send rejected: {0}")]
    Rejected(String),
}

/// Why a controller gave up on its connection.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum FailureCause {
    #[error("maximum reconnect attempts ({max_attempts}) reached")]
    MaxAttemptsExceeded { max_attempts: u32 },

    #[error("connection lost and auto-reconnect is disabled")]
    ReconnectDisabled,
}

/// Settings could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// The record store could not be read or written.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("store file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode records: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Registry operation failures surfaced to the operator.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("server {0} not found")]
    NotFound(String),

    #[error("not authorized to manage server {0}")]
    NotAuthorized(String),

    #[error("bot for server {0} is already running")]
    AlreadyRunning(String),

    #[error("bot for server {0} is not running")]
    NotRunning(String),

    #[error("server limit reached ({limit} per user)")]
    LimitReached { limit: usize },

    #[error("invalid server address `{input}`: {reason}")]
    InvalidAddress { input: String, reason: String },

    #[error("admin privileges required")]
    AdminOnly,

    #[error(transparent)]
    Store(#[from] StoreError),
}
