//! afkbot: a Minecraft anti-idle bot built around a reconnect/backoff controller.
//!
//! The crate drives a single logical connection to a game server through an
//! external protocol client, keeps the player from being kicked for idling,
//! and offers a registry that manages one controller per registered server.
//!
//! # Architecture
//!
//! - **Controller**: one task per target owns the connection, counts attempts
//!   and schedules retries with a flat (disconnect) or linear (error) delay
//! - **Drivers**: rotation, crouch, jump, chat and teleport timers, gated on
//!   the connection being established
//! - **Registry**: server records persisted as JSON, at most one live
//!   controller per server
//!
//! # Modules
//!
//! - [`config`]: CLI flags and the bot settings file
//! - [`error`]: error taxonomy
//! - [`features`]: anti-idle feature drivers
//! - [`observability`]: tracing, metrics and the status page
//! - [`reconnect`]: backoff policy, attempt state machine and controller task
//! - [`registry`]: server records, persistence and live sessions
//! - [`shutdown`]: SIGINT/SIGTERM handling for the binaries
//! - [`transport`]: the seam to the external protocol client

// Lint configuration
#![warn(clippy::all)]
#![allow(
    clippy::module_name_repetitions, // reconnect::ReconnectMachine is fine
    clippy::must_use_candidate,      // Not all functions need #[must_use]
    clippy::missing_errors_doc,      // Error docs can be verbose
    clippy::missing_panics_doc,      // Panic docs can be verbose
    clippy::struct_excessive_bools   // Settings structs carry feature flags
)]

pub mod config;
pub mod error;
pub mod features;
pub mod observability;
pub mod reconnect;
pub mod registry;
pub mod shutdown;
pub mod transport;

use uuid::Uuid;

/// Generate a new UUIDv7 (time-sortable) server ID.
///
/// # Example
///
/// ```
/// let id = afkbot::generate_server_id();
/// assert!(id.len() == 36); // UUID string format
/// ```
#[must_use]
pub fn generate_server_id() -> String {
    Uuid::now_v7().to_string()
}

/// Get the current Unix timestamp in milliseconds.
#[must_use]
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}
