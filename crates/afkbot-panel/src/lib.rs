//! afkbot-panel: an HTTP surface over the afkbot session registry.
//!
//! # Modules
//!
//! - [`api`]: routes, caller extraction and error mapping
//! - [`config`]: CLI flags and `panel.json`
//! - [`server`]: startup and graceful shutdown

// Lint configuration
#![warn(clippy::all)]
#![allow(
    clippy::module_name_repetitions, // config::PanelSettings is fine
    clippy::must_use_candidate,      // Not all functions need #[must_use]
    clippy::missing_errors_doc       // Error docs can be verbose
)]

pub mod api;
pub mod config;
pub mod server;
