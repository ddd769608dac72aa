//! Observability infrastructure.
//!
//! Provides:
//! - Structured tracing through `tracing-subscriber`
//! - Prometheus counters for connection and driver activity
//! - HTTP status page with health and metrics endpoints

pub mod http;
pub mod metrics;
pub mod tracing;
