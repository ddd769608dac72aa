//! Prometheus metrics.
//!
//! Key metrics:
//! - afkbot_connect_attempts_total: Sessions opened, by edition
//! - afkbot_retries_scheduled_total: Retry timers armed, by trigger
//! - afkbot_failures_total: Terminal failures, by cause
//! - afkbot_actions_sent_total: Driver actions delivered, by kind
//! - afkbot_action_send_failures_total: Driver actions dropped, by kind

use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::OnceLock;

use crate::error::FailureCause;
use crate::reconnect::RetryTrigger;
use crate::transport::Edition;

/// Global metrics instance.
static METRICS: OnceLock<Metrics> = OnceLock::new();

/// afkbot metrics registry.
#[derive(Debug)]
pub struct Metrics {
    registry: Registry,
    pub connect_attempts: IntCounterVec,
    pub retries_scheduled: IntCounterVec,
    pub failures: IntCounterVec,
    pub actions_sent: IntCounterVec,
    pub action_send_failures: IntCounterVec,
}

impl Metrics {
    fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let counter = |name: &str, help: &str, label: &str| -> prometheus::Result<IntCounterVec> {
            let c = IntCounterVec::new(Opts::new(name, help), &[label])?;
            registry.register(Box::new(c.clone()))?;
            Ok(c)
        };

        Ok(Self {
            connect_attempts: counter(
                "afkbot_connect_attempts_total",
                "Sessions opened by the controller",
                "edition",
            )?,
            retries_scheduled: counter(
                "afkbot_retries_scheduled_total",
                "Retry timers armed after a lost session",
                "trigger",
            )?,
            failures: counter(
                "afkbot_failures_total",
                "Controllers that gave up",
                "cause",
            )?,
            actions_sent: counter(
                "afkbot_actions_sent_total",
                "Feature driver actions delivered",
                "kind",
            )?,
            action_send_failures: counter(
                "afkbot_action_send_failures_total",
                "Feature driver actions the session rejected",
                "kind",
            )?,
            registry,
        })
    }
}

/// Initialize the metrics system.
///
/// This should be called once at startup. Subsequent calls are ignored.
pub fn init_metrics() -> &'static Metrics {
    METRICS.get_or_init(|| Metrics::new().expect("static metric definitions are valid"))
}

/// Render every metric in the Prometheus text format.
///
/// Empty when metrics were never initialized.
pub fn render() -> Result<Vec<u8>, prometheus::Error> {
    let mut buffer = Vec::new();
    if let Some(m) = METRICS.get() {
        TextEncoder::new().encode(&m.registry.gather(), &mut buffer)?;
    }
    Ok(buffer)
}

pub fn record_connect_attempt(edition: Edition) {
    if let Some(m) = METRICS.get() {
        let label = edition.to_string();
        m.connect_attempts.with_label_values(&[label.as_str()]).inc();
    }
}

pub fn record_retry_scheduled(trigger: RetryTrigger) {
    if let Some(m) = METRICS.get() {
        let label = match trigger {
            RetryTrigger::Disconnect => "disconnect",
            RetryTrigger::Error => "error",
        };
        m.retries_scheduled.with_label_values(&[label]).inc();
    }
}

pub fn record_failure(cause: FailureCause) {
    if let Some(m) = METRICS.get() {
        let label = match cause {
            FailureCause::MaxAttemptsExceeded { .. } => "max_attempts_exceeded",
            FailureCause::ReconnectDisabled => "reconnect_disabled",
        };
        m.failures.with_label_values(&[label]).inc();
    }
}

pub fn record_action_sent(kind: &str) {
    if let Some(m) = METRICS.get() {
        m.actions_sent.with_label_values(&[kind]).inc();
    }
}

pub fn record_action_failed(kind: &str) {
    if let Some(m) = METRICS.get() {
        m.action_send_failures.with_label_values(&[kind]).inc();
    }
}
