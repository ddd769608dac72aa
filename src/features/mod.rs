//! Anti-idle feature drivers.
//!
//! Each driver is a timer loop that acts on the live session only while the
//! controller reports Connected. A tick that finds the gate closed does
//! nothing, and a failed send is logged and forgotten. The controller owns
//! the [`DriverSet`] and cancels it on every exit from Connected.

pub mod chat;
mod movement;
pub mod player;
mod teleport;

pub use chat::{ChatCycler, ChatLine};
pub use player::{PlayerState, SharedPlayer};

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::error::ConfigError;
use crate::observability::metrics;
use crate::reconnect::ControllerStatus;
use crate::transport::{Action, Session, Vec3};

/// Movement toggles and their periods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct AntiAfkConfig {
    pub enabled: bool,
    pub rotate: bool,
    pub sneak: bool,
    pub jump: bool,
    pub rotate_interval_ms: u64,
    pub rotate_step_degrees: f32,
    pub sneak_interval_ms: u64,
    pub sneak_hold_ms: u64,
    pub jump_interval_ms: u64,
}

impl Default for AntiAfkConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rotate: true,
            sneak: true,
            jump: true,
            rotate_interval_ms: 3_000,
            rotate_step_degrees: 5.0,
            sneak_interval_ms: 6_000,
            sneak_hold_ms: 1_000,
            jump_interval_ms: 4_000,
        }
    }
}

/// Scripted chat lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ChatConfig {
    pub enabled: bool,
    pub repeat: bool,
    /// Seconds between lines.
    pub repeat_delay: u64,
    pub messages: Vec<String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            repeat: true,
            repeat_delay: 60,
            messages: Vec::new(),
        }
    }
}

/// One-shot move to a fixed coordinate after spawning.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionConfig {
    pub enabled: bool,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Everything the driver set needs to know.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureConfig {
    pub anti_afk: AntiAfkConfig,
    pub chat: ChatConfig,
    pub position: PositionConfig,
    pub teleport_delay: Duration,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            anti_afk: AntiAfkConfig::default(),
            chat: ChatConfig::default(),
            position: PositionConfig::default(),
            teleport_delay: Duration::from_secs(2),
        }
    }
}

impl FeatureConfig {
    /// Reject periods that would make a driver fire on every scheduler turn.
    ///
    /// Field names are relative to the feature block of the settings file.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let anti_afk = &self.anti_afk;
        if anti_afk.enabled {
            let periods = [
                (anti_afk.rotate, anti_afk.rotate_interval_ms, "anti-afk.rotate-interval-ms"),
                (anti_afk.sneak, anti_afk.sneak_interval_ms, "anti-afk.sneak-interval-ms"),
                (anti_afk.jump, anti_afk.jump_interval_ms, "anti-afk.jump-interval-ms"),
            ];
            for (on, period, field) in periods {
                if on && period == 0 {
                    return Err(ConfigError::Invalid {
                        field,
                        reason: "must be greater than zero".into(),
                    });
                }
            }
        }
        let chat = &self.chat;
        if chat.enabled && chat.repeat && chat.repeat_delay == 0 {
            return Err(ConfigError::Invalid {
                field: "chat-messages.repeat-delay",
                reason: "must be at least one second".into(),
            });
        }
        Ok(())
    }
}

/// Read-only view of the controller phase.
#[derive(Debug, Clone)]
pub struct Gate(watch::Receiver<ControllerStatus>);

impl Gate {
    pub fn new(status: watch::Receiver<ControllerStatus>) -> Self {
        Self(status)
    }

    /// True while the controller is Connected.
    pub fn is_open(&self) -> bool {
        self.0.borrow().phase.is_connected()
    }
}

/// Shared inputs of every driver task.
#[derive(Clone)]
pub struct DriverContext {
    pub session: Arc<dyn Session>,
    pub gate: Gate,
    pub player: SharedPlayer,
    pub token: CancellationToken,
    /// Server address used in log fields.
    pub label: String,
}

/// Send one action, recording the outcome. Returns whether it was sent.
pub(crate) fn send_action(ctx: &DriverContext, action: &Action) -> bool {
    match ctx.session.send(action) {
        Ok(()) => {
            metrics::record_action_sent(action.kind());
            true
        }
        Err(e) => {
            metrics::record_action_failed(action.kind());
            tracing::debug!(server = %ctx.label, action = action.kind(), error = %e, "Action send failed");
            false
        }
    }
}

/// Interval whose first tick is one full period away.
fn ticker(period: Duration) -> Interval {
    let period = period.max(Duration::from_millis(1));
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Running driver tasks for one connected session.
#[derive(Debug)]
pub struct DriverSet {
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl DriverSet {
    /// Spawn every enabled driver.
    pub fn start(config: &FeatureConfig, ctx: DriverContext) -> Self {
        let mut tasks = Vec::new();
        let anti_afk = &config.anti_afk;

        if anti_afk.enabled {
            tracing::info!(server = %ctx.label, "Started anti-AFK module");
            if anti_afk.rotate {
                tasks.push(tokio::spawn(movement::rotate(
                    ctx.clone(),
                    Duration::from_millis(anti_afk.rotate_interval_ms),
                    anti_afk.rotate_step_degrees,
                )));
            }
            if anti_afk.sneak {
                tasks.push(tokio::spawn(movement::sneak(
                    ctx.clone(),
                    Duration::from_millis(anti_afk.sneak_interval_ms),
                    Duration::from_millis(anti_afk.sneak_hold_ms),
                )));
            }
            if anti_afk.jump {
                tasks.push(tokio::spawn(movement::jump(
                    ctx.clone(),
                    Duration::from_millis(anti_afk.jump_interval_ms),
                )));
            }
        }

        if config.chat.enabled {
            match ChatCycler::new(config.chat.messages.clone()) {
                Some(cycler) if config.chat.repeat => {
                    tracing::info!(server = %ctx.label, lines = config.chat.messages.len(), "Started chat messages module");
                    tasks.push(tokio::spawn(chat::run(
                        ctx.clone(),
                        cycler,
                        Duration::from_secs(config.chat.repeat_delay),
                    )));
                }
                _ => tracing::warn!(server = %ctx.label, "Chat messages disabled: no valid messages found"),
            }
        }

        if config.position.enabled {
            let target = Vec3::new(config.position.x, config.position.y, config.position.z);
            tracing::info!(server = %ctx.label, x = target.x, y = target.y, z = target.z, "Moving to target position");
            tasks.push(tokio::spawn(teleport::run(
                ctx.clone(),
                target,
                config.teleport_delay,
            )));
        }

        Self {
            token: ctx.token,
            tasks,
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Stop every driver; no tick runs after this returns.
    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for DriverSet {
    fn drop(&mut self) {
        self.token.cancel();
        for task in &self.tasks {
            task.abort();
        }
    }
}
