//! Attempt bookkeeping and the connection state machine.
//!
//! [`ReconnectMachine`] is synchronous and owns no timers or sockets. Every
//! input returns a [`Directive`] telling the controller task what side
//! effect to perform, which keeps the transition rules testable without a
//! runtime.

use serde::Serialize;
use std::fmt;
use std::time::Duration;

use super::backoff::RetryPolicy;
use crate::error::FailureCause;

/// Lifecycle phase of one logical connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Connecting,
    Connected,
    Backoff,
    Failed,
    Stopped,
}

impl Phase {
    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }

    /// Connecting or Connected: a session object exists.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Connecting | Self::Connected)
    }

    /// No automatic transition leaves this phase.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Idle | Self::Failed | Self::Stopped)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Backoff => "backoff",
            Self::Failed => "failed",
            Self::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Attempt counter for the current sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnectionAttempt {
    pub attempt_count: u32,
    pub max_attempts: u32,
    pub in_progress: bool,
}

impl ConnectionAttempt {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempt_count: 0,
            max_attempts,
            in_progress: false,
        }
    }

    pub fn can_retry(&self) -> bool {
        self.attempt_count < self.max_attempts
    }
}

/// What kind of loss triggered a retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryTrigger {
    Disconnect,
    Error,
}

/// Side effect the controller must carry out after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Input does not apply to the current phase.
    Ignore,
    /// Open a new session.
    Connect { attempt: u32, max_attempts: u32 },
    /// Handshake done; arm the grace timer for the feature drivers.
    Established,
    /// Tear down the session and arm the retry timer.
    ScheduleRetry {
        delay: Duration,
        trigger: RetryTrigger,
        next_attempt: u32,
    },
    /// Tear down everything; terminal.
    Fail(FailureCause),
    /// Tear down everything after an explicit stop; terminal.
    Stop,
}

/// Connection state machine for one target.
#[derive(Debug, Clone)]
pub struct ReconnectMachine {
    phase: Phase,
    attempt: ConnectionAttempt,
    policy: RetryPolicy,
}

impl ReconnectMachine {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            phase: Phase::Idle,
            attempt: ConnectionAttempt::new(policy.max_attempts),
            policy,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn attempt(&self) -> ConnectionAttempt {
        self.attempt
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Explicit start from outside.
    ///
    /// Ignored while a session exists. From any other phase a fresh attempt
    /// sequence begins, cancelling a pending retry if there is one.
    pub fn start(&mut self) -> Directive {
        if self.phase.is_active() {
            return Directive::Ignore;
        }
        self.attempt.attempt_count = 0;
        self.begin_attempt()
    }

    /// The retry timer fired.
    pub fn retry_due(&mut self) -> Directive {
        if self.phase != Phase::Backoff {
            return Directive::Ignore;
        }
        self.begin_attempt()
    }

    /// The session reported a completed handshake.
    pub fn connected(&mut self) -> Directive {
        if self.phase != Phase::Connecting {
            return Directive::Ignore;
        }
        self.attempt.attempt_count = 0;
        self.attempt.in_progress = false;
        self.phase = Phase::Connected;
        Directive::Established
    }

    /// The server closed the session.
    pub fn disconnected(&mut self) -> Directive {
        if !self.phase.is_active() {
            return Directive::Ignore;
        }
        let delay = self.policy.on_disconnect.delay(self.attempt.attempt_count);
        self.after_loss(delay, RetryTrigger::Disconnect)
    }

    /// The transport failed while connecting or connected.
    pub fn errored(&mut self) -> Directive {
        if !self.phase.is_active() {
            return Directive::Ignore;
        }
        let delay = self.policy.on_error.delay(self.attempt.attempt_count);
        self.after_loss(delay, RetryTrigger::Error)
    }

    /// Explicit stop from outside.
    pub fn stop(&mut self) -> Directive {
        if self.phase.is_terminal() {
            return Directive::Ignore;
        }
        self.attempt.in_progress = false;
        self.phase = Phase::Stopped;
        Directive::Stop
    }

    fn begin_attempt(&mut self) -> Directive {
        self.attempt.attempt_count += 1;
        if self.attempt.attempt_count > self.attempt.max_attempts {
            self.attempt.in_progress = false;
            self.phase = Phase::Failed;
            return Directive::Fail(FailureCause::MaxAttemptsExceeded {
                max_attempts: self.attempt.max_attempts,
            });
        }
        self.attempt.in_progress = true;
        self.phase = Phase::Connecting;
        Directive::Connect {
            attempt: self.attempt.attempt_count,
            max_attempts: self.attempt.max_attempts,
        }
    }

    fn after_loss(&mut self, delay: Duration, trigger: RetryTrigger) -> Directive {
        self.attempt.in_progress = false;

        if !self.attempt.can_retry() {
            self.phase = Phase::Failed;
            return Directive::Fail(FailureCause::MaxAttemptsExceeded {
                max_attempts: self.attempt.max_attempts,
            });
        }
        if !self.policy.auto_reconnect {
            self.phase = Phase::Failed;
            return Directive::Fail(FailureCause::ReconnectDisabled);
        }

        self.phase = Phase::Backoff;
        Directive::ScheduleRetry {
            delay,
            trigger,
            next_attempt: self.attempt.attempt_count + 1,
        }
    }
}
