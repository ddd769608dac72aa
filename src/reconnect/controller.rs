//! Connection controller task.
//!
//! One task per target owns the [`ReconnectMachine`], the live session, the
//! retry and grace timers and the driver set. Commands, session
//! notifications and timer firings are all serialised through one
//! `select!` loop, so transitions for a target never interleave.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

use super::attempt::{ConnectionAttempt, Directive, Phase, ReconnectMachine, RetryTrigger};
use super::backoff::RetryPolicy;
use super::timer::ScheduledTask;
use crate::error::FailureCause;
use crate::features::{DriverContext, DriverSet, FeatureConfig, Gate, SharedPlayer};
use crate::observability::metrics;
use crate::transport::{ConnectOptions, EventSink, Session, SessionEvent, SpawnInfo, Transport};

/// Capacity of the per-controller event channel.
const EVENT_CHANNEL_SIZE: usize = 64;

/// Immutable inputs of one controller.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub connect: ConnectOptions,
    pub retry: RetryPolicy,
    pub features: FeatureConfig,
    /// Wait after the handshake before drivers start.
    pub grace_delay: Duration,
    /// Log chat lines received from the server.
    pub chat_log: bool,
}

impl ControllerConfig {
    pub fn new(connect: ConnectOptions) -> Self {
        Self {
            connect,
            retry: RetryPolicy::default(),
            features: FeatureConfig::default(),
            grace_delay: Duration::from_secs(2),
            chat_log: false,
        }
    }
}

/// Snapshot published on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ControllerStatus {
    pub phase: Phase,
    pub attempt: ConnectionAttempt,
}

impl ControllerStatus {
    fn of(machine: &ReconnectMachine) -> Self {
        Self {
            phase: machine.phase(),
            attempt: machine.attempt(),
        }
    }
}

/// Transition notifications for observers such as the registry.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    Connecting { attempt: u32, max_attempts: u32 },
    Connected { world: Option<String> },
    Disconnected { reason: String },
    TransportError { message: String },
    RetryScheduled {
        delay: Duration,
        next_attempt: u32,
        trigger: RetryTrigger,
    },
    Failed { cause: FailureCause },
    Stopped,
}

#[derive(Debug)]
enum Command {
    Start,
    Stop,
}

#[derive(Debug)]
enum TimerFired {
    Retry(u64),
    Drivers(u64),
}

/// Handle to a running controller task.
///
/// Dropping every handle stops the controller and closes its session.
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<ControllerStatus>,
    events: broadcast::Sender<ControllerEvent>,
}

impl ControllerHandle {
    /// Request a fresh connection sequence. Returns false if the task is gone.
    pub fn start(&self) -> bool {
        self.commands.send(Command::Start).is_ok()
    }

    /// Request an explicit stop. Returns false if the task is gone.
    pub fn stop(&self) -> bool {
        self.commands.send(Command::Stop).is_ok()
    }

    pub fn status(&self) -> ControllerStatus {
        *self.status.borrow()
    }

    pub fn watch(&self) -> watch::Receiver<ControllerStatus> {
        self.status.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    /// Wait until the published status satisfies `f`.
    pub async fn wait_for<F>(&self, f: F) -> ControllerStatus
    where
        F: Fn(&ControllerStatus) -> bool,
    {
        let mut rx = self.status.clone();
        if let Ok(status) = rx.wait_for(|s| f(s)).await {
            return *status;
        }
        let last = *rx.borrow();
        last
    }
}

/// Controller task state. Built and driven by [`Controller::spawn`].
pub struct Controller {
    config: ControllerConfig,
    transport: Arc<dyn Transport>,
    machine: ReconnectMachine,
    label: String,
    generation: u64,
    next_ticket: u64,
    session: Option<Arc<dyn Session>>,
    retry_timer: Option<(u64, ScheduledTask)>,
    grace_timer: Option<(u64, ScheduledTask)>,
    drivers: Option<DriverSet>,
    player: SharedPlayer,
    status_tx: watch::Sender<ControllerStatus>,
    events_tx: broadcast::Sender<ControllerEvent>,
    session_tx: mpsc::UnboundedSender<(u64, SessionEvent)>,
    timer_tx: mpsc::UnboundedSender<TimerFired>,
}

impl Controller {
    /// Spawn a controller in Idle. Nothing connects until [`ControllerHandle::start`].
    pub fn spawn(config: ControllerConfig, transport: Arc<dyn Transport>) -> ControllerHandle {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (session_tx, session_rx) = mpsc::unbounded_channel();
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);

        let machine = ReconnectMachine::new(config.retry);
        let (status_tx, status_rx) = watch::channel(ControllerStatus::of(&machine));

        let controller = Self {
            label: config.connect.address(),
            config,
            transport,
            machine,
            generation: 0,
            next_ticket: 0,
            session: None,
            retry_timer: None,
            grace_timer: None,
            drivers: None,
            player: SharedPlayer::new(),
            status_tx,
            events_tx: events_tx.clone(),
            session_tx,
            timer_tx,
        };
        tokio::spawn(controller.run(commands_rx, session_rx, timer_rx));

        ControllerHandle {
            commands: commands_tx,
            status: status_rx,
            events: events_tx,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut session_rx: mpsc::UnboundedReceiver<(u64, SessionEvent)>,
        mut timer_rx: mpsc::UnboundedReceiver<TimerFired>,
    ) {
        loop {
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(Command::Start) => self.on_start(),
                    Some(Command::Stop) => {
                        let directive = self.machine.stop();
                        self.apply(directive);
                    }
                    None => {
                        let directive = self.machine.stop();
                        self.apply(directive);
                        break;
                    }
                },
                Some((generation, event)) = session_rx.recv() => self.on_session_event(generation, event),
                Some(fired) = timer_rx.recv() => self.on_timer(fired),
            }
        }
        tracing::debug!(server = %self.label, "Controller task exiting");
    }

    fn on_start(&mut self) {
        let directive = self.machine.start();
        if directive == Directive::Ignore {
            tracing::info!(server = %self.label, phase = %self.machine.phase(), "Already trying to connect, skipping");
            return;
        }
        self.cancel_retry();
        self.apply(directive);
    }

    fn on_session_event(&mut self, generation: u64, event: SessionEvent) {
        if generation != self.generation || self.session.is_none() {
            tracing::debug!(server = %self.label, generation, current = self.generation, "Dropping notification from stale session");
            return;
        }

        match event {
            SessionEvent::Connected(info) => {
                if self.machine.connected() == Directive::Established {
                    self.on_established(info);
                }
            }
            SessionEvent::Disconnected { reason } => {
                tracing::warn!(server = %self.label, %reason, "Bot disconnected");
                self.emit(ControllerEvent::Disconnected { reason });
                let directive = self.machine.disconnected();
                self.apply(directive);
            }
            SessionEvent::Error(err) => {
                tracing::error!(server = %self.label, error = %err, "Bot transport error");
                self.emit(ControllerEvent::TransportError {
                    message: err.to_string(),
                });
                let directive = self.machine.errored();
                self.apply(directive);
            }
            SessionEvent::Moved { position, rotation } => self.player.moved(position, rotation),
            SessionEvent::Chat { source, message } => {
                if self.config.chat_log {
                    tracing::info!(server = %self.label, "<{}> {}", source, message);
                }
            }
        }
    }

    fn on_established(&mut self, info: SpawnInfo) {
        self.player.spawn(&info);
        self.publish();
        tracing::info!(
            server = %self.label,
            username = %self.config.connect.username,
            world = info.world.as_deref().unwrap_or("unknown"),
            "Bot connected successfully"
        );
        self.emit(ControllerEvent::Connected { world: info.world });

        let ticket = self.ticket();
        let task = ScheduledTask::schedule(
            self.config.grace_delay,
            self.timer_tx.clone(),
            TimerFired::Drivers(ticket),
        );
        self.grace_timer = Some((ticket, task));
    }

    fn on_timer(&mut self, fired: TimerFired) {
        match fired {
            TimerFired::Retry(ticket) => {
                if !matches!(self.retry_timer, Some((current, _)) if current == ticket) {
                    return;
                }
                self.retry_timer = None;
                let directive = self.machine.retry_due();
                self.apply(directive);
            }
            TimerFired::Drivers(ticket) => {
                if !matches!(self.grace_timer, Some((current, _)) if current == ticket) {
                    return;
                }
                self.grace_timer = None;
                self.start_drivers();
            }
        }
    }

    fn start_drivers(&mut self) {
        let Some(session) = self.session.clone() else {
            return;
        };
        if !self.machine.phase().is_connected() {
            return;
        }
        let ctx = DriverContext {
            session,
            gate: Gate::new(self.status_tx.subscribe()),
            player: self.player.clone(),
            token: CancellationToken::new(),
            label: self.label.clone(),
        };
        self.drivers = Some(DriverSet::start(&self.config.features, ctx));
    }

    fn apply(&mut self, directive: Directive) {
        match directive {
            Directive::Ignore | Directive::Established => {}
            Directive::Connect {
                attempt,
                max_attempts,
            } => self.connect(attempt, max_attempts),
            Directive::ScheduleRetry {
                delay,
                trigger,
                next_attempt,
            } => {
                self.teardown_session();
                self.publish();
                tracing::info!(
                    server = %self.label,
                    delay_ms = delay.as_millis() as u64,
                    ?trigger,
                    attempt = next_attempt,
                    max_attempts = self.machine.attempt().max_attempts,
                    "Reconnecting in {:.1}s",
                    delay.as_secs_f64()
                );
                metrics::record_retry_scheduled(trigger);
                self.emit(ControllerEvent::RetryScheduled {
                    delay,
                    next_attempt,
                    trigger,
                });

                self.cancel_retry();
                let ticket = self.ticket();
                let task = ScheduledTask::schedule(delay, self.timer_tx.clone(), TimerFired::Retry(ticket));
                self.retry_timer = Some((ticket, task));
            }
            Directive::Fail(cause) => {
                self.cancel_retry();
                self.teardown_session();
                self.publish();
                tracing::error!(server = %self.label, %cause, "Bot stopped. Please check server status");
                metrics::record_failure(cause);
                self.emit(ControllerEvent::Failed { cause });
            }
            Directive::Stop => {
                self.cancel_retry();
                self.teardown_session();
                self.publish();
                tracing::info!(server = %self.label, "Bot stopped");
                self.emit(ControllerEvent::Stopped);
            }
        }
    }

    fn connect(&mut self, attempt: u32, max_attempts: u32) {
        self.publish();
        tracing::info!(server = %self.label, attempt, max_attempts, "Starting bot");
        metrics::record_connect_attempt(self.config.connect.edition);
        self.emit(ControllerEvent::Connecting {
            attempt,
            max_attempts,
        });

        self.generation += 1;
        let sink = EventSink::new(self.generation, self.session_tx.clone());
        match self.transport.connect(&self.config.connect, sink) {
            Ok(session) => self.session = Some(session),
            Err(err) => {
                tracing::error!(server = %self.label, error = %err, "Failed to open session");
                self.emit(ControllerEvent::TransportError {
                    message: err.to_string(),
                });
                // Always resolves to a scheduled retry or a failure.
                let directive = self.machine.errored();
                self.apply(directive);
            }
        }
    }

    /// Cancel the grace timer and drivers, then close the session.
    fn teardown_session(&mut self) {
        if let Some((_, task)) = self.grace_timer.take() {
            task.cancel();
        }
        if let Some(drivers) = self.drivers.take() {
            drivers.cancel();
        }
        if let Some(session) = self.session.take() {
            session.stop();
        }
    }

    fn cancel_retry(&mut self) {
        if let Some((_, task)) = self.retry_timer.take() {
            task.cancel();
        }
    }

    fn ticket(&mut self) -> u64 {
        self.next_ticket += 1;
        self.next_ticket
    }

    fn publish(&self) {
        self.status_tx.send_replace(ControllerStatus::of(&self.machine));
    }

    fn emit(&self, event: ControllerEvent) {
        // No subscribers is fine.
        let _ = self.events_tx.send(event);
    }
}
