//! Test utilities for afkbot integration tests.
//!
//! Provides:
//! - A scripted in-memory transport
//! - Sessions that record sent actions and can be dropped on demand
//! - Temporary data directory fixtures

#![allow(dead_code)]

use afkbot::error::{SendError, TransportError};
use afkbot::reconnect::{ControllerConfig, ControllerEvent, RetryPolicy};
use afkbot::transport::{Action, ConnectOptions, Edition, EventSink, Session, SessionEvent, SpawnInfo, Transport, Vec3};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::broadcast;

/// What the next `connect` call does.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Session opens and the handshake succeeds.
    Accept,
    /// `connect` itself returns an error.
    Refuse(String),
    /// Session opens, then reports a transport error.
    FailHandshake(String),
    /// Session opens and never reports anything.
    Hang,
}

/// Session that records every action.
pub struct MockSession {
    sink: EventSink,
    sent: Mutex<Vec<Action>>,
    stopped: AtomicBool,
}

impl MockSession {
    pub fn sent(&self) -> Vec<Action> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Report a server-side disconnect.
    pub fn kick(&self, reason: &str) {
        self.sink.emit(SessionEvent::Disconnected {
            reason: reason.to_string(),
        });
    }

    /// Report a transport error on an open session.
    pub fn fail(&self, message: &str) {
        self.sink
            .emit(SessionEvent::Error(TransportError::Dropped(message.to_string())));
    }

    /// Emit an arbitrary notification, even after the session was replaced.
    pub fn emit(&self, event: SessionEvent) {
        self.sink.emit(event);
    }
}

impl Session for MockSession {
    fn send(&self, action: &Action) -> Result<(), SendError> {
        if self.is_stopped() {
            return Err(SendError::Closed);
        }
        self.sent.lock().unwrap().push(action.clone());
        Ok(())
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

/// Transport that follows a script of outcomes, then a default.
pub struct MockTransport {
    script: Mutex<VecDeque<Outcome>>,
    fallback: Outcome,
    connects: AtomicU32,
    sessions: Mutex<Vec<Arc<MockSession>>>,
}

impl MockTransport {
    pub fn new(fallback: Outcome) -> Arc<Self> {
        Self::scripted(Vec::new(), fallback)
    }

    pub fn scripted(script: Vec<Outcome>, fallback: Outcome) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback,
            connects: AtomicU32::new(0),
            sessions: Mutex::new(Vec::new()),
        })
    }

    pub fn connects(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn sessions(&self) -> Vec<Arc<MockSession>> {
        self.sessions.lock().unwrap().clone()
    }

    pub fn last_session(&self) -> Arc<MockSession> {
        self.sessions
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no session opened yet")
    }
}

impl Transport for MockTransport {
    fn connect(&self, _options: &ConnectOptions, events: EventSink) -> Result<Arc<dyn Session>, TransportError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let outcome = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        if let Outcome::Refuse(message) = &outcome {
            return Err(TransportError::Connect(message.clone()));
        }

        let session = Arc::new(MockSession {
            sink: events,
            sent: Mutex::new(Vec::new()),
            stopped: AtomicBool::new(false),
        });
        match outcome {
            Outcome::Accept => {
                session.sink.emit(SessionEvent::Connected(SpawnInfo {
                    world: Some("overworld".to_string()),
                    position: Some(Vec3::new(10.0, 70.0, -4.0)),
                }));
            }
            Outcome::FailHandshake(message) => {
                session
                    .sink
                    .emit(SessionEvent::Error(TransportError::Connect(message)));
            }
            Outcome::Hang | Outcome::Refuse(_) => {}
        }
        self.sessions.lock().unwrap().push(Arc::clone(&session));
        Ok(session)
    }
}

/// Controller config with every driver off and the stock retry policy.
pub fn quiet_config() -> ControllerConfig {
    afkbot::observability::tracing::init_test_tracing();
    let mut config = ControllerConfig::new(ConnectOptions::new(
        "play.example.net",
        19132,
        "AFKBot",
        Edition::Bedrock,
    ));
    config.features.anti_afk.enabled = false;
    config.retry = RetryPolicy::default();
    config
}

/// Receive events until one matches `f`, collecting everything seen.
pub async fn collect_until<F>(events: &mut broadcast::Receiver<ControllerEvent>, f: F) -> Vec<ControllerEvent>
where
    F: Fn(&ControllerEvent) -> bool,
{
    let mut seen = Vec::new();
    loop {
        let event = events.recv().await.expect("controller event stream closed");
        let done = f(&event);
        seen.push(event);
        if done {
            return seen;
        }
    }
}

/// Test fixture that manages a temporary data directory.
///
/// The directory is automatically cleaned up when the fixture is dropped.
pub struct TestFixture {
    pub temp_dir: TempDir,
    pub data_dir: PathBuf,
}

impl TestFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let data_dir = temp_dir.path().join("data");
        Self { temp_dir, data_dir }
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Wait for a condition to become true with timeout.
///
/// Uses tokio time, so it cooperates with paused-clock tests.
pub async fn wait_for<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
