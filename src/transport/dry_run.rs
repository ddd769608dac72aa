//! Dry-run transport.
//!
//! Completes the handshake locally after a short delay and logs every action
//! instead of writing it to a socket. Lets the controller, drivers and
//! registry run end to end without a protocol client.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{Action, ConnectOptions, EventSink, Session, SessionEvent, SpawnInfo, Transport, Vec3};
use crate::error::{SendError, TransportError};

/// Transport that never touches the network.
#[derive(Debug, Clone)]
pub struct DryRunTransport {
    handshake_delay: Duration,
}

impl DryRunTransport {
    pub fn new(handshake_delay: Duration) -> Self {
        Self { handshake_delay }
    }
}

impl Default for DryRunTransport {
    fn default() -> Self {
        Self::new(Duration::from_millis(500))
    }
}

impl Transport for DryRunTransport {
    fn connect(
        &self,
        options: &ConnectOptions,
        events: EventSink,
    ) -> Result<Arc<dyn Session>, TransportError> {
        if options.host.trim().is_empty() {
            return Err(TransportError::Connect("empty host".into()));
        }

        let session = Arc::new(DryRunSession {
            address: options.address(),
            stopped: AtomicBool::new(false),
            sent: AtomicU64::new(0),
        });

        let delay = self.handshake_delay;
        let world = format!("dry-run/{}", options.edition);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            events.emit(SessionEvent::Connected(SpawnInfo {
                world: Some(world),
                position: Some(Vec3::new(0.0, 64.0, 0.0)),
            }));
        });

        tracing::debug!(address = %options.address(), username = %options.username, "Dry-run session opened");
        Ok(session)
    }
}

struct DryRunSession {
    address: String,
    stopped: AtomicBool,
    sent: AtomicU64,
}

impl Session for DryRunSession {
    fn send(&self, action: &Action) -> Result<(), SendError> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(SendError::Closed);
        }
        let n = self.sent.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!(address = %self.address, seq = n, action = ?action, "Dry-run action");
        Ok(())
    }

    fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            tracing::debug!(
                address = %self.address,
                sent = self.sent.load(Ordering::SeqCst),
                "Dry-run session closed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Edition;
    use tokio::sync::mpsc;

    #[tokio::test(start_paused = true)]
    async fn test_handshake_completes_after_delay() {
        let transport = DryRunTransport::new(Duration::from_millis(250));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let opts = ConnectOptions::new("localhost", 19132, "Bot", Edition::Bedrock);

        let session = transport.connect(&opts, EventSink::new(1, tx)).unwrap();
        let (generation, event) = rx.recv().await.unwrap();
        assert_eq!(generation, 1);
        assert!(matches!(event, SessionEvent::Connected(_)));

        assert!(session.send(&Action::Jump).is_ok());
        session.stop();
        session.stop();
        assert_eq!(session.send(&Action::Jump), Err(SendError::Closed));
    }

    #[test]
    fn test_empty_host_rejected() {
        let transport = DryRunTransport::default();
        let (tx, _rx) = mpsc::unbounded_channel();
        let opts = ConnectOptions::new(" ", 19132, "Bot", Edition::Bedrock);
        assert!(transport.connect(&opts, EventSink::new(1, tx)).is_err());
    }
}
