//! Session registry integration tests against a scripted transport.

mod common;

use afkbot::error::RegistryError;
use afkbot::reconnect::{Phase, RetryPolicy};
use afkbot::registry::{
    EditionChoice, JsonFileStore, RegistryConfig, ServerStatus, SessionDefaults, SessionRegistry, SessionStore,
};
use common::{MockTransport, Outcome, TestFixture};
use std::sync::Arc;
use std::time::Duration;

const OWNER: &str = "1001";

fn config() -> RegistryConfig {
    let mut session = SessionDefaults::default();
    session.features.anti_afk.enabled = false;
    session.retry = RetryPolicy::default();
    RegistryConfig {
        admin_id: Some("42".into()),
        max_servers_per_user: 3,
        session,
        ..RegistryConfig::default()
    }
}

#[tokio::test(start_paused = true)]
async fn test_failed_controller_marks_server_stopped() {
    let fixture = TestFixture::new();
    let store = Arc::new(JsonFileStore::in_dir(&fixture.data_dir));
    let transport = MockTransport::new(Outcome::Refuse("unreachable".into()));
    let registry = SessionRegistry::open(config(), transport.clone(), store.clone()).unwrap();

    let record = registry.register(OWNER, "down.example.net", EditionChoice::Auto).unwrap();
    registry.start(OWNER, &record.id).unwrap();

    // Five attempts with 8+16+24+30s of backoff in between.
    let gone = common::wait_for(Duration::from_secs(120), || registry.live_count() == 0).await;
    assert!(gone, "controller should have given up");
    assert_eq!(transport.connects(), 5);

    let view = registry.status(OWNER, &record.id).unwrap();
    assert_eq!(view.record.status, ServerStatus::Stopped);
    assert_eq!(view.record.stats.total_connections, 0);
    assert!(view.live.is_none());

    // The server can be started again after a failure.
    registry.start(OWNER, &record.id).unwrap();
    assert_eq!(registry.live_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_reconnects_count_connections() {
    let transport = MockTransport::new(Outcome::Accept);
    let registry = SessionRegistry::open(config(), transport.clone(), Arc::new(afkbot::registry::MemoryStore::new())).unwrap();
    let record = registry.register(OWNER, "play.example.net:25565", EditionChoice::Auto).unwrap();
    registry.start(OWNER, &record.id).unwrap();

    let handle = registry.controller(&record.id).unwrap();
    handle.wait_for(|s| s.phase == Phase::Connected).await;

    transport.last_session().kick("server restart");
    handle.wait_for(|s| s.phase == Phase::Backoff).await;
    handle.wait_for(|s| s.phase == Phase::Connected).await;

    let counted = common::wait_for(Duration::from_secs(5), || {
        registry.status(OWNER, &record.id).unwrap().record.stats.total_connections == 2
    })
    .await;
    assert!(counted);

    let view = registry.status(OWNER, &record.id).unwrap();
    assert_eq!(view.record.status, ServerStatus::Running);
    assert_eq!(view.record.edition, afkbot::transport::Edition::Java);
}

#[tokio::test(start_paused = true)]
async fn test_one_live_controller_per_server() {
    let transport = MockTransport::new(Outcome::Hang);
    let registry = SessionRegistry::open(config(), transport.clone(), Arc::new(afkbot::registry::MemoryStore::new())).unwrap();
    let record = registry.register(OWNER, "play.example.net", EditionChoice::Auto).unwrap();

    registry.start(OWNER, &record.id).unwrap();
    for _ in 0..3 {
        assert!(matches!(
            registry.start(OWNER, &record.id),
            Err(RegistryError::AlreadyRunning(_))
        ));
    }
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(transport.connects(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_records_survive_reopen() {
    let fixture = TestFixture::new();
    let store = Arc::new(JsonFileStore::in_dir(&fixture.data_dir));
    let transport = MockTransport::new(Outcome::Accept);

    let id = {
        let registry = SessionRegistry::open(config(), transport.clone(), store.clone()).unwrap();
        let record = registry.register(OWNER, "play.example.net", EditionChoice::Auto).unwrap();
        registry.start(OWNER, &record.id).unwrap();
        let running = common::wait_for(Duration::from_secs(5), || {
            registry.status(OWNER, &record.id).unwrap().record.is_running()
        })
        .await;
        assert!(running);
        record.id
    };

    // The previous registry went away without stopping its bot.
    assert!(store.load().unwrap()[0].is_running());

    let registry = SessionRegistry::open(config(), transport, store.clone()).unwrap();
    let view = registry.status(OWNER, &id).unwrap();
    assert_eq!(view.record.status, ServerStatus::Stopped);
    assert_eq!(view.record.stats.total_connections, 1);
    assert!(!store.load().unwrap()[0].is_running());
}
