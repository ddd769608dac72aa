//! Session registry.
//!
//! Maps server ids to persisted [`ServerRecord`]s and to at most one live
//! controller each. The registry is the only writer of the record store; it
//! learns about connection transitions by watching each controller's event
//! stream.

pub mod address;
pub mod record;
pub mod store;

pub use address::{parse_address, DefaultPorts, EditionChoice, ServerAddress};
pub use record::{RegistryStats, ServerRecord, ServerStats, ServerStatus, ServerView};
pub use store::{JsonFileStore, MemoryStore, SessionStore};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use crate::error::{RegistryError, StoreError};
use crate::features::FeatureConfig;
use crate::reconnect::{Controller, ControllerConfig, ControllerEvent, ControllerHandle, RetryPolicy};
use crate::transport::{ConnectOptions, Edition, Transport};
use crate::{generate_server_id, now_millis};

/// Controller settings shared by every registered server.
#[derive(Debug, Clone)]
pub struct SessionDefaults {
    pub retry: RetryPolicy,
    pub features: FeatureConfig,
    pub grace_delay: Duration,
    pub chat_log: bool,
    pub offline: bool,
    pub bedrock_version: String,
    pub java_version: String,
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            features: FeatureConfig::default(),
            grace_delay: Duration::from_secs(2),
            chat_log: false,
            offline: true,
            bedrock_version: Edition::Bedrock.default_version().to_string(),
            java_version: Edition::Java.default_version().to_string(),
        }
    }
}

impl SessionDefaults {
    pub fn controller_config(&self, record: &ServerRecord) -> ControllerConfig {
        let mut connect = ConnectOptions::new(&record.host, record.port, &record.bot_username, record.edition);
        connect.offline = self.offline;
        connect.version = match record.edition {
            Edition::Bedrock => self.bedrock_version.clone(),
            Edition::Java => self.java_version.clone(),
        };

        ControllerConfig {
            connect,
            retry: self.retry,
            features: self.features.clone(),
            grace_delay: self.grace_delay,
            chat_log: self.chat_log,
        }
    }
}

/// Registry policy.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Caller id allowed to manage every server and read stats.
    pub admin_id: Option<String>,
    pub max_servers_per_user: usize,
    pub default_ports: DefaultPorts,
    pub session: SessionDefaults,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            admin_id: None,
            max_servers_per_user: 3,
            default_ports: DefaultPorts::default(),
            session: SessionDefaults::default(),
        }
    }
}

struct LiveSession {
    epoch: u64,
    handle: ControllerHandle,
    /// Unix millis of the current connection, while Connected.
    connected_at: Option<i64>,
    watcher: JoinHandle<()>,
}

#[derive(Default)]
struct State {
    records: HashMap<String, ServerRecord>,
    live: HashMap<String, LiveSession>,
    next_epoch: u64,
}

impl State {
    fn view(&self, record: &ServerRecord) -> ServerView {
        ServerView {
            record: record.clone(),
            live: self.live.get(&record.id).map(|l| l.handle.status()),
        }
    }

    /// Stop a live controller and close out its record.
    fn retire(&mut self, id: &str, live: LiveSession, now: i64) {
        live.watcher.abort();
        live.handle.stop();
        if let Some(record) = self.records.get_mut(id) {
            close_record(record, live.connected_at, now);
        }
    }

    /// The record for `id` as it will look once its live session is retired.
    fn retired_record(&self, id: &str, now: i64) -> Option<ServerRecord> {
        let mut record = self.records.get(id)?.clone();
        close_record(&mut record, self.live.get(id).and_then(|l| l.connected_at), now);
        Some(record)
    }
}

fn close_record(record: &mut ServerRecord, connected_at: Option<i64>, now: i64) {
    record.status = ServerStatus::Stopped;
    if let Some(at) = connected_at {
        record.accumulate_uptime(at, now);
    }
}

struct Shared {
    state: Mutex<State>,
    store: Arc<dyn SessionStore>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, state: &State) -> Result<(), StoreError> {
        self.save_sorted(state.records.values().cloned().collect())
    }

    /// Save `state` with the record for `id` replaced by `update`, or left
    /// out when `update` is `None`. Memory is untouched.
    fn persist_change(&self, state: &State, id: &str, update: Option<ServerRecord>) -> Result<(), StoreError> {
        let mut records: Vec<ServerRecord> = state.records.values().filter(|r| r.id != id).cloned().collect();
        records.extend(update);
        self.save_sorted(records)
    }

    fn save_sorted(&self, mut records: Vec<ServerRecord>) -> Result<(), StoreError> {
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        self.store.save(&records)
    }

    /// Fold one controller event into the record. Returns false once the
    /// watcher should exit.
    fn apply_event(&self, id: &str, epoch: u64, event: &ControllerEvent) -> bool {
        let mut guard = self.lock();
        let state = &mut *guard;
        if !matches!(state.live.get(id), Some(live) if live.epoch == epoch) {
            return false;
        }
        let now = now_millis();

        let keep_watching = match event {
            ControllerEvent::Connected { world } => {
                if let Some(live) = state.live.get_mut(id) {
                    live.connected_at = Some(now);
                }
                if let Some(record) = state.records.get_mut(id) {
                    record.status = ServerStatus::Running;
                    record.stats.total_connections += 1;
                    record.stats.last_connection = Some(now);
                    tracing::info!(
                        server_id = %id,
                        address = %record.address(),
                        world = world.as_deref().unwrap_or("unknown"),
                        total_connections = record.stats.total_connections,
                        "Bot online"
                    );
                }
                true
            }
            ControllerEvent::Disconnected { .. } | ControllerEvent::TransportError { .. } => {
                let connected_at = state.live.get_mut(id).and_then(|l| l.connected_at.take());
                match (connected_at, state.records.get_mut(id)) {
                    (Some(at), Some(record)) => record.accumulate_uptime(at, now),
                    _ => return true,
                }
                true
            }
            ControllerEvent::Failed { cause } => {
                tracing::warn!(server_id = %id, %cause, "Bot gave up, marking server stopped");
                if let Some(live) = state.live.remove(id) {
                    state.retire(id, live, now);
                }
                false
            }
            ControllerEvent::Stopped => {
                if let Some(live) = state.live.remove(id) {
                    state.retire(id, live, now);
                }
                false
            }
            ControllerEvent::Connecting { .. } | ControllerEvent::RetryScheduled { .. } => return true,
        };

        if let Err(e) = self.persist(state) {
            tracing::error!(server_id = %id, error = %e, "Failed to persist server records");
        }
        keep_watching
    }
}

async fn watch_controller(shared: Weak<Shared>, id: String, epoch: u64, mut events: broadcast::Receiver<ControllerEvent>) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(server_id = %id, skipped, "Registry lagged behind controller events");
                continue;
            }
            Err(RecvError::Closed) => break,
        };
        let Some(shared) = shared.upgrade() else {
            break;
        };
        if !shared.apply_event(&id, epoch, &event) {
            break;
        }
    }
    tracing::debug!(server_id = %id, epoch, "Registry watcher exiting");
}

/// Registered servers and their live controllers.
///
/// Cheap to clone. Operations that spawn controllers must run inside a
/// tokio runtime.
#[derive(Clone)]
pub struct SessionRegistry {
    config: Arc<RegistryConfig>,
    transport: Arc<dyn Transport>,
    shared: Arc<Shared>,
}

impl SessionRegistry {
    /// Load records from `store`. Records left running by a previous process
    /// have no live controller and are reset to stopped.
    pub fn open(
        config: RegistryConfig,
        transport: Arc<dyn Transport>,
        store: Arc<dyn SessionStore>,
    ) -> Result<Self, StoreError> {
        let mut state = State::default();
        let mut reset = 0usize;
        for mut record in store.load()? {
            if record.is_running() {
                record.status = ServerStatus::Stopped;
                reset += 1;
            }
            state.records.insert(record.id.clone(), record);
        }

        let shared = Shared {
            state: Mutex::new(State::default()),
            store,
        };
        if reset > 0 {
            shared.persist(&state)?;
            tracing::info!(reset, "Reset servers left running by a previous process");
        }
        tracing::info!(servers = state.records.len(), "Loaded server records");
        *shared.lock() = state;

        Ok(Self {
            config: Arc::new(config),
            transport,
            shared: Arc::new(shared),
        })
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn is_admin(&self, caller: &str) -> bool {
        self.config.admin_id.as_deref() == Some(caller)
    }

    fn check_access(&self, state: &State, caller: &str, id: &str) -> Result<(), RegistryError> {
        let record = state
            .records
            .get(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        if record.owner != caller && !self.is_admin(caller) {
            tracing::warn!(server_id = %id, caller, "Rejected access to server");
            return Err(RegistryError::NotAuthorized(id.to_string()));
        }
        Ok(())
    }

    /// Register a server for `caller`. The bot starts stopped.
    pub fn register(&self, caller: &str, address: &str, edition: EditionChoice) -> Result<ServerRecord, RegistryError> {
        let parsed = parse_address(address, edition, self.config.default_ports)?;

        let mut state = self.shared.lock();
        let owned = state.records.values().filter(|r| r.owner == caller).count();
        if owned >= self.config.max_servers_per_user {
            return Err(RegistryError::LimitReached {
                limit: self.config.max_servers_per_user,
            });
        }

        let id = generate_server_id();
        let record = ServerRecord {
            bot_username: bot_username(&id),
            id: id.clone(),
            owner: caller.to_string(),
            host: parsed.host,
            port: parsed.port,
            edition: parsed.edition,
            status: ServerStatus::Stopped,
            created_at: now_millis(),
            stats: ServerStats::default(),
        };
        state.records.insert(id.clone(), record.clone());
        if let Err(e) = self.shared.persist(&state) {
            state.records.remove(&id);
            return Err(e.into());
        }

        tracing::info!(
            server_id = %id,
            owner = caller,
            address = %record.address(),
            edition = %record.edition,
            bot = %record.bot_username,
            "Registered server"
        );
        Ok(record)
    }

    /// Servers visible to `caller`, oldest first. The admin sees all.
    pub fn list(&self, caller: &str) -> Vec<ServerView> {
        let state = self.shared.lock();
        let admin = self.is_admin(caller);
        let mut views: Vec<ServerView> = state
            .records
            .values()
            .filter(|r| admin || r.owner == caller)
            .map(|r| state.view(r))
            .collect();
        views.sort_by(|a, b| {
            a.record
                .created_at
                .cmp(&b.record.created_at)
                .then_with(|| a.record.id.cmp(&b.record.id))
        });
        views
    }

    pub fn status(&self, caller: &str, id: &str) -> Result<ServerView, RegistryError> {
        let state = self.shared.lock();
        self.check_access(&state, caller, id)?;
        Ok(state.view(&state.records[id]))
    }

    /// Spawn and start a controller for `id`.
    pub fn start(&self, caller: &str, id: &str) -> Result<ServerView, RegistryError> {
        let mut state = self.shared.lock();
        self.check_access(&state, caller, id)?;
        if state.live.contains_key(id) {
            return Err(RegistryError::AlreadyRunning(id.to_string()));
        }

        let record = state.records[id].clone();
        let handle = Controller::spawn(self.config.session.controller_config(&record), Arc::clone(&self.transport));
        // Subscribe before starting so no transition is missed.
        let events = handle.subscribe();

        state.next_epoch += 1;
        let epoch = state.next_epoch;
        let watcher = tokio::spawn(watch_controller(
            Arc::downgrade(&self.shared),
            id.to_string(),
            epoch,
            events,
        ));
        handle.start();

        tracing::info!(
            server_id = %id,
            address = %record.address(),
            bot = %record.bot_username,
            epoch,
            "Starting bot"
        );
        state.live.insert(
            id.to_string(),
            LiveSession {
                epoch,
                handle,
                connected_at: None,
                watcher,
            },
        );
        Ok(state.view(&record))
    }

    /// Stop the live controller for `id`.
    ///
    /// The stopped record is written first; a failed write leaves the bot
    /// running.
    pub fn stop(&self, caller: &str, id: &str) -> Result<ServerView, RegistryError> {
        let mut state = self.shared.lock();
        self.check_access(&state, caller, id)?;
        if !state.live.contains_key(id) {
            return Err(RegistryError::NotRunning(id.to_string()));
        }

        let now = now_millis();
        let closed = state.retired_record(id, now);
        self.shared.persist_change(&state, id, closed)?;

        if let Some(live) = state.live.remove(id) {
            state.retire(id, live, now);
        }
        tracing::info!(server_id = %id, "Stopped bot");
        Ok(state.view(&state.records[id]))
    }

    /// Delete `id`, stopping its bot first.
    pub fn remove(&self, caller: &str, id: &str) -> Result<ServerRecord, RegistryError> {
        let mut state = self.shared.lock();
        self.check_access(&state, caller, id)?;
        self.shared.persist_change(&state, id, None)?;

        if let Some(live) = state.live.remove(id) {
            state.retire(id, live, now_millis());
        }
        let record = state
            .records
            .remove(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        tracing::info!(server_id = %id, address = %record.address(), "Removed server");
        Ok(record)
    }

    /// Aggregate numbers. Admin only.
    pub fn stats(&self, caller: &str) -> Result<RegistryStats, RegistryError> {
        if !self.is_admin(caller) {
            return Err(RegistryError::AdminOnly);
        }
        let state = self.shared.lock();
        Ok(RegistryStats::collect(state.records.values(), state.live.len()))
    }

    /// Handle of the live controller for `id`, if one is running.
    pub fn controller(&self, id: &str) -> Option<ControllerHandle> {
        self.shared.lock().live.get(id).map(|l| l.handle.clone())
    }

    pub fn live_count(&self) -> usize {
        self.shared.lock().live.len()
    }

    /// Stop every live controller and persist the final records.
    pub fn shutdown(&self) -> Result<(), StoreError> {
        let mut state = self.shared.lock();
        let now = now_millis();
        let live: Vec<(String, LiveSession)> = state.live.drain().collect();
        let count = live.len();
        for (id, session) in live {
            state.retire(&id, session, now);
        }
        self.shared.persist(&state)?;
        tracing::info!(stopped = count, "Registry shut down");
        Ok(())
    }
}

/// `AFK_Bot_` plus the last six characters of the server id.
fn bot_username(id: &str) -> String {
    let suffix: String = id.chars().rev().take(6).collect::<Vec<_>>().into_iter().rev().collect();
    format!("AFK_Bot_{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconnect::Phase;
    use crate::transport::dry_run::DryRunTransport;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::TempDir;

    /// Memory store whose writes can be switched off.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        broken: AtomicBool,
    }

    impl SessionStore for FlakyStore {
        fn load(&self) -> Result<Vec<ServerRecord>, StoreError> {
            self.inner.load()
        }

        fn save(&self, records: &[ServerRecord]) -> Result<(), StoreError> {
            if self.broken.load(Ordering::SeqCst) {
                return Err(StoreError::Io {
                    path: PathBuf::from("servers.json"),
                    source: std::io::Error::other("disk full"),
                });
            }
            self.inner.save(records)
        }
    }

    const OWNER: &str = "1001";
    const ADMIN: &str = "42";

    fn registry_with(store: Arc<dyn SessionStore>) -> SessionRegistry {
        let config = RegistryConfig {
            admin_id: Some(ADMIN.to_string()),
            max_servers_per_user: 2,
            ..RegistryConfig::default()
        };
        let transport = Arc::new(DryRunTransport::new(Duration::from_millis(100)));
        SessionRegistry::open(config, transport, store).unwrap()
    }

    fn registry() -> SessionRegistry {
        registry_with(Arc::new(MemoryStore::new()))
    }

    async fn wait_for_status(registry: &SessionRegistry, id: &str, status: ServerStatus) -> ServerView {
        for _ in 0..200 {
            let view = registry.status(OWNER, id).unwrap();
            if view.record.status == status {
                return view;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("server {id} never reached {status:?}");
    }

    #[test]
    fn test_bot_username_suffix() {
        assert_eq!(bot_username("0190a1b2-c3d4-7e5f-8a9b-0c1d2e3f4a5b"), "AFK_Bot_3f4a5b");
        assert_eq!(bot_username("ab"), "AFK_Bot_ab");
    }

    #[test]
    fn test_register_assigns_defaults() {
        let registry = registry();
        let record = registry.register(OWNER, "play.example.net", EditionChoice::Auto).unwrap();
        assert_eq!(record.port, 19132);
        assert_eq!(record.edition, Edition::Bedrock);
        assert_eq!(record.status, ServerStatus::Stopped);
        assert!(record.bot_username.starts_with("AFK_Bot_"));
        assert_eq!(record.bot_username.len(), "AFK_Bot_".len() + 6);
    }

    #[test]
    fn test_register_rejects_bad_address_and_limit() {
        let registry = registry();
        assert!(matches!(
            registry.register(OWNER, "host:abc", EditionChoice::Auto),
            Err(RegistryError::InvalidAddress { .. })
        ));

        registry.register(OWNER, "a.example.net", EditionChoice::Auto).unwrap();
        registry.register(OWNER, "b.example.net", EditionChoice::Auto).unwrap();
        assert!(matches!(
            registry.register(OWNER, "c.example.net", EditionChoice::Auto),
            Err(RegistryError::LimitReached { limit: 2 })
        ));
        // Other users have their own allowance.
        registry.register("2002", "c.example.net", EditionChoice::Auto).unwrap();
    }

    #[test]
    fn test_access_checks() {
        let registry = registry();
        let record = registry.register(OWNER, "play.example.net:25565", EditionChoice::Auto).unwrap();

        assert!(matches!(
            registry.status("2002", &record.id),
            Err(RegistryError::NotAuthorized(_))
        ));
        assert!(registry.status(ADMIN, &record.id).is_ok());
        assert!(matches!(registry.status(OWNER, "missing"), Err(RegistryError::NotFound(_))));
        assert!(matches!(registry.stats(OWNER), Err(RegistryError::AdminOnly)));

        assert_eq!(registry.list(OWNER).len(), 1);
        assert!(registry.list("2002").is_empty());
        assert_eq!(registry.list(ADMIN).len(), 1);
    }

    #[test]
    fn test_open_resets_running_records() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(JsonFileStore::in_dir(dir.path()));
        let mut record = {
            let registry = registry_with(store.clone());
            registry.register(OWNER, "play.example.net", EditionChoice::Auto).unwrap()
        };
        record.status = ServerStatus::Running;
        store.save(std::slice::from_ref(&record)).unwrap();

        let registry = registry_with(store.clone());
        let view = registry.status(OWNER, &record.id).unwrap();
        assert_eq!(view.record.status, ServerStatus::Stopped);
        assert!(view.live.is_none());
        assert_eq!(store.load().unwrap()[0].status, ServerStatus::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_marks_running_on_connect() {
        let registry = registry();
        let record = registry.register(OWNER, "play.example.net", EditionChoice::Auto).unwrap();

        let view = registry.start(OWNER, &record.id).unwrap();
        assert!(view.live.is_some());
        assert!(matches!(
            registry.start(OWNER, &record.id),
            Err(RegistryError::AlreadyRunning(_))
        ));

        let view = wait_for_status(&registry, &record.id, ServerStatus::Running).await;
        assert_eq!(view.record.stats.total_connections, 1);
        assert!(view.record.stats.last_connection.is_some());
        assert_eq!(view.live.map(|s| s.phase), Some(Phase::Connected));

        let stats = registry.stats(ADMIN).unwrap();
        assert_eq!(stats.running, 1);
        assert_eq!(stats.live_controllers, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_and_remove() {
        let registry = registry();
        let record = registry.register(OWNER, "play.example.net", EditionChoice::Auto).unwrap();
        assert!(matches!(registry.stop(OWNER, &record.id), Err(RegistryError::NotRunning(_))));

        registry.start(OWNER, &record.id).unwrap();
        wait_for_status(&registry, &record.id, ServerStatus::Running).await;

        let view = registry.stop(OWNER, &record.id).unwrap();
        assert_eq!(view.record.status, ServerStatus::Stopped);
        assert!(view.live.is_none());
        assert_eq!(registry.live_count(), 0);

        // Restart, then remove while running.
        registry.start(OWNER, &record.id).unwrap();
        let removed = registry.remove(OWNER, &record.id).unwrap();
        assert_eq!(removed.id, record.id);
        assert_eq!(registry.live_count(), 0);
        assert!(matches!(registry.status(OWNER, &record.id), Err(RegistryError::NotFound(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_everything() {
        let store = Arc::new(MemoryStore::new());
        let registry = registry_with(store.clone());
        let a = registry.register(OWNER, "a.example.net", EditionChoice::Auto).unwrap();
        let b = registry.register(OWNER, "b.example.net", EditionChoice::Auto).unwrap();
        registry.start(OWNER, &a.id).unwrap();
        registry.start(OWNER, &b.id).unwrap();
        wait_for_status(&registry, &a.id, ServerStatus::Running).await;

        registry.shutdown().unwrap();
        assert_eq!(registry.live_count(), 0);
        assert!(store.snapshot().iter().all(|r| r.status == ServerStatus::Stopped));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_write_keeps_memory_and_store_in_step() {
        let store = Arc::new(FlakyStore::default());
        let registry = registry_with(store.clone());
        let record = registry.register(OWNER, "play.example.net", EditionChoice::Auto).unwrap();
        registry.start(OWNER, &record.id).unwrap();
        wait_for_status(&registry, &record.id, ServerStatus::Running).await;

        store.broken.store(true, Ordering::SeqCst);
        assert!(matches!(registry.stop(OWNER, &record.id), Err(RegistryError::Store(_))));
        let view = registry.status(OWNER, &record.id).unwrap();
        assert_eq!(view.record.status, ServerStatus::Running);
        assert_eq!(view.live.map(|s| s.phase), Some(Phase::Connected));
        assert_eq!(store.inner.snapshot()[0].status, ServerStatus::Running);

        assert!(matches!(registry.remove(OWNER, &record.id), Err(RegistryError::Store(_))));
        assert!(registry.status(OWNER, &record.id).is_ok());
        assert_eq!(registry.live_count(), 1);

        store.broken.store(false, Ordering::SeqCst);
        registry.stop(OWNER, &record.id).unwrap();
        assert_eq!(store.inner.snapshot()[0].status, ServerStatus::Stopped);
        assert_eq!(registry.live_count(), 0);
    }
}
