//! Persisted server records.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::reconnect::ControllerStatus;
use crate::transport::Edition;

/// Persisted run state of a server's bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    #[default]
    Stopped,
    Running,
}

/// Connection counters of one server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerStats {
    pub total_connections: u64,
    /// Unix millis of the last successful handshake.
    pub last_connection: Option<i64>,
    pub uptime_secs: u64,
}

/// A registered server and the bot assigned to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerRecord {
    pub id: String,
    pub owner: String,
    pub host: String,
    pub port: u16,
    pub edition: Edition,
    pub bot_username: String,
    #[serde(default)]
    pub status: ServerStatus,
    /// Unix millis.
    pub created_at: i64,
    #[serde(default)]
    pub stats: ServerStats,
}

impl ServerRecord {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_running(&self) -> bool {
        self.status == ServerStatus::Running
    }

    /// Add the time since `connected_at` to the uptime counter.
    pub(crate) fn accumulate_uptime(&mut self, connected_at: i64, now: i64) {
        let elapsed = now.saturating_sub(connected_at).max(0) / 1000;
        self.stats.uptime_secs = self.stats.uptime_secs.saturating_add(elapsed as u64);
    }
}

/// A record together with the live controller status, if any.
#[derive(Debug, Clone, Serialize)]
pub struct ServerView {
    #[serde(flatten)]
    pub record: ServerRecord,
    pub live: Option<ControllerStatus>,
}

/// Aggregate numbers across every registered server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryStats {
    pub total_servers: usize,
    pub running: usize,
    pub stopped: usize,
    pub bedrock: usize,
    pub java: usize,
    pub live_controllers: usize,
    pub total_connections: u64,
    pub owners: usize,
    /// Most registered host and its server count.
    pub top_host: Option<(String, usize)>,
}

impl RegistryStats {
    pub(crate) fn collect<'a>(records: impl Iterator<Item = &'a ServerRecord>, live_controllers: usize) -> Self {
        let mut stats = Self {
            live_controllers,
            ..Self::default()
        };
        let mut hosts: HashMap<&str, usize> = HashMap::new();
        let mut owners: HashSet<&str> = HashSet::new();

        for record in records {
            stats.total_servers += 1;
            match record.status {
                ServerStatus::Running => stats.running += 1,
                ServerStatus::Stopped => stats.stopped += 1,
            }
            match record.edition {
                Edition::Bedrock => stats.bedrock += 1,
                Edition::Java => stats.java += 1,
            }
            stats.total_connections += record.stats.total_connections;
            *hosts.entry(record.host.as_str()).or_default() += 1;
            owners.insert(record.owner.as_str());
        }

        stats.owners = owners.len();
        stats.top_host = hosts
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(host, count)| (host.to_string(), count));
        stats
    }
}
