//! Server management commands.

use afkbot::registry::{EditionChoice, ServerRecord};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::client::PanelClient;
use crate::OutputFormat;

#[derive(Debug, Serialize, Deserialize)]
struct Attempt {
    attempt_count: u32,
    max_attempts: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct LiveStatus {
    phase: String,
    attempt: Attempt,
}

#[derive(Debug, Serialize, Deserialize)]
struct ServerEntry {
    #[serde(flatten)]
    record: ServerRecord,
    live: Option<LiveStatus>,
}

#[derive(Serialize)]
struct ServersOutput {
    servers: Vec<ServerEntry>,
    total: usize,
}

pub async fn add(client: &PanelClient, address: &str, edition: EditionChoice, format: OutputFormat) -> Result<()> {
    let record: ServerRecord = client
        .post_json("/api/servers", &json!({ "address": address, "edition": edition }))
        .await?;

    match format {
        OutputFormat::Text => {
            println!("Added server {}", record.id);
            println!("  Address:  {}", record.address());
            println!("  Edition:  {}", record.edition);
            println!("  Bot name: {}", record.bot_username);
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&record)?),
    }
    Ok(())
}

pub async fn list(client: &PanelClient, format: OutputFormat) -> Result<()> {
    let servers: Vec<ServerEntry> = client.get("/api/servers").await?;
    let output = ServersOutput {
        total: servers.len(),
        servers,
    };

    match format {
        OutputFormat::Text => {
            if output.servers.is_empty() {
                println!("No servers registered.");
            } else {
                println!("{:<38} {:<32} {:<8} {:<11} {:>6}", "ID", "ADDRESS", "EDITION", "PHASE", "CONNS");
                println!("{}", "-".repeat(99));
                for entry in &output.servers {
                    println!(
                        "{:<38} {:<32} {:<8} {:<11} {:>6}",
                        entry.record.id,
                        entry.record.address(),
                        entry.record.edition.to_string(),
                        phase(entry),
                        entry.record.stats.total_connections
                    );
                }
                println!();
                println!("Total: {} server(s)", output.total);
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&output)?),
    }
    Ok(())
}

pub async fn status(client: &PanelClient, id: &str, format: OutputFormat) -> Result<()> {
    let entry: ServerEntry = client.get(&format!("/api/servers/{id}")).await?;
    print_entry(&entry, format)
}

pub async fn start(client: &PanelClient, id: &str, format: OutputFormat) -> Result<()> {
    let entry: ServerEntry = client.post(&format!("/api/servers/{id}/start")).await?;
    if format == OutputFormat::Text {
        println!("Starting bot {} on {}", entry.record.bot_username, entry.record.address());
        return Ok(());
    }
    print_entry(&entry, format)
}

pub async fn stop(client: &PanelClient, id: &str, format: OutputFormat) -> Result<()> {
    let entry: ServerEntry = client.post(&format!("/api/servers/{id}/stop")).await?;
    if format == OutputFormat::Text {
        println!("Stopped bot {} on {}", entry.record.bot_username, entry.record.address());
        return Ok(());
    }
    print_entry(&entry, format)
}

pub async fn remove(client: &PanelClient, id: &str, format: OutputFormat) -> Result<()> {
    let record: ServerRecord = client.delete(&format!("/api/servers/{id}")).await?;
    match format {
        OutputFormat::Text => println!("Removed server {} ({})", record.id, record.address()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&record)?),
    }
    Ok(())
}

fn print_entry(entry: &ServerEntry, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            let record = &entry.record;
            println!("Server {}", record.id);
            println!("  Address:      {}", record.address());
            println!("  Edition:      {}", record.edition);
            println!("  Bot name:     {}", record.bot_username);
            println!("  Status:       {}", phase(entry));
            if let Some(live) = &entry.live {
                println!(
                    "  Attempt:      {}/{}",
                    live.attempt.attempt_count, live.attempt.max_attempts
                );
            }
            println!("  Connections:  {}", record.stats.total_connections);
            println!("  Last online:  {}", format_ago(record.stats.last_connection));
            println!("  Uptime:       {} min", record.stats.uptime_secs / 60);
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(entry)?),
    }
    Ok(())
}

fn phase(entry: &ServerEntry) -> String {
    match &entry.live {
        Some(live) => live.phase.clone(),
        None if entry.record.is_running() => "running".to_string(),
        None => "stopped".to_string(),
    }
}

fn format_ago(millis: Option<i64>) -> String {
    let Some(millis) = millis else {
        return "never".to_string();
    };
    let secs = (afkbot::now_millis() - millis).max(0) / 1000;
    match secs {
        0..=59 => format!("{secs}s ago"),
        60..=3599 => format!("{}m ago", secs / 60),
        3600..=86_399 => format!("{}h ago", secs / 3600),
        _ => format!("{}d ago", secs / 86_400),
    }
}
