//! Stats command implementation.

use afkbot::registry::RegistryStats;
use anyhow::Result;

use crate::client::PanelClient;
use crate::OutputFormat;

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}

pub async fn show(client: &PanelClient, format: OutputFormat) -> Result<()> {
    let stats: RegistryStats = client.get("/api/stats").await?;

    match format {
        OutputFormat::Text => {
            let total = stats.total_servers;
            println!("Servers:      {total}");
            println!("  running:    {} ({:.1}%)", stats.running, percent(stats.running, total));
            println!("  stopped:    {}", stats.stopped);
            println!("  bedrock:    {} ({:.1}%)", stats.bedrock, percent(stats.bedrock, total));
            println!("  java:       {} ({:.1}%)", stats.java, percent(stats.java, total));
            println!("Live bots:    {}", stats.live_controllers);
            println!("Owners:       {}", stats.owners);
            let avg = if total == 0 {
                0.0
            } else {
                stats.total_connections as f64 / total as f64
            };
            println!("Connections:  {} ({avg:.1} per server)", stats.total_connections);
            match &stats.top_host {
                Some((host, count)) => println!("Top host:     {host} ({count} bots)"),
                None => println!("Top host:     -"),
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
    }
    Ok(())
}
