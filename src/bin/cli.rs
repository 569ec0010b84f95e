//! Booking Hub CLI
//!
//! Operator commands against a running hub:
//! - Show connection stats
//! - Send a notification to a user
//! - Broadcast custom events to a role or everyone
//! - Generate a default config file

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use reqwest::Url;
use serde_json::{json, Value};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "booking-hub-cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Operate a running booking hub")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Hub server URL
    #[arg(long, default_value = "http://localhost:8090", global = true)]
    pub api_url: String,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show connections, users and active rooms
    Stats,

    /// Send a notification to every device of a user
    Notify {
        /// Target user id
        user_id: String,
        /// Notification title
        #[arg(short, long)]
        title: String,
        /// Notification body
        #[arg(short, long, default_value = "")]
        message: String,
    },

    /// Send a custom event to every connection in a role room
    BroadcastRole {
        /// Role (student, library_owner, library_staff, front_desk, super_admin, platform_support)
        role: String,
        /// Event name
        event: String,
        /// JSON payload
        #[arg(short, long)]
        data: Option<String>,
    },

    /// Send a custom event to every connection
    Broadcast {
        /// Event name
        event: String,
        /// JSON payload
        #[arg(short, long)]
        data: Option<String>,
    },

    /// Generate a default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Stats => {
            let health = get_json(&client, endpoint(&cli.api_url, &["health"])?).await?;
            let stats = get_json(&client, endpoint(&cli.api_url, &["api", "v1", "stats"])?).await?;

            if cli.format == "json" {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&json!({ "health": health, "stats": stats }))?
                );
                return Ok(());
            }

            println!(
                "Booking Hub {}",
                health["version"].as_str().unwrap_or("unknown")
            );
            println!();
            println!("Status:      {}", health["status"].as_str().unwrap_or("unknown"));
            println!(
                "Connections: {} / {}",
                stats["total_connections"].as_u64().unwrap_or(0),
                health["max_connections"].as_u64().unwrap_or(0)
            );
            println!(
                "Users:       {}",
                stats["authenticated_users"].as_u64().unwrap_or(0)
            );
            if let Some(uptime) = health["uptime_seconds"].as_u64() {
                println!("Uptime:      {}", format_duration(uptime));
            }

            let rooms = stats["rooms"].as_array().cloned().unwrap_or_default();
            println!();
            if rooms.is_empty() {
                println!("No active rooms.");
            } else {
                println!("Rooms ({}):", rooms.len());
                for room in rooms {
                    println!("  {}", room.as_str().unwrap_or_default());
                }
            }
        }

        Commands::Notify {
            user_id,
            title,
            message,
        } => {
            let body = json!({ "title": title, "message": message });
            let report = post_json(
                &client,
                endpoint(&cli.api_url, &["api", "v1", "notifications", user_id.as_str()])?,
                &body,
            )
            .await?;
            print_report(&report, &cli.format)?;
        }

        Commands::BroadcastRole { role, event, data } => {
            let body = json!({ "event": event, "data": parse_data(data.as_deref())? });
            let report = post_json(
                &client,
                endpoint(&cli.api_url, &["api", "v1", "broadcast", "role", role.as_str()])?,
                &body,
            )
            .await?;
            print_report(&report, &cli.format)?;
        }

        Commands::Broadcast { event, data } => {
            let body = json!({ "event": event, "data": parse_data(data.as_deref())? });
            let report =
                post_json(&client, endpoint(&cli.api_url, &["api", "v1", "broadcast"])?, &body)
                    .await?;
            print_report(&report, &cli.format)?;
        }

        Commands::Config { output } => {
            let config = booking_hub::config::generate_default_config();

            match output {
                Some(path) => {
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&path, config)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("Config written to {}", path.display());
                }
                None => print!("{}", config),
            }
        }
    }

    Ok(())
}

/// Append path segments to the base URL, percent-encoding each one
fn endpoint(base: &str, segments: &[&str]) -> anyhow::Result<Url> {
    let mut url = Url::parse(base).with_context(|| format!("Invalid API URL: {}", base))?;
    url.path_segments_mut()
        .map_err(|_| anyhow!("API URL cannot be a base: {}", base))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

async fn get_json(client: &reqwest::Client, url: Url) -> anyhow::Result<Value> {
    let response = client
        .get(url.clone())
        .send()
        .await
        .with_context(|| format!("Cannot connect to booking hub at {}", url))?;
    read_response(response).await
}

async fn post_json(client: &reqwest::Client, url: Url, body: &Value) -> anyhow::Result<Value> {
    let response = client
        .post(url.clone())
        .json(body)
        .send()
        .await
        .with_context(|| format!("Cannot connect to booking hub at {}", url))?;
    read_response(response).await
}

async fn read_response(response: reqwest::Response) -> anyhow::Result<Value> {
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
            .unwrap_or(text);
        bail!("Request failed ({}): {}", status, message);
    }
    Ok(response.json().await?)
}

fn parse_data(data: Option<&str>) -> anyhow::Result<Value> {
    match data {
        Some(raw) => serde_json::from_str(raw).context("--data must be valid JSON"),
        None => Ok(Value::Null),
    }
}

fn print_report(report: &Value, format: &str) -> anyhow::Result<()> {
    if format == "json" {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        println!(
            "Sent {} to {} connection(s)",
            report["event"].as_str().unwrap_or("event"),
            report["delivered"].as_u64().unwrap_or(0)
        );
    }
    Ok(())
}

fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else if seconds < 86400 {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    } else {
        format!("{}d {}h", seconds / 86400, (seconds % 86400) / 3600)
    }
}
