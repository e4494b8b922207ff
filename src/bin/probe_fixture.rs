//! Probe: football-data.org match endpoint
//!
//! Hits GET {base}/matches/<fixture_id> and documents:
//! - Response shape and fields
//! - How the payload normalises into a live state
//! - Latency over a few repeated requests

use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;

use live_monitor::api::{FootballDataClient, LiveDataSource};
use live_monitor::config::{AppConfig, CONFIG_PATH};

#[derive(Parser)]
#[command(name = "probe_fixture", about = "Inspect the live data provider for one fixture")]
struct Args {
    /// Provider fixture (match) id
    fixture_id: String,

    /// Number of timed requests to make
    #[arg(long, default_value_t = 3)]
    repeat: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut config = AppConfig::load_or_default(Path::new(CONFIG_PATH))?;
    config.apply_env();
    let client = FootballDataClient::new(
        config.data_source.base_url.clone(),
        config.data_source.api_key.clone(),
        config.data_source.timeout(),
    )?;

    println!("=== Probe: fixture {} ===", args.fixture_id);
    println!("URL: {}", client.match_url(&args.fixture_id));
    println!(
        "API key: {}",
        if config.data_source.api_key.is_some() { "set" } else { "missing" }
    );
    println!();

    // 1. Raw payload
    println!("--- 1. Raw payload ---");
    let start = Instant::now();
    match client.fetch_raw(&args.fixture_id).await {
        Ok(body) => {
            println!("Latency: {:?}", start.elapsed());
            println!("{}", serde_json::to_string_pretty(&body)?);
            if let Some(obj) = body.as_object() {
                println!("\nFields present:");
                for key in obj.keys() {
                    println!("  - {}", key);
                }
            }
        }
        Err(e) => println!("Error: {e}"),
    }
    println!();

    // 2. Parsed live state
    println!("--- 2. Parsed live state ---");
    match client.find_live_state(&args.fixture_id).await {
        Ok(Some(state)) => {
            println!("{}", serde_json::to_string_pretty(&state)?);
            println!("Live (would be recomputed): {}", state.status.is_live());
        }
        Ok(None) => println!("No data (404)"),
        Err(e) => println!("Fetch error: {e}"),
    }
    println!();

    // 3. Latency
    println!("--- 3. Latency over {} requests ---", args.repeat);
    for i in 0..args.repeat {
        let start = Instant::now();
        let outcome = client.find_live_state(&args.fixture_id).await;
        let label = match outcome {
            Ok(Some(s)) => format!("{} {}", s.status, s.score),
            Ok(None) => "none".to_string(),
            Err(e) => format!("error: {e}"),
        };
        println!("  #{}: {:?} ({label})", i + 1, start.elapsed());
    }

    Ok(())
}
