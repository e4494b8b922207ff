use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use live_monitor::api::FootballDataClient;
use live_monitor::clock::SystemClock;
use live_monitor::config::{AppConfig, CONFIG_PATH};
use live_monitor::engine::BaselineModel;
use live_monitor::initializer::{initialize_predictions, summarize};
use live_monitor::orchestrator::Orchestrator;
use live_monitor::poller::Collaborators;
use live_monitor::reporter::{
    Broadcaster, FanoutBroadcaster, StdoutBroadcaster, WebhookBroadcaster,
};
use live_monitor::store::{MemoryStore, load_forms};

#[derive(Parser)]
#[command(name = "live-monitor", about = "Live betting form monitor")]
struct Args {
    /// JSON file with an array of betting forms to load at startup
    #[arg(long)]
    forms: Option<PathBuf>,

    /// Path to config.toml (defaults apply when missing)
    #[arg(long, default_value = CONFIG_PATH)]
    config: PathBuf,

    /// Override the poll interval in seconds
    #[arg(long)]
    interval: Option<u64>,

    /// POST update events to this URL as well as stdout
    #[arg(long)]
    webhook: Option<String>,

    /// Load forms without starting monitoring for them
    #[arg(long)]
    no_autostart: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut config = AppConfig::load_or_default(&args.config)?;
    config.apply_env();
    if let Some(secs) = args.interval {
        config.settings.poll_interval_secs = secs;
    }
    if let Some(url) = args.webhook {
        config.broadcast.webhook_url = Some(url);
    }
    config.validate()?;

    if config.data_source.api_key.is_none() {
        warn!("No football-data API key configured; requests may be rejected");
    }

    // --- Seed the store ---
    let mut forms = match &args.forms {
        Some(path) => load_forms(path)?,
        None => Vec::new(),
    };
    let model = Arc::new(BaselineModel);
    for form in &mut forms {
        let scored = initialize_predictions(form, model.as_ref());
        let summary = summarize(form);
        info!(
            "[{}] Loaded {} game(s), {scored} newly scored, stake ${:.2}, overall {:.2}% ({})",
            form.id,
            summary.total_games,
            summary.total_stake,
            summary.overall_win_probability,
            summary.recommendation,
        );
    }
    let ids: Vec<String> = forms.iter().map(|f| f.id.to_string()).collect();
    let store = Arc::new(MemoryStore::from_documents(forms));

    // --- Collaborators ---
    let source = Arc::new(FootballDataClient::new(
        config.data_source.base_url.clone(),
        config.data_source.api_key.clone(),
        config.data_source.timeout(),
    )?);
    let mut broadcaster = FanoutBroadcaster::default();
    broadcaster.push(Arc::new(StdoutBroadcaster));
    if let Some(url) = &config.broadcast.webhook_url {
        info!("Publishing updates to webhook {url}");
        broadcaster.push(Arc::new(WebhookBroadcaster::new(
            url.clone(),
            config.data_source.timeout(),
        )?));
    }
    let broadcaster: Arc<dyn Broadcaster> = Arc::new(broadcaster);

    let monitor = Orchestrator::new(
        Collaborators {
            store,
            source,
            model,
            broadcaster,
            clock: Arc::new(SystemClock),
        },
        config.settings.poll_interval(),
    );

    if !args.no_autostart {
        for id in &ids {
            monitor.start_monitoring(id)?;
        }
    }

    info!(
        "Monitoring {} form(s) every {}s. Commands: start <id>, stop <id>, status. Ctrl+C to quit.",
        monitor.active_ids().len(),
        config.settings.poll_interval_secs
    );

    // --- Command loop ---
    let input = BufReader::new(tokio::io::stdin());
    run_commands(&monitor, input, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    })
    .await;

    let grace = config.settings.shutdown_grace();
    if !monitor.shutdown(grace).await {
        warn!("Exiting with poll loops still running");
    }
    Ok(())
}

/// Read commands until EOF, a read error, or `shutdown` resolves.
async fn run_commands<R>(monitor: &Orchestrator, input: R, shutdown: impl Future<Output = ()>)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                return;
            }
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => handle_command(monitor, &line),
                    Ok(None) => {
                        info!("stdin closed, shutting down");
                        return;
                    }
                    Err(e) => {
                        warn!("Failed to read command: {e}, shutting down");
                        return;
                    }
                }
            }
        }
    }
}

/// Apply one `start <id>` / `stop <id>` / `status` command.
fn handle_command(monitor: &Orchestrator, line: &str) {
    let mut parts = line.split_whitespace();
    let result = match (parts.next(), parts.next()) {
        (None, _) => return,
        (Some("start"), Some(id)) => monitor.start_monitoring(id).map(|started| {
            if !started {
                info!("[{id}] Already monitoring");
            }
        }),
        (Some("stop"), Some(id)) => monitor.stop_monitoring(id).map(|stopped| {
            if !stopped {
                info!("[{id}] Was not being monitored");
            }
        }),
        (Some(cmd @ ("start" | "stop")), None) => {
            warn!("Usage: {cmd} <form_id>");
            Ok(())
        }
        (Some("status"), _) => {
            let active = monitor.active_ids();
            let names: Vec<&str> = active.iter().map(|id| id.as_str()).collect();
            info!("{} active: [{}]", names.len(), names.join(", "));
            Ok(())
        }
        (Some(other), _) => {
            warn!("Unknown command '{other}' (expected: start <id>, stop <id>, status)");
            Ok(())
        }
    };
    if let Err(e) = result {
        warn!("{e}");
    }
}
