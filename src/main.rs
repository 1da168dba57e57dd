#![forbid(unsafe_code)]

mod config;
mod constants;
mod dedupe;
mod notifier;
mod parser;
mod watcher;
mod webhook;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::mpsc::{self, SyncSender};
use tracing::{error, info, Level as TraceLevel};
use tracing_subscriber::FmtSubscriber;

use config::Config;
use constants::watcher::EVENT_QUEUE_CAPACITY;
use dedupe::ProcessedCache;
use notifier::Notifier;
use watcher::{spawn_event_loop, DirectoryWatcher, WatchEvent};
use webhook::HttpWebhook;

/// Watch a screenshot folder and post rhythm-game results to a webhook
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Config file (defaults to ./config.json, then the user config directory)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Map a `LOG_LEVEL` value to a tracing level (info when unknown)
fn parse_log_level(value: &str) -> TraceLevel {
    match value.to_lowercase().as_str() {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    }
}

fn init_tracing() -> Result<()> {
    let log_level =
        parse_log_level(&std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()));

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")
}

/// Push a shutdown event into the queue on SIGINT/SIGTERM
#[cfg(unix)]
fn spawn_shutdown_listener(queue: SyncSender<WatchEvent>) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals =
        Signals::new([SIGINT, SIGTERM]).context("Failed to register signal handlers")?;
    std::thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            info!(signal = sig, "Received signal, shutting down");
            let _ = queue.send(WatchEvent::Shutdown);
        }
    });
    Ok(())
}

#[cfg(not(unix))]
fn spawn_shutdown_listener(_queue: SyncSender<WatchEvent>) -> Result<()> {
    Ok(())
}

fn main() -> Result<()> {
    init_tracing()?;
    let args = Args::parse();

    let config = match Config::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!(error = ?e, "Failed to load config");
            error!("Create a config.json with \"username\", \"webhook\" and \"watch_path\".");
            std::process::exit(1);
        }
    };
    info!(
        username = %config.username,
        watch_path = %config.watch_path.display(),
        "Starting result notifier"
    );

    let sink = HttpWebhook::new(config.webhook.clone(), config.request_timeout())
        .context("Failed to create webhook client")?;
    let processed = ProcessedCache::new(config.dedupe_capacity, config.dedupe_window());
    let notifier = Notifier::new(sink, processed);

    let (queue_tx, queue_rx) = mpsc::sync_channel(EVENT_QUEUE_CAPACITY);
    let _watcher = DirectoryWatcher::start(&config.watch_path, queue_tx.clone())?;
    spawn_shutdown_listener(queue_tx)?;

    let handle = spawn_event_loop(queue_rx, notifier, config.settle_delay())?;
    handle
        .join()
        .map_err(|_| anyhow!("Event loop thread panicked"))?;

    info!("Stopped");
    Ok(())
}
