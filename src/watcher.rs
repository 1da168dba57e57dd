//! Directory watcher and the event consumer loop
//!
//! The `notify` backend thread only classifies events and pushes them onto a
//! bounded queue. A single consumer thread drains the queue and does all
//! parsing, file I/O and uploading synchronously, so a slow webhook holds up
//! later events.

use anyhow::{Context, Result};
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, SyncSender};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::constants::watcher::THREAD_NAME;
use crate::notifier::Notifier;
use crate::webhook::WebhookSink;

/// What the consumer loop reacts to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Created(PathBuf),
    Written(PathBuf),
    /// Error reported by the watcher backend; logged, never fatal
    Failed(String),
    /// Stop the consumer loop
    Shutdown,
}

/// Live subscription to one directory (non-recursive)
///
/// Dropping it unsubscribes.
pub struct DirectoryWatcher {
    _watcher: RecommendedWatcher,
}

impl DirectoryWatcher {
    /// Subscribe to `path`, forwarding classified events into `queue`
    pub fn start(path: &Path, queue: SyncSender<WatchEvent>) -> Result<Self> {
        let handler = move |res: notify::Result<Event>| {
            let events = match res {
                Ok(event) => classify(&event),
                Err(e) => vec![WatchEvent::Failed(e.to_string())],
            };
            for event in events {
                // Consumer gone; nothing left to deliver to
                if queue.send(event).is_err() {
                    return;
                }
            }
        };

        let mut watcher = RecommendedWatcher::new(handler, notify::Config::default())
            .context("Failed to create filesystem watcher")?;
        watcher
            .watch(path, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch {}", path.display()))?;

        info!(path = %path.display(), "Watching directory");
        Ok(Self { _watcher: watcher })
    }
}

/// Map a raw notify event to the events the consumer cares about
pub fn classify(event: &Event) -> Vec<WatchEvent> {
    let make: fn(PathBuf) -> WatchEvent = match event.kind {
        EventKind::Create(_) => WatchEvent::Created,
        EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any) => WatchEvent::Written,
        _ => return Vec::new(),
    };
    event.paths.iter().cloned().map(make).collect()
}

/// Drain `events` until a shutdown event arrives or every sender is gone
pub fn run_event_loop<S: WebhookSink>(
    events: &Receiver<WatchEvent>,
    notifier: &mut Notifier<S>,
    settle_delay: Duration,
) {
    for event in events.iter() {
        debug!(event = ?event, "Watch event");
        match event {
            WatchEvent::Created(path) => {
                // Give the producer time to finish writing before anything else is handled
                debug!(
                    path = %path.display(),
                    delay_ms = settle_delay.as_millis() as u64,
                    "File created, settling"
                );
                if !settle_delay.is_zero() {
                    thread::sleep(settle_delay);
                }
            }
            WatchEvent::Written(path) => {
                notifier.handle(&path);
            }
            WatchEvent::Failed(message) => {
                warn!(error = %message, "Watcher error");
            }
            WatchEvent::Shutdown => {
                info!("Shutdown requested, stopping event loop");
                return;
            }
        }
    }
    info!("Event queue closed, stopping event loop");
}

/// Run the consumer loop on its own thread
pub fn spawn_event_loop<S>(
    events: Receiver<WatchEvent>,
    mut notifier: Notifier<S>,
    settle_delay: Duration,
) -> Result<JoinHandle<()>>
where
    S: WebhookSink + Send + 'static,
{
    thread::Builder::new()
        .name(THREAD_NAME.to_string())
        .spawn(move || {
            info!("Event loop started");
            run_event_loop(&events, &mut notifier, settle_delay);
        })
        .context("Failed to spawn event loop thread")
}
