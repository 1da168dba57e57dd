//! Per-event notification flow
//!
//! Idle → Parsing → Reading → Building → Sending, ending in one of
//! [`Outcome::Sent`], [`Outcome::Skipped`] or [`Outcome::Failed`]. Nothing is
//! retried.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::dedupe::ProcessedCache;
use crate::parser::{parse_result_filename, NotAResult};
use crate::webhook::{Upload, WebhookError, WebhookSink};

/// Expected reasons for not sending anything
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Same path as a recent delivery
    Duplicate,
    /// Path has no file name component
    NoFileName,
    NotAResult(NotAResult),
    /// Zero-byte file (producer has not written it yet)
    EmptyFile,
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Deliver(#[from] WebhookError),
}

#[derive(Debug)]
pub enum Outcome {
    /// Request went out; `status` may still be an HTTP error
    Sent { status: u16 },
    Skipped(SkipReason),
    Failed(NotifyError),
}

/// Turns write events into webhook uploads
pub struct Notifier<S> {
    sink: S,
    processed: ProcessedCache,
}

impl<S: WebhookSink> Notifier<S> {
    pub fn new(sink: S, processed: ProcessedCache) -> Self {
        Self { sink, processed }
    }

    /// Handle one write event for `path`
    pub fn handle(&mut self, path: &Path) -> Outcome {
        let outcome = self.process(path);
        match &outcome {
            Outcome::Sent { status } => {
                info!(path = %path.display(), status = status, "Notification sent")
            }
            Outcome::Skipped(SkipReason::NotAResult(reason)) => {
                debug!(
                    path = %path.display(),
                    reason = %reason,
                    "Not a result screenshot, ignoring"
                )
            }
            Outcome::Skipped(reason) => {
                debug!(path = %path.display(), reason = ?reason, "Skipped file")
            }
            Outcome::Failed(e) => error!(path = %path.display(), error = %e, "Notification failed"),
        }
        outcome
    }

    fn process(&mut self, path: &Path) -> Outcome {
        if self.processed.contains(path) {
            return Outcome::Skipped(SkipReason::Duplicate);
        }

        let Some(filename) = path.file_name().map(|name| name.to_string_lossy()) else {
            return Outcome::Skipped(SkipReason::NoFileName);
        };

        let result = match parse_result_filename(&filename) {
            Ok(result) => result,
            Err(reason) => return Outcome::Skipped(SkipReason::NotAResult(reason)),
        };
        debug!(
            title = %result.title,
            clear_type = %result.clear_type,
            rank = %result.rank,
            timestamp = %result.timestamp,
            "Parsed result filename"
        );

        let bytes = match read_file(path) {
            Ok(bytes) => bytes,
            Err(source) => {
                return Outcome::Failed(NotifyError::Read {
                    path: path.display().to_string(),
                    source,
                });
            }
        };
        if bytes.is_empty() {
            return Outcome::Skipped(SkipReason::EmptyFile);
        }

        let extension = path.extension().map(|ext| ext.to_string_lossy());
        let upload = Upload::new(&result, extension.as_deref(), bytes);

        match self.sink.deliver(&upload) {
            Ok(delivery) => {
                // Any response counts as processed, including HTTP error statuses
                if !delivery.is_success() {
                    warn!(
                        path = %path.display(),
                        status = delivery.status,
                        "Webhook rejected upload; not retrying"
                    );
                }
                self.processed.mark(path);
                debug!(cached = self.processed.len(), "Marked as processed");
                Outcome::Sent {
                    status: delivery.status,
                }
            }
            Err(e) => Outcome::Failed(e.into()),
        }
    }
}

/// Open, stat and read; zero-length files come back empty without a read
fn read_file(path: &Path) -> io::Result<Vec<u8>> {
    let mut file = File::open(path)?;
    let size = file.metadata()?.len();
    if size == 0 {
        return Ok(Vec::new());
    }
    let mut bytes = Vec::with_capacity(usize::try_from(size).unwrap_or(0));
    file.read_to_end(&mut bytes)?;
    Ok(bytes)
}
