//! Duplicate suppression for delivered screenshots
//!
//! Session-only: nothing here survives a restart.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::debug;

/// Recently delivered paths, oldest first
///
/// With the defaults (capacity 1, no window) only an immediately repeated
/// path is treated as a duplicate.
#[derive(Debug)]
pub struct ProcessedCache {
    entries: VecDeque<(PathBuf, Instant)>,
    capacity: usize,
    window: Option<Duration>,
}

impl Default for ProcessedCache {
    fn default() -> Self {
        Self::new(crate::constants::dedupe::DEFAULT_CAPACITY, None)
    }
}

impl ProcessedCache {
    /// A capacity of 0 is treated as 1
    pub fn new(capacity: usize, window: Option<Duration>) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::new(),
            capacity,
            window,
        }
    }

    /// Whether `path` was delivered recently enough to skip
    pub fn contains(&self, path: &Path) -> bool {
        self.contains_at(path, Instant::now())
    }

    /// Record a delivery of `path`
    pub fn mark(&mut self, path: &Path) {
        self.mark_at(path, Instant::now());
    }

    fn contains_at(&self, path: &Path, now: Instant) -> bool {
        self.entries
            .iter()
            .any(|(seen, at)| seen == path && !self.expired(*at, now))
    }

    fn mark_at(&mut self, path: &Path, now: Instant) {
        self.entries.retain(|(seen, _)| seen != path);
        while self.entries.len() >= self.capacity {
            if let Some((evicted, _)) = self.entries.pop_front() {
                debug!(path = %evicted.display(), "Evicted from processed cache");
            }
        }
        self.entries.push_back((path.to_path_buf(), now));
    }

    fn expired(&self, at: Instant, now: Instant) -> bool {
        self.window
            .is_some_and(|window| now.saturating_duration_since(at) >= window)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
