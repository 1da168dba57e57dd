//! Notifier configuration
//!
//! Loaded once at startup from a JSON file and never reloaded.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::constants::{config, dedupe, watcher};

/// Static configuration (immutable for the process lifetime)
///
/// Missing keys fall back to empty/default values without complaint, unknown
/// keys are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub username: String,
    pub webhook: String,
    pub watch_path: PathBuf,

    /// How many recently delivered paths count as duplicates
    pub dedupe_capacity: usize,

    /// Forget a delivered path after this many seconds (never when unset)
    pub dedupe_window_secs: Option<u64>,

    /// Overall timeout for the webhook request (none when unset)
    pub request_timeout_secs: Option<u64>,

    /// Wait after a create event before handling further events
    pub settle_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            username: String::new(),
            webhook: String::new(),
            watch_path: PathBuf::new(),
            dedupe_capacity: dedupe::DEFAULT_CAPACITY,
            dedupe_window_secs: None,
            request_timeout_secs: None,
            settle_delay_ms: watcher::DEFAULT_SETTLE_DELAY_MS,
        }
    }
}

impl Config {
    /// Config in the working directory
    fn local_path() -> PathBuf {
        PathBuf::from(config::FILENAME)
    }

    /// Config in the per-user config directory
    fn user_path() -> Option<PathBuf> {
        let mut path = dirs::config_dir()?;
        path.push(config::APP_DIR);
        path.push(config::FILENAME);
        Some(path)
    }

    /// Pick the config file: explicit path, then `./config.json`, then the user config dir
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }

        let local = Self::local_path();
        if local.exists() {
            return local;
        }

        match Self::user_path() {
            Some(user) if user.exists() => user,
            _ => local,
        }
    }

    /// Load configuration; any read or decode failure is an error
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_path(explicit);
        debug!(path = %path.display(), "Reading config");

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let config = Self::from_json(&contents)
            .with_context(|| format!("Failed to parse config JSON from {}", path.display()))?;

        info!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        Ok(serde_json::from_str(contents)?)
    }

    pub fn dedupe_window(&self) -> Option<Duration> {
        self.dedupe_window_secs.map(Duration::from_secs)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_core_keys() {
        let json = r#"{
            "username": "dj",
            "webhook": "https://example.com/hook",
            "watch_path": "/tmp/shots"
        }"#;
        let config = Config::from_json(json).unwrap();

        assert_eq!(config.username, "dj");
        assert_eq!(config.webhook, "https://example.com/hook");
        assert_eq!(config.watch_path, PathBuf::from("/tmp/shots"));
        assert_eq!(config.dedupe_capacity, 1);
        assert_eq!(config.dedupe_window(), None);
        assert_eq!(config.request_timeout(), None);
        assert_eq!(config.settle_delay(), Duration::from_millis(2000));
    }

    #[test]
    fn test_from_json_missing_keys_are_empty() {
        let config = Config::from_json(r#"{"webhook": "https://example.com/hook"}"#).unwrap();
        assert_eq!(config.username, "");
        assert_eq!(config.watch_path, PathBuf::new());
    }

    #[test]
    fn test_from_json_ignores_unknown_keys() {
        let config = Config::from_json(r#"{"username": "dj", "theme": "dark"}"#).unwrap();
        assert_eq!(config.username, "dj");
    }

    #[test]
    fn test_from_json_optional_tuning() {
        let json = r#"{
            "dedupe_capacity": 8,
            "dedupe_window_secs": 30,
            "request_timeout_secs": 10,
            "settle_delay_ms": 0
        }"#;
        let config = Config::from_json(json).unwrap();
        assert_eq!(config.dedupe_capacity, 8);
        assert_eq!(config.dedupe_window(), Some(Duration::from_secs(30)));
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(10)));
        assert_eq!(config.settle_delay(), Duration::ZERO);
    }

    #[test]
    fn test_huge_dedupe_capacity_builds_cache() {
        let json = format!(r#"{{"dedupe_capacity": {}}}"#, usize::MAX);
        let config = Config::from_json(&json).unwrap();
        assert_eq!(config.dedupe_capacity, usize::MAX);

        let mut cache = crate::dedupe::ProcessedCache::new(
            config.dedupe_capacity,
            config.dedupe_window(),
        );
        cache.mark(Path::new("/shots/a.png"));
        assert!(cache.contains(Path::new("/shots/a.png")));
    }

    #[test]
    fn test_from_json_malformed() {
        assert!(Config::from_json("{ username: ").is_err());
        assert!(Config::from_json(r#"{"username": 5}"#).is_err());
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notifier.json");
        fs::write(&path, r#"{"username": "dj", "watch_path": "/data"}"#).unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.watch_path, PathBuf::from("/data"));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(Some(&dir.path().join("absent.json"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read config"));
    }

    #[test]
    fn test_resolve_path_prefers_explicit() {
        let explicit = Path::new("/etc/notifier.json");
        assert_eq!(Config::resolve_path(Some(explicit)), explicit);
    }
}
