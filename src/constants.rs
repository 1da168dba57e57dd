//! Application-wide constants
//!
//! Wire-format literals and timing values used by the watcher, the notifier
//! and the webhook client.

/// Configuration file location
pub mod config {
    /// Application directory name under the user config dir
    pub const APP_DIR: &str = "result-notifier";

    /// Config filename (looked up in the working directory first)
    pub const FILENAME: &str = "config.json";
}

/// Directory watcher constants
pub mod watcher {
    /// Delay after a create event before further events are handled
    pub const DEFAULT_SETTLE_DELAY_MS: u64 = 2000;

    /// Capacity of the bounded event queue between notify and the consumer
    pub const EVENT_QUEUE_CAPACITY: usize = 256;

    /// Name of the consumer thread
    pub const THREAD_NAME: &str = "result-watcher";
}

/// Multipart upload constants
pub mod upload {
    /// Form field carrying the screenshot
    pub const FILE_FIELD: &str = "file";

    /// Form field carrying the embed JSON
    pub const PAYLOAD_FIELD: &str = "payload_json";

    /// Scheme used by the embed to reference an attached file
    pub const ATTACHMENT_SCHEME: &str = "attachment://";

    /// User agent sent with every webhook request
    pub const USER_AGENT: &str = concat!("result-notifier/", env!("CARGO_PKG_VERSION"));
}

/// Rich embed constants
pub mod embed {
    /// Accent color (0x00FF00)
    pub const COLOR: u32 = 0x00ff00;

    /// Field label for the clear type
    pub const CLEAR_TYPE_FIELD: &str = ":trophy: Clear Type";

    /// Field label for the rank
    pub const RANK_FIELD: &str = ":military_medal: Rank";
}

/// Duplicate suppression defaults
pub mod dedupe {
    /// Number of recently delivered paths remembered
    pub const DEFAULT_CAPACITY: usize = 1;
}
