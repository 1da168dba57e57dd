//! Result screenshot filename grammar
//!
//! A result filename carries a timestamp, a chart title, a clear type and a
//! rank, e.g. `Title Here FULL COMBO A 1700000000_123.png` or
//! `20240101_123456_Title Here HARD CLEAR AA.png`. The pieces are peeled off
//! in a fixed order: timestamp, then the trailing rank, then the clear type.
//! Whatever is left is the title.

use regex::Regex;
use std::fmt;
use std::ops::Range;
use std::path::Path;
use std::sync::LazyLock;
use thiserror::Error;

/// Two digit runs joined by `_`, plus the separator that follows a leading timestamp
static TIMESTAMP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?P<stamp>[0-9]+_[0-9]+)_?").expect("timestamp pattern"));

static RANK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s(?P<rank>[A-F]+)$").expect("rank pattern"));

/// Alternatives are ordered; at a given position the first one listed wins
static CLEAR_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    let alternatives: Vec<String> = ClearType::ALL
        .iter()
        .map(|clear_type| format!("(?P<{}>{})", clear_type.group_name(), clear_type.pattern()))
        .collect();
    Regex::new(&alternatives.join("|")).expect("clear type pattern")
});

/// How a chart was completed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClearType {
    Perfect,
    FullCombo,
    LightAssistEasyClear,
    ExHardClear,
    HardClear,
    EasyClear,
    Failed,
    Clear,
}

impl ClearType {
    /// Matching priority order
    pub const ALL: [ClearType; 8] = [
        ClearType::Perfect,
        ClearType::FullCombo,
        ClearType::LightAssistEasyClear,
        ClearType::ExHardClear,
        ClearType::HardClear,
        ClearType::EasyClear,
        ClearType::Failed,
        ClearType::Clear,
    ];

    /// Label shown in the notification
    pub fn label(self) -> &'static str {
        match self {
            ClearType::Perfect => "PERFECT",
            ClearType::FullCombo => "FULL COMBO",
            ClearType::LightAssistEasyClear => "LIGHT ASSIST EASY CLEAR",
            ClearType::ExHardClear => "EXHARD CLEAR",
            ClearType::HardClear => "HARD CLEAR",
            ClearType::EasyClear => "EASY CLEAR",
            ClearType::Failed => "FAILED",
            ClearType::Clear => "CLEAR",
        }
    }

    fn group_name(self) -> &'static str {
        match self {
            ClearType::Perfect => "perfect",
            ClearType::FullCombo => "full_combo",
            ClearType::LightAssistEasyClear => "light_assist_easy_clear",
            ClearType::ExHardClear => "exhard_clear",
            ClearType::HardClear => "hard_clear",
            ClearType::EasyClear => "easy_clear",
            ClearType::Failed => "failed",
            ClearType::Clear => "clear",
        }
    }

    fn pattern(self) -> String {
        let words = self.label().replace(' ', r"\s");
        // A bare CLEAR only counts at the very end
        if self == ClearType::Clear {
            format!("{words}$")
        } else {
            words
        }
    }
}

impl fmt::Display for ClearType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Fields extracted from a result filename
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedResult {
    pub title: String,
    pub rank: String,
    pub clear_type: ClearType,
    /// Verbatim, e.g. `1700000000_123`
    pub timestamp: String,
}

/// Why a filename is not a result screenshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NotAResult {
    #[error("no timestamp in filename")]
    MissingTimestamp,
    #[error("no trailing rank in filename")]
    MissingRank,
    #[error("no clear type in filename")]
    MissingClearType,
}

/// Parse a bare filename (no directory) into its result fields
pub fn parse_result_filename(filename: &str) -> Result<ParsedResult, NotAResult> {
    let stem = Path::new(filename)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(filename);

    let stamp = TIMESTAMP.captures(stem).ok_or(NotAResult::MissingTimestamp)?;
    let timestamp = stamp["stamp"].to_string();
    let whole = stamp.get(0).ok_or(NotAResult::MissingTimestamp)?;
    let working = cut(stem, whole.range());

    let rank_caps = RANK.captures(&working).ok_or(NotAResult::MissingRank)?;
    let rank = rank_caps["rank"].to_string();
    let whole = rank_caps.get(0).ok_or(NotAResult::MissingRank)?;
    let working = cut(&working, whole.range());

    let clear_caps = CLEAR_TYPE
        .captures(&working)
        .ok_or(NotAResult::MissingClearType)?;
    let clear_type = ClearType::ALL
        .into_iter()
        .find(|clear_type| clear_caps.name(clear_type.group_name()).is_some())
        .ok_or(NotAResult::MissingClearType)?;
    let whole = clear_caps.get(0).ok_or(NotAResult::MissingClearType)?;
    let title = cut(&working, whole.range())
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    Ok(ParsedResult {
        title,
        rank,
        clear_type,
        timestamp,
    })
}

/// Remove `range` from `text` and trim the remainder
fn cut(text: &str, range: Range<usize>) -> String {
    let mut out = String::with_capacity(text.len());
    out.push_str(&text[..range.start]);
    out.push_str(&text[range.end..]);
    out.trim().to_string()
}
