//! Single-line shaping helpers shared by the classifier and the renderer.
//!
//! Lengths are counted in Unicode scalar values, so truncation never splits a
//! multi-byte codepoint.

use std::time::Duration;

pub const ELLIPSIS: &str = "…";
pub const STATUS_RUNNING: &str = "▸";
pub const STATUS_DONE: &str = "✓";
pub const HEADER_SEP: &str = " · ";
pub const HARD_BREAK: &str = "  \n";

pub const MAX_CMD_LEN: usize = 40;
pub const MAX_REASON_LEN: usize = 80;
pub const MAX_QUERY_LEN: usize = 60;
pub const MAX_PATH_LEN: usize = 40;
pub const MAX_WARNING_LEN: usize = 120;
pub const MAX_PROGRESS_CHARS: usize = 300;
/// Smallest progress budget that still fits a full header such as
/// `working · 59m 59s · turn 9999`.
pub const MIN_PROGRESS_CHARS: usize = 32;

/// Collapses every run of whitespace (including newlines) into a single space.
pub fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collapses `text` to one line and caps it at `max_len` characters.
///
/// When the text is too long the last visible character is replaced by
/// [`ELLIPSIS`]; a budget too small to hold the marker yields a hard cut.
pub fn truncate(text: &str, max_len: usize) -> String {
    let text = one_line(text);
    if text.chars().count() <= max_len {
        return text;
    }
    let marker_len = ELLIPSIS.chars().count();
    if max_len <= marker_len {
        return text.chars().take(max_len).collect();
    }
    let mut out: String = text.chars().take(max_len - marker_len).collect();
    out.push_str(ELLIPSIS);
    out
}

pub fn inline_code(text: &str) -> String {
    format!("`{text}`")
}

pub fn emphasis(text: &str) -> String {
    format!("_{text}_")
}

/// `42s`, `3m 07s`, or `2h 05m`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    let (minutes, seconds) = (total / 60, total % 60);
    let (hours, minutes) = (minutes / 60, minutes % 60);
    if hours > 0 {
        format!("{hours}h {minutes:02}m")
    } else if minutes > 0 {
        format!("{minutes}m {seconds:02}s")
    } else {
        format!("{seconds}s")
    }
}

pub fn format_header(elapsed: Duration, turn: Option<u64>, label: &str) -> String {
    let elapsed = format_elapsed(elapsed);
    match turn {
        Some(turn) => format!("{label}{HEADER_SEP}{elapsed}{HEADER_SEP}turn {turn}"),
        None => format!("{label}{HEADER_SEP}{elapsed}"),
    }
}
