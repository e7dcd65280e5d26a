pub mod events;
pub mod identity;
pub mod models;

/// Longest chat text accepted, in characters. Longer text is cut, not rejected.
pub const MAX_TEXT_CHARS: usize = 5_000;

/// Longest shared-notes document, in characters.
pub const MAX_NOTES_CHARS: usize = 50_000;

/// Number of most recent messages returned as history.
pub const HISTORY_LIMIT: usize = 100;

/// Truncate `s` to at most `max` characters (not bytes).
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Current wall-clock time as epoch milliseconds.
pub fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}
