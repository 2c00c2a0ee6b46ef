//! Length-bounding for commit messages.
//!
//! Commit messages can be arbitrarily long (squash merges routinely carry the
//! full log of every squashed commit). Before a message is rendered into a
//! page it is cut down to a budget measured in **alphanumeric characters**
//! (whitespace and punctuation are free) and marked with a trailing ellipsis.
//!
//! ```text
//! truncate("Fix typo, clarify setup", 10)  →  "Fix typo..."
//!           ^^^ ^^^^                          7 alphanumerics + "..."
//! ```
//!
//! The ellipsis counts against the budget, so a truncated result always holds
//! exactly `max_len - 3` alphanumeric characters.

/// Marker appended to truncated text.
pub const ELLIPSIS: &str = "...";

/// Truncate `text` so it holds at most `max_len` alphanumeric characters,
/// ellipsis included.
///
/// - Text within budget is returned unchanged (including empty text).
/// - Otherwise the longest prefix ending on the `(max_len - 3)`th
///   alphanumeric character is kept and [`ELLIPSIS`] appended.
/// - If no such prefix exists (e.g. `max_len < 3`) the text is returned
///   unchanged rather than producing something misleading.
///
/// Absent text stays absent: map over the `Option` at the call site.
pub fn truncate(text: &str, max_len: usize) -> String {
    if text.is_empty() {
        return String::new();
    }

    let alphanumerics = text.chars().filter(|c| c.is_alphanumeric()).count();
    if alphanumerics <= max_len {
        return text.to_string();
    }

    // The last few characters are never a cut point: cutting there would
    // leave the ellipsis longer than what it replaces.
    let scan_limit = text.chars().count().saturating_sub(ELLIPSIS.len());

    let mut seen = 0;
    for (idx, ch) in text.char_indices().take(scan_limit) {
        if ch.is_alphanumeric() {
            seen += 1;
        }
        if seen + ELLIPSIS.len() == max_len {
            let end = idx + ch.len_utf8();
            return format!("{}{ELLIPSIS}", &text[..end]);
        }
    }

    text.to_string()
}
