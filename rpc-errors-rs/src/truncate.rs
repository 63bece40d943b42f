//! Length bounds for text sent over the wire.
//!
//! Lengths are counted in characters, not bytes, so a cut never splits a
//! UTF-8 sequence.

use std::borrow::Cow;

/// Maximum length of a status message
pub const MAX_MESSAGE_LENGTH: usize = 2048;

const ELLIPSIS: &str = "...";

/// Shortens `text` to at most `max` characters, replacing the tail with
/// `...` when anything was cut.
pub fn abbreviate(text: &str, max: usize) -> Cow<'_, str> {
    if text.chars().count() <= max {
        return Cow::Borrowed(text);
    }
    if max < ELLIPSIS.len() + 1 {
        return truncate(text, max);
    }
    let keep = max - ELLIPSIS.len();
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(ELLIPSIS);
    Cow::Owned(out)
}

/// Cuts `text` to at most `max` characters
pub fn truncate(text: &str, max: usize) -> Cow<'_, str> {
    match text.char_indices().nth(max) {
        Some((end, _)) => Cow::Borrowed(&text[..end]),
        None => Cow::Borrowed(text),
    }
}
