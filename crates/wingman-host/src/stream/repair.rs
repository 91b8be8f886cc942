//! Speculative repair of truncated streaming JSON.

use serde_json::Value;

/// Attempts to recover a usable value from a streamed, possibly incomplete
/// JSON argument chunk.
///
/// First the text is parsed as-is; if that fails it is retried with a closing
/// quote-and-brace appended, which recovers the common case of a chunk
/// truncated inside a string field. Both attempts may legitimately fail,
/// which means "no recoverable value yet", not an error.
pub fn parse_partial_json(text: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str(text) {
        return Some(value);
    }
    serde_json::from_str(&format!("{text}\"}}")).ok()
}
