//! Common utilities and helper functions
//!
//! This module provides shared utilities used across the application.

pub mod error;
pub mod retry;

use encoding_rs::{Encoding, UTF_8};

/// Decode a response body using the charset label from its `Content-Type`
///
/// Unknown or missing labels fall back to UTF-8; malformed sequences are
/// replaced rather than rejected.
pub fn decode_body(bytes: &[u8], content_type: Option<&str>) -> String {
    let encoding = content_type
        .and_then(charset_label)
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .unwrap_or(UTF_8);

    let (cow, _encoding, _had_errors) = encoding.decode(bytes);
    cow.into_owned()
}

fn charset_label(content_type: &str) -> Option<String> {
    content_type.split(';').find_map(|part| {
        let (key, value) = part.trim().split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"').to_string())
    })
}

/// First `max_chars` characters of `text`, on a char boundary
pub fn take_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Truncate text to a maximum number of characters, marking the cut
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let truncated = take_chars(text, max_chars.saturating_sub(3));
        format!("{truncated}...")
    }
}
