//! Text sanitization utilities for cleaning extracted page text
//!
//! These helpers operate on plain text and keep line structure intact,
//! since line-level comparison depends on it.

use regex::Regex;
use std::sync::LazyLock;

// Any whitespace other than a newline
static HORIZONTAL_WS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\S\n]+").expect("Invalid regex pattern"));

/// Sanitize extracted text content
///
/// Applies, in order:
/// 1. Remove zero-width characters
/// 2. Remove control characters (except newline/tab)
/// 3. Collapse horizontal whitespace
/// 4. Trim each line and drop blank lines
///
/// # Examples
///
/// ```
/// use regwatch::parser::sanitize::sanitize_text;
///
/// let dirty = "Forskrift\u{200B}  om\n\n\n  akvakultur  ";
/// assert_eq!(sanitize_text(dirty), "Forskrift om\nakvakultur");
/// ```
pub fn sanitize_text(text: &str) -> String {
    let cleaned = remove_control_chars(&remove_zero_width(text));
    non_blank_lines(&cleaned)
        .map(collapse_whitespace)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Remove zero-width spaces and similar invisible characters
///
/// Removes \u{200B}-\u{200F}, \u{2028}-\u{202F}, \u{2060} and the BOM.
///
/// # Examples
///
/// ```
/// use regwatch::parser::sanitize::remove_zero_width;
///
/// assert_eq!(remove_zero_width("lake\u{200B}lus\u{FEFF}"), "lakelus");
/// ```
pub fn remove_zero_width(text: &str) -> String {
    text.chars()
        .filter(|c| {
            !matches!(*c,
                '\u{200B}'..='\u{200F}' |
                '\u{2028}'..='\u{202F}' |
                '\u{2060}' |
                '\u{FEFF}'
            )
        })
        .collect()
}

/// Remove control characters except newline and tab
///
/// Carriage returns are dropped, so CRLF input behaves like LF input.
pub fn remove_control_chars(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect()
}

/// Collapse runs of whitespace within a line to a single space and trim
///
/// # Examples
///
/// ```
/// use regwatch::parser::sanitize::collapse_whitespace;
///
/// assert_eq!(collapse_whitespace("  rød \t sone\u{A0} "), "rød sone");
/// ```
pub fn collapse_whitespace(line: &str) -> String {
    HORIZONTAL_WS_REGEX.replace_all(line, " ").trim().to_string()
}

/// Iterate over lines that contain something besides whitespace
pub fn non_blank_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines().filter(|line| !line.trim().is_empty())
}

/// Decode HTML entities left in text that did not come through a DOM parser
pub fn decode_entities(text: &str) -> String {
    html_escape::decode_html_entities(text).replace('\u{A0}', " ")
}
