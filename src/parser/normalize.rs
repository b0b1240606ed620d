//! Volatile-content normalization
//!
//! Pages change cosmetically all the time: "updated 5 minutes ago", hit
//! counters, publication timestamps. [`Normalizer`] replaces those substrings
//! with fixed placeholders so that two fetches of an unchanged page hash
//! identically.
//!
//! Placeholders contain no digits, and every built-in pattern requires one,
//! so `normalize(normalize(x)) == normalize(x)`.

use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::LazyLock;

use super::sanitize::{collapse_whitespace, remove_control_chars, remove_zero_width};

// ============================================================================
// Built-in patterns
// ============================================================================

static ISO_DATETIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b\d{4}-\d{2}-\d{2}(?:[T ]\d{2}:\d{2}(?::\d{2}(?:\.\d+)?)?(?:Z|[+-]\d{2}:?\d{2})?)?\b",
    )
    .expect("Invalid regex pattern")
});

static NUMERIC_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d{1,2}[./]\d{1,2}[./](?:\d{4}|\d{2})\b").expect("Invalid regex pattern")
});

static SPELLED_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)\b\d{1,2}\.?\s+",
        r"(?:januar|februar|mars|april|mai|juni|juli|august|september|oktober|november|desember",
        r"|january|february|march|may|june|july|october|december",
        r"|jan|feb|mar|apr|jun|jul|aug|sept|sep|okt|oct|nov|des|dec)\.?",
        r"(?:\s+\d{4})?\b"
    ))
    .expect("Invalid regex pattern")
});

static CLOCK_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bkl\.?\s*\d{1,2}[:.]\d{2}\b").expect("Invalid regex pattern")
});

static BARE_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d{1,2}:\d{2}(?::\d{2})?\b").expect("Invalid regex pattern")
});

static RELATIVE_AGO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)\b(?:(?:sist\s+)?(?:oppdatert|publisert|endret|updated|published|modified)\s+(?:for\s+)?)?",
        r"\d+\s+",
        r"(?:sekunder|sekund|minutter|minutt|timer|time|dager|dag|uker|uke|måneder|måned",
        r"|seconds|second|minutes|minute|hours|hour|days|day|weeks|week|months|month|min)",
        r"\s+(?:siden|ago)\b"
    ))
    .expect("Invalid regex pattern")
});

static RESULT_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(viser|showing)\s+\d+\s*[-–]\s*\d+\s+(av|of)\s+\d+(?:[ \u{A0}]\d{3})*\b")
        .expect("Invalid regex pattern")
});

static HIT_COUNTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)\b\d+(?:[ \u{A0}]\d{3})*\s*",
        r"(treff|resultater|resultat|results|result|hits|hit|visninger|views|view|dokumenter|documents)\b"
    ))
    .expect("Invalid regex pattern")
});

/// Placeholder written for dates
pub const DATE_PLACEHOLDER: &str = "{date}";
/// Placeholder written for clock times
pub const TIME_PLACEHOLDER: &str = "{time}";
/// Placeholder written for relative "... ago" phrases
pub const AGO_PLACEHOLDER: &str = "{ago}";

// ============================================================================
// Normalizer
// ============================================================================

/// Deterministic, idempotent text normalizer
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    /// Operator-supplied patterns; matches are deleted
    extra: Vec<Regex>,
}

impl Normalizer {
    /// Normalizer with only the built-in patterns
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalizer with additional patterns whose matches are removed
    pub fn with_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Self, regex::Error> {
        let extra = patterns
            .iter()
            .map(|p| Regex::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { extra })
    }

    /// Replace volatile substrings and collapse whitespace, keeping line breaks
    pub fn normalize(&self, text: &str) -> String {
        let cleaned = remove_control_chars(&remove_zero_width(text));

        cleaned
            .lines()
            .map(|line| self.normalize_line(line))
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// SHA-256 hex digest of the normalized text
    pub fn content_hash(&self, text: &str) -> String {
        hash_text(&self.normalize(text))
    }

    fn normalize_line(&self, line: &str) -> String {
        let mut out = ISO_DATETIME.replace_all(line, DATE_PLACEHOLDER).into_owned();
        out = NUMERIC_DATE.replace_all(&out, DATE_PLACEHOLDER).into_owned();
        out = SPELLED_DATE.replace_all(&out, DATE_PLACEHOLDER).into_owned();
        out = CLOCK_TIME.replace_all(&out, "kl. {time}").into_owned();
        out = BARE_TIME.replace_all(&out, TIME_PLACEHOLDER).into_owned();
        out = RELATIVE_AGO.replace_all(&out, AGO_PLACEHOLDER).into_owned();
        out = RESULT_RANGE.replace_all(&out, "$1 {range}").into_owned();
        out = HIT_COUNTER.replace_all(&out, "{n} $1").into_owned();

        for pattern in &self.extra {
            out = pattern.replace_all(&out, "").into_owned();
        }

        collapse_whitespace(&out)
    }
}

/// SHA-256 hex digest of already-normalized text
pub fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
