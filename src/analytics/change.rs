//! Change analysis between two versions of a page
//!
//! [`ChangeAnalyzer::analyze`] compares the stored text of a source with the
//! freshly fetched one and decides whether the difference is substantive.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;
use uuid::Uuid;

use super::lexicon::KeywordLexicon;
use super::similarity::{line_ratio, unified_diff, OpTag, SequenceMatcher};
use crate::models::{
    ChangeRecord, ChangeSummary, ModifiedSection, Priority, SectionChange, Snapshot, Source,
};
use crate::parser::Normalizer;
use crate::utils::take_chars;

pub const NO_CHANGES_SUMMARY: &str = "No changes detected.";
pub const NOISE_ONLY_SUMMARY: &str = "Only formatting/timestamp changes (no substantive updates).";
pub const UNKNOWN_SECTION: &str = "Unknown section";

// Markdown headings, "Label:" lines and numbered paragraphs open a section
static SECTION_HEADER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(#{1,4}|[A-ZÆØÅ][a-zæøå]+:|\d+\.\s)").expect("Invalid regex pattern")
});

/// Tunables for change analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Minimum change percentage that is significant without keyword hits
    pub min_change_threshold: f64,
    /// Context lines around each hunk of the unified diff
    pub context_lines: usize,
    /// Cap on stored added/removed lines per record
    pub max_lines: usize,
    /// Cap on stored diff characters per record
    pub max_diff_chars: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            min_change_threshold: 1.0,
            context_lines: 3,
            max_lines: 50,
            max_diff_chars: 10_000,
        }
    }
}

/// Result of comparing two texts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeAnalysis {
    pub has_changes: bool,
    /// Texts differ, but only in volatile content
    pub noise_only: bool,
    pub change_percent: f64,
    pub added_lines: Vec<String>,
    pub removed_lines: Vec<String>,
    pub diff_text: String,
    pub keywords: Vec<String>,
    pub hard_triggers: Vec<String>,
    pub modified_sections: Vec<ModifiedSection>,
    pub significant: bool,
    pub summary: String,
}

impl ChangeAnalysis {
    fn unchanged(noise_only: bool) -> Self {
        Self {
            has_changes: false,
            noise_only,
            change_percent: 0.0,
            added_lines: Vec::new(),
            removed_lines: Vec::new(),
            diff_text: String::new(),
            keywords: Vec::new(),
            hard_triggers: Vec::new(),
            modified_sections: Vec::new(),
            significant: false,
            summary: if noise_only {
                NOISE_ONLY_SUMMARY
            } else {
                NO_CHANGES_SUMMARY
            }
            .to_string(),
        }
    }

    /// Priority of the change, never below the source's base priority
    ///
    /// A hard trigger or a major rewrite (>= 50%) escalates to at least high,
    /// a keyword hit to at least medium.
    pub fn classify_priority(&self, base: Priority) -> Priority {
        let signal = if !self.hard_triggers.is_empty() || self.change_percent >= 50.0 {
            Priority::High
        } else if !self.keywords.is_empty() {
            Priority::Medium
        } else {
            Priority::Low
        };
        base.max(signal)
    }
}

/// Percentage of lines that differ, rounded to two decimals
///
/// `0` when both sides are empty, `100` when only the old side is.
pub fn change_percent(old_lines: &[&str], new_lines: &[&str]) -> f64 {
    if old_lines.is_empty() && new_lines.is_empty() {
        return 0.0;
    }
    if old_lines.is_empty() {
        return 100.0;
    }
    let ratio = line_ratio(old_lines, new_lines);
    ((1.0 - ratio) * 100.0 * 100.0).round() / 100.0
}

/// Human summary assembled from the magnitude and the line/keyword counts
pub fn describe_change(
    added: usize,
    removed: usize,
    keywords: &[String],
    change_percent: f64,
) -> String {
    let mut parts = Vec::new();

    parts.push(if change_percent >= 50.0 {
        "Major changes detected (>50% of content modified)".to_string()
    } else if change_percent >= 20.0 {
        format!("Significant changes detected ({change_percent:?}% modified)")
    } else if change_percent >= 5.0 {
        format!("Moderate changes detected ({change_percent:?}% modified)")
    } else {
        format!("Minor changes detected ({change_percent:?}% modified)")
    });

    if !keywords.is_empty() {
        let shown: Vec<&str> = keywords.iter().take(5).map(String::as_str).collect();
        parts.push(format!("Keywords found: {}", shown.join(", ")));
    }
    if added > 0 {
        parts.push(format!("Added {added} new lines/items"));
    }
    if removed > 0 {
        parts.push(format!("Removed {removed} lines/items"));
    }

    format!("{}.", parts.join(". "))
}

/// Split `text` into sections, each starting at a heading line
///
/// Lines before the first heading form their own section.
fn split_sections(text: &str) -> Vec<String> {
    let mut sections: Vec<String> = Vec::new();
    let mut current = String::new();
    for line in text.lines() {
        if SECTION_HEADER_REGEX.is_match(line) && !current.is_empty() {
            sections.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(line);
    }
    if !current.is_empty() {
        sections.push(current);
    }
    sections
}

/// Sections that were replaced, deleted or inserted between two versions
///
/// Each entry is named after the first line of the section at the start of
/// its new range, or [`UNKNOWN_SECTION`] when there is none.
pub fn modified_sections(old: &str, new: &str) -> Vec<ModifiedSection> {
    let old_sections = split_sections(old);
    let new_sections = split_sections(new);

    SequenceMatcher::new(&old_sections, &new_sections)
        .opcodes()
        .into_iter()
        .filter_map(|op| {
            let change = match op.tag {
                OpTag::Equal => return None,
                OpTag::Replace => SectionChange::Replace,
                OpTag::Delete => SectionChange::Delete,
                OpTag::Insert => SectionChange::Insert,
            };
            let section = new_sections
                .get(op.b_start)
                .and_then(|s| s.lines().next())
                .map(|line| take_chars(line.trim(), 100))
                .filter(|line| !line.is_empty())
                .unwrap_or_else(|| UNKNOWN_SECTION.to_string());
            Some(ModifiedSection {
                change,
                section,
                old_range: (op.a_start, op.a_end),
                new_range: (op.b_start, op.b_end),
            })
        })
        .collect()
}

/// Trimmed, non-empty lines of `text` absent from `other`, first occurrence order
fn line_difference(text: &str, other: &str) -> Vec<String> {
    let exclude: HashSet<&str> = other.lines().map(str::trim).collect();
    let mut seen = HashSet::new();
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !exclude.contains(line) && seen.insert(*line))
        .map(String::from)
        .collect()
}

/// Compares text versions using a normalizer and a keyword lexicon
#[derive(Debug, Clone)]
pub struct ChangeAnalyzer {
    normalizer: Normalizer,
    lexicon: KeywordLexicon,
    config: AnalyzerConfig,
}

impl ChangeAnalyzer {
    pub fn new(normalizer: Normalizer, lexicon: KeywordLexicon, config: AnalyzerConfig) -> Self {
        Self {
            normalizer,
            lexicon,
            config,
        }
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Compare `old` with `new`
    pub fn analyze(&self, old: &str, new: &str) -> ChangeAnalysis {
        if old == new {
            return ChangeAnalysis::unchanged(false);
        }

        let old_normalized = self.normalizer.normalize(old);
        let new_normalized = self.normalizer.normalize(new);
        if old_normalized == new_normalized {
            return ChangeAnalysis::unchanged(true);
        }

        let old_lines: Vec<&str> = old_normalized.lines().collect();
        let new_lines: Vec<&str> = new_normalized.lines().collect();
        let change_percent = change_percent(&old_lines, &new_lines);

        let added_lines = line_difference(new, old);
        let removed_lines = line_difference(old, new);

        let raw_old: Vec<&str> = old.lines().collect();
        let raw_new: Vec<&str> = new.lines().collect();
        let diff_text = unified_diff(
            &raw_old,
            &raw_new,
            "Previous",
            "Current",
            self.config.context_lines,
        );

        let changed_text = added_lines.join("\n");
        let keywords = self.lexicon.scan(&changed_text);
        let hard_triggers = self.lexicon.hard_trigger_hits(&changed_text);
        let modified_sections = modified_sections(old, new);

        let significant = change_percent >= self.config.min_change_threshold
            || !keywords.is_empty()
            || !hard_triggers.is_empty();

        let summary = describe_change(
            added_lines.len(),
            removed_lines.len(),
            &keywords,
            change_percent,
        );

        ChangeAnalysis {
            has_changes: true,
            noise_only: false,
            change_percent,
            added_lines,
            removed_lines,
            diff_text,
            keywords,
            hard_triggers,
            modified_sections,
            significant,
            summary,
        }
    }

    /// Persistable record for an analysis, with stored lists capped
    pub fn build_record(
        &self,
        source: &Source,
        previous: Option<&Snapshot>,
        analysis: &ChangeAnalysis,
        summary: ChangeSummary,
        detected_at: DateTime<Utc>,
    ) -> ChangeRecord {
        let priority = summary
            .priority_hint
            .unwrap_or_else(|| analysis.classify_priority(source.priority));

        ChangeRecord {
            id: Uuid::new_v4().to_string(),
            source_id: source.id.clone(),
            source_name: source.name.clone(),
            source_url: source.url.clone(),
            category: source.category.clone(),
            previous_snapshot_id: previous.map(|s| s.id),
            current_snapshot_id: None,
            change_percent: analysis.change_percent,
            added_lines: analysis
                .added_lines
                .iter()
                .take(self.config.max_lines)
                .cloned()
                .collect(),
            removed_lines: analysis
                .removed_lines
                .iter()
                .take(self.config.max_lines)
                .cloned()
                .collect(),
            diff_text: take_chars(&analysis.diff_text, self.config.max_diff_chars),
            keywords: analysis.keywords.clone(),
            modified_sections: analysis
                .modified_sections
                .iter()
                .take(self.config.max_lines)
                .cloned()
                .collect(),
            priority,
            significant: analysis.significant,
            summary,
            detected_at,
        }
    }
}

impl Default for ChangeAnalyzer {
    fn default() -> Self {
        Self::new(
            Normalizer::new(),
            KeywordLexicon::default(),
            AnalyzerConfig::default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_text() {
        let analysis = ChangeAnalyzer::default().analyze("Regelverk\ngrense 0.5", "Regelverk\ngrense 0.5");
        assert!(!analysis.has_changes);
        assert!(!analysis.noise_only);
        assert_eq!(analysis.summary, NO_CHANGES_SUMMARY);
    }

    #[test]
    fn test_noise_only() {
        let analysis = ChangeAnalyzer::default().analyze(
            "Regelverk\nSist oppdatert 01.02.2026",
            "Regelverk\nSist oppdatert 02.02.2026",
        );
        assert!(!analysis.has_changes);
        assert!(analysis.noise_only);
        assert!(!analysis.significant);
        assert_eq!(analysis.summary, NOISE_ONLY_SUMMARY);
    }

    #[test]
    fn test_change_percent_bounds() {
        assert_eq!(change_percent(&[], &[]), 0.0);
        assert_eq!(change_percent(&[], &["a"]), 100.0);
        assert_eq!(change_percent(&["a"], &["a"]), 0.0);
        assert_eq!(change_percent(&["a", "b", "c"], &["a", "b", "x"]), 33.33);
    }

    #[test]
    fn test_added_and_removed_lines() {
        let analysis = ChangeAnalyzer::default().analyze(
            "Tittel\nGammel regel\n\nFelles",
            "Tittel\nFelles\nNy regel\nNy regel",
        );
        assert_eq!(analysis.added_lines, vec!["Ny regel"]);
        assert_eq!(analysis.removed_lines, vec!["Gammel regel"]);
        assert!(analysis.diff_text.starts_with("--- Previous\n+++ Current\n"));
    }

    #[test]
    fn test_keywords_only_from_added_lines() {
        let analysis = ChangeAnalyzer::default().analyze(
            "Forskrift om akvakultur\nside 1",
            "Forskrift om akvakultur\nside 2",
        );
        assert!(analysis.has_changes);
        assert!(analysis.keywords.is_empty());
        assert!(analysis.hard_triggers.is_empty());
    }

    #[test]
    fn test_summary_buckets() {
        assert_eq!(
            describe_change(2, 1, &["forskrift (regulation)".into()], 75.0),
            "Major changes detected (>50% of content modified). Keywords found: forskrift (regulation). Added 2 new lines/items. Removed 1 lines/items."
        );
        assert_eq!(
            describe_change(0, 0, &[], 25.5),
            "Significant changes detected (25.5% modified)."
        );
        assert_eq!(
            describe_change(1, 0, &[], 5.0),
            "Moderate changes detected (5.0% modified). Added 1 new lines/items."
        );
        assert_eq!(describe_change(0, 1, &[], 0.5), "Minor changes detected (0.5% modified). Removed 1 lines/items.");
    }

    #[test]
    fn test_summary_lists_at_most_five_keywords() {
        let keywords: Vec<String> = (0..7).map(|i| format!("k{i}")).collect();
        let summary = describe_change(0, 0, &keywords, 10.0);
        assert!(summary.contains("k0, k1, k2, k3, k4."));
        assert!(!summary.contains("k5"));
    }

    #[test]
    fn test_empty_old_is_total_change() {
        let analysis = ChangeAnalyzer::default().analyze("", "Ny side");
        assert_eq!(analysis.change_percent, 100.0);
        assert!(analysis.significant);
    }

    #[test]
    fn test_priority_classification() {
        let analyzer = ChangeAnalyzer::default();

        let trigger = analyzer.analyze("a\nb\nc\nd\ne", "a\nb\nc\nd\ne\nstenging");
        assert_eq!(trigger.classify_priority(Priority::Low), Priority::High);

        let keyword = analyzer.analyze(
            "a\nb\nc\nd\ne\nf\ng\nh\ni\nj",
            "a\nb\nc\nd\ne\nf\ng\nh\ni\nj\nny søknad",
        );
        assert!(keyword.change_percent < 50.0);
        assert_eq!(keyword.classify_priority(Priority::Low), Priority::Medium);
        assert_eq!(keyword.classify_priority(Priority::Critical), Priority::Critical);
    }

    #[test]
    fn test_split_sections_on_headings() {
        let text = "Innledning\n# Kapittel 1\ntekst\nFrist: 1. mars\n2. Krav\nmer";
        assert_eq!(
            split_sections(text),
            vec!["Innledning", "# Kapittel 1\ntekst", "Frist: 1. mars", "2. Krav\nmer"]
        );
        assert!(split_sections("").is_empty());
    }

    #[test]
    fn test_modified_sections() {
        let old = "# Kapittel 1\ngrense 0.5\n# Kapittel 2\nuendret\n# Kapittel 3\nfjernes";
        let new = "# Kapittel 1\ngrense 0.25\n# Kapittel 2\nuendret\n# Kapittel 4\nny";

        let sections = modified_sections(old, new);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].change, SectionChange::Replace);
        assert_eq!(sections[0].section, "# Kapittel 1");
        assert_eq!(sections[0].old_range, (0, 1));
        assert_eq!(sections[0].new_range, (0, 1));
        assert_eq!(sections[1].section, "# Kapittel 4");
        assert_eq!(sections[1].old_range, (2, 3));
    }

    #[test]
    fn test_deleted_trailing_section_is_unknown() {
        let sections = modified_sections("# A\nx\n# B\ny", "# A\nx");
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].change, SectionChange::Delete);
        assert_eq!(sections[0].section, UNKNOWN_SECTION);
        assert_eq!(sections[0].new_range, (1, 1));
    }

    #[test]
    fn test_analysis_carries_sections() {
        let analysis = ChangeAnalyzer::default().analyze(
            "1. Formål\nGammel tekst",
            "1. Formål\nGammel tekst\n2. Virkeområde\nNy tekst",
        );
        assert_eq!(analysis.modified_sections.len(), 1);
        assert_eq!(analysis.modified_sections[0].change, SectionChange::Insert);
        assert_eq!(analysis.modified_sections[0].section, "2. Virkeområde");
    }

    #[test]
    fn test_record_caps() {
        let analyzer = ChangeAnalyzer::new(
            Normalizer::new(),
            KeywordLexicon::default(),
            AnalyzerConfig {
                max_lines: 2,
                max_diff_chars: 20,
                ..Default::default()
            },
        );
        let analysis = analyzer.analyze("x", "a\nb\nc\nd");
        let source = Source::new("s1", "Kilde", "https://example.no", "regulations");
        let record = analyzer.build_record(
            &source,
            None,
            &analysis,
            ChangeSummary::fallback("Kilde", &analysis.summary),
            Utc::now(),
        );
        assert_eq!(record.added_lines.len(), 2);
        assert_eq!(record.diff_text.chars().count(), 20);
        assert_eq!(record.priority, Priority::High);
        assert_eq!(record.previous_snapshot_id, None);
    }
}
