//! Change analysis: line similarity, keyword lexicon and significance scoring

pub mod change;
pub mod lexicon;
pub mod similarity;

pub use change::{
    change_percent, describe_change, modified_sections, AnalyzerConfig, ChangeAnalysis,
    ChangeAnalyzer, NOISE_ONLY_SUMMARY, NO_CHANGES_SUMMARY, UNKNOWN_SECTION,
};
pub use lexicon::{KeywordLexicon, LexiconConfig, LexiconTerm};
pub use similarity::{line_ratio, unified_diff, SequenceMatcher};
