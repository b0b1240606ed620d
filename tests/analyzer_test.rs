//! Change analysis tests: detection scenarios and noise invariance

use proptest::prelude::*;
use regwatch::analytics::{ChangeAnalyzer, NOISE_ONLY_SUMMARY, NO_CHANGES_SUMMARY};
use regwatch::models::Priority;
use regwatch::parser::Normalizer;

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_identical_text_has_no_changes() {
    let analyzer = ChangeAnalyzer::default();
    let text = "Forskrift om drift av akvakulturanlegg\n§ 1 Formål";

    let analysis = analyzer.analyze(text, text);

    assert!(!analysis.has_changes);
    assert!(!analysis.noise_only);
    assert!(!analysis.significant);
    assert_eq!(analysis.change_percent, 0.0);
    assert_eq!(analysis.summary, NO_CHANGES_SUMMARY);
}

#[test]
fn test_date_only_difference_is_noise() {
    let analyzer = ChangeAnalyzer::default();

    let analysis = analyzer.analyze(
        "Sist oppdatert 12.03.2024\ngrense 0.5",
        "Sist oppdatert 19.03.2024\ngrense 0.5",
    );

    assert!(!analysis.has_changes);
    assert!(analysis.noise_only);
    assert!(analysis.added_lines.is_empty());
    assert_eq!(analysis.summary, NOISE_ONLY_SUMMARY);
}

#[test]
fn test_regulation_amendment_is_significant() {
    let analyzer = ChangeAnalyzer::default();

    let analysis = analyzer.analyze("grense 0.5", "ny forskrift: grense 0.25, bot 1000000");

    assert!(analysis.has_changes);
    assert!(analysis.significant);
    assert!(analysis.change_percent > 0.0);
    assert!(
        analysis.keywords.iter().any(|k| k.starts_with("forskrift")),
        "keywords: {:?}",
        analysis.keywords
    );
    assert!(analysis.hard_triggers.contains(&"forskrift".to_string()));
    assert_eq!(analysis.classify_priority(Priority::Low), Priority::High);
    assert!(analysis.diff_text.contains("-grense 0.5"));
    assert!(analysis.diff_text.contains("+ny forskrift: grense 0.25, bot 1000000"));
}

#[test]
fn test_whole_word_terms_do_not_match_inside_words() {
    let analyzer = ChangeAnalyzer::default();

    // "bot" is whole-word only, "robot" must not trigger it
    let analysis = analyzer.analyze("Nyheter", "Nyheter\nNy robotteknologi");

    assert!(analysis.has_changes);
    assert!(!analysis.keywords.iter().any(|k| k.starts_with("bot ")));
    assert!(analysis.hard_triggers.is_empty());
}

#[test]
fn test_small_edit_without_keywords_below_threshold() {
    let analyzer = ChangeAnalyzer::default();
    let old: Vec<String> = (0..200).map(|i| format!("linje {i} tekst")).collect();
    let mut new = old.clone();
    new[100] = "linje hundre tekst".to_string();

    let analysis = analyzer.analyze(&old.join("\n"), &new.join("\n"));

    assert!(analysis.has_changes);
    assert!(analysis.change_percent < 1.0);
    assert!(analysis.keywords.is_empty());
    assert!(!analysis.significant);
}

// ============================================================================
// Noise invariance
// ============================================================================

fn date() -> impl Strategy<Value = String> {
    (1u32..=28, 1u32..=12, 2000u32..=2030).prop_map(|(d, m, y)| format!("{d:02}.{m:02}.{y}"))
}

fn time() -> impl Strategy<Value = String> {
    (0u32..24, 0u32..60).prop_map(|(h, m)| format!("kl. {h:02}:{m:02}"))
}

proptest! {
    #[test]
    fn prop_dates_and_times_do_not_change_hash(
        d1 in date(), d2 in date(), t1 in time(), t2 in time(), views in 0u32..100_000
    ) {
        let normalizer = Normalizer::new();
        let a = format!("Publisert {d1} {t1}\nGrense for lakselus 0.5\n{views} visninger");
        let b = format!("Publisert {d2} {t2}\nGrense for lakselus 0.5\n{} visninger", views + 7);

        prop_assert_eq!(normalizer.content_hash(&a), normalizer.content_hash(&b));

        let analysis = ChangeAnalyzer::default().analyze(&a, &b);
        prop_assert!(!analysis.has_changes);
    }

    #[test]
    fn prop_change_percent_in_range(
        old in prop::collection::vec("[a-z ]{1,20}", 0..30),
        new in prop::collection::vec("[a-z ]{1,20}", 0..30),
    ) {
        let analysis = ChangeAnalyzer::default().analyze(&old.join("\n"), &new.join("\n"));
        prop_assert!((0.0..=100.0).contains(&analysis.change_percent));
    }
}
