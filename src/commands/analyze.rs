use anyhow::{Context, Result};
use std::path::PathBuf;

use regwatch::analytics::ChangeAnalyzer;
use regwatch::config::Config;
use regwatch::models::Priority;

/// Compare two local text files with the configured analyzer
pub async fn analyze(config: Config, old: PathBuf, new: PathBuf, json: bool) -> Result<()> {
    let old_text = std::fs::read_to_string(&old)
        .with_context(|| format!("Failed to read {}", old.display()))?;
    let new_text = std::fs::read_to_string(&new)
        .with_context(|| format!("Failed to read {}", new.display()))?;

    let analyzer = ChangeAnalyzer::new(
        config.normalizer()?,
        config.keyword_lexicon()?,
        config.analyzer_config(),
    );
    let analysis = analyzer.analyze(&old_text, &new_text);

    if json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
        return Ok(());
    }

    println!("Change Analysis");
    println!("===============");
    println!("Changed: {}", analysis.has_changes);
    if analysis.noise_only {
        println!("Only volatile content differs");
    }
    println!("Change: {:.2}%", analysis.change_percent);
    println!("Significant: {}", analysis.significant);
    println!(
        "Priority (from medium base): {}",
        analysis.classify_priority(Priority::Medium).as_str()
    );
    if !analysis.keywords.is_empty() {
        println!("Keywords: {}", analysis.keywords.join(", "));
    }
    if !analysis.hard_triggers.is_empty() {
        println!("Hard triggers: {}", analysis.hard_triggers.join(", "));
    }
    println!("Summary: {}", analysis.summary);
    for section in &analysis.modified_sections {
        println!(
            "  {:?} {} (sections {}..{} -> {}..{})",
            section.change,
            section.section,
            section.old_range.0,
            section.old_range.1,
            section.new_range.0,
            section.new_range.1
        );
    }

    if !analysis.diff_text.is_empty() {
        println!("\n{}", analysis.diff_text);
    }

    Ok(())
}
