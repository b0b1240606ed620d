//! LLM client for change summaries
//!
//! This module provides summarization of detected changes using an
//! Ollama-compatible `/api/generate` endpoint. The monitor works without it:
//! any [`SummarizeError`] makes the orchestrator fall back to the analyzer's
//! own summary.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::models::{ActionItem, ChangeSummary, Priority, SummaryOrigin};
use crate::utils::truncate_text;

/// Errors from the summarization service
#[derive(Debug, thiserror::Error)]
pub enum SummarizeError {
    /// Summarization is switched off in configuration
    #[error("summarizer disabled")]
    Disabled,

    /// Request could not be sent or timed out
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Service answered with a non-success status
    #[error("service returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Reply did not contain a usable summary
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Configuration for LLM client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Whether changes are sent for summarization at all
    pub enabled: bool,

    /// Ollama endpoint URL (default: http://localhost:11434)
    pub endpoint: String,

    /// Model name to use
    pub model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Temperature for generation (0.0 - 1.0)
    pub temperature: f32,

    /// Characters of old and new content included in the prompt
    pub max_content_chars: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "http://localhost:11434".to_string(),
            model: "qwen2.5:7b".to_string(),
            timeout_secs: 60,
            max_tokens: 2048,
            temperature: 0.1,
            max_content_chars: 3000,
        }
    }
}

/// Everything the summarizer gets to see about one change
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryRequest {
    pub source_name: String,
    pub source_url: String,
    pub category: String,
    pub old_content: String,
    pub new_content: String,
    /// Analyzer summary of the diff
    pub diff_summary: String,
    pub keywords: Vec<String>,
}

/// Produces a [`ChangeSummary`] for a detected change
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarize one change
    async fn summarize(&self, request: &SummaryRequest) -> Result<ChangeSummary, SummarizeError>;

    /// Name used in logs
    fn name(&self) -> &str {
        "summarizer"
    }
}

/// Ollama generate request
#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    system: &'static str,
    prompt: String,
    stream: bool,
    options: OllamaOptions,
}

/// Ollama generation options
#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

/// Ollama generate response
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

/// Summary as the model is asked to write it
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ModelSummary {
    title: String,
    #[serde(alias = "summary_no")]
    narrative: String,
    #[serde(alias = "summary_en")]
    narrative_en: String,
    who_affected: Vec<String>,
    action_items: Vec<ModelActionItem>,
    deadlines: Vec<serde_json::Value>,
    priority: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ModelActionItem {
    action: String,
    deadline: Option<String>,
    priority: Option<String>,
}

impl ModelSummary {
    fn into_summary(self) -> Result<ChangeSummary, SummarizeError> {
        if self.title.trim().is_empty() {
            return Err(SummarizeError::InvalidResponse(
                "summary has no title".to_string(),
            ));
        }

        let action_items = self
            .action_items
            .into_iter()
            .filter(|item| !item.action.trim().is_empty())
            .map(|item| ActionItem {
                action: item.action,
                deadline: item.deadline.filter(|d| !d.trim().is_empty()),
                priority: item.priority.as_deref().and_then(Priority::parse),
            })
            .collect();

        // Deadlines come back either as strings or as {date, description}
        let deadlines = self
            .deadlines
            .into_iter()
            .filter_map(|d| match d {
                serde_json::Value::String(s) => Some(s),
                serde_json::Value::Object(map) => {
                    let date = map.get("date").and_then(|v| v.as_str())?;
                    Some(match map.get("description").and_then(|v| v.as_str()) {
                        Some(description) => format!("{date}: {description}"),
                        None => date.to_string(),
                    })
                }
                _ => None,
            })
            .collect();

        Ok(ChangeSummary {
            title: truncate_text(self.title.trim(), 120),
            narrative: self.narrative,
            narrative_en: self.narrative_en,
            who_affected: self.who_affected,
            action_items,
            deadlines,
            priority_hint: self.priority.as_deref().and_then(Priority::parse),
            origin: SummaryOrigin::Service,
        })
    }
}

const SYSTEM_PROMPT: &str = "Du er ekspert på norsk akvakulturregulering \
(Fiskeridirektoratet, Mattilsynet, Miljødirektoratet, Lovdata). \
Beskriv endringer presist og praktisk: eksakte tall, hvem som påvirkes, \
konkrete handlinger og frister. Svar KUN med JSON.";

const OUTPUT_SCHEMA: &str = r#"{
  "title": "Kort tittel på norsk (maks 80 tegn)",
  "summary_no": "2-3 setninger på norsk med konkrete tall",
  "summary_en": "The same summary in English",
  "who_affected": ["Hvem som påvirkes"],
  "action_items": [{"action": "Handling", "deadline": "YYYY-MM-DD eller null", "priority": "critical/high/medium/low"}],
  "deadlines": [{"date": "YYYY-MM-DD", "description": "Hva fristen gjelder"}],
  "priority": "critical/high/medium/low"
}"#;

/// Summarizer backed by an Ollama-compatible text generation service
pub struct LlmSummarizer {
    client: Client,
    config: LlmConfig,
}

impl LlmSummarizer {
    /// Create a summarizer from configuration
    ///
    /// # Errors
    ///
    /// Returns `SummarizeError::Disabled` when summarization is switched off.
    pub fn new(config: LlmConfig) -> Result<Self, SummarizeError> {
        if !config.enabled {
            return Err(SummarizeError::Disabled);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;

        Ok(Self { client, config })
    }

    /// Build the prompt for one change
    fn build_prompt(&self, request: &SummaryRequest) -> String {
        let max = self.config.max_content_chars;
        let keywords = if request.keywords.is_empty() {
            "Ingen spesifikke".to_string()
        } else {
            request.keywords.join(", ")
        };

        format!(
            "Analyser følgende endring fra norske myndigheter.\n\n\
             === KILDE ===\nNavn: {name}\nURL: {url}\nKategori: {category}\n\n\
             === NØKKELORD ===\n{keywords}\n\n\
             === ENDRINGER ===\n{diff}\n\n\
             === TIDLIGERE INNHOLD ===\n{old}\n\n\
             === NYTT INNHOLD ===\n{new}\n\n\
             Svar UTELUKKENDE i dette JSON-formatet:\n{schema}\n\nJSON:",
            name = request.source_name,
            url = request.source_url,
            category = request.category,
            diff = request.diff_summary,
            old = truncate_text(&request.old_content, max),
            new = truncate_text(&request.new_content, max),
            schema = OUTPUT_SCHEMA,
        )
    }

    /// Generate text using Ollama
    async fn generate(&self, prompt: String) -> Result<String, SummarizeError> {
        let url = format!("{}/api/generate", self.config.endpoint.trim_end_matches('/'));

        let request = OllamaRequest {
            model: &self.config.model,
            system: SYSTEM_PROMPT,
            prompt,
            stream: false,
            options: OllamaOptions {
                temperature: self.config.temperature,
                num_predict: self.config.max_tokens,
            },
        };

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SummarizeError::Status { status, body });
        }

        let ollama_response: OllamaResponse = response.json().await?;
        Ok(ollama_response.response)
    }
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(&self, request: &SummaryRequest) -> Result<ChangeSummary, SummarizeError> {
        let reply = self.generate(self.build_prompt(request)).await?;
        let summary = parse_summary(&reply)?;

        tracing::debug!(
            source = %request.source_name,
            title = %summary.title,
            "Summary generated"
        );
        Ok(summary)
    }

    fn name(&self) -> &str {
        "llm"
    }
}

/// Parse a model reply into a [`ChangeSummary`]
pub fn parse_summary(reply: &str) -> Result<ChangeSummary, SummarizeError> {
    let json = extract_json(reply);
    let parsed: ModelSummary = serde_json::from_str(json).map_err(|e| {
        SummarizeError::InvalidResponse(format!(
            "{e}; reply starts with: {}",
            truncate_text(reply, 200)
        ))
    })?;
    parsed.into_summary()
}

/// Extract JSON from markdown code blocks or raw text
pub fn extract_json(text: &str) -> &str {
    // Try to find JSON in code block
    if let Some(start) = text.find("```json") {
        let body = &text[start + 7..];
        if let Some(end) = body.find("```") {
            return body[..end].trim();
        }
    }

    // Try to find JSON in generic code block
    if let Some(start) = text.find("```") {
        let after_start = &text[start + 3..];
        // Skip language identifier if present
        let content_start = after_start.find('\n').map_or(0, |i| i + 1);
        if let Some(end) = after_start[content_start..].find("```") {
            return after_start[content_start..content_start + end].trim();
        }
    }

    // Try to find raw JSON object
    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if end > start {
            return &text[start..=end];
        }
    }

    text.trim()
}
