//! Summarization collaborator
//!
//! Talks to a local LLM server (Ollama-compatible) over HTTP. Summarization
//! runs inside batched maintenance, so the timeout is generous and one failed
//! document defers to the next cycle rather than failing the batch.

use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{GravityError, Result};

/// Sentinel prefix marking a failed summarization artifact.
///
/// The trait signals failure through `Err`, but artifacts written by earlier
/// tooling may carry this marker in their body; anything starting with it is
/// treated as a failure, never as content.
pub const FAILURE_MARKER: &str = "[SUMMARY-FAILED]";

/// What kind of distillation to ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryMode {
    /// Atrium -> corridor: a narrative summary of raw notes
    Narrative,
    /// Corridor -> vault: durable lessons distilled from a narrative
    Lessons,
}

impl SummaryMode {
    fn prompt_for(&self, text: &str) -> String {
        match self {
            Self::Narrative => format!(
                "Rewrite the following raw notes as a concise narrative summary. \
                 Preserve names, dates, decisions, and outcomes. Write flowing \
                 prose, not bullet points. Output only the summary.\n\n{text}"
            ),
            Self::Lessons => format!(
                "Distill the following narrative into durable lessons: what was \
                 learned, what to repeat, what to avoid. Be specific and brief. \
                 Output only the lessons.\n\n{text}"
            ),
        }
    }
}

/// Narrow interface over the summarization collaborator.
pub trait Summarizer: Send + Sync {
    fn summarize(&self, text: &str, mode: SummaryMode) -> Result<String>;
}

/// Request format for the Ollama API
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: i32,
}

/// Response format from the Ollama API
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

/// Production summarizer backed by an Ollama-compatible HTTP server.
pub struct OllamaSummarizer {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    /// Local LLM servers degrade badly under concurrent generations;
    /// serialize requests through this lock.
    generation_lock: Mutex<()>,
}

impl OllamaSummarizer {
    /// `endpoint` is the base URL (e.g. "http://localhost:11434").
    pub fn new(endpoint: &str, model: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| GravityError::collaborator("summarizer", err))?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            generation_lock: Mutex::new(()),
        })
    }
}

impl Summarizer for OllamaSummarizer {
    fn summarize(&self, text: &str, mode: SummaryMode) -> Result<String> {
        let _guard = self.generation_lock.lock();

        let request = OllamaRequest {
            model: self.model.clone(),
            prompt: mode.prompt_for(text),
            stream: false,
            options: OllamaOptions {
                temperature: 0.3,
                num_predict: 1024,
            },
        };
        let url = format!("{}/api/generate", self.endpoint);
        debug!(%url, mode = ?mode, "requesting summarization");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .map_err(|err| GravityError::collaborator("summarizer", err))?;

        if !response.status().is_success() {
            return Err(GravityError::collaborator(
                "summarizer",
                format!("status {}", response.status()),
            ));
        }

        let body: OllamaResponse = response
            .json()
            .map_err(|err| GravityError::collaborator("summarizer", err))?;

        let summary = body.response.trim().to_string();
        if summary.is_empty() || summary.starts_with(FAILURE_MARKER) {
            return Err(GravityError::collaborator("summarizer", "empty response"));
        }
        Ok(summary)
    }
}

/// In-memory fake for tests: echoes a canned transformation or fails on
/// demand.
pub struct FakeSummarizer {
    pub fail: bool,
}

impl FakeSummarizer {
    pub fn new() -> Self {
        Self { fail: false }
    }

    pub fn failing() -> Self {
        Self { fail: true }
    }
}

impl Default for FakeSummarizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Summarizer for FakeSummarizer {
    fn summarize(&self, text: &str, mode: SummaryMode) -> Result<String> {
        if self.fail {
            return Err(GravityError::collaborator("summarizer", "fake failure"));
        }
        let label = match mode {
            SummaryMode::Narrative => "narrative",
            SummaryMode::Lessons => "lessons",
        };
        let head: String = text.chars().take(40).collect();
        Ok(format!("{label}: {head}"))
    }
}
