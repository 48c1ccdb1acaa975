//! Vector-search collaborator
//!
//! The engine never computes embeddings or similarity itself; it asks an
//! external service for the nearest chunks and re-ranks what comes back. The
//! wire contract: POST a free-text query and a max-result count, receive
//! either a bare array of candidates or an object with a `results` array.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{GravityError, Result};
use crate::memory::types::Candidate;

/// Narrow interface over the vector-search collaborator.
pub trait VectorSearch: Send + Sync {
    fn search(&self, query: &str, max_results: usize) -> Result<Vec<Candidate>>;
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    #[serde(rename = "maxResults")]
    max_results: usize,
}

/// Either shape the collaborator is allowed to return.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SearchResponse {
    Wrapped { results: Vec<Candidate> },
    Bare(Vec<Candidate>),
}

impl SearchResponse {
    fn into_candidates(self) -> Vec<Candidate> {
        match self {
            Self::Wrapped { results } => results,
            Self::Bare(results) => results,
        }
    }
}

/// Production client over HTTP.
pub struct HttpVectorSearch {
    client: reqwest::blocking::Client,
    endpoint: String,
}

impl HttpVectorSearch {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| GravityError::collaborator("vector-search", err))?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }
}

impl VectorSearch for HttpVectorSearch {
    fn search(&self, query: &str, max_results: usize) -> Result<Vec<Candidate>> {
        let url = format!("{}/search", self.endpoint);
        debug!(%url, max_results, "requesting vector search");

        let response = self
            .client
            .post(&url)
            .json(&SearchRequest { query, max_results })
            .send()
            .map_err(|err| GravityError::collaborator("vector-search", err))?;

        if !response.status().is_success() {
            return Err(GravityError::collaborator(
                "vector-search",
                format!("status {}", response.status()),
            ));
        }

        let body: SearchResponse = response
            .json()
            .map_err(|err| GravityError::collaborator("vector-search", err))?;

        Ok(body.into_candidates())
    }
}

/// In-memory fake serving a fixed candidate list, for tests and offline use.
pub struct StaticVectorSearch {
    candidates: Vec<Candidate>,
    pub fail: bool,
}

impl StaticVectorSearch {
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self {
            candidates,
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            candidates: Vec::new(),
            fail: true,
        }
    }
}

impl VectorSearch for StaticVectorSearch {
    fn search(&self, _query: &str, max_results: usize) -> Result<Vec<Candidate>> {
        if self.fail {
            return Err(GravityError::collaborator("vector-search", "fake failure"));
        }
        Ok(self.candidates.iter().take(max_results).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_bare_list() {
        let raw = r#"[{"path":"a.md","startLine":1,"endLine":9,"score":0.8}]"#;
        let parsed: SearchResponse = serde_json::from_str(raw).expect("bare list");
        let candidates = parsed.into_candidates();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].path, "a.md");
        assert_eq!(candidates[0].start_line, 1);
    }

    #[test]
    fn test_decodes_wrapped_results() {
        let raw = r#"{"results":[{"path":"a.md","score":0.5,"snippet":"hello"}]}"#;
        let parsed: SearchResponse = serde_json::from_str(raw).expect("wrapped");
        let candidates = parsed.into_candidates();
        assert_eq!(candidates.len(), 1);
        // Missing line fields default to the whole file
        assert!(candidates[0].lines().is_whole_file());
        assert_eq!(candidates[0].snippet.as_deref(), Some("hello"));
    }
}
