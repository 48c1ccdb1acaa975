//! Search pipeline: the engine's only outward request/response contract
//!
//! A linear pipeline with no branching retries: oversample candidates from
//! the vector-search collaborator, enrich each with gravity metadata, apply
//! door and chamber filters, re-rank, truncate, format. If the collaborator
//! itself fails there is no meaningful partial result, so the caller gets a
//! single structured error.

use tracing::{debug, instrument};

use super::storage::GravityStore;
use super::types::*;
use crate::collaborators::VectorSearch;
use crate::constants::{DEFAULT_SEARCH_RESULTS, SEARCH_OVERSAMPLE_FACTOR, SNIPPET_MAX_CHARS};
use crate::doors::passes_doors;
use crate::errors::Result;
use crate::recording::{AccessEvent, AccessRecorder};
use crate::scoring::access_multiplier;

/// Parsed options for one search request.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Result count N; the collaborator is asked for 3N
    pub max_results: usize,
    /// Exact context tag a candidate must carry
    pub context: Option<String>,
    /// Chamber allow-list; always enforced when present
    pub chambers: Option<Vec<Chamber>>,
    /// Bypass context-tag filtering only (never chamber filtering)
    pub trapdoor: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            max_results: DEFAULT_SEARCH_RESULTS,
            context: None,
            chambers: None,
            trapdoor: false,
        }
    }
}

/// The orchestrator: composes the external search with the gravity store and
/// the door classifier into a single re-ranked result set.
pub struct SearchPipeline<'a> {
    store: &'a GravityStore,
    search: &'a dyn VectorSearch,
    recorder: Option<&'a AccessRecorder>,
}

impl<'a> SearchPipeline<'a> {
    pub fn new(
        store: &'a GravityStore,
        search: &'a dyn VectorSearch,
        recorder: Option<&'a AccessRecorder>,
    ) -> Self {
        Self {
            store,
            search,
            recorder,
        }
    }

    /// Run the full pipeline. The only hard failure is the collaborator call
    /// itself; everything downstream degrades per candidate.
    #[instrument(skip(self), fields(n = options.max_results))]
    pub fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchResult>> {
        let n = options.max_results.max(1);
        // Oversample to survive filtering
        let candidates = self.search.search(query, n * SEARCH_OVERSAMPLE_FACTOR)?;
        debug!(candidates = candidates.len(), "vector search returned");

        let mut enriched: Vec<SearchResult> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let meta = self
                .store
                .lookup_meta(&candidate.path, candidate.lines())
                .unwrap_or_default();
            // Superseded records are invisible to ranking output
            if !meta.supersession.is_active() {
                continue;
            }
            if !passes_doors(
                &meta.tags,
                meta.chamber,
                options.context.as_deref(),
                options.chambers.as_deref(),
                options.trapdoor,
            ) {
                continue;
            }
            let final_score = candidate.score
                * access_multiplier(meta.access_count)
                * meta.chamber.recency_boost();
            enriched.push(SearchResult {
                path: candidate.path,
                line_start: candidate.start_line,
                line_end: candidate.end_line,
                final_score,
                chamber: meta.chamber,
                tags: meta.tags,
                access_count: meta.access_count,
                vector_score: candidate.score,
                snippet: candidate.snippet.map(truncate_snippet),
            });
        }

        enriched.sort_by(|a, b| {
            b.final_score
                .partial_cmp(&a.final_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        enriched.truncate(n);

        if let Some(recorder) = self.recorder {
            for result in &enriched {
                recorder.submit(AccessEvent {
                    path: result.path.clone(),
                    lines: LineRange::new(result.line_start, result.line_end),
                    kind: AccessKind::Read,
                    query: Some(query.to_string()),
                    score: Some(result.vector_score),
                    context: options.context.clone(),
                });
            }
        }

        Ok(enriched)
    }
}

fn truncate_snippet(snippet: String) -> String {
    if snippet.chars().count() <= SNIPPET_MAX_CHARS {
        return snippet;
    }
    let mut truncated: String = snippet.chars().take(SNIPPET_MAX_CHARS).collect();
    truncated.push('…');
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snippet_truncation() {
        let short = "short enough".to_string();
        assert_eq!(truncate_snippet(short.clone()), short);

        let long = "x".repeat(SNIPPET_MAX_CHARS + 10);
        let truncated = truncate_snippet(long);
        assert_eq!(truncated.chars().count(), SNIPPET_MAX_CHARS + 1);
        assert!(truncated.ends_with('…'));
    }
}
