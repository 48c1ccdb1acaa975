//! Mirror index: multi-granularity cross-references
//!
//! The same logical event can exist as a raw note, a corridor summary, and a
//! vault lesson. Mirrors record which representations exist so that a caller
//! holding only the lesson can still locate the raw source after the
//! detailed material has been retired from everyday retrieval.

use std::path::Path;

use crate::chambers::{LESSONS_SUFFIX, SUMMARY_SUFFIX};
use crate::errors::Result;
use crate::memory::storage::GravityStore;
use crate::memory::types::{Granularity, LineRange, MirrorCoverage, MirrorRecord};

/// Event key of a file: its stem with any derived-artifact suffix stripped,
/// so `2026-08-12-standup.md`, `2026-08-12-standup-summary.md` and
/// `2026-08-12-standup-lessons.md` all key the same event.
pub fn event_key_for(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = stem.strip_suffix(SUMMARY_SUFFIX).unwrap_or(&stem);
    let stem = stem.strip_suffix(LESSONS_SUFFIX).unwrap_or(stem);
    stem.to_string()
}

/// Thin facade over the mirror table in the gravity store.
pub struct MirrorIndex<'a> {
    store: &'a GravityStore,
}

impl<'a> MirrorIndex<'a> {
    pub fn new(store: &'a GravityStore) -> Self {
        Self { store }
    }

    /// Upsert one `(event_key, granularity)` link; duplicates are ignored
    /// silently. Returns whether a new link was created.
    pub fn link(
        &self,
        event_key: &str,
        granularity: Granularity,
        path: &str,
        lines: LineRange,
    ) -> Result<bool> {
        self.store.mirror_link(event_key, granularity, path, lines)
    }

    /// Register an event in one shot: the raw path plus whatever derived
    /// representations already exist. Returns the number of new links.
    pub fn create(
        &self,
        event_key: &str,
        raw: &str,
        summary: Option<&str>,
        lesson: Option<&str>,
    ) -> Result<usize> {
        let mut created = 0;
        if self
            .store
            .mirror_link(event_key, Granularity::Raw, raw, LineRange::WHOLE_FILE)?
        {
            created += 1;
        }
        if let Some(summary) = summary {
            if self.store.mirror_link(
                event_key,
                Granularity::Summary,
                summary,
                LineRange::WHOLE_FILE,
            )? {
                created += 1;
            }
        }
        if let Some(lesson) = lesson {
            if self.store.mirror_link(
                event_key,
                Granularity::Lesson,
                lesson,
                LineRange::WHOLE_FILE,
            )? {
                created += 1;
            }
        }
        Ok(created)
    }

    /// The other granularities of the event(s) `path` belongs to.
    pub fn resolve(&self, path: &str) -> Result<Vec<MirrorRecord>> {
        self.store.mirror_resolve(path)
    }

    /// Every link recorded for an event.
    pub fn event(&self, event_key: &str) -> Result<Vec<MirrorRecord>> {
        self.store.mirror_event(event_key)
    }

    /// Direct health metric: events holding all three granularities versus
    /// total distinct events.
    pub fn coverage(&self) -> Result<MirrorCoverage> {
        self.store.mirror_coverage()
    }
}
