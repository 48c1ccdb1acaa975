//! Chamber manager: temporal tiering and the distillation pipelines
//!
//! Chunks move through three tiers by age alone — there are no explicit
//! transition calls. Fresh material sits in the atrium, recent material in
//! the corridor, and long-term material in the vault. Two pipelines distill
//! content downward: promotion summarizes aged atrium files into corridor
//! narratives, crystallization distills aged corridor narratives into vault
//! lessons. Both are idempotent and defer failed candidates to the next
//! cycle instead of failing the batch.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::config::ChamberThresholds;
use crate::constants::{MIN_SUMMARIZABLE_BYTES, MISSING_TIMESTAMP_DAYS};
use crate::collaborators::{Summarizer, SummaryMode};
use crate::errors::Result;
use crate::memory::storage::GravityStore;
use crate::memory::types::{Chamber, Granularity, LineRange};
use crate::mirrors::event_key_for;

/// Subdirectory of the memory root holding corridor artifacts
pub const CORRIDOR_DIR: &str = "corridor";

/// Subdirectory of the memory root holding vault artifacts
pub const VAULT_DIR: &str = "vault";

/// Suffix of corridor artifacts (kept on the source's stem)
pub const SUMMARY_SUFFIX: &str = "-summary";

/// Suffix of vault artifacts
pub const LESSONS_SUFFIX: &str = "-lessons";

/// Classify an age into a chamber. Boundaries are inclusive: exactly 48
/// hours is still atrium, exactly 7 days is still corridor.
pub fn classify_chamber(age_days: f64, thresholds: &ChamberThresholds) -> Chamber {
    if age_days * 24.0 <= thresholds.atrium_max_age_hours {
        Chamber::Atrium
    } else if age_days <= thresholds.corridor_max_age_days {
        Chamber::Corridor
    } else {
        Chamber::Vault
    }
}

/// Outcome of a classification sweep.
#[derive(Debug, Default, Clone)]
pub struct ClassifyReport {
    pub examined: usize,
    pub reassigned: usize,
}

/// Outcome of one distillation pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub stage: &'static str,
    pub candidates: usize,
    pub produced: usize,
    pub skipped_existing: usize,
    pub skipped_short: usize,
    pub deferred: usize,
}

impl PipelineReport {
    fn new(stage: &'static str) -> Self {
        Self {
            stage,
            candidates: 0,
            produced: 0,
            skipped_existing: 0,
            skipped_short: 0,
            deferred: 0,
        }
    }
}

impl fmt::Display for PipelineReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} candidates, {} produced, {} existing, {} too short, {} deferred",
            self.stage,
            self.candidates,
            self.produced,
            self.skipped_existing,
            self.skipped_short,
            self.deferred
        )
    }
}

/// Drives tier classification and the two distillation pipelines.
pub struct ChamberManager<'a> {
    store: &'a GravityStore,
    thresholds: &'a ChamberThresholds,
    memory_dir: &'a Path,
    filename_date: Regex,
}

impl<'a> ChamberManager<'a> {
    pub fn new(
        store: &'a GravityStore,
        thresholds: &'a ChamberThresholds,
        memory_dir: &'a Path,
    ) -> Self {
        Self {
            store,
            thresholds,
            memory_dir,
            // A date embedded anywhere in the file name, e.g. 2026-08-12-standup.md
            filename_date: Regex::new(r"(\d{4})-(\d{2})-(\d{2})")
                .unwrap_or_else(|err| panic!("filename date pattern invalid: {err}")),
        }
    }

    /// Age of a file in days, derived preferentially from a date embedded in
    /// the file name, then from modification time; unresolvable ages default
    /// to "ancient" so unknown material lands in the vault rather than
    /// polluting the atrium.
    pub fn age_days_of(&self, path: &Path) -> f64 {
        let now = Utc::now();
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if let Some(date) = self.date_in_name(name) {
                let age = (now - date).num_seconds() as f64 / 86_400.0;
                return age.max(0.0);
            }
        }
        match fs::metadata(path).and_then(|m| m.modified()) {
            Ok(modified) => {
                let modified: DateTime<Utc> = modified.into();
                ((now - modified).num_seconds() as f64 / 86_400.0).max(0.0)
            }
            Err(err) => {
                debug!(path = %path.display(), %err, "age unresolvable, treating as ancient");
                MISSING_TIMESTAMP_DAYS
            }
        }
    }

    fn date_in_name(&self, name: &str) -> Option<DateTime<Utc>> {
        let caps = self.filename_date.captures(name)?;
        let year = caps[1].parse().ok()?;
        let month = caps[2].parse().ok()?;
        let day = caps[3].parse().ok()?;
        let date = NaiveDate::from_ymd_opt(year, month, day)?;
        Some(date.and_hms_opt(0, 0, 0)?.and_utc())
    }

    fn resolve(&self, path_str: &str) -> PathBuf {
        let path = Path::new(path_str);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.memory_dir.join(path)
        }
    }

    /// Reassign every tracked path to the chamber its age dictates.
    pub fn classify_all(&self, dry_run: bool) -> Result<ClassifyReport> {
        let mut report = ClassifyReport::default();
        let mut seen: Vec<String> = Vec::new();
        for record in self.store.records()? {
            if seen.contains(&record.path) || !record.supersession.is_active() {
                continue;
            }
            seen.push(record.path.clone());
            report.examined += 1;

            let age = self.age_days_of(&self.resolve(&record.path));
            let chamber = classify_chamber(age, self.thresholds);
            if chamber != record.chamber {
                report.reassigned += 1;
                if !dry_run {
                    self.store.set_chamber(&record.path, chamber)?;
                }
                debug!(
                    path = record.path,
                    from = %record.chamber,
                    to = %chamber,
                    age_days = age,
                    dry_run,
                    "chamber reassignment"
                );
            }
        }
        Ok(report)
    }

    /// Atrium -> corridor: summarize aged raw files into narrative artifacts.
    pub fn promote(&self, summarizer: &dyn Summarizer, dry_run: bool) -> Result<PipelineReport> {
        let sources = self.raw_files()?;
        let mut report = PipelineReport::new("promote");
        for source in sources {
            let age = self.age_days_of(&source);
            if age * 24.0 <= self.thresholds.atrium_max_age_hours {
                continue;
            }
            report.candidates += 1;
            let target = self.artifact_path(&source, CORRIDOR_DIR, SUMMARY_SUFFIX);
            self.distill_one(
                summarizer,
                SummaryMode::Narrative,
                &source,
                &target,
                Chamber::Corridor,
                Granularity::Summary,
                "derived:summary",
                dry_run,
                &mut report,
            );
        }
        info!(%report, "promotion pass complete");
        Ok(report)
    }

    /// Corridor -> vault: distill aged narratives into lesson artifacts.
    pub fn crystallize(
        &self,
        summarizer: &dyn Summarizer,
        dry_run: bool,
    ) -> Result<PipelineReport> {
        let sources = self.files_in(&self.memory_dir.join(CORRIDOR_DIR))?;
        let mut report = PipelineReport::new("crystallize");
        for source in sources {
            let age = self.age_days_of(&source);
            if age <= self.thresholds.corridor_max_age_days {
                continue;
            }
            report.candidates += 1;
            let target = self.artifact_path(&source, VAULT_DIR, LESSONS_SUFFIX);
            self.distill_one(
                summarizer,
                SummaryMode::Lessons,
                &source,
                &target,
                Chamber::Vault,
                Granularity::Lesson,
                "derived:lesson",
                dry_run,
                &mut report,
            );
        }
        info!(%report, "crystallization pass complete");
        Ok(report)
    }

    /// One candidate through summarize-write-record. Failures defer the
    /// candidate to the next cycle; nothing here is fatal to the batch.
    #[allow(clippy::too_many_arguments)]
    fn distill_one(
        &self,
        summarizer: &dyn Summarizer,
        mode: SummaryMode,
        source: &Path,
        target: &Path,
        target_chamber: Chamber,
        granularity: Granularity,
        derived_tag: &str,
        dry_run: bool,
        report: &mut PipelineReport,
    ) {
        if target.exists() {
            report.skipped_existing += 1;
            return;
        }
        let content = match fs::read_to_string(source) {
            Ok(content) => content,
            Err(err) => {
                warn!(source = %source.display(), %err, "unreadable source, deferring");
                report.deferred += 1;
                return;
            }
        };
        if content.len() < MIN_SUMMARIZABLE_BYTES {
            report.skipped_short += 1;
            return;
        }
        if dry_run {
            report.produced += 1;
            return;
        }
        let summary = match summarizer.summarize(&content, mode) {
            Ok(summary) => summary,
            Err(err) => {
                warn!(source = %source.display(), %err, "summarization failed, deferring");
                report.deferred += 1;
                return;
            }
        };
        if let Err(err) = self.write_artifact(source, target, target_chamber, granularity, derived_tag, &summary)
        {
            warn!(source = %source.display(), %err, "artifact write failed, deferring");
            report.deferred += 1;
            return;
        }
        report.produced += 1;
    }

    fn write_artifact(
        &self,
        source: &Path,
        target: &Path,
        target_chamber: Chamber,
        granularity: Granularity,
        derived_tag: &str,
        summary: &str,
    ) -> Result<()> {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(target, summary)?;

        let source_str = source.to_string_lossy().to_string();
        let target_str = target.to_string_lossy().to_string();

        // The artifact is a deliberate link back to its source; recording the
        // reference first also creates the source row when it was untracked,
        // so the chamber reassignment below always has a row to land on.
        self.store
            .record_reference(&source_str, LineRange::WHOLE_FILE)?;
        self.store.set_chamber(&source_str, target_chamber)?;
        self.store.insert_derived(
            &target_str,
            target_chamber,
            &[derived_tag.to_string(), format!("source:{source_str}")],
        )?;

        let event_key = event_key_for(source);
        if granularity == Granularity::Summary {
            self.store.mirror_link(
                &event_key,
                Granularity::Raw,
                &source_str,
                LineRange::WHOLE_FILE,
            )?;
        }
        self.store
            .mirror_link(&event_key, granularity, &target_str, LineRange::WHOLE_FILE)?;
        Ok(())
    }

    fn artifact_path(&self, source: &Path, dir: &str, suffix: &str) -> PathBuf {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "untitled".to_string());
        // Crystallized artifacts keep the original stem, not a stacked one
        let stem = stem.strip_suffix(SUMMARY_SUFFIX).unwrap_or(&stem).to_string();
        self.memory_dir.join(dir).join(format!("{stem}{suffix}.md"))
    }

    /// Raw note files at the memory root, excluding derived directories.
    fn raw_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let entries = match fs::read_dir(self.memory_dir) {
            Ok(entries) => entries,
            Err(err) => {
                debug!(dir = %self.memory_dir.display(), %err, "memory dir unreadable");
                return Ok(files);
            }
        };
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    fn files_in(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(_) => return Ok(files), // nothing distilled yet
        };
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> ChamberThresholds {
        ChamberThresholds::default()
    }

    #[test]
    fn test_classification_boundaries() {
        let t = thresholds();
        assert_eq!(classify_chamber(0.0, &t), Chamber::Atrium);
        assert_eq!(classify_chamber(2.0, &t), Chamber::Atrium); // exactly 48h
        assert_eq!(classify_chamber(2.01, &t), Chamber::Corridor);
        assert_eq!(classify_chamber(7.0, &t), Chamber::Corridor); // exactly 7d
        assert_eq!(classify_chamber(7.01, &t), Chamber::Vault);
        assert_eq!(classify_chamber(MISSING_TIMESTAMP_DAYS, &t), Chamber::Vault);
    }
}
