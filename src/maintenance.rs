//! The maintenance pipeline
//!
//! Strictly sequential, single-threaded: register-recent-writes -> classify
//! -> auto-tag -> decay -> promote -> crystallize -> mirror-link. Each stage
//! is isolated; one stage failing is caught, logged, and recorded in the
//! report without preventing later stages from running. The command always
//! completes and reports a step-by-step summary.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use crate::chambers::{ChamberManager, CORRIDOR_DIR, VAULT_DIR};
use crate::collaborators::Summarizer;
use crate::config::Config;
use crate::constants::RECENT_WRITE_WINDOW_HOURS;
use crate::doors::DoorClassifier;
use crate::errors::Result;
use crate::memory::storage::GravityStore;
use crate::memory::types::{AccessKind, Granularity, LineRange};
use crate::mirrors::{event_key_for, MirrorIndex};

/// Outcome of one maintenance stage.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub name: &'static str,
    pub detail: String,
    pub error: Option<String>,
}

/// Step-by-step summary of a maintenance run.
#[derive(Debug, Default)]
pub struct MaintenanceReport {
    pub steps: Vec<StepOutcome>,
}

impl MaintenanceReport {
    pub fn has_errors(&self) -> bool {
        self.steps.iter().any(|s| s.error.is_some())
    }
}

/// Sequences the other components on a schedule.
pub struct MaintenancePipeline<'a> {
    store: &'a GravityStore,
    doors: &'a DoorClassifier,
    summarizer: &'a dyn Summarizer,
    config: &'a Config,
    /// Whether the register-recent-writes stage runs at all
    pub register_recent: bool,
}

impl<'a> MaintenancePipeline<'a> {
    pub fn new(
        store: &'a GravityStore,
        doors: &'a DoorClassifier,
        summarizer: &'a dyn Summarizer,
        config: &'a Config,
    ) -> Self {
        Self {
            store,
            doors,
            summarizer,
            config,
            register_recent: false,
        }
    }

    /// Run every stage in order, isolating failures per stage.
    pub fn run(&self) -> MaintenanceReport {
        let mut report = MaintenanceReport::default();

        if self.register_recent {
            self.run_step(&mut report, "register-recent-writes", || {
                self.register_recent_writes()
            });
        }
        self.run_step(&mut report, "classify", || self.classify());
        self.run_step(&mut report, "auto-tag", || self.auto_tag());
        self.run_step(&mut report, "decay", || self.decay());
        self.run_step(&mut report, "promote", || self.promote());
        self.run_step(&mut report, "crystallize", || self.crystallize());
        self.run_step(&mut report, "mirror-link", || self.mirror_link());

        info!(
            steps = report.steps.len(),
            errors = report.steps.iter().filter(|s| s.error.is_some()).count(),
            "maintenance complete"
        );
        report
    }

    fn run_step(
        &self,
        report: &mut MaintenanceReport,
        name: &'static str,
        step: impl FnOnce() -> Result<String>,
    ) {
        match step() {
            Ok(detail) => {
                info!(step = name, detail, "maintenance step ok");
                report.steps.push(StepOutcome {
                    name,
                    detail,
                    error: None,
                });
            }
            Err(err) => {
                warn!(step = name, %err, "maintenance step failed, continuing");
                report.steps.push(StepOutcome {
                    name,
                    detail: String::new(),
                    error: Some(err.to_string()),
                });
            }
        }
    }

    /// Register files modified within the recent-write window as writes, so
    /// edits made outside this process still accrue gravity.
    fn register_recent_writes(&self) -> Result<String> {
        let cutoff = Utc::now() - Duration::hours(RECENT_WRITE_WINDOW_HOURS);
        let mut registered = 0usize;
        for file in self.memory_files() {
            let Ok(modified) = fs::metadata(&file).and_then(|m| m.modified()) else {
                continue;
            };
            let modified: DateTime<Utc> = modified.into();
            if modified >= cutoff {
                self.store.try_record_access(
                    &file.to_string_lossy(),
                    LineRange::WHOLE_FILE,
                    AccessKind::Write,
                    None,
                    None,
                    Some("register-recent-writes"),
                )?;
                registered += 1;
            }
        }
        Ok(format!("{registered} recent writes registered"))
    }

    fn classify(&self) -> Result<String> {
        let manager = self.chamber_manager();
        let report = manager.classify_all(false)?;
        Ok(format!(
            "{} paths examined, {} reassigned",
            report.examined, report.reassigned
        ))
    }

    /// Re-derive context tags for every tracked path. Additive only; a tag
    /// once stored is never removed here.
    fn auto_tag(&self) -> Result<String> {
        let mut seen: Vec<String> = Vec::new();
        let mut tagged = 0usize;
        for record in self.store.records()? {
            if seen.contains(&record.path) || !record.supersession.is_active() {
                continue;
            }
            seen.push(record.path.clone());
            let path = PathBuf::from(&record.path);
            match self.doors.update_context_tags(self.store, &path) {
                Ok(_) => tagged += 1,
                Err(err) => {
                    // One bad item must not abort the batch
                    warn!(path = record.path, %err, "auto-tag failed for path");
                }
            }
        }
        Ok(format!("{tagged} paths tagged"))
    }

    fn decay(&self) -> Result<String> {
        let pruned = self.store.decay()?;
        Ok(format!(
            "{} superseded records and {} log entries pruned",
            pruned.pruned_records, pruned.pruned_log_entries
        ))
    }

    fn promote(&self) -> Result<String> {
        let manager = self.chamber_manager();
        let report = manager.promote(self.summarizer, false)?;
        Ok(report.to_string())
    }

    fn crystallize(&self) -> Result<String> {
        let manager = self.chamber_manager();
        let report = manager.crystallize(self.summarizer, false)?;
        Ok(report.to_string())
    }

    /// Backfill mirror links for every derived artifact on disk, so lessons
    /// stay findable even when their links were created by older tooling.
    fn mirror_link(&self) -> Result<String> {
        let mirrors = MirrorIndex::new(self.store);
        let mut created = 0usize;

        let raw_by_key: Vec<(String, PathBuf)> = files_in(&self.config.memory_dir)
            .into_iter()
            .map(|p| (event_key_for(&p), p))
            .collect();

        for (dir, granularity) in [
            (CORRIDOR_DIR, Granularity::Summary),
            (VAULT_DIR, Granularity::Lesson),
        ] {
            for artifact in files_in(&self.config.memory_dir.join(dir)) {
                let key = event_key_for(&artifact);
                if mirrors.link(
                    &key,
                    granularity,
                    &artifact.to_string_lossy(),
                    LineRange::WHOLE_FILE,
                )? {
                    created += 1;
                }
                if let Some((_, raw)) = raw_by_key.iter().find(|(k, _)| *k == key) {
                    if mirrors.link(
                        &key,
                        Granularity::Raw,
                        &raw.to_string_lossy(),
                        LineRange::WHOLE_FILE,
                    )? {
                        created += 1;
                    }
                }
            }
        }
        Ok(format!("{created} mirror links created"))
    }

    fn chamber_manager(&self) -> ChamberManager<'_> {
        ChamberManager::new(
            self.store,
            &self.config.chamber_thresholds,
            &self.config.memory_dir,
        )
    }

    fn memory_files(&self) -> Vec<PathBuf> {
        let mut files = files_in(&self.config.memory_dir);
        files.extend(files_in(&self.config.memory_dir.join(CORRIDOR_DIR)));
        files.extend(files_in(&self.config.memory_dir.join(VAULT_DIR)));
        files
    }
}

fn files_in(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let Ok(entries) = fs::read_dir(dir) else {
        return files;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    files
}
