//! Maintenance Pipeline Tests
//!
//! Full sequential runs over a real memory directory: stage ordering,
//! register-recent-writes, failure isolation, and the mirror backfill.

use std::fs;
use std::path::Path;

use gravity_memory::collaborators::FakeSummarizer;
use gravity_memory::config::Config;
use gravity_memory::doors::DoorClassifier;
use gravity_memory::maintenance::MaintenancePipeline;
use gravity_memory::memory::GravityStore;
use gravity_memory::scoring::ScoringParams;
use tempfile::TempDir;

fn setup(temp_dir: &TempDir) -> (GravityStore, Config) {
    let memory_dir = temp_dir.path().join("memory");
    fs::create_dir_all(&memory_dir).expect("create memory dir");
    let config = Config {
        gravity_db: temp_dir.path().join("gravity.db"),
        memory_dir,
        ..Config::default()
    };
    let store = GravityStore::open(
        config.gravity_db.clone(),
        ScoringParams::default(),
        config.retention_days,
    )
    .expect("Failed to open store");
    (store, config)
}

fn step_names(report: &gravity_memory::maintenance::MaintenanceReport) -> Vec<&'static str> {
    report.steps.iter().map(|s| s.name).collect()
}

#[test]
fn stages_run_in_order_and_complete() {
    let temp_dir = TempDir::new().expect("temp dir");
    let (store, config) = setup(&temp_dir);
    fs::write(
        config.memory_dir.join("2020-01-01-launch.md"),
        "We decided to launch despite the deadline pressure. ".repeat(8),
    )
    .expect("write note");

    let doors = DoorClassifier::with_defaults();
    let summarizer = FakeSummarizer::new();
    let mut pipeline = MaintenancePipeline::new(&store, &doors, &summarizer, &config);
    pipeline.register_recent = true;

    let report = pipeline.run();

    assert_eq!(
        step_names(&report),
        vec![
            "register-recent-writes",
            "classify",
            "auto-tag",
            "decay",
            "promote",
            "crystallize",
            "mirror-link",
        ]
    );
    assert!(!report.has_errors());

    // The dated note aged past the atrium window, so promotion produced its
    // corridor artifact during the same run.
    assert!(config
        .memory_dir
        .join("corridor")
        .join("2020-01-01-launch-summary.md")
        .exists());
}

#[test]
fn register_recent_is_opt_in() {
    let temp_dir = TempDir::new().expect("temp dir");
    let (store, config) = setup(&temp_dir);
    fs::write(config.memory_dir.join("today.md"), "fresh note").expect("write note");

    let doors = DoorClassifier::with_defaults();
    let summarizer = FakeSummarizer::new();
    let pipeline = MaintenancePipeline::new(&store, &doors, &summarizer, &config);

    let report = pipeline.run();
    assert!(!step_names(&report).contains(&"register-recent-writes"));
    assert_eq!(store.stats().expect("stats").total_records, 0);
}

#[test]
fn register_recent_records_writes_for_fresh_files() {
    let temp_dir = TempDir::new().expect("temp dir");
    let (store, config) = setup(&temp_dir);
    fs::write(config.memory_dir.join("today.md"), "fresh note").expect("write note");
    fs::write(config.memory_dir.join("also-today.md"), "another").expect("write note");

    let doors = DoorClassifier::with_defaults();
    let summarizer = FakeSummarizer::new();
    let mut pipeline = MaintenancePipeline::new(&store, &doors, &summarizer, &config);
    pipeline.register_recent = true;

    let report = pipeline.run();
    let register = &report.steps[0];
    assert_eq!(register.name, "register-recent-writes");
    assert_eq!(register.detail, "2 recent writes registered");

    let record = store
        .file_level(&config.memory_dir.join("today.md").to_string_lossy())
        .expect("get")
        .expect("registered");
    assert_eq!(record.access_count, 1);
    assert!(record.last_written_at.is_some());
}

#[test]
fn summarizer_failure_defers_without_failing_the_run() {
    let temp_dir = TempDir::new().expect("temp dir");
    let (store, config) = setup(&temp_dir);
    fs::write(
        config.memory_dir.join("2020-02-02-note.md"),
        "long enough content to summarize ".repeat(10),
    )
    .expect("write note");

    let doors = DoorClassifier::with_defaults();
    let summarizer = FakeSummarizer::failing();
    let pipeline = MaintenancePipeline::new(&store, &doors, &summarizer, &config);

    let report = pipeline.run();
    assert!(!report.has_errors());

    let promote = report
        .steps
        .iter()
        .find(|s| s.name == "promote")
        .expect("promote step present");
    assert!(promote.detail.contains("1 deferred"));
    assert!(!config.memory_dir.join("corridor").exists());
}

#[test]
fn mirror_link_backfills_artifacts_found_on_disk() {
    let temp_dir = TempDir::new().expect("temp dir");
    let (store, config) = setup(&temp_dir);

    // Artifacts placed by older tooling, with no mirror rows yet. Undated
    // names keep them out of the distillation pipelines during this run.
    fs::write(config.memory_dir.join("launch.md"), "raw note").expect("write raw");
    write_artifact(&config.memory_dir.join("corridor"), "launch-summary.md");
    write_artifact(&config.memory_dir.join("vault"), "launch-lessons.md");

    let doors = DoorClassifier::with_defaults();
    let summarizer = FakeSummarizer::new();
    let pipeline = MaintenancePipeline::new(&store, &doors, &summarizer, &config);

    let report = pipeline.run();
    assert!(!report.has_errors());

    let mirror = report
        .steps
        .iter()
        .find(|s| s.name == "mirror-link")
        .expect("mirror-link step present");
    assert_eq!(mirror.detail, "3 mirror links created");

    let coverage = store.mirror_coverage().expect("coverage");
    assert_eq!(coverage.total_events, 1);
    assert_eq!(coverage.fully_mirrored, 1);

    // A second run creates nothing new
    let report = pipeline.run();
    let mirror = report
        .steps
        .iter()
        .find(|s| s.name == "mirror-link")
        .expect("mirror-link step present");
    assert_eq!(mirror.detail, "0 mirror links created");
}

fn write_artifact(dir: &Path, name: &str) {
    fs::create_dir_all(dir).expect("create artifact dir");
    fs::write(dir.join(name), "artifact body").expect("write artifact");
}
