//! Search Pipeline Tests
//!
//! End-to-end runs over a static collaborator: enrichment, door and chamber
//! filtering, re-ranking, truncation, and read-recording side effects.

use std::sync::Arc;

use gravity_memory::collaborators::StaticVectorSearch;
use gravity_memory::memory::{
    AccessKind, Candidate, Chamber, GravityStore, LineRange, SearchOptions, SearchPipeline,
};
use gravity_memory::recording::AccessRecorder;
use gravity_memory::scoring::ScoringParams;
use tempfile::TempDir;

fn setup_store() -> (GravityStore, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let store = GravityStore::open(
        temp_dir.path().join("gravity.db"),
        ScoringParams::default(),
        90,
    )
    .expect("Failed to open store");
    (store, temp_dir)
}

fn candidate(path: &str, score: f64) -> Candidate {
    Candidate {
        path: path.to_string(),
        start_line: 0,
        end_line: 0,
        score,
        snippet: None,
    }
}

fn record_reads(store: &GravityStore, path: &str, n: usize) {
    for _ in 0..n {
        store
            .try_record_access(path, LineRange::WHOLE_FILE, AccessKind::Read, None, None, None)
            .expect("record access");
    }
}

#[test]
fn untracked_candidate_gets_atrium_boost_only() {
    let (store, _dir) = setup_store();
    let search = StaticVectorSearch::new(vec![candidate("unknown.md", 1.0)]);
    let pipeline = SearchPipeline::new(&store, &search, None);

    let results = pipeline
        .search("anything", &SearchOptions::default())
        .expect("search");

    assert_eq!(results.len(), 1);
    // vector 1.0 * access multiplier 1.0 * atrium boost 1.2
    assert!((results[0].final_score - 1.2).abs() < 1e-9);
    assert_eq!(results[0].access_count, 0);
    assert_eq!(results[0].chamber, Chamber::Atrium);
}

#[test]
fn access_history_multiplies_the_score() {
    let (store, _dir) = setup_store();
    record_reads(&store, "hot.md", 9);

    let search = StaticVectorSearch::new(vec![candidate("hot.md", 1.0)]);
    let pipeline = SearchPipeline::new(&store, &search, None);

    let results = pipeline
        .search("anything", &SearchOptions::default())
        .expect("search");

    // 1.0 * (1 + ln(10)) * 1.2
    let expected = (1.0 + 10.0_f64.ln()) * 1.2;
    assert!((results[0].final_score - expected).abs() < 1e-9);
    assert_eq!(results[0].access_count, 9);
}

#[test]
fn context_filter_keeps_only_tagged_candidates() {
    let (store, _dir) = setup_store();
    store
        .merge_tags("a.md", &["project:x".to_string()])
        .expect("tag");
    store
        .merge_tags("d.md", &["project:x".to_string()])
        .expect("tag");

    let search = StaticVectorSearch::new(vec![
        candidate("a.md", 0.9),
        candidate("b.md", 0.8),
        candidate("c.md", 0.7),
        candidate("d.md", 0.6),
        candidate("e.md", 0.5),
    ]);
    let pipeline = SearchPipeline::new(&store, &search, None);

    let options = SearchOptions {
        context: Some("project:x".to_string()),
        ..SearchOptions::default()
    };
    let results = pipeline.search("anything", &options).expect("search");

    let paths: Vec<&str> = results.iter().map(|r| r.path.as_str()).collect();
    assert_eq!(paths, vec!["a.md", "d.md"]);
}

#[test]
fn trapdoor_bypasses_context_but_not_chambers() {
    let (store, _dir) = setup_store();
    store
        .merge_tags("vaulted.md", &["project:x".to_string()])
        .expect("tag");
    store.set_chamber("vaulted.md", Chamber::Vault).expect("set chamber");

    let search = StaticVectorSearch::new(vec![
        candidate("vaulted.md", 0.9),
        candidate("plain.md", 0.5),
    ]);
    let pipeline = SearchPipeline::new(&store, &search, None);

    // Trapdoor: the untagged candidate passes the context filter
    let options = SearchOptions {
        context: Some("project:x".to_string()),
        trapdoor: true,
        ..SearchOptions::default()
    };
    let results = pipeline.search("anything", &options).expect("search");
    assert_eq!(results.len(), 2);

    // Chamber allow-list still applies under the trapdoor
    let options = SearchOptions {
        context: Some("project:x".to_string()),
        chambers: Some(vec![Chamber::Atrium]),
        trapdoor: true,
        ..SearchOptions::default()
    };
    let results = pipeline.search("anything", &options).expect("search");
    let paths: Vec<&str> = results.iter().map(|r| r.path.as_str()).collect();
    assert_eq!(paths, vec!["plain.md"]);
}

#[test]
fn superseded_candidates_never_surface() {
    let (store, _dir) = setup_store();
    record_reads(&store, "old.md", 1);
    store.supersede("old.md", "new.md").expect("supersede");

    let search = StaticVectorSearch::new(vec![candidate("old.md", 0.99)]);
    let pipeline = SearchPipeline::new(&store, &search, None);

    let results = pipeline
        .search("anything", &SearchOptions::default())
        .expect("search");
    assert!(results.is_empty());
}

#[test]
fn results_are_sorted_and_truncated() {
    let (store, _dir) = setup_store();
    record_reads(&store, "warm.md", 3);
    record_reads(&store, "hot.md", 9);

    let search = StaticVectorSearch::new(vec![
        candidate("cold.md", 0.5),
        candidate("warm.md", 0.5),
        candidate("hot.md", 0.5),
    ]);
    let pipeline = SearchPipeline::new(&store, &search, None);

    let options = SearchOptions {
        max_results: 2,
        ..SearchOptions::default()
    };
    let results = pipeline.search("anything", &options).expect("search");

    let paths: Vec<&str> = results.iter().map(|r| r.path.as_str()).collect();
    assert_eq!(paths, vec!["hot.md", "warm.md"]);
    assert!(results[0].final_score > results[1].final_score);
}

#[test]
fn chunk_lookup_falls_back_to_file_level() {
    let (store, _dir) = setup_store();
    record_reads(&store, "notes.md", 9);

    let chunk = Candidate {
        path: "notes.md".to_string(),
        start_line: 10,
        end_line: 20,
        score: 1.0,
        snippet: None,
    };
    let search = StaticVectorSearch::new(vec![chunk]);
    let pipeline = SearchPipeline::new(&store, &search, None);

    let results = pipeline
        .search("anything", &SearchOptions::default())
        .expect("search");

    assert_eq!(results[0].access_count, 9);
    assert_eq!(results[0].line_start, 10);
    assert_eq!(results[0].line_end, 20);
}

#[test]
fn collaborator_failure_is_a_structured_error() {
    let (store, _dir) = setup_store();
    let search = StaticVectorSearch::failing();
    let pipeline = SearchPipeline::new(&store, &search, None);

    let err = pipeline
        .search("anything", &SearchOptions::default())
        .expect_err("must fail");
    assert_eq!(err.code(), "COLLABORATOR_FAILED");
}

#[test]
fn hits_are_recorded_as_reads() {
    let (store, _dir) = setup_store();
    let store = Arc::new(store);
    let recorder = AccessRecorder::spawn(Arc::clone(&store));

    let search = StaticVectorSearch::new(vec![candidate("seen.md", 0.9)]);
    {
        let pipeline = SearchPipeline::new(&store, &search, Some(&recorder));
        pipeline
            .search("what did we decide", &SearchOptions::default())
            .expect("search");
    }
    recorder.shutdown();

    let record = store
        .get("seen.md", LineRange::WHOLE_FILE)
        .expect("get")
        .expect("recorded");
    assert_eq!(record.access_count, 1);
    assert!(record.last_accessed_at.is_some());
    assert_eq!(store.stats().expect("stats").access_log_entries, 1);
}
