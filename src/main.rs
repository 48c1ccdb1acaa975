//! gravity-memory - memory curation CLI
//!
//! Re-ranked search, tier maintenance, tagging, and mirror inspection over a
//! personal memory store. Exit code 0 on success; non-zero only on an
//! unrecoverable error (a failed upstream search call, or a maintenance run
//! in which any step recorded an error).

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::warn;

use gravity_memory::chambers::ChamberManager;
use gravity_memory::collaborators::{HttpVectorSearch, OllamaSummarizer};
use gravity_memory::config::Config;
use gravity_memory::doors::DoorClassifier;
use gravity_memory::errors::{GravityError, Result};
use gravity_memory::maintenance::MaintenancePipeline;
use gravity_memory::memory::{
    Chamber, Granularity, GravityStore, LineRange, SearchOptions, SearchPipeline, SearchResult,
};
use gravity_memory::mirrors::MirrorIndex;
use gravity_memory::recording::AccessRecorder;
use gravity_memory::tracing_setup::init_tracing;

#[derive(Parser, Debug)]
#[command(
    name = "gravity-memory",
    about = "Importance-aware retrieval and curation for a personal memory store",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search the memory store with gravity re-ranking
    Search {
        /// Free-text query
        query: String,

        /// Number of results to return
        #[arg(long, short = 'n', default_value_t = 5)]
        n: usize,

        /// Require an exact context tag (e.g. project:alpha)
        #[arg(long)]
        context: Option<String>,

        /// Comma-separated chamber allow-list (atrium,corridor,vault)
        #[arg(long, value_delimiter = ',')]
        chamber: Option<Vec<String>>,

        /// Bypass context-tag filtering (chamber filtering still applies)
        #[arg(long)]
        trapdoor: bool,

        /// Show per-result scoring breakdown
        #[arg(long, short = 'v')]
        verbose: bool,

        /// Emit JSON instead of human-readable output
        #[arg(long)]
        json: bool,
    },

    /// Show store statistics and mirror coverage
    Status {
        #[arg(long)]
        json: bool,
    },

    /// Show the most recent access-log entries
    Log {
        /// Number of entries to show
        #[arg(long, short = 'n', default_value_t = 20)]
        n: usize,

        /// Emit JSON instead of human-readable output
        #[arg(long)]
        json: bool,
    },

    /// Run the full maintenance pipeline
    Maintain {
        /// Also register files modified in the last day as writes
        #[arg(long)]
        register_recent: bool,
    },

    /// Add explicit importance to a path
    Boost {
        path: String,
        #[arg(default_value_t = 1.0)]
        amount: f64,
    },

    /// Mark every chunk of a path as superseded by another path
    Supersede { old_path: String, new_path: String },

    /// Temporal tier operations
    Chambers {
        #[command(subcommand)]
        command: ChambersCommand,
    },

    /// Context tag operations
    Doors {
        #[command(subcommand)]
        command: DoorsCommand,
    },

    /// Cross-reference operations
    Mirrors {
        #[command(subcommand)]
        command: MirrorsCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ChambersCommand {
    /// Reassign every tracked path to the chamber its age dictates
    Classify {
        #[arg(long)]
        dry_run: bool,
    },
    /// Summarize aged atrium files into corridor narratives
    Promote {
        #[arg(long)]
        dry_run: bool,
    },
    /// Distill aged corridor narratives into vault lessons
    Crystallize {
        #[arg(long)]
        dry_run: bool,
    },
    /// Per-chamber record counts
    Status,
}

#[derive(Subcommand, Debug)]
enum DoorsCommand {
    /// Classify free text into context tags
    Classify { text: String },
    /// Manually add tags to a path (additive)
    Tag { path: String, tags: Vec<String> },
    /// Derive and persist tags for a file
    AutoTag { path: PathBuf },
}

#[derive(Subcommand, Debug)]
enum MirrorsCommand {
    /// Register an event with its representations in one shot
    Create {
        event_key: String,
        raw: String,
        #[arg(long)]
        summary: Option<String>,
        #[arg(long)]
        lesson: Option<String>,
    },
    /// Upsert a single granularity link
    Link {
        event_key: String,
        /// raw | summary | lesson
        granularity: String,
        path: String,
    },
    /// Find the other granularities of the event a path belongs to
    Resolve { path: String },
    /// Coverage health metric
    Stats,
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    let config = Config::from_env();

    if !config.enabled {
        println!("gravity-memory is disabled (GRAVITY_ENABLED=false)");
        return ExitCode::SUCCESS;
    }

    match run(cli.command, &config) {
        Ok(code) => code,
        Err(err) => {
            let report = err.to_report();
            eprintln!(
                "{}",
                serde_json::to_string(&report)
                    .unwrap_or_else(|_| format!("{{\"code\":\"{}\"}}", report.code))
            );
            ExitCode::FAILURE
        }
    }
}

fn open_store(config: &Config) -> Result<GravityStore> {
    GravityStore::open(
        &config.gravity_db,
        config.scoring_params(),
        config.retention_days,
    )
}

fn summarizer(config: &Config) -> Result<OllamaSummarizer> {
    OllamaSummarizer::new(
        &config.summarizer_endpoint,
        &config.summarizer_model,
        Duration::from_secs(config.summarize_timeout_secs),
    )
}

fn parse_chambers(names: &[String]) -> Result<Vec<Chamber>> {
    let mut chambers = Vec::with_capacity(names.len());
    for name in names {
        match name.trim() {
            "atrium" => chambers.push(Chamber::Atrium),
            "corridor" => chambers.push(Chamber::Corridor),
            "vault" => chambers.push(Chamber::Vault),
            other => {
                return Err(GravityError::invalid_input(
                    "chamber",
                    format!("unknown chamber '{other}'"),
                ))
            }
        }
    }
    Ok(chambers)
}

fn run(command: Command, config: &Config) -> Result<ExitCode> {
    match command {
        Command::Search {
            query,
            n,
            context,
            chamber,
            trapdoor,
            verbose,
            json,
        } => {
            let store = open_store(config)?;
            let search = HttpVectorSearch::new(
                &config.search_endpoint,
                Duration::from_secs(config.search_timeout_secs),
            )?;
            let recorder = AccessRecorder::spawn(Arc::new(store.clone()));
            let options = SearchOptions {
                max_results: n,
                context,
                chambers: chamber.as_deref().map(parse_chambers).transpose()?,
                trapdoor,
            };
            let pipeline = SearchPipeline::new(&store, &search, Some(&recorder));
            let results = pipeline.search(&query, &options)?;
            recorder.shutdown();

            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                print_results(&results, verbose);
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::Status { json } => {
            let store = open_store(config)?;
            let stats = store.stats()?;
            let coverage = MirrorIndex::new(&store).coverage()?;
            let db_bytes = std::fs::metadata(&config.gravity_db)
                .map(|m| m.len())
                .unwrap_or(0);
            if json {
                let payload = serde_json::json!({
                    "store": stats,
                    "mirrors": coverage,
                    "db": config.gravity_db.display().to_string(),
                    "db_bytes": db_bytes,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!(
                    "gravity database: {} ({db_bytes} bytes)",
                    config.gravity_db.display()
                );
                println!(
                    "records: {} (atrium {}, corridor {}, vault {}, unknown {})",
                    stats.total_records, stats.atrium, stats.corridor, stats.vault, stats.unknown
                );
                println!("superseded: {}", stats.superseded);
                println!("access log entries: {}", stats.access_log_entries);
                println!(
                    "mirror coverage: {}/{} events fully mirrored",
                    coverage.fully_mirrored, coverage.total_events
                );
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::Log { n, json } => {
            let store = open_store(config)?;
            let entries = store.recent_accesses(n)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else if entries.is_empty() {
                println!("no accesses recorded");
            } else {
                for entry in entries {
                    let location = if entry.lines.is_whole_file() {
                        entry.path
                    } else {
                        format!("{}:{}-{}", entry.path, entry.lines.start, entry.lines.end)
                    };
                    let origin = entry
                        .query
                        .or(entry.context)
                        .unwrap_or_else(|| "-".to_string());
                    println!(
                        "{} {} ({})",
                        entry.accessed_at.format("%Y-%m-%d %H:%M:%S"),
                        location,
                        origin
                    );
                }
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::Maintain { register_recent } => {
            let store = open_store(config)?;
            let doors = DoorClassifier::with_defaults();
            let summarizer = summarizer(config)?;
            let mut pipeline = MaintenancePipeline::new(&store, &doors, &summarizer, config);
            pipeline.register_recent = register_recent;
            let report = pipeline.run();

            for step in &report.steps {
                match &step.error {
                    None => println!("ok   {:<24} {}", step.name, step.detail),
                    Some(err) => println!("FAIL {:<24} {}", step.name, err),
                }
            }
            if report.has_errors() {
                Ok(ExitCode::FAILURE)
            } else {
                Ok(ExitCode::SUCCESS)
            }
        }

        Command::Boost { path, amount } => {
            let store = open_store(config)?;
            store.boost(&path, amount)?;
            println!("boosted {path} by {amount}");
            Ok(ExitCode::SUCCESS)
        }

        Command::Supersede { old_path, new_path } => {
            let store = open_store(config)?;
            store.supersede(&old_path, &new_path)?;
            println!("{old_path} superseded by {new_path}");
            Ok(ExitCode::SUCCESS)
        }

        Command::Chambers { command } => {
            let store = open_store(config)?;
            let manager =
                ChamberManager::new(&store, &config.chamber_thresholds, &config.memory_dir);
            match command {
                ChambersCommand::Classify { dry_run } => {
                    let report = manager.classify_all(dry_run)?;
                    println!(
                        "{} paths examined, {} reassigned{}",
                        report.examined,
                        report.reassigned,
                        if dry_run { " (dry run)" } else { "" }
                    );
                }
                ChambersCommand::Promote { dry_run } => {
                    let summarizer = summarizer(config)?;
                    let report = manager.promote(&summarizer, dry_run)?;
                    println!("{report}");
                }
                ChambersCommand::Crystallize { dry_run } => {
                    let summarizer = summarizer(config)?;
                    let report = manager.crystallize(&summarizer, dry_run)?;
                    println!("{report}");
                }
                ChambersCommand::Status => {
                    let stats = store.stats()?;
                    println!(
                        "atrium {}, corridor {}, vault {}, unknown {}",
                        stats.atrium, stats.corridor, stats.vault, stats.unknown
                    );
                }
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::Doors { command } => {
            let doors = DoorClassifier::with_defaults();
            match command {
                DoorsCommand::Classify { text } => {
                    for tag in doors.classify_text(&text) {
                        println!("{tag}");
                    }
                }
                DoorsCommand::Tag { path, tags } => {
                    let store = open_store(config)?;
                    let merged = store.merge_tags(&path, &tags)?;
                    println!("{}", merged.join(", "));
                }
                DoorsCommand::AutoTag { path } => {
                    let store = open_store(config)?;
                    let merged = doors.update_context_tags(&store, &path)?;
                    println!("{}", merged.join(", "));
                }
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::Mirrors { command } => {
            let store = open_store(config)?;
            let mirrors = MirrorIndex::new(&store);
            match command {
                MirrorsCommand::Create {
                    event_key,
                    raw,
                    summary,
                    lesson,
                } => {
                    let created =
                        mirrors.create(&event_key, &raw, summary.as_deref(), lesson.as_deref())?;
                    println!("{created} links created for {event_key}");
                }
                MirrorsCommand::Link {
                    event_key,
                    granularity,
                    path,
                } => {
                    let granularity = Granularity::parse(&granularity).ok_or_else(|| {
                        GravityError::invalid_input(
                            "granularity",
                            "expected raw, summary, or lesson",
                        )
                    })?;
                    let created =
                        mirrors.link(&event_key, granularity, &path, LineRange::WHOLE_FILE)?;
                    if created {
                        println!("linked {event_key}/{granularity} -> {path}");
                    } else {
                        println!("already linked");
                    }
                }
                MirrorsCommand::Resolve { path } => {
                    let records = mirrors.resolve(&path)?;
                    if records.is_empty() {
                        warn!(path, "no mirrors recorded for path");
                    }
                    for record in records {
                        println!(
                            "{} {} {}",
                            record.event_key, record.granularity, record.path
                        );
                    }
                }
                MirrorsCommand::Stats => {
                    let coverage = mirrors.coverage()?;
                    println!(
                        "{}/{} events fully mirrored",
                        coverage.fully_mirrored, coverage.total_events
                    );
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn print_results(results: &[SearchResult], verbose: bool) {
    if results.is_empty() {
        println!("no results");
        return;
    }
    for (rank, result) in results.iter().enumerate() {
        let location = if result.line_start == 0 && result.line_end == 0 {
            result.path.clone()
        } else {
            format!("{}:{}-{}", result.path, result.line_start, result.line_end)
        };
        println!(
            "{:>2}. [{:.3}] {} ({})",
            rank + 1,
            result.final_score,
            location,
            result.chamber
        );
        if !result.tags.is_empty() {
            println!("    tags: {}", result.tags.join(", "));
        }
        if verbose {
            println!(
                "    vector {:.3} x access({}) x chamber {:.2}",
                result.vector_score,
                result.access_count,
                result.chamber.recency_boost()
            );
        }
        if let Some(snippet) = &result.snippet {
            println!("    {snippet}");
        }
    }
}
