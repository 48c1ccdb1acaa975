//! Gravity-Memory Library
//!
//! Memory-gravity engine for a personal long-term memory store: re-ranks and
//! curates retrieval on top of an external vector-similarity search.
//!
//! # Key Features
//! - Persistent importance tracking (access, reference, explicit boosts)
//!   with lazy write-recency decay
//! - Temporal tiering (atrium/corridor/vault) with summarize-and-distill
//!   promotion pipelines
//! - Pattern-based context tagging and filtering (doors)
//! - Multi-granularity cross-referencing (mirrors) so lessons stay findable
//!   after their sources are retired
//! - A single search orchestrator composing all of the above with the
//!   external search call
//!
//! Embedding generation, vector similarity, and summarization are external
//! collaborators; their outputs are opaque to this crate.

pub mod chambers;
pub mod collaborators;
pub mod config;
pub mod constants;
pub mod doors;
pub mod errors;
pub mod maintenance;
pub mod memory;
pub mod mirrors;
pub mod recording;
pub mod scoring;
pub mod tracing_setup;

// Re-export dependencies to ensure tests/benchmarks use the same version
pub use chrono;
pub use parking_lot;
