//! The gravity store and its retrieval pipeline
//!
//! - Persistent per-chunk importance statistics with an append-only access
//!   log (storage)
//! - The search orchestrator composing external vector search with
//!   enrichment, filtering, and re-ranking (retrieval)
//! - Shared record and result types (types)

pub mod retrieval;
pub mod storage;
pub mod types;

pub use retrieval::{SearchOptions, SearchPipeline};
pub use storage::{GravityStore, PruneReport, RankedChunk};
pub use types::*;
