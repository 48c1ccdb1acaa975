//! External collaborators
//!
//! Vector similarity search and natural-language summarization are performed
//! by external services; this engine treats their outputs as opaque. Each
//! collaborator is a narrow trait with a production HTTP implementation and
//! an in-memory fake for tests. Calls are synchronous and carry explicit
//! timeouts; a timeout is a normal, expected failure mode.

pub mod summarizer;
pub mod vector_search;

pub use summarizer::{FakeSummarizer, OllamaSummarizer, Summarizer, SummaryMode, FAILURE_MARKER};
pub use vector_search::{HttpVectorSearch, StaticVectorSearch, VectorSearch};
