//! Core types for the gravity store
//!
//! One gravity record per `(path, line_start, line_end)` chunk, an
//! append-only access log, and mirror records linking the same logical event
//! across granularities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Temporal tier of a chunk, by increasing age and distillation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chamber {
    /// Fresh material, age <= 48h
    Atrium,
    /// Recent material, 48h < age <= 7d
    Corridor,
    /// Long-term material, age > 7d
    Vault,
    /// Tier could not be determined
    Unknown,
}

impl Chamber {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Atrium => "atrium",
            Self::Corridor => "corridor",
            Self::Vault => "vault",
            Self::Unknown => "unknown",
        }
    }

    /// Lenient parse; anything unrecognized lands in `Unknown` rather than
    /// failing the row it came from.
    pub fn parse(s: &str) -> Self {
        match s {
            "atrium" => Self::Atrium,
            "corridor" => Self::Corridor,
            "vault" => Self::Vault,
            _ => Self::Unknown,
        }
    }

    /// Fixed per-chamber multiplier used in final-score computation.
    ///
    /// Fresher tiers weigh slightly higher independent of access history.
    pub fn recency_boost(&self) -> f64 {
        match self {
            Self::Atrium => crate::constants::CHAMBER_BOOST_ATRIUM,
            Self::Corridor => crate::constants::CHAMBER_BOOST_CORRIDOR,
            Self::Vault => crate::constants::CHAMBER_BOOST_VAULT,
            Self::Unknown => crate::constants::CHAMBER_BOOST_UNKNOWN,
        }
    }
}

impl std::fmt::Display for Chamber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of access being recorded against a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessKind {
    Read,
    Write,
}

/// Sub-range of lines within a source unit; `(0, 0)` means the whole file
/// (or a derived artifact with no meaningful line structure).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct LineRange {
    pub start: u32,
    pub end: u32,
}

impl LineRange {
    pub const WHOLE_FILE: LineRange = LineRange { start: 0, end: 0 };

    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn is_whole_file(&self) -> bool {
        self.start == 0 && self.end == 0
    }
}

/// Supersession state of a record.
///
/// Superseded records are kept for history but excluded from all ranking and
/// search output. Modeled as a variant rather than a bare nullable pointer so
/// every read site has to decide what to do with a superseded row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "state", content = "by")]
pub enum Supersession {
    Active,
    Superseded(String),
}

impl Supersession {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    pub fn from_column(superseded_by: Option<String>) -> Self {
        match superseded_by {
            Some(path) if !path.is_empty() => Self::Superseded(path),
            _ => Self::Active,
        }
    }

    pub fn as_column(&self) -> Option<&str> {
        match self {
            Self::Active => None,
            Self::Superseded(path) => Some(path),
        }
    }
}

/// One row per `(path, line_start, line_end)` chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GravityRecord {
    pub path: String,
    pub lines: LineRange,
    pub access_count: u64,
    pub reference_count: u64,
    pub explicit_importance: f64,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub last_written_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub supersession: Supersession,
    /// Context labels; unique, order-preserving
    pub tags: Vec<String>,
    pub chamber: Chamber,
}

/// Append-only access event, for audit and history.
///
/// Scoring never reads this table; it reads the denormalized counters on the
/// gravity record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessLogEntry {
    pub id: i64,
    pub path: String,
    pub lines: LineRange,
    pub accessed_at: DateTime<Utc>,
    pub query: Option<String>,
    pub score: Option<f64>,
    pub context: Option<String>,
}

/// Representation level of a mirrored event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Raw,
    Summary,
    Lesson,
}

impl Granularity {
    pub const ALL: [Granularity; 3] = [Self::Raw, Self::Summary, Self::Lesson];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Summary => "summary",
            Self::Lesson => "lesson",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "raw" => Some(Self::Raw),
            "summary" => Some(Self::Summary),
            "lesson" => Some(Self::Lesson),
            _ => None,
        }
    }
}

impl std::fmt::Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `(event_key, granularity)` cross-reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorRecord {
    pub event_key: String,
    pub granularity: Granularity,
    pub path: String,
    pub lines: LineRange,
    pub created_at: DateTime<Utc>,
}

/// Mirror-coverage health metric: events holding all three granularities
/// versus total distinct events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorCoverage {
    pub fully_mirrored: usize,
    pub total_events: usize,
}

/// Denormalized per-chunk metadata the search pipeline attaches to vector
/// candidates. Unresolved candidates get the defaults.
#[derive(Debug, Clone)]
pub struct ChunkMeta {
    pub access_count: u64,
    pub chamber: Chamber,
    pub tags: Vec<String>,
    pub supersession: Supersession,
}

impl Default for ChunkMeta {
    fn default() -> Self {
        Self {
            access_count: 0,
            chamber: Chamber::Atrium,
            tags: Vec::new(),
            supersession: Supersession::Active,
        }
    }
}

/// A candidate as returned by the vector-search collaborator.
///
/// The wire format uses camelCase line fields per the collaborator contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub path: String,
    #[serde(rename = "startLine", default)]
    pub start_line: u32,
    #[serde(rename = "endLine", default)]
    pub end_line: u32,
    pub score: f64,
    #[serde(default)]
    pub snippet: Option<String>,
}

impl Candidate {
    pub fn lines(&self) -> LineRange {
        LineRange::new(self.start_line, self.end_line)
    }
}

/// A fully enriched, re-ranked search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub path: String,
    pub line_start: u32,
    pub line_end: u32,
    /// Renamed from the collaborator's `score`; this is the re-ranked value
    pub final_score: f64,
    pub chamber: Chamber,
    pub tags: Vec<String>,
    pub access_count: u64,
    /// Similarity score as the collaborator reported it
    pub vector_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

/// Store-wide statistics for `status` reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_records: usize,
    pub atrium: usize,
    pub corridor: usize,
    pub vault: usize,
    pub unknown: usize,
    pub superseded: usize,
    pub access_log_entries: usize,
}
