//! Documented constants for the memory-gravity engine
//!
//! This module contains all tunable parameters with justification for their
//! values. Centralizing constants prevents magic numbers and makes tuning
//! easier. Every scoring constant here is mirrored by a `Config` field so it
//! can be overridden per deployment.

// =============================================================================
// EFFECTIVE MASS (GRAVITY) CONSTANTS
// base_mass = access_count * ACCESS_WEIGHT
//           + reference_count * REFERENCE_WEIGHT
//           + explicit_importance
// =============================================================================

/// Weight of one recorded access in the base mass
///
/// Justification:
/// - Accesses are cheap signals (every search hit records one), so a single
///   access moves the mass by less than half a unit
/// - 10 accesses contribute 3.0 mass, comparable to a deliberate boost
pub const ACCESS_WEIGHT: f64 = 0.3;

/// Weight of one cross-reference in the base mass
///
/// Justification:
/// - A reference is a deliberate act (another note linking here), rarer and
///   stronger evidence of importance than a retrieval hit
/// - 0.5 keeps two references roughly equal to three reads
pub const REFERENCE_WEIGHT: f64 = 0.5;

/// Default per-day decay rate for the recency factor
///
/// recency_factor = 1 / (1 + days_since_write * decay_rate)
///
/// Justification:
/// - 0.1/day halves the recency factor after ~10 days without a write
/// - Slow enough that a weekly-maintained note keeps >85% of its mass
/// - Decay keys off *write* recency, not access recency: an old note that
///   is frequently reread must not masquerade as authoritative
pub const DEFAULT_DECAY_RATE: f64 = 0.1;

/// Default additive boost for recently written (authoritative) chunks
///
/// Applied when the chunk was written within [`AUTHORITY_WINDOW_DAYS`].
///
/// Justification:
/// - 2.0 lifts a brand-new note above an unboosted note with ~6 accesses,
///   reflecting that fresh writes are the author's current position
pub const DEFAULT_AUTHORITY_BOOST: f64 = 2.0;

/// Window (days since last write) inside which the authority boost applies
pub const AUTHORITY_WINDOW_DAYS: f64 = 2.0;

/// Default cap on effective mass
///
/// Justification:
/// - Caps the score modifier at 1 + 0.1*ln(11) ≈ 1.24, so no chunk can
///   outrank a strong similarity match on popularity alone
pub const DEFAULT_MASS_CAP: f64 = 10.0;

/// Days of staleness assumed when a timestamp is missing or a source file
/// is unreadable ("maximally stale")
pub const MISSING_TIMESTAMP_DAYS: f64 = 999.0;

/// Scale of the logarithmic score modifier: 1 + SCALE * ln(1 + mass)
///
/// Justification:
/// - Log damping prevents runaway dominance by heavily accessed chunks
/// - 0.1 keeps the modifier in [1.0, ~1.25] for capped masses
pub const MODIFIER_LOG_SCALE: f64 = 0.1;

// =============================================================================
// CHAMBER (TEMPORAL TIER) CONSTANTS
// =============================================================================

/// Maximum age for the atrium tier, in hours (boundary inclusive)
pub const DEFAULT_ATRIUM_MAX_AGE_HOURS: f64 = 48.0;

/// Maximum age for the corridor tier, in days (boundary inclusive)
pub const DEFAULT_CORRIDOR_MAX_AGE_DAYS: f64 = 7.0;

/// Per-chamber multipliers applied during search re-ranking
///
/// Fresher tiers are weighted slightly higher even independent of access
/// counts: an atrium note and a vault lesson with identical similarity and
/// history should surface the atrium note first.
pub const CHAMBER_BOOST_ATRIUM: f64 = 1.2;
pub const CHAMBER_BOOST_CORRIDOR: f64 = 1.1;
pub const CHAMBER_BOOST_VAULT: f64 = 1.0;
pub const CHAMBER_BOOST_UNKNOWN: f64 = 1.0;

/// Minimum source length (bytes) worth summarizing
///
/// Justification:
/// - Below ~200 bytes a "narrative summary" is longer than the source;
///   such files are skipped (not an error) and stay in their tier
pub const MIN_SUMMARIZABLE_BYTES: usize = 200;

// =============================================================================
// SEARCH PIPELINE CONSTANTS
// =============================================================================

/// Vector search oversampling factor
///
/// When searching for N results we request N * this factor candidates, then
/// filter down to N.
///
/// Justification:
/// - Context-tag and chamber filters can reject a large share of raw
///   similarity hits; 3x survives a ~66% rejection rate
pub const SEARCH_OVERSAMPLE_FACTOR: usize = 3;

/// Default number of results returned by a search
pub const DEFAULT_SEARCH_RESULTS: usize = 5;

/// Maximum snippet length (chars) in formatted search output
pub const SNIPPET_MAX_CHARS: usize = 240;

/// Content prefix (bytes) fed to the text classifier during auto-tagging
///
/// Justification:
/// - Context markers (project names, people, secrets) cluster near the top
///   of a note; 5 KB bounds classifier cost on large files
pub const AUTO_TAG_CONTENT_PREFIX_BYTES: usize = 5 * 1024;

// =============================================================================
// EXTERNAL COLLABORATOR TIMEOUTS
// =============================================================================

/// Timeout for the vector-search collaborator (seconds)
///
/// Search is interactive; tens of seconds is already generous.
pub const SEARCH_TIMEOUT_SECS: u64 = 30;

/// Timeout for the summarization collaborator (seconds)
///
/// Summarization runs in batched overnight maintenance; a local LLM on
/// modest hardware can legitimately take this long per document.
pub const SUMMARIZE_TIMEOUT_SECS: u64 = 120;

// =============================================================================
// STORAGE CONTENTION CONSTANTS
// =============================================================================

/// Retries for SQLITE_BUSY / SQLITE_LOCKED before surfacing a hard failure
pub const BUSY_RETRY_LIMIT: u32 = 3;

/// Base delay for busy retries (milliseconds, doubled per attempt)
pub const BUSY_RETRY_BASE_MS: u64 = 50;

/// In-connection busy timeout handed to SQLite itself (milliseconds)
pub const SQLITE_BUSY_TIMEOUT_MS: u64 = 250;

// =============================================================================
// MAINTENANCE / RETENTION CONSTANTS
// =============================================================================

/// Default retention window (days) for access-log rows and long-superseded
/// gravity rows pruned by the decay sweep
pub const DEFAULT_RETENTION_DAYS: i64 = 90;

/// Window (hours) the register-recent-writes stage scans for modified files
pub const RECENT_WRITE_WINDOW_HOURS: i64 = 24;

/// Capacity of the fire-and-forget access recording queue
///
/// Justification:
/// - 256 pending recordings is minutes of burst at interactive rates; when
///   the queue is full the caller records inline rather than blocking
pub const RECORDING_QUEUE_CAPACITY: usize = 256;
