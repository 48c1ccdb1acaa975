//! Storage backend for the gravity store
//!
//! SQLite with WAL journaling so readers never block the writer. There is no
//! in-process connection pool: each logical operation opens, uses, and closes
//! its own connection, which bounds lock hold time. Busy/locked errors during
//! commit are retried with bounded exponential backoff before surfacing as a
//! hard failure; an abandoned operation is always logged, never silently
//! dropped.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use tracing::{debug, warn};

use super::types::*;
use crate::constants::{
    BUSY_RETRY_BASE_MS, BUSY_RETRY_LIMIT, SQLITE_BUSY_TIMEOUT_MS,
};
use crate::errors::{GravityError, Result};
use crate::scoring::{self, ScoringParams};

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
///
/// `access_log` is append-only: no UPDATE is ever issued against it, and the
/// only DELETE is retention pruning in the decay sweep.
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS gravity (
    path                TEXT NOT NULL,
    line_start          INTEGER NOT NULL DEFAULT 0,
    line_end            INTEGER NOT NULL DEFAULT 0,
    access_count        INTEGER NOT NULL DEFAULT 0,
    reference_count     INTEGER NOT NULL DEFAULT 0,
    explicit_importance REAL NOT NULL DEFAULT 0.0,
    last_accessed_at    TEXT,
    last_written_at     TEXT,
    created_at          TEXT NOT NULL,
    superseded_by       TEXT,            -- forward pointer; never a delete
    tags                TEXT NOT NULL DEFAULT '[]',
    chamber             TEXT NOT NULL DEFAULT 'atrium',
    PRIMARY KEY (path, line_start, line_end)
);

CREATE TABLE IF NOT EXISTS access_log (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    path        TEXT NOT NULL,
    line_start  INTEGER NOT NULL DEFAULT 0,
    line_end    INTEGER NOT NULL DEFAULT 0,
    accessed_at TEXT NOT NULL,
    query       TEXT,
    score       REAL,
    context     TEXT
);

CREATE TABLE IF NOT EXISTS mirrors (
    event_key   TEXT NOT NULL,
    granularity TEXT NOT NULL,   -- 'raw' | 'summary' | 'lesson'
    path        TEXT NOT NULL,
    line_start  INTEGER NOT NULL DEFAULT 0,
    line_end    INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL,
    UNIQUE (event_key, granularity)
);

CREATE INDEX IF NOT EXISTS gravity_chamber_idx  ON gravity(chamber);
CREATE INDEX IF NOT EXISTS access_log_path_idx  ON access_log(path);
CREATE INDEX IF NOT EXISTS access_log_time_idx  ON access_log(accessed_at);
CREATE INDEX IF NOT EXISTS mirrors_path_idx     ON mirrors(path);
";

/// Maximum supersession chain length walked during cycle detection
const SUPERSESSION_WALK_LIMIT: usize = 32;

/// A re-ranked candidate produced by [`GravityStore::rerank`].
#[derive(Debug, Clone)]
pub struct RankedChunk {
    pub path: String,
    pub lines: LineRange,
    pub base_score: f64,
    pub adjusted_score: f64,
    pub effective_mass: f64,
}

/// Result of the retention pruning performed by the decay sweep.
#[derive(Debug, Clone, Default)]
pub struct PruneReport {
    pub pruned_records: usize,
    pub pruned_log_entries: usize,
}

/// The persistent importance store. All other components read and write
/// through it; the SQLite file is the only shared mutable resource in the
/// process.
///
/// Cheap to share: holds a path and scoring knobs, never an open connection.
#[derive(Debug, Clone)]
pub struct GravityStore {
    db_path: PathBuf,
    params: ScoringParams,
    retention_days: i64,
}

fn encode_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(raw: Option<String>) -> Option<DateTime<Utc>> {
    let raw = raw?;
    match DateTime::parse_from_rfc3339(&raw) {
        Ok(ts) => Some(ts.with_timezone(&Utc)),
        Err(err) => {
            // Unparseable timestamp reads as "maximally stale"
            warn!(raw, %err, "unparseable timestamp in gravity row");
            None
        }
    }
}

/// Decode the tags JSON array; a corrupted field decodes to the empty
/// default instead of propagating as a crash.
fn decode_tags(path: &str, raw: &str) -> (Vec<String>, bool) {
    match serde_json::from_str::<Vec<String>>(raw) {
        Ok(tags) => (tags, false),
        Err(err) => {
            warn!(path, %err, "corrupt tags field, resetting to empty");
            (Vec::new(), true)
        }
    }
}

fn is_busy(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if matches!(e.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    )
}

impl GravityStore {
    /// Open (or create) the store at `db_path` and run schema initialisation.
    pub fn open(
        db_path: impl AsRef<Path>,
        params: ScoringParams,
        retention_days: i64,
    ) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let store = Self {
            db_path,
            params,
            retention_days,
        };
        store.with_conn("init_schema", |conn| conn.execute_batch(SCHEMA))?;
        Ok(store)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn scoring_params(&self) -> &ScoringParams {
        &self.params
    }

    fn connect(&self) -> rusqlite::Result<Connection> {
        let conn = Connection::open(&self.db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "busy_timeout", SQLITE_BUSY_TIMEOUT_MS as i64)?;
        Ok(conn)
    }

    /// Connection-per-operation with bounded busy retry.
    ///
    /// The closure may run more than once; it must be a pure function of the
    /// connection.
    fn with_conn<T>(
        &self,
        operation: &str,
        f: impl Fn(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T> {
        let mut attempt: u32 = 0;
        loop {
            let result = self.connect().and_then(|conn| f(&conn));
            match result {
                Ok(value) => return Ok(value),
                Err(err) if is_busy(&err) && attempt < BUSY_RETRY_LIMIT => {
                    let delay = BUSY_RETRY_BASE_MS << attempt;
                    debug!(operation, attempt, delay_ms = delay, "store busy, retrying");
                    std::thread::sleep(Duration::from_millis(delay));
                    attempt += 1;
                }
                Err(err) if is_busy(&err) => {
                    warn!(operation, attempts = attempt + 1, "store busy, abandoning");
                    return Err(GravityError::Busy {
                        operation: operation.to_string(),
                        attempts: attempt + 1,
                    });
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    // ========================================================================
    // ACCESS RECORDING
    // ========================================================================

    /// Record an access. Side effect only: errors are logged and swallowed,
    /// because tracking must never block or fail the caller's primary task.
    pub fn record_access(
        &self,
        path: &str,
        lines: LineRange,
        kind: AccessKind,
        query: Option<&str>,
        score: Option<f64>,
        context: Option<&str>,
    ) {
        if let Err(err) = self.try_record_access(path, lines, kind, query, score, context) {
            warn!(path, %err, "access recording failed (ignored)");
        }
    }

    /// Fallible variant of [`record_access`](Self::record_access) for callers
    /// that do want the error (tests, maintenance).
    pub fn try_record_access(
        &self,
        path: &str,
        lines: LineRange,
        kind: AccessKind,
        query: Option<&str>,
        score: Option<f64>,
        context: Option<&str>,
    ) -> Result<()> {
        let now = encode_ts(Utc::now());
        self.with_conn("record_access", |conn| {
            let tx = conn.unchecked_transaction()?;
            // Reads and writes share one access counter; only the timestamp
            // column differs by kind.
            let (sql_insert, sql_update) = match kind {
                AccessKind::Read => (
                    "INSERT INTO gravity (path, line_start, line_end, access_count,
                                          last_accessed_at, created_at)
                     VALUES (?1, ?2, ?3, 1, ?4, ?4)",
                    "UPDATE gravity SET access_count = access_count + 1,
                                        last_accessed_at = ?4
                     WHERE path = ?1 AND line_start = ?2 AND line_end = ?3",
                ),
                AccessKind::Write => (
                    "INSERT INTO gravity (path, line_start, line_end, access_count,
                                          last_written_at, created_at)
                     VALUES (?1, ?2, ?3, 1, ?4, ?4)",
                    "UPDATE gravity SET access_count = access_count + 1,
                                        last_written_at = ?4
                     WHERE path = ?1 AND line_start = ?2 AND line_end = ?3",
                ),
            };
            let updated = tx.execute(
                sql_update,
                params![path, lines.start, lines.end, now],
            )?;
            if updated == 0 {
                tx.execute(sql_insert, params![path, lines.start, lines.end, now])?;
            }
            tx.execute(
                "INSERT INTO access_log (path, line_start, line_end, accessed_at,
                                         query, score, context)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![path, lines.start, lines.end, now, query, score, context],
            )?;
            tx.commit()
        })
    }

    /// Increment the reference counter (another unit deliberately linking
    /// here; stronger evidence of importance than a retrieval hit).
    pub fn record_reference(&self, path: &str, lines: LineRange) -> Result<()> {
        let now = encode_ts(Utc::now());
        self.with_conn("record_reference", |conn| {
            let updated = conn.execute(
                "UPDATE gravity SET reference_count = reference_count + 1
                 WHERE path = ?1 AND line_start = ?2 AND line_end = ?3",
                params![path, lines.start, lines.end],
            )?;
            if updated == 0 {
                conn.execute(
                    "INSERT INTO gravity (path, line_start, line_end, reference_count,
                                          created_at)
                     VALUES (?1, ?2, ?3, 1, ?4)",
                    params![path, lines.start, lines.end, now],
                )?;
            }
            Ok(())
        })
    }

    /// Add `amount` to the explicit importance of every chunk of `path`,
    /// creating the whole-file record when none exists. No upper bound here;
    /// the mass cap applies at scoring time.
    pub fn boost(&self, path: &str, amount: f64) -> Result<()> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(GravityError::invalid_input(
                "amount",
                "boost must be a non-negative finite number",
            ));
        }
        let now = encode_ts(Utc::now());
        self.with_conn("boost", |conn| {
            let updated = conn.execute(
                "UPDATE gravity SET explicit_importance = explicit_importance + ?2
                 WHERE path = ?1",
                params![path, amount],
            )?;
            if updated == 0 {
                conn.execute(
                    "INSERT INTO gravity (path, line_start, line_end,
                                          explicit_importance, created_at)
                     VALUES (?1, 0, 0, ?2, ?3)",
                    params![path, amount, now],
                )?;
            }
            Ok(())
        })
    }

    // ========================================================================
    // READ SIDE
    // ========================================================================

    fn row_to_record(conn: &Connection, row: &rusqlite::Row<'_>) -> rusqlite::Result<GravityRecord> {
        let path: String = row.get(0)?;
        let raw_tags: String = row.get(10)?;
        let (tags, corrupt) = decode_tags(&path, &raw_tags);
        let line_start: u32 = row.get(1)?;
        let line_end: u32 = row.get(2)?;
        if corrupt {
            // Repair in place so the corruption is not re-decoded forever
            conn.execute(
                "UPDATE gravity SET tags = '[]'
                 WHERE path = ?1 AND line_start = ?2 AND line_end = ?3",
                params![path, line_start, line_end],
            )?;
        }
        let chamber: String = row.get(11)?;
        Ok(GravityRecord {
            path,
            lines: LineRange::new(line_start, line_end),
            access_count: row.get::<_, i64>(3)? as u64,
            reference_count: row.get::<_, i64>(4)? as u64,
            explicit_importance: row.get(5)?,
            last_accessed_at: parse_ts(row.get(6)?),
            last_written_at: parse_ts(row.get(7)?),
            created_at: parse_ts(row.get::<_, Option<String>>(8)?).unwrap_or_else(Utc::now),
            supersession: Supersession::from_column(row.get(9)?),
            tags,
            chamber: Chamber::parse(&chamber),
        })
    }

    const RECORD_COLUMNS: &'static str = "path, line_start, line_end, access_count, \
        reference_count, explicit_importance, last_accessed_at, last_written_at, \
        created_at, superseded_by, tags, chamber";

    /// Exact chunk lookup.
    pub fn get(&self, path: &str, lines: LineRange) -> Result<Option<GravityRecord>> {
        self.with_conn("get", |conn| {
            conn.query_row(
                &format!(
                    "SELECT {} FROM gravity
                     WHERE path = ?1 AND line_start = ?2 AND line_end = ?3",
                    Self::RECORD_COLUMNS
                ),
                params![path, lines.start, lines.end],
                |row| Self::row_to_record(conn, row),
            )
            .optional()
        })
    }

    /// File-level lookup: the whole-file row when present, otherwise the
    /// most-accessed chunk of the path.
    pub fn file_level(&self, path: &str) -> Result<Option<GravityRecord>> {
        self.with_conn("file_level", |conn| {
            conn.query_row(
                &format!(
                    "SELECT {} FROM gravity WHERE path = ?1
                     ORDER BY (line_start = 0 AND line_end = 0) DESC,
                              access_count DESC
                     LIMIT 1",
                    Self::RECORD_COLUMNS
                ),
                params![path],
                |row| Self::row_to_record(conn, row),
            )
            .optional()
        })
    }

    /// Every record, for maintenance sweeps.
    pub fn records(&self) -> Result<Vec<GravityRecord>> {
        self.with_conn("records", |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM gravity ORDER BY path, line_start, line_end",
                Self::RECORD_COLUMNS
            ))?;
            let rows = stmt.query_map([], |row| Self::row_to_record(conn, row))?;
            rows.collect()
        })
    }

    /// Chunk metadata for search enrichment: exact match first, file-level
    /// fallback second, defaults for unresolved candidates.
    pub fn lookup_meta(&self, path: &str, lines: LineRange) -> Result<ChunkMeta> {
        let record = match self.get(path, lines)? {
            Some(r) => Some(r),
            None => self.file_level(path)?,
        };
        Ok(match record {
            Some(r) => ChunkMeta {
                access_count: r.access_count,
                chamber: r.chamber,
                tags: r.tags,
                supersession: r.supersession,
            },
            None => ChunkMeta::default(),
        })
    }

    /// Effective mass of a chunk right now. Absent chunks weigh nothing.
    pub fn score(&self, path: &str, lines: LineRange) -> Result<f64> {
        let record = match self.get(path, lines)? {
            Some(r) => r,
            None => return Ok(0.0),
        };
        Ok(self.mass_of(&record, Utc::now()))
    }

    fn mass_of(&self, record: &GravityRecord, now: DateTime<Utc>) -> f64 {
        let days = scoring::days_since(now, record.last_written_at);
        scoring::effective_mass(
            record.access_count,
            record.reference_count,
            record.explicit_importance,
            days,
            &self.params,
        )
    }

    /// Multiply each candidate's base score by its gravity modifier and sort
    /// descending. Superseded records are excluded from the output entirely.
    pub fn rerank(&self, candidates: &[(String, LineRange, f64)]) -> Result<Vec<RankedChunk>> {
        let now = Utc::now();
        let mut ranked = Vec::with_capacity(candidates.len());
        for (path, lines, base_score) in candidates {
            let record = match self.get(path, *lines)? {
                Some(r) => Some(r),
                None => self.file_level(path)?,
            };
            let (mass, active) = match &record {
                Some(r) => (self.mass_of(r, now), r.supersession.is_active()),
                None => (0.0, true),
            };
            if !active {
                continue;
            }
            ranked.push(RankedChunk {
                path: path.clone(),
                lines: *lines,
                base_score: *base_score,
                adjusted_score: base_score * scoring::score_modifier(mass),
                effective_mass: mass,
            });
        }
        ranked.sort_by(|a, b| {
            b.adjusted_score
                .partial_cmp(&a.adjusted_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(ranked)
    }

    // ========================================================================
    // TAGS AND CHAMBERS
    // ========================================================================

    /// Union of stored tags across every chunk of `path`, order-preserving.
    pub fn tags_for(&self, path: &str) -> Result<Vec<String>> {
        self.with_conn("tags_for", |conn| {
            let mut stmt = conn.prepare(
                "SELECT path, tags FROM gravity WHERE path = ?1
                 ORDER BY line_start, line_end",
            )?;
            let rows = stmt.query_map(params![path], |row| {
                let p: String = row.get(0)?;
                let raw: String = row.get(1)?;
                Ok(decode_tags(&p, &raw).0)
            })?;
            let mut merged: Vec<String> = Vec::new();
            for tags in rows {
                for tag in tags? {
                    if !merged.contains(&tag) {
                        merged.push(tag);
                    }
                }
            }
            Ok(merged)
        })
    }

    /// Merge `new_tags` into the stored tags of every chunk of `path`.
    /// Strictly additive: existing tags are never removed. Returns the final
    /// merged set. Creates the whole-file record when none exists.
    pub fn merge_tags(&self, path: &str, new_tags: &[String]) -> Result<Vec<String>> {
        let mut merged = self.tags_for(path)?;
        for tag in new_tags {
            if !merged.contains(tag) {
                merged.push(tag.clone());
            }
        }
        let encoded = serde_json::to_string(&merged)?;
        let now = encode_ts(Utc::now());
        self.with_conn("merge_tags", |conn| {
            let updated = conn.execute(
                "UPDATE gravity SET tags = ?2 WHERE path = ?1",
                params![path, encoded],
            )?;
            if updated == 0 {
                conn.execute(
                    "INSERT INTO gravity (path, line_start, line_end, tags, created_at)
                     VALUES (?1, 0, 0, ?2, ?3)",
                    params![path, encoded, now],
                )?;
            }
            Ok(())
        })?;
        Ok(merged)
    }

    /// Reassign the chamber of every chunk of `path`.
    pub fn set_chamber(&self, path: &str, chamber: Chamber) -> Result<usize> {
        self.with_conn("set_chamber", |conn| {
            conn.execute(
                "UPDATE gravity SET chamber = ?2 WHERE path = ?1",
                params![path, chamber.as_str()],
            )
        })
    }

    /// Insert a record for a derived artifact (summary or lesson), already
    /// classified into its chamber and tagged back to its source.
    pub fn insert_derived(&self, path: &str, chamber: Chamber, tags: &[String]) -> Result<()> {
        let encoded = serde_json::to_string(tags)?;
        let now = encode_ts(Utc::now());
        self.with_conn("insert_derived", |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO gravity
                     (path, line_start, line_end, last_written_at, created_at,
                      tags, chamber)
                 VALUES (?1, 0, 0, ?2, ?2, ?3, ?4)",
                params![path, now, encoded, chamber.as_str()],
            )?;
            Ok(())
        })
    }

    // ========================================================================
    // SUPERSESSION
    // ========================================================================

    fn supersession_target(&self, path: &str) -> Result<Option<String>> {
        self.with_conn("supersession_target", |conn| {
            conn.query_row(
                "SELECT superseded_by FROM gravity
                 WHERE path = ?1 AND superseded_by IS NOT NULL
                 LIMIT 1",
                params![path],
                |row| row.get(0),
            )
            .optional()
        })
    }

    /// Mark every chunk of `old_path` as superseded by `new_path`.
    ///
    /// Supersession chains must stay acyclic; a forward walk from `new_path`
    /// that reaches `old_path` refuses the operation.
    pub fn supersede(&self, old_path: &str, new_path: &str) -> Result<()> {
        if old_path == new_path {
            return Err(GravityError::invalid_input(
                "new_path",
                "a record cannot supersede itself",
            ));
        }
        let mut cursor = new_path.to_string();
        for _ in 0..SUPERSESSION_WALK_LIMIT {
            match self.supersession_target(&cursor)? {
                Some(next) if next == old_path => {
                    return Err(GravityError::invalid_input(
                        "new_path",
                        "supersession would create a cycle",
                    ));
                }
                Some(next) => cursor = next,
                None => break,
            }
        }
        let updated = self.with_conn("supersede", |conn| {
            conn.execute(
                "UPDATE gravity SET superseded_by = ?2 WHERE path = ?1",
                params![old_path, new_path],
            )
        })?;
        if updated == 0 {
            return Err(GravityError::NotFound(old_path.to_string()));
        }
        Ok(())
    }

    // ========================================================================
    // DECAY / RETENTION
    // ========================================================================

    /// The scheduled decay sweep.
    ///
    /// Decay itself is lazy: the recency factor is evaluated at read time
    /// from `last_written_at`, so there is nothing to recompute here. The
    /// sweep's only mutation is retention pruning of access-log rows and of
    /// gravity rows that have sat superseded for longer than the retention
    /// window. Idempotent.
    pub fn decay(&self) -> Result<PruneReport> {
        let cutoff = encode_ts(Utc::now() - chrono::Duration::days(self.retention_days));
        self.with_conn("decay", |conn| {
            let tx = conn.unchecked_transaction()?;
            let pruned_log_entries = tx.execute(
                "DELETE FROM access_log WHERE accessed_at < ?1",
                params![cutoff],
            )?;
            let pruned_records = tx.execute(
                "DELETE FROM gravity
                 WHERE superseded_by IS NOT NULL
                   AND COALESCE(last_accessed_at, created_at) < ?1",
                params![cutoff],
            )?;
            tx.commit()?;
            Ok(PruneReport {
                pruned_records,
                pruned_log_entries,
            })
        })
    }

    // ========================================================================
    // MIRRORS
    // ========================================================================

    /// Upsert a mirror link; duplicate `(event_key, granularity)` pairs are
    /// ignored silently. Returns whether a new row was inserted.
    pub fn mirror_link(
        &self,
        event_key: &str,
        granularity: Granularity,
        path: &str,
        lines: LineRange,
    ) -> Result<bool> {
        let now = encode_ts(Utc::now());
        self.with_conn("mirror_link", |conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO mirrors
                     (event_key, granularity, path, line_start, line_end, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    event_key,
                    granularity.as_str(),
                    path,
                    lines.start,
                    lines.end,
                    now
                ],
            )?;
            Ok(inserted > 0)
        })
    }

    fn row_to_mirror(row: &rusqlite::Row<'_>) -> rusqlite::Result<Option<MirrorRecord>> {
        let granularity: String = row.get(1)?;
        let Some(granularity) = Granularity::parse(&granularity) else {
            return Ok(None);
        };
        Ok(Some(MirrorRecord {
            event_key: row.get(0)?,
            granularity,
            path: row.get(2)?,
            lines: LineRange::new(row.get(3)?, row.get(4)?),
            created_at: parse_ts(row.get::<_, Option<String>>(5)?).unwrap_or_else(Utc::now),
        }))
    }

    /// All granularities recorded for an event.
    pub fn mirror_event(&self, event_key: &str) -> Result<Vec<MirrorRecord>> {
        self.with_conn("mirror_event", |conn| {
            let mut stmt = conn.prepare(
                "SELECT event_key, granularity, path, line_start, line_end, created_at
                 FROM mirrors WHERE event_key = ?1 ORDER BY granularity",
            )?;
            let rows = stmt.query_map(params![event_key], Self::row_to_mirror)?;
            rows.filter_map(|r| r.transpose()).collect()
        })
    }

    /// The *other* granularities of every event `path` participates in, so a
    /// caller holding only a vault lesson can locate the raw source.
    pub fn mirror_resolve(&self, path: &str) -> Result<Vec<MirrorRecord>> {
        self.with_conn("mirror_resolve", |conn| {
            let mut stmt = conn.prepare(
                "SELECT event_key, granularity, path, line_start, line_end, created_at
                 FROM mirrors
                 WHERE event_key IN (SELECT event_key FROM mirrors WHERE path = ?1)
                   AND path != ?1
                 ORDER BY event_key, granularity",
            )?;
            let rows = stmt.query_map(params![path], Self::row_to_mirror)?;
            rows.filter_map(|r| r.transpose()).collect()
        })
    }

    /// Coverage health metric: events with all three granularities vs total.
    pub fn mirror_coverage(&self) -> Result<MirrorCoverage> {
        self.with_conn("mirror_coverage", |conn| {
            let total_events: usize = conn.query_row(
                "SELECT COUNT(DISTINCT event_key) FROM mirrors",
                [],
                |row| row.get::<_, i64>(0).map(|n| n as usize),
            )?;
            let fully_mirrored: usize = conn.query_row(
                "SELECT COUNT(*) FROM (
                     SELECT event_key FROM mirrors
                     GROUP BY event_key
                     HAVING COUNT(DISTINCT granularity) = ?1
                 )",
                params![Granularity::ALL.len()],
                |row| row.get::<_, i64>(0).map(|n| n as usize),
            )?;
            Ok(MirrorCoverage {
                fully_mirrored,
                total_events,
            })
        })
    }

    // ========================================================================
    // STATS / HISTORY
    // ========================================================================

    /// Most recent access-log entries, newest first.
    pub fn recent_accesses(&self, limit: usize) -> Result<Vec<AccessLogEntry>> {
        self.with_conn("recent_accesses", |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, path, line_start, line_end, accessed_at, query, score, context
                 FROM access_log ORDER BY id DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit], |row| {
                Ok(AccessLogEntry {
                    id: row.get(0)?,
                    path: row.get(1)?,
                    lines: LineRange::new(row.get(2)?, row.get(3)?),
                    accessed_at: parse_ts(row.get::<_, Option<String>>(4)?)
                        .unwrap_or_else(Utc::now),
                    query: row.get(5)?,
                    score: row.get(6)?,
                    context: row.get(7)?,
                })
            })?;
            rows.collect()
        })
    }

    pub fn stats(&self) -> Result<StoreStats> {
        self.with_conn("stats", |conn| {
            let count = |sql: &str| -> rusqlite::Result<usize> {
                conn.query_row(sql, [], |row| row.get::<_, i64>(0).map(|n| n as usize))
            };
            Ok(StoreStats {
                total_records: count("SELECT COUNT(*) FROM gravity")?,
                atrium: count("SELECT COUNT(*) FROM gravity WHERE chamber = 'atrium'")?,
                corridor: count("SELECT COUNT(*) FROM gravity WHERE chamber = 'corridor'")?,
                vault: count("SELECT COUNT(*) FROM gravity WHERE chamber = 'vault'")?,
                unknown: count("SELECT COUNT(*) FROM gravity WHERE chamber = 'unknown'")?,
                superseded: count(
                    "SELECT COUNT(*) FROM gravity WHERE superseded_by IS NOT NULL",
                )?,
                access_log_entries: count("SELECT COUNT(*) FROM access_log")?,
            })
        })
    }
}
