//! Structured error types for the memory-gravity engine
//!
//! Errors carry a machine-readable code alongside the human-readable message
//! so CLI consumers can branch on failure class without parsing prose.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Structured error payload emitted by the CLI on unrecoverable failures
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorReport {
    /// Machine-readable error code
    pub code: String,

    /// Human-readable error message
    pub message: String,
}

/// Application error types with proper categorization
#[derive(Debug)]
pub enum GravityError {
    /// Persistent store unavailable or rejecting operations
    Storage(String),

    /// Write contention that survived the bounded retry loop
    Busy { operation: String, attempts: u32 },

    /// A persisted field failed to decode; the field is reset to its empty
    /// default by the reader, this variant only surfaces when the row itself
    /// is unusable
    CorruptRecord { path: String, reason: String },

    /// External collaborator (vector search, summarizer) failed or timed out
    Collaborator { service: String, reason: String },

    /// Caller handed us something unusable
    InvalidInput { field: String, reason: String },

    /// Referenced record does not exist
    NotFound(String),

    /// Generic wrapper for external errors
    Internal(anyhow::Error),
}

impl GravityError {
    pub fn collaborator(service: &str, reason: impl fmt::Display) -> Self {
        Self::Collaborator {
            service: service.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_input(field: &str, reason: impl fmt::Display) -> Self {
        Self::InvalidInput {
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Get error code for client identification
    pub fn code(&self) -> &'static str {
        match self {
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Busy { .. } => "STORE_BUSY",
            Self::CorruptRecord { .. } => "CORRUPT_RECORD",
            Self::Collaborator { .. } => "COLLABORATOR_FAILED",
            Self::InvalidInput { .. } => "INVALID_INPUT",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Get detailed error message
    pub fn message(&self) -> String {
        match self {
            Self::Storage(msg) => format!("Storage error: {msg}"),
            Self::Busy {
                operation,
                attempts,
            } => {
                format!("Store busy: '{operation}' abandoned after {attempts} attempts")
            }
            Self::CorruptRecord { path, reason } => {
                format!("Corrupt record for '{path}': {reason}")
            }
            Self::Collaborator { service, reason } => {
                format!("Collaborator '{service}' failed: {reason}")
            }
            Self::InvalidInput { field, reason } => {
                format!("Invalid input for field '{field}': {reason}")
            }
            Self::NotFound(what) => format!("Not found: {what}"),
            Self::Internal(err) => format!("Internal error: {err}"),
        }
    }

    /// Convert to the structured payload printed by the CLI
    pub fn to_report(&self) -> ErrorReport {
        ErrorReport {
            code: self.code().to_string(),
            message: self.message(),
        }
    }
}

impl fmt::Display for GravityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for GravityError {}

impl From<anyhow::Error> for GravityError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

impl From<rusqlite::Error> for GravityError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<std::io::Error> for GravityError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(format!("io: {err}"))
    }
}

impl From<serde_json::Error> for GravityError {
    fn from(err: serde_json::Error) -> Self {
        Self::Storage(format!("json: {err}"))
    }
}

/// Type alias for Results using GravityError
pub type Result<T> = std::result::Result<T, GravityError>;
