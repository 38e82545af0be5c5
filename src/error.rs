//! Error types for marketmap_rs
//!
//! This module defines domain-specific error types that provide clear,
//! actionable error messages to users.

use thiserror::Error;

/// Errors raised while loading a market snapshot file.
///
/// These errors are shown directly to users and should be clear and actionable.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Failed to read snapshot file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Snapshot JSON was not well-formatted: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to decrypt '{path}' with gpg: {reason}")]
    Gpg { path: String, reason: String },
}
