//! Error types for the form engine

use thiserror::Error;

/// Result type for fallible form engine operations
pub type Result<T> = std::result::Result<T, FormError>;

/// Errors surfaced at the edges of the engine.
///
/// Validation failures, duplicate registrations and stale option completions
/// are ordinary state, not errors.
#[derive(Debug, Error)]
pub enum FormError {
    /// Strict lookup of a field id that is not registered
    #[error("unknown field: {id}")]
    UnknownField { id: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
