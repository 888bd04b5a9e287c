//! Error types for the reqlog domain.
//!
//! Uses `thiserror` for ergonomic error definitions. Extraction errors are
//! never propagated to the request path; the exporter recovers them per key.

use thiserror::Error;

/// Why a single exported value could not be produced.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Part of the context could not be read (e.g. a poisoned lock).
    #[error("context state unavailable: {0}")]
    Unavailable(String),

    /// A value did not have the shape its type hint promised.
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result of a single extraction: `Ok(None)` means the value is absent for
/// this request, which is not an error.
pub type ExtractResult = std::result::Result<Option<String>, ExtractError>;
