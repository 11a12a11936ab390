//! Error types for huella

use thiserror::Error;

/// Errors that can occur during evaluation and reporting
#[derive(Error, Debug)]
pub enum AnalyzeError {
    /// Concrete evaluation referenced a register never assigned
    #[error("Unresolved register: {0}")]
    UnresolvedRegister(String),

    /// Select referenced a predicate register never set
    #[error("Unresolved predicate: {0}")]
    UnresolvedPredicate(String),

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for huella operations
pub type Result<T> = std::result::Result<T, AnalyzeError>;
