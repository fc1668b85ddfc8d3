//! Error types for the digest pipeline.
//!
//! Failures are classified by where in a run they occur, because each stage
//! has its own containment rule: a bad article stays inside its fetch job, a
//! bad source stays inside the run loop, and only setup problems abort the
//! process. The variant a function returns tells the caller which rule
//! applies.

use thiserror::Error;

/// Common error type for pipeline operations.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The shared database is missing required tables, or the environment is
    /// otherwise unusable. The only class that aborts a run before fetching.
    #[error("setup incomplete: {0}")]
    ConfigMissing(String),

    /// The configuration file could not be read or parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// A feed could not be fetched or parsed. The affected source simply
    /// contributes zero records for the day.
    #[error("feed unavailable: {0}")]
    Feed(String),

    /// A single article could not be turned into a staging candidate
    /// (transport failure, non-article content, or an implausible body).
    #[error("extraction failed: {0}")]
    Extraction(String),

    /// Appending one record to the staging store failed after retrying.
    #[error("staging write failed: {0}")]
    StagingWrite(String),

    /// A staged source id no longer resolves to a display name.
    #[error("no display name for source id {0}")]
    SourceNameUnresolved(i64),

    /// Rendering a digest into its artifacts failed. Staged records are kept
    /// so a later run can retry.
    #[error("render failed: {0}")]
    Render(String),

    /// Writing finished artifacts to the shared store failed.
    #[error("persist failed: {0}")]
    Persist(String),

    /// Database error outside the classes above.
    #[error("database error: {0}")]
    Database(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// Conversion from sqlx errors
impl From<sqlx::Error> for PipelineError {
    fn from(e: sqlx::Error) -> Self {
        PipelineError::Database(e.to_string())
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
