//! Common error types for MoodLens

use thiserror::Error;

/// Common result type for MoodLens operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across MoodLens crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Required column or feature absent from the input
    ///
    /// Carries both lists so the caller can see what was expected and what it sent.
    #[error("Schema error: missing {missing:?} (available: {available:?})")]
    Schema {
        missing: Vec<String>,
        available: Vec<String>,
    },

    /// No valid rows remained after filtering
    #[error("No valid rows after filtering ({total_rows} rows inspected)")]
    DegenerateCorpus { total_rows: usize },

    /// Model training, loading or inference failure
    #[error("Model error: {0}")]
    Model(String),

    /// JSON (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Delimited-text read/write error
    #[error("CSV error: {0}")]
    Csv(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Build a schema error from borrowed name lists
    pub fn schema<M, A>(missing: M, available: A) -> Self
    where
        M: IntoIterator,
        M::Item: Into<String>,
        A: IntoIterator,
        A::Item: Into<String>,
    {
        Error::Schema {
            missing: missing.into_iter().map(Into::into).collect(),
            available: available.into_iter().map(Into::into).collect(),
        }
    }
}
