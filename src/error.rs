//! The error type of the pipeline stages.
//!
//! Stages return `PipelineError`; the analysis runner (see
//! [`pipeline`](crate::pipeline)) wraps them into `anyhow::Error`
//! with the stage name and the input shape attached. The original
//! `PipelineError` stays reachable via `downcast_ref`.

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    /// A required column is absent or of the wrong kind, no rows
    /// remained after dropping missing measurements, or the features
    /// contain non-finite values.
    #[error("missing data: {0}")]
    MissingData(String),

    /// Requested cluster or component count incompatible with the
    /// input, or otherwise unusable parameters.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("length mismatch for {what}: {left} vs. {right}")]
    LengthMismatch {
        what: &'static str,
        left: usize,
        right: usize,
    },

    #[error("duplicate column name {0:?}")]
    DuplicateColumn(String),

    /// `row` is 1-based, counting data rows after the header.
    #[error("malformed number {value:?} in column {column:?}, data row {row}")]
    MalformedValue {
        column: String,
        row: u64,
        value: String,
    },

    #[error("reading CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("opening {path:?}: {source}")]
    Io {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    /// Reported by the clustering library.
    #[error("{algorithm} failed: {message}")]
    Clustering {
        algorithm: &'static str,
        message: String,
    },
}

impl PipelineError {
    pub fn is_invalid_configuration(&self) -> bool {
        matches!(self, PipelineError::InvalidConfiguration(_))
    }

    pub fn is_missing_data(&self) -> bool {
        matches!(self, PipelineError::MissingData(_))
    }
}
