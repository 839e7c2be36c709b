use thiserror::Error;

/// Boxed error reported by a job or an external collaborator.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Invalid ledger scope: {0}")]
    ScopeValidationError(String),
    #[error("Usage error: {0}")]
    UsageError(String),
    #[error("Job {index} failed: {source}")]
    JobFailure {
        index: usize,
        #[source]
        source: BoxError,
    },
    #[error("{} of {total} jobs failed", .failures.len())]
    PartialFailure {
        total: usize,
        failures: Vec<LedgerError>,
    },
}

impl LedgerError {
    /// Index of the failing job, for job failures.
    pub fn job_index(&self) -> Option<usize> {
        match self {
            LedgerError::JobFailure { index, .. } => Some(*index),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
