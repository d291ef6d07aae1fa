use std::path::PathBuf;
use thiserror::Error;

/// Failures of the record store. Any of these aborts a merge before the
/// store file is replaced, so the previous content stays intact.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not lock {path}: {source}")]
    Lock {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("corrupt store row at line {line}: {reason}")]
    Corrupt { line: u64, reason: String },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("background task failed: {0}")]
    Task(String),
}

impl StoreError {
    pub(crate) fn corrupt(err: csv::Error) -> Self {
        let line = err.position().map(|p| p.line()).unwrap_or(0);
        let reason = err.to_string();
        match err.into_kind() {
            csv::ErrorKind::Io(io) => Self::Io(io),
            _ => Self::Corrupt { line, reason },
        }
    }
}
