use thiserror::Error;

use crate::DatasetId;

/// Rejection of an uploaded file. Either variant rejects the whole file.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("missing required column(s): {}", .missing.join(", "))]
    Schema { missing: Vec<String> },

    /// `row` is the 1-based index of the data row (header excluded); 0 is the
    /// header row itself.
    #[error("row {row}: {reason}")]
    Row {
        row: usize,
        column: Option<String>,
        reason: String,
    },
}

impl ParseError {
    pub fn code(&self) -> &'static str {
        match self {
            ParseError::Schema { .. } => "schema_error",
            ParseError::Row { .. } => "row_parse_error",
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Backend(String),

    #[error("dataset {0} is not awaiting commit")]
    NotPending(DatasetId),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("ingest rejected: {0}")]
    Ingest(#[from] ParseError),

    #[error("dataset {0} not found")]
    NotFound(DatasetId),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("report rendering failed: {0}")]
    Render(String),
}

impl Error {
    /// Stable, client-visible error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Ingest(e) => e.code(),
            Error::NotFound(_) => "not_found",
            Error::Store(_) => "store_error",
            Error::Render(_) => "render_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
