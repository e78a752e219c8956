use thiserror::Error;

/// Errors raised by the record-keeping core.
///
/// Data-quality problems (bad grade tokens, missing units) never show up here;
/// the GWA engine absorbs them. Per-student batch failures are reported in the
/// batch outcome instead of being returned.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    NotFound(String),
    /// The write would duplicate something that already exists.
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Persistence(#[from] rusqlite::Error),
}

impl CoreError {
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::InvalidInput(_) => "bad_params",
            CoreError::NotFound(_) => "not_found",
            CoreError::Conflict(_) => "conflict",
            CoreError::Persistence(_) => "db_query_failed",
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
