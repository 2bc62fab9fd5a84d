use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error("Rollback failed: {rollback} (while handling: {original})")]
    RollbackFailed {
        original: Box<AppError>,
        rollback: sqlx::Error,
    },
}

impl AppError {
    /// True when the underlying database error is an exclusion-constraint
    /// violation (Postgres `23P01`), e.g. overlapping timetable intervals.
    pub fn is_exclusion_violation(&self) -> bool {
        match self {
            AppError::Database(sqlx::Error::Database(db)) => db.code().as_deref() == Some("23P01"),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
