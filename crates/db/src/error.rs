use conveyor_core::error::CoreError;

/// Error type returned by every repository operation.
///
/// Wraps the domain taxonomy from `conveyor-core` plus raw database
/// failures. Unique violations on `uq_`-prefixed constraints become
/// [`CoreError::Conflict`] before wrapping.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

/// Convenience type alias for repository return values.
pub type StoreResult<T> = Result<T, StoreError>;

impl From<sqlx::Error> for StoreError {
    /// Classify a sqlx error before wrapping.
    ///
    /// PostgreSQL unique violations (code 23505) on `uq_`-named
    /// constraints -- in this schema, the master-upload partial index --
    /// surface as [`CoreError::Conflict`] so the caller can retry the
    /// promotion rather than treat it as an internal fault.
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.code().as_deref() == Some("23505") {
                let constraint = db_err.constraint().unwrap_or("unknown");
                if constraint.starts_with("uq_") {
                    return StoreError::Core(CoreError::Conflict(format!(
                        "Duplicate value violates unique constraint: {constraint}"
                    )));
                }
            }
        }
        StoreError::Database(err)
    }
}

impl StoreError {
    /// Whether this is a retryable promotion conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Core(CoreError::Conflict(_)))
    }

    /// Whether the referenced entity was absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::Core(CoreError::NotFound { .. }))
    }
}
