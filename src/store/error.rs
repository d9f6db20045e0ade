use crate::error::ApiError;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0} already exists")]
    Conflict(String),

    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

impl StoreError {
    /// Translate Postgres constraint violations into domain errors.
    /// `23505` is a unique violation, `23503` a foreign-key violation.
    pub(crate) fn from_db(err: sqlx::Error, conflict: impl FnOnce() -> String) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            match db_err.code().as_deref() {
                Some("23505") => return Self::Conflict(conflict()),
                Some("23503") => return Self::NotFound("project"),
                _ => {}
            }
        }
        Self::Db(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => Self::NotFound(what.into()),
            StoreError::Conflict(msg) => Self::Conflict(format!("{msg} already exists")),
            StoreError::Db(e) => Self::from(e),
        }
    }
}
