use thiserror::Error;

/// Errors from the relational layer (main store and tenant databases)
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid schema name: {0}")]
    InvalidSchemaName(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate: {0}")]
    Duplicate(String),

    #[error("Stored data is corrupt: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Map unique-constraint violations to `Duplicate`, everything else to `Sqlx`.
    pub fn from_write(err: sqlx::Error, what: impl Into<String>) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => DatabaseError::Duplicate(what.into()),
            _ => DatabaseError::Sqlx(err),
        }
    }
}
