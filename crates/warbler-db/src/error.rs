use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    /// A `UNIQUE` column rejected the write. `field` is the column name.
    #[error("{field} already taken")]
    UniqueViolation { field: &'static str },

    #[error("database lock poisoned")]
    LockPoisoned,

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, DbError>;

/// Turn SQLite's `UNIQUE constraint failed: users.<column>` into a typed error.
pub(crate) fn classify_unique(err: rusqlite::Error) -> DbError {
    if let rusqlite::Error::SqliteFailure(code, Some(msg)) = &err {
        if code.code == ErrorCode::ConstraintViolation && msg.starts_with("UNIQUE") {
            if msg.contains("users.username") {
                return DbError::UniqueViolation { field: "username" };
            }
            if msg.contains("users.email") {
                return DbError::UniqueViolation { field: "email" };
            }
        }
    }
    DbError::Sqlite(err)
}
