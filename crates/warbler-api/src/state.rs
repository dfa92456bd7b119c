use std::sync::Arc;

use chrono::Duration;
use tracing::error;
use warbler_db::Database;

use crate::error::AppError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub session_secret: String,
    pub session_max_age: Duration,
}

impl AppStateInner {
    pub fn new(db: Database, session_secret: String, session_max_age: Duration) -> AppState {
        Arc::new(Self {
            db,
            session_secret,
            session_max_age,
        })
    }

    /// Run a store call on the blocking pool.
    pub async fn with_db<F, T>(self: &Arc<Self>, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&Database) -> warbler_db::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let state = Arc::clone(self);
        blocking(move || f(&state.db)).await
    }
}

/// Run blocking work (SQLite, Argon2) off the async runtime.
pub async fn blocking<F, T, E>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Into<AppError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            AppError::Internal(e.into())
        })?
        .map_err(Into::into)
}
