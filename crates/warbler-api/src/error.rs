//! Error type shared by every handler.
//!
//! Authorization failures are not reported as errors to the client: they
//! redirect home with a flash, the same way a browser form flow expects.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use thiserror::Error;
use tracing::error;
use warbler_db::DbError;
use warbler_types::api::Flash;

use crate::flash::PendingFlash;

#[derive(Debug, Error)]
pub enum AppError {
    /// Unknown user or message id (404)
    #[error("Not found")]
    NotFound,

    /// Anonymous caller on a protected route, or a caller acting on
    /// something they do not own (redirect + flash)
    #[error("Access unauthorized.")]
    Unauthorized,

    /// Missing or mismatched CSRF token on a mutation (400)
    #[error("CSRF token missing or invalid")]
    Csrf,

    /// Store failure. Unique violations that escape a handler map to 409.
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Unauthorized => {
                let mut response = Redirect::to("/").into_response();
                response
                    .extensions_mut()
                    .insert(PendingFlash(Flash::danger(self.to_string())));
                return response;
            }
            AppError::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::Csrf => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::Database(DbError::UniqueViolation { .. }) => {
                (StatusCode::CONFLICT, self.to_string())
            }
            AppError::Database(e) => {
                error!("database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                )
            }
            AppError::Internal(e) => {
                error!("internal error: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
