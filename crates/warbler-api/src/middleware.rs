use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use tracing::{debug, error};
use warbler_db::models::UserRow;
use warbler_types::api::SessionClaims;

use crate::error::AppError;
use crate::flash::{self, PendingFlash};
use crate::session::{self, SESSION_COOKIE};
use crate::state::AppState;

/// Who is making this request. Resolved once per request by [`load_session`]
/// and read by handlers through extractors.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub session: SessionClaims,
    /// `None` when anonymous, or when the session names a deleted account.
    pub user: Option<UserRow>,
}

impl RequestContext {
    pub fn verify_csrf(&self, submitted: &str) -> Result<(), AppError> {
        session::verify_csrf(&self.session, submitted)
    }
}

/// Decode the session cookie and resolve the current user before every
/// request. Visitors without a valid cookie get a new anonymous session.
pub async fn load_session(
    State(state): State<AppState>,
    mut jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    let existing = jar
        .get(SESSION_COOKIE)
        .and_then(|cookie| session::decode_session(cookie.value(), &state.session_secret));
    let fresh = existing.is_none();
    let claims = existing.unwrap_or_else(|| session::new_claims(&state, None));

    let user = match claims.sub {
        Some(user_id) => match state.with_db(move |db| db.get_user_by_id(user_id)).await {
            Ok(user) => user,
            Err(e) => return e.into_response(),
        },
        None => None,
    };
    if claims.sub.is_some() && user.is_none() {
        debug!(user_id = ?claims.sub, "session names a deleted user, treating as anonymous");
    }

    req.extensions_mut().insert(RequestContext {
        session: claims.clone(),
        user,
    });

    let mut response = next.run(req).await;
    let mut changed = false;

    if let Some(PendingFlash(pending)) = response.extensions_mut().remove::<PendingFlash>() {
        jar = flash::push(jar, pending);
        changed = true;
    }

    // Handlers that log in or out set their own cookie.
    if fresh && !sets_session_cookie(&response) {
        match session::encode_session(&claims, &state.session_secret) {
            Ok(token) => {
                jar = jar.add(session::session_cookie(token));
                changed = true;
            }
            Err(e) => error!("failed to sign session: {:#}", e),
        }
    }

    if changed {
        (jar, response).into_response()
    } else {
        response
    }
}

fn sets_session_cookie(response: &Response) -> bool {
    let prefix = format!("{SESSION_COOKIE}=");
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.starts_with(&prefix))
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("session layer not installed")))
    }
}

/// An authenticated caller. Extracting it is the gate on protected routes:
/// anonymous requests are rejected with [`AppError::Unauthorized`].
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: UserRow,
    pub session: SessionClaims,
}

impl CurrentUser {
    pub fn id(&self) -> i64 {
        self.user.id
    }

    pub fn verify_csrf(&self, submitted: &str) -> Result<(), AppError> {
        session::verify_csrf(&self.session, submitted)
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let ctx = RequestContext::from_request_parts(parts, state).await?;
        match ctx.user {
            Some(user) => Ok(CurrentUser {
                user,
                session: ctx.session,
            }),
            None => Err(AppError::Unauthorized),
        }
    }
}
