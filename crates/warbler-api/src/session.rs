//! Signed session cookie.
//!
//! The cookie holds a JWT signed with the configured secret. Its claims carry
//! the logged-in user id (if any) and the CSRF token for the session. Nothing
//! is stored server-side.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::debug;
use warbler_types::api::SessionClaims;

use crate::error::AppError;
use crate::state::AppStateInner;

pub const SESSION_COOKIE: &str = "session";

/// Fresh claims with a new CSRF token.
pub fn new_claims(state: &AppStateInner, user_id: Option<i64>) -> SessionClaims {
    SessionClaims {
        sub: user_id,
        csrf: new_csrf_token(),
        exp: (chrono::Utc::now() + state.session_max_age).timestamp() as usize,
    }
}

pub fn encode_session(claims: &SessionClaims, secret: &str) -> anyhow::Result<String> {
    let token = encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok(token)
}

/// `None` for a tampered, malformed or expired token.
pub fn decode_session(token: &str, secret: &str) -> Option<SessionClaims> {
    match decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    ) {
        Ok(data) => Some(data.claims),
        Err(e) => {
            debug!("discarding session cookie: {}", e);
            None
        }
    }
}

pub fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

/// Start an authenticated session for `user_id`. The CSRF token rotates.
pub fn login(
    state: &AppStateInner,
    jar: CookieJar,
    user_id: i64,
) -> Result<(CookieJar, SessionClaims), AppError> {
    replace(state, jar, Some(user_id))
}

/// Drop the user id from the session. Safe to call when already anonymous.
pub fn logout(
    state: &AppStateInner,
    jar: CookieJar,
) -> Result<(CookieJar, SessionClaims), AppError> {
    replace(state, jar, None)
}

fn replace(
    state: &AppStateInner,
    jar: CookieJar,
    user_id: Option<i64>,
) -> Result<(CookieJar, SessionClaims), AppError> {
    let claims = new_claims(state, user_id);
    let token = encode_session(&claims, &state.session_secret)?;
    Ok((jar.add(session_cookie(token)), claims))
}

/// Compare the submitted token with the session's in constant time.
pub fn verify_csrf(claims: &SessionClaims, submitted: &str) -> Result<(), AppError> {
    let expected = claims.csrf.as_bytes();
    let submitted = submitted.as_bytes();
    if expected.is_empty() || expected.len() != submitted.len() {
        return Err(AppError::Csrf);
    }
    let diff = expected
        .iter()
        .zip(submitted)
        .fold(0u8, |acc, (a, b)| acc | (a ^ b));
    if diff == 0 { Ok(()) } else { Err(AppError::Csrf) }
}

fn new_csrf_token() -> String {
    B64.encode(rand::random::<[u8; 32]>())
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use warbler_db::Database;

    use super::*;

    fn state() -> std::sync::Arc<AppStateInner> {
        AppStateInner::new(
            Database::open_in_memory().unwrap(),
            "test-secret".into(),
            Duration::days(1),
        )
    }

    #[test]
    fn test_round_trip_and_tamper() {
        let state = state();
        let claims = new_claims(&state, Some(7));
        let token = encode_session(&claims, "test-secret").unwrap();

        assert_eq!(decode_session(&token, "test-secret"), Some(claims));
        assert_eq!(decode_session(&token, "other-secret"), None);
        assert_eq!(decode_session("not.a.jwt", "test-secret"), None);
    }

    #[test]
    fn test_expired_session_is_rejected() {
        let claims = SessionClaims {
            sub: Some(1),
            csrf: "x".into(),
            exp: (chrono::Utc::now() - Duration::hours(2)).timestamp() as usize,
        };
        let token = encode_session(&claims, "test-secret").unwrap();
        assert_eq!(decode_session(&token, "test-secret"), None);
    }

    #[test]
    fn test_login_rotates_csrf_and_logout_clears_user() {
        let state = state();
        let (jar, first) = login(&state, CookieJar::new(), 3).unwrap();
        assert_eq!(first.sub, Some(3));
        let cookie = jar.get(SESSION_COOKIE).unwrap();
        assert_eq!(
            decode_session(cookie.value(), &state.session_secret),
            Some(first.clone())
        );

        let (_, second) = logout(&state, jar).unwrap();
        assert_eq!(second.sub, None);
        assert_ne!(first.csrf, second.csrf);
    }

    #[test]
    fn test_verify_csrf() {
        let claims = SessionClaims {
            sub: None,
            csrf: "abc123".into(),
            exp: 0,
        };
        assert!(verify_csrf(&claims, "abc123").is_ok());
        assert!(matches!(verify_csrf(&claims, "abc124"), Err(AppError::Csrf)));
        assert!(matches!(verify_csrf(&claims, ""), Err(AppError::Csrf)));
        assert!(matches!(verify_csrf(&claims, "abc1234"), Err(AppError::Csrf)));
    }
}
