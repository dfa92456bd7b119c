use axum::Json;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::CookieJar;
use serde::Serialize;
use warbler_db::models::UserRow;
use warbler_types::api::{Flash, Page, SessionClaims};

use crate::flash;

/// Render a page body inside the common envelope.
///
/// Flashes queued by an earlier redirect come first, followed by `now`,
/// which holds notices raised while handling this request.
pub fn render<T: Serialize>(
    session: &SessionClaims,
    user: Option<&UserRow>,
    jar: CookieJar,
    now: Vec<Flash>,
    body: T,
) -> Response {
    let (jar, mut flashes) = flash::take(jar);
    flashes.extend(now);

    let page = Page {
        csrf_token: session.csrf.clone(),
        flashes,
        user: user.map(UserRow::summary),
        body,
    };
    (jar, Json(page)).into_response()
}
