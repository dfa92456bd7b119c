use axum::extract::State;
use axum::response::Response;
use axum_extra::extract::CookieJar;
use warbler_types::api::HomePage;
use warbler_types::models::FEED_LIMIT;

use crate::error::AppError;
use crate::messages::to_views;
use crate::middleware::RequestContext;
use crate::page::render;
use crate::state::AppState;

/// `GET /`: the landing page for anonymous visitors, otherwise the feed of
/// the caller and everyone they follow.
pub async fn homepage(
    State(state): State<AppState>,
    ctx: RequestContext,
    jar: CookieJar,
) -> Result<Response, AppError> {
    let Some(user) = ctx.user.as_ref() else {
        return Ok(render(&ctx.session, None, jar, vec![], HomePage::Anonymous));
    };

    let user_id = user.id;
    let (rows, liked) = state
        .with_db(move |db| Ok((db.feed_for(user_id, FEED_LIMIT)?, db.liked_message_ids(user_id)?)))
        .await?;

    let page = HomePage::Feed {
        messages: to_views(rows, &liked),
    };
    Ok(render(&ctx.session, Some(user), jar, vec![], page))
}
