use std::collections::HashSet;

use axum::{
    Form,
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use tracing::info;
use warbler_db::models::MessageRow;
use warbler_types::api::{FormPage, MessageListPage, MessagePage, MessageView};
use warbler_types::forms::{CsrfForm, MessageForm, NewMessage};
use warbler_types::models::FEED_LIMIT;

use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::page::render;
use crate::state::AppState;

/// Attach the viewer's like state to each row.
pub(crate) fn to_views(rows: Vec<MessageRow>, liked: &HashSet<i64>) -> Vec<MessageView> {
    rows.into_iter()
        .map(|row| {
            let is_liked = liked.contains(&row.id);
            let (message, author) = row.into_parts();
            MessageView::new(message, author, is_liked)
        })
        .collect()
}

/// `GET /messages/new`
pub async fn new_message_page(me: CurrentUser, jar: CookieJar) -> Response {
    render(&me.session, Some(&me.user), jar, vec![], FormPage::default())
}

/// `POST /messages/new`
pub async fn create_message(
    State(state): State<AppState>,
    me: CurrentUser,
    jar: CookieJar,
    Form(form): Form<MessageForm>,
) -> Result<Response, AppError> {
    me.verify_csrf(&form.csrf_token)?;

    let mut values = serde_json::Map::new();
    values.insert("text".into(), form.text.clone().into());

    let NewMessage { text } = match NewMessage::try_from(form) {
        Ok(message) => message,
        Err(errors) => {
            let page = FormPage {
                values,
                errors: Some(errors),
            };
            return Ok(render(&me.session, Some(&me.user), jar, vec![], page));
        }
    };

    let user_id = me.id();
    let message = state
        .with_db(move |db| db.insert_message(user_id, &text))
        .await?;
    info!(user_id, message_id = message.id, "message posted");

    Ok((jar, Redirect::to(&format!("/users/{user_id}"))).into_response())
}

/// `GET /messages`: the newest messages from everyone.
pub async fn discover(
    State(state): State<AppState>,
    me: CurrentUser,
    jar: CookieJar,
) -> Result<Response, AppError> {
    let user_id = me.id();
    let (rows, liked) = state
        .with_db(move |db| Ok((db.discover(FEED_LIMIT)?, db.liked_message_ids(user_id)?)))
        .await?;

    let page = MessageListPage {
        messages: to_views(rows, &liked),
    };
    Ok(render(&me.session, Some(&me.user), jar, vec![], page))
}

/// `GET /messages/{message_id}`
pub async fn show_message(
    State(state): State<AppState>,
    me: CurrentUser,
    jar: CookieJar,
    Path(message_id): Path<i64>,
) -> Result<Response, AppError> {
    let user_id = me.id();
    let (row, liked) = state
        .with_db(move |db| {
            Ok((
                db.get_message(message_id)?,
                db.liked_message_ids(user_id)?,
            ))
        })
        .await?;
    let row = row.ok_or(AppError::NotFound)?;

    let message = to_views(vec![row], &liked)
        .pop()
        .ok_or(AppError::NotFound)?;
    Ok(render(
        &me.session,
        Some(&me.user),
        jar,
        vec![],
        MessagePage { message },
    ))
}

/// `POST /messages/{message_id}/delete`. Only the author may delete.
pub async fn delete_message(
    State(state): State<AppState>,
    me: CurrentUser,
    jar: CookieJar,
    Path(message_id): Path<i64>,
    Form(form): Form<CsrfForm>,
) -> Result<Response, AppError> {
    me.verify_csrf(&form.csrf_token)?;

    let message = state
        .with_db(move |db| db.get_message(message_id))
        .await?
        .ok_or(AppError::NotFound)?;
    if message.user_id != me.id() {
        return Err(AppError::Unauthorized);
    }

    state.with_db(move |db| db.delete_message(message_id)).await?;
    info!(user_id = me.id(), message_id, "message deleted");

    Ok((jar, Redirect::to(&format!("/users/{}", me.id()))).into_response())
}

/// `POST /messages/{message_id}/add-like`
pub async fn add_like(
    State(state): State<AppState>,
    me: CurrentUser,
    Path(message_id): Path<i64>,
    Form(form): Form<CsrfForm>,
) -> Result<Redirect, AppError> {
    set_like(&state, &me, message_id, &form, true).await?;
    Ok(Redirect::to("/"))
}

/// `POST /messages/{message_id}/remove-like`
pub async fn remove_like(
    State(state): State<AppState>,
    me: CurrentUser,
    Path(message_id): Path<i64>,
    Form(form): Form<CsrfForm>,
) -> Result<Redirect, AppError> {
    set_like(&state, &me, message_id, &form, false).await?;
    Ok(Redirect::to("/"))
}

/// `POST /messages/{message_id}/add-like-from/{user_id}`: like from a
/// profile page and return to it.
pub async fn add_like_from_profile(
    State(state): State<AppState>,
    me: CurrentUser,
    Path((message_id, user_id)): Path<(i64, i64)>,
    Form(form): Form<CsrfForm>,
) -> Result<Redirect, AppError> {
    set_like(&state, &me, message_id, &form, true).await?;
    Ok(Redirect::to(&format!("/users/{user_id}")))
}

/// `POST /messages/{message_id}/remove-like-from/{user_id}`
pub async fn remove_like_from_profile(
    State(state): State<AppState>,
    me: CurrentUser,
    Path((message_id, user_id)): Path<(i64, i64)>,
    Form(form): Form<CsrfForm>,
) -> Result<Redirect, AppError> {
    set_like(&state, &me, message_id, &form, false).await?;
    Ok(Redirect::to(&format!("/users/{user_id}")))
}

async fn set_like(
    state: &AppState,
    me: &CurrentUser,
    message_id: i64,
    form: &CsrfForm,
    liked: bool,
) -> Result<(), AppError> {
    me.verify_csrf(&form.csrf_token)?;

    let user_id = me.id();
    let changed = state
        .with_db(move |db| {
            if db.get_message(message_id)?.is_none() {
                return Ok(None);
            }
            let changed = if liked {
                db.like(user_id, message_id)?
            } else {
                db.unlike(user_id, message_id)?
            };
            Ok(Some(changed))
        })
        .await?
        .ok_or(AppError::NotFound)?;

    info!(user_id, message_id, liked, changed, "like updated");
    Ok(())
}
