use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use tracing::info;
use warbler_db::DbError;
use warbler_db::models::UserRow;
use warbler_types::api::{
    EditProfilePage, Flash, FormPage, LikedMessagesPage, ProfilePage, RelationPage, UserListPage,
};
use warbler_types::forms::{CsrfForm, EditProfileForm, FormErrors, ProfileUpdate, UserSearch};
use warbler_types::models::{FEED_LIMIT, User};

use crate::auth::authenticate;
use crate::error::AppError;
use crate::flash;
use crate::messages::to_views;
use crate::middleware::CurrentUser;
use crate::page::render;
use crate::session;
use crate::state::AppState;

/// `GET /users?q=`
pub async fn list_users(
    State(state): State<AppState>,
    me: CurrentUser,
    jar: CookieJar,
    Query(search): Query<UserSearch>,
) -> Result<Response, AppError> {
    let query = search.q.filter(|q| !q.trim().is_empty());
    let q = query.clone();
    let users = state
        .with_db(move |db| db.search_users(q.as_deref()))
        .await?;

    let page = UserListPage {
        query,
        users: users.iter().map(UserRow::summary).collect(),
    };
    Ok(render(&me.session, Some(&me.user), jar, vec![], page))
}

/// `GET /users/{user_id}`
pub async fn show_user(
    State(state): State<AppState>,
    me: CurrentUser,
    jar: CookieJar,
    Path(user_id): Path<i64>,
) -> Result<Response, AppError> {
    let viewer = me.id();
    let page = state
        .with_db(move |db| {
            let Some(profile) = db.get_user_by_id(user_id)? else {
                return Ok(None);
            };
            let liked = db.liked_message_ids(viewer)?;
            let messages = to_views(db.messages_by_user(user_id, FEED_LIMIT)?, &liked);
            Ok(Some(ProfilePage {
                stats: db.user_stats(user_id)?,
                is_following: db.is_following(viewer, user_id)?,
                is_followed_by: db.is_followed_by(viewer, user_id)?,
                profile: User::from(profile),
                messages,
            }))
        })
        .await?
        .ok_or(AppError::NotFound)?;

    Ok(render(&me.session, Some(&me.user), jar, vec![], page))
}

/// `GET /users/{user_id}/following`
pub async fn show_following(
    State(state): State<AppState>,
    me: CurrentUser,
    jar: CookieJar,
    Path(user_id): Path<i64>,
) -> Result<Response, AppError> {
    let page = relation_page(&state, user_id, Relation::Following).await?;
    Ok(render(&me.session, Some(&me.user), jar, vec![], page))
}

/// `GET /users/{user_id}/followers`
pub async fn show_followers(
    State(state): State<AppState>,
    me: CurrentUser,
    jar: CookieJar,
    Path(user_id): Path<i64>,
) -> Result<Response, AppError> {
    let page = relation_page(&state, user_id, Relation::Followers).await?;
    Ok(render(&me.session, Some(&me.user), jar, vec![], page))
}

#[derive(Clone, Copy)]
enum Relation {
    Following,
    Followers,
}

async fn relation_page(
    state: &AppState,
    user_id: i64,
    relation: Relation,
) -> Result<RelationPage, AppError> {
    state
        .with_db(move |db| {
            let Some(profile) = db.get_user_by_id(user_id)? else {
                return Ok(None);
            };
            let users = match relation {
                Relation::Following => db.following(user_id)?,
                Relation::Followers => db.followers(user_id)?,
            };
            Ok(Some(RelationPage {
                profile: profile.summary(),
                users: users.iter().map(UserRow::summary).collect(),
            }))
        })
        .await?
        .ok_or(AppError::NotFound)
}

/// `GET /users/{user_id}/liked-messages`
pub async fn show_liked_messages(
    State(state): State<AppState>,
    me: CurrentUser,
    jar: CookieJar,
    Path(user_id): Path<i64>,
) -> Result<Response, AppError> {
    let viewer = me.id();
    let page = state
        .with_db(move |db| {
            let Some(profile) = db.get_user_by_id(user_id)? else {
                return Ok(None);
            };
            let liked = db.liked_message_ids(viewer)?;
            Ok(Some(LikedMessagesPage {
                profile: profile.summary(),
                messages: to_views(db.liked_messages(user_id)?, &liked),
            }))
        })
        .await?
        .ok_or(AppError::NotFound)?;

    Ok(render(&me.session, Some(&me.user), jar, vec![], page))
}

/// `POST /users/follow/{user_id}`
pub async fn start_following(
    State(state): State<AppState>,
    me: CurrentUser,
    jar: CookieJar,
    Path(target_id): Path<i64>,
    Form(form): Form<CsrfForm>,
) -> Result<Response, AppError> {
    me.verify_csrf(&form.csrf_token)?;
    let redirect = Redirect::to(&format!("/users/{}/following", me.id()));

    if target_id == me.id() {
        let jar = flash::push(jar, Flash::danger("You cannot follow yourself."));
        return Ok((jar, redirect).into_response());
    }

    let follower_id = me.id();
    let added = state
        .with_db(move |db| {
            if db.get_user_by_id(target_id)?.is_none() {
                return Ok(None);
            }
            Ok(Some(db.follow(follower_id, target_id)?))
        })
        .await?
        .ok_or(AppError::NotFound)?;
    info!(follower_id, target_id, added, "follow");

    Ok((jar, redirect).into_response())
}

/// `POST /users/stop-following/{user_id}`
pub async fn stop_following(
    State(state): State<AppState>,
    me: CurrentUser,
    Path(target_id): Path<i64>,
    Form(form): Form<CsrfForm>,
) -> Result<Redirect, AppError> {
    me.verify_csrf(&form.csrf_token)?;

    let follower_id = me.id();
    let removed = state
        .with_db(move |db| {
            if db.get_user_by_id(target_id)?.is_none() {
                return Ok(None);
            }
            Ok(Some(db.unfollow(follower_id, target_id)?))
        })
        .await?
        .ok_or(AppError::NotFound)?;
    info!(follower_id, target_id, removed, "unfollow");

    Ok(Redirect::to(&format!("/users/{follower_id}/following")))
}

/// `GET /users/{user_id}/edit`. Only for the caller's own profile.
pub async fn edit_profile_page(
    me: CurrentUser,
    jar: CookieJar,
    Path(user_id): Path<i64>,
) -> Result<Response, AppError> {
    if user_id != me.id() {
        return Err(AppError::Unauthorized);
    }

    let page = EditProfilePage {
        profile: User::from(me.user.clone()),
        form: FormPage {
            values: profile_values(&me.user),
            errors: None,
        },
    };
    Ok(render(&me.session, Some(&me.user), jar, vec![], page))
}

/// `POST /users/{user_id}/edit`. Applies the change only after the current
/// password checks out.
pub async fn edit_profile(
    State(state): State<AppState>,
    me: CurrentUser,
    jar: CookieJar,
    Path(user_id): Path<i64>,
    Form(form): Form<EditProfileForm>,
) -> Result<Response, AppError> {
    if user_id != me.id() {
        return Err(AppError::Unauthorized);
    }
    me.verify_csrf(&form.csrf_token)?;

    let represent = |jar: CookieJar, flashes: Vec<Flash>, errors: Option<FormErrors>| {
        let page = EditProfilePage {
            profile: User::from(me.user.clone()),
            form: FormPage {
                values: submitted_values(&form),
                errors,
            },
        };
        render(&me.session, Some(&me.user), jar, flashes, page)
    };

    let update = match ProfileUpdate::try_from(&form) {
        Ok(update) => update,
        Err(errors) => return Ok(represent(jar, vec![], Some(errors))),
    };

    let verified =
        authenticate(&state, me.user.username.clone(), form.password.clone()).await?;
    if verified.is_none() {
        return Ok(represent(
            jar,
            vec![Flash::danger("Invalid credentials.")],
            None,
        ));
    }

    let username = update.username.clone();
    match state
        .with_db(move |db| db.update_user(user_id, &update))
        .await
    {
        Ok(()) => {}
        Err(AppError::Database(DbError::UniqueViolation { field })) => {
            let message = match field {
                "email" => "Email already taken",
                _ => "Username already taken",
            };
            return Ok(represent(jar, vec![Flash::danger(message)], None));
        }
        Err(e) => return Err(e),
    }
    info!(user_id, "profile updated");

    let jar = flash::push(jar, Flash::success(format!("Hello, {username}!")));
    Ok((jar, Redirect::to(&format!("/users/{user_id}"))).into_response())
}

/// `POST /users/delete`: remove the caller's account and end the session.
pub async fn delete_user(
    State(state): State<AppState>,
    me: CurrentUser,
    jar: CookieJar,
    Form(form): Form<CsrfForm>,
) -> Result<Response, AppError> {
    me.verify_csrf(&form.csrf_token)?;

    let (jar, _) = session::logout(&state, jar)?;
    let user_id = me.id();
    state.with_db(move |db| db.delete_user(user_id)).await?;
    info!(user_id, "account deleted");

    Ok((jar, Redirect::to("/signup")).into_response())
}

fn profile_values(user: &UserRow) -> serde_json::Map<String, serde_json::Value> {
    let mut values = serde_json::Map::new();
    values.insert("username".into(), user.username.clone().into());
    values.insert("email".into(), user.email.clone().into());
    values.insert("image_url".into(), user.image_url.clone().into());
    values.insert(
        "header_image_url".into(),
        user.header_image_url.clone().into(),
    );
    values.insert("bio".into(), user.bio.clone().into());
    values.insert("location".into(), user.location.clone().into());
    values
}

fn submitted_values(form: &EditProfileForm) -> serde_json::Map<String, serde_json::Value> {
    let mut values = serde_json::Map::new();
    values.insert("username".into(), form.username.clone().into());
    values.insert("email".into(), form.email.clone().into());
    values.insert("image_url".into(), form.image_url.clone().into());
    values.insert(
        "header_image_url".into(),
        form.header_image_url.clone().into(),
    );
    values.insert("bio".into(), form.bio.clone().into());
    values.insert("location".into(), form.location.clone().into());
    values
}
