use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use tracing::{info, warn};
use warbler_db::DbError;
use warbler_db::models::UserRow;
use warbler_types::api::{Flash, FormPage};
use warbler_types::forms::{Credentials, CsrfForm, FormErrors, LoginForm, NewUser, SignupForm};

use crate::error::AppError;
use crate::flash;
use crate::middleware::{CurrentUser, RequestContext};
use crate::page::render;
use crate::session;
use crate::state::{AppState, blocking};

// -- Auth service --

/// Create an account. A taken username or email comes back as
/// `AppError::Database(DbError::UniqueViolation { .. })`.
pub async fn signup(state: &AppState, new_user: NewUser) -> Result<UserRow, AppError> {
    let NewUser {
        username,
        password,
        email,
        image_url,
    } = new_user;

    let password_hash = blocking(move || hash_password(&password)).await?;

    let user = state
        .with_db(move |db| db.create_user(&username, &password_hash, email.as_deref(), &image_url))
        .await?;
    info!(user_id = user.id, username = %user.username, "account created");
    Ok(user)
}

/// `Some(user)` iff `username` exists and `password` matches its hash.
/// Bad credentials are not an error.
pub async fn authenticate(
    state: &AppState,
    username: String,
    password: String,
) -> Result<Option<UserRow>, AppError> {
    state
        .with_db(move |db| {
            let Some(user) = db.get_user_by_username(&username)? else {
                return Ok(None);
            };
            Ok(verify_password(&password, &user.password).then_some(user))
        })
        .await
}

/// Argon2id with a random salt, as a PHC string.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    let parsed = match PasswordHash::new(password_hash) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("stored password hash is unreadable: {}", e);
            return false;
        }
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

// -- Handlers --

/// `GET /signup`. Visiting the signup page ends any logged-in session.
pub async fn signup_page(
    State(state): State<AppState>,
    ctx: RequestContext,
    jar: CookieJar,
) -> Result<Response, AppError> {
    let (jar, session) = if ctx.user.is_some() {
        session::logout(&state, jar)?
    } else {
        (jar, ctx.session)
    };
    Ok(render(&session, None, jar, vec![], FormPage::default()))
}

pub async fn signup_submit(
    State(state): State<AppState>,
    ctx: RequestContext,
    jar: CookieJar,
    Form(form): Form<SignupForm>,
) -> Result<Response, AppError> {
    ctx.verify_csrf(&form.csrf_token)?;

    let values = serde_json::json!({
        "username": form.username,
        "email": form.email,
        "image_url": form.image_url,
    });
    let represent = |jar: CookieJar, flashes: Vec<Flash>, errors: Option<FormErrors>| {
        let page = FormPage {
            values: values.as_object().cloned().unwrap_or_default(),
            errors,
        };
        render(&ctx.session, None, jar, flashes, page)
    };

    let new_user = match NewUser::try_from(form) {
        Ok(new_user) => new_user,
        Err(errors) => return Ok(represent(jar, vec![], Some(errors))),
    };

    let user = match signup(&state, new_user).await {
        Ok(user) => user,
        Err(AppError::Database(DbError::UniqueViolation { field })) => {
            let message = match field {
                "email" => "Email already taken",
                _ => "Username already taken",
            };
            return Ok(represent(jar, vec![Flash::danger(message)], None));
        }
        Err(e) => return Err(e),
    };

    let (jar, _) = session::login(&state, jar, user.id)?;
    Ok((jar, Redirect::to("/")).into_response())
}

/// `GET /login`
pub async fn login_page(ctx: RequestContext, jar: CookieJar) -> Response {
    render(
        &ctx.session,
        ctx.user.as_ref(),
        jar,
        vec![],
        FormPage::default(),
    )
}

pub async fn login_submit(
    State(state): State<AppState>,
    ctx: RequestContext,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    ctx.verify_csrf(&form.csrf_token)?;

    let mut values = serde_json::Map::new();
    values.insert("username".into(), form.username.clone().into());

    let Credentials { username, password } = match Credentials::try_from(form) {
        Ok(credentials) => credentials,
        Err(errors) => {
            let page = FormPage {
                values,
                errors: Some(errors),
            };
            return Ok(render(&ctx.session, ctx.user.as_ref(), jar, vec![], page));
        }
    };

    match authenticate(&state, username.clone(), password).await? {
        Some(user) => {
            info!(user_id = user.id, "login");
            let (jar, _) = session::login(&state, jar, user.id)?;
            let jar = flash::push(jar, Flash::success(format!("Hello, {}!", user.username)));
            Ok((jar, Redirect::to("/")).into_response())
        }
        None => {
            warn!(%username, "failed login");
            let page = FormPage {
                values,
                errors: None,
            };
            Ok(render(
                &ctx.session,
                ctx.user.as_ref(),
                jar,
                vec![Flash::danger("Invalid credentials.")],
                page,
            ))
        }
    }
}

/// `POST /logout`
pub async fn logout(
    State(state): State<AppState>,
    me: CurrentUser,
    jar: CookieJar,
    Form(form): Form<CsrfForm>,
) -> Result<Response, AppError> {
    me.verify_csrf(&form.csrf_token)?;

    let (jar, _) = session::logout(&state, jar)?;
    info!(user_id = me.id(), "logout");
    let jar = flash::push(jar, Flash::info("User is logged out"));
    Ok((jar, Redirect::to("/login")).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_not_plaintext_and_verifies() {
        let hash = hash_password("password").unwrap();
        assert_ne!(hash, "password");
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("password", &hash));
        assert!(!verify_password("4567", &hash));
    }

    #[test]
    fn test_unreadable_hash_never_verifies() {
        assert!(!verify_password("password", "password"));
    }
}
