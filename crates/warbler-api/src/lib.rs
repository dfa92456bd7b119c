pub mod auth;
pub mod error;
pub mod flash;
pub mod home;
pub mod messages;
pub mod middleware;
pub mod page;
pub mod session;
pub mod state;
pub mod users;

use axum::{
    Router,
    http::{HeaderValue, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

pub use error::AppError;
pub use state::{AppState, AppStateInner};

/// Every route, behind the session layer. Responses are never cached.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home::homepage))
        // Auth
        .route("/signup", get(auth::signup_page).post(auth::signup_submit))
        .route("/login", get(auth::login_page).post(auth::login_submit))
        .route("/logout", post(auth::logout))
        // Users
        .route("/users", get(users::list_users))
        .route("/users/{user_id}", get(users::show_user))
        .route("/users/{user_id}/following", get(users::show_following))
        .route("/users/{user_id}/followers", get(users::show_followers))
        .route("/users/{user_id}/liked-messages", get(users::show_liked_messages))
        .route("/users/follow/{user_id}", post(users::start_following))
        .route("/users/stop-following/{user_id}", post(users::stop_following))
        .route(
            "/users/{user_id}/edit",
            get(users::edit_profile_page).post(users::edit_profile),
        )
        .route("/users/delete", post(users::delete_user))
        // Messages
        .route(
            "/messages/new",
            get(messages::new_message_page).post(messages::create_message),
        )
        .route("/messages", get(messages::discover))
        .route("/messages/{message_id}", get(messages::show_message))
        .route("/messages/{message_id}/delete", post(messages::delete_message))
        .route("/messages/{message_id}/add-like", post(messages::add_like))
        .route("/messages/{message_id}/remove-like", post(messages::remove_like))
        .route(
            "/messages/{message_id}/add-like-from/{user_id}",
            post(messages::add_like_from_profile),
        )
        .route(
            "/messages/{message_id}/remove-like-from/{user_id}",
            post(messages::remove_like_from_profile),
        )
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::load_session,
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
