//! Signup, login, logout and the request gate over HTTP.

mod common;

use axum::http::StatusCode;
use common::TestApp;
use warbler_api::session::{SESSION_COOKIE, encode_session};
use warbler_types::api::SessionClaims;

#[tokio::test]
async fn test_signup_logs_in_and_shows_feed() {
    let mut app = TestApp::new();
    let id = app.signup("u1", "password").await;

    let row = app.state.db.get_user_by_id(id).unwrap().unwrap();
    assert_ne!(row.password, "password");
    assert!(row.password.starts_with("$argon2"));
    assert_eq!(row.email.as_deref(), Some("u1@email.com"));
    assert_eq!(row.image_url, "/static/images/default-pic.png");

    let home = app.get("/").await;
    assert_eq!(home.status, StatusCode::OK);
    let body = home.json();
    assert_eq!(body["view"], "feed");
    assert_eq!(body["user"]["username"], "u1");
    assert!(body["messages"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_duplicate_username_is_flashed_and_form_represented() {
    let mut app = TestApp::new();
    app.signup("u1", "password").await;

    let mut other = app.other_client();
    let res = other
        .submit(
            "/signup",
            &[("username", "u1"), ("password", "password"), ("email", "")],
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.flash_messages(), vec!["Username already taken"]);
    assert_eq!(res.json()["values"]["username"], "u1");
    assert!(res.json()["values"].get("password").is_none());
}

#[tokio::test]
async fn test_signup_validation_errors() {
    let mut app = TestApp::new();
    let res = app
        .submit(
            "/signup",
            &[("username", ""), ("password", "123"), ("email", "nope")],
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    let fields: Vec<String> = res.json()["errors"]["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["field"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(fields, vec!["username", "email", "password"]);
    assert!(app.state.db.search_users(None).unwrap().is_empty());
}

#[tokio::test]
async fn test_login_success_and_failure() {
    let mut app = TestApp::new();
    app.signup("u1", "password").await;

    let mut browser = app.other_client();
    let res = browser.login("u1", "4567").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.flash_messages(), vec!["Invalid credentials."]);

    let res = browser.login("nobody", "password").await;
    assert_eq!(res.flash_messages(), vec!["Invalid credentials."]);

    let res = browser.login("u1", "password").await;
    res.assert_redirect("/");
    let home = browser.get("/").await;
    assert_eq!(home.flash_messages(), vec!["Hello, u1!"]);
    assert_eq!(home.json()["user"]["username"], "u1");

    // Flashes are shown once.
    let again = browser.get("/").await;
    assert!(again.flash_messages().is_empty());
}

#[tokio::test]
async fn test_logout_returns_to_anonymous() {
    let mut app = TestApp::new();
    app.signup("u1", "password").await;

    let res = app.submit("/logout", &[]).await;
    res.assert_redirect("/login");

    let page = app.get("/login").await;
    assert_eq!(page.flash_messages(), vec!["User is logged out"]);
    assert!(page.json()["user"].is_null());

    let home = app.get("/").await;
    assert_eq!(home.json()["view"], "anonymous");

    let res = app.get("/users").await;
    res.assert_redirect("/");
}

#[tokio::test]
async fn test_anonymous_access_is_redirected_with_flash() {
    let mut app = TestApp::new();

    for path in ["/users", "/users/1", "/messages", "/messages/new", "/users/1/following"] {
        let res = app.get(path).await;
        res.assert_redirect("/");
    }

    let res = app.submit("/users/follow/1", &[]).await;
    res.assert_redirect("/");
    let res = app.submit("/logout", &[]).await;
    res.assert_redirect("/");

    let home = app.get("/").await;
    assert_eq!(home.json()["view"], "anonymous");
    assert!(
        home.flash_messages()
            .iter()
            .all(|m| m == "Access unauthorized.")
    );
    assert!(!home.flash_messages().is_empty());
}

#[tokio::test]
async fn test_mutations_require_csrf_token() {
    let mut app = TestApp::new();
    app.signup("u1", "password").await;
    let other = app.other_client().signup("u2", "password").await;

    let res = app.post(&format!("/users/follow/{other}"), &[]).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app
        .post(&format!("/users/follow/{other}"), &[("csrf_token", "forged")])
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app
        .post("/login", &[("username", "u1"), ("password", "password")])
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let me = app.user_id("u1");
    assert!(!app.state.db.is_following(me, other).unwrap());
}

#[tokio::test]
async fn test_forged_session_cookie_is_anonymous() {
    let mut app = TestApp::new();
    let id = app.signup("u1", "password").await;

    let claims = SessionClaims {
        sub: Some(id),
        csrf: "forged".into(),
        exp: (chrono::Utc::now() + chrono::Duration::days(1)).timestamp() as usize,
    };
    let token = encode_session(&claims, "wrong-secret").unwrap();
    app.set_cookie(SESSION_COOKIE, &token);

    let res = app.get("/users").await;
    res.assert_redirect("/");

    let home = app.get("/").await;
    assert_eq!(home.json()["view"], "anonymous");
    assert_ne!(home.json()["csrf_token"], "forged");
}

#[tokio::test]
async fn test_signup_page_ends_existing_session() {
    let mut app = TestApp::new();
    app.signup("u1", "password").await;

    let page = app.get("/signup").await;
    assert!(page.json()["user"].is_null());

    let res = app.get("/users").await;
    res.assert_redirect("/");
}

#[tokio::test]
async fn test_responses_are_not_cached() {
    let mut app = TestApp::new();
    let res = app.get("/").await;
    assert_eq!(res.cache_control.as_deref(), Some("no-store"));
}

#[tokio::test]
async fn test_unauthorized_redirect_keeps_queued_flashes() {
    let mut app = TestApp::new();
    app.signup("u1", "password").await;

    app.submit("/logout", &[]).await.assert_redirect("/login");
    app.submit("/users/follow/1", &[]).await.assert_redirect("/");

    let page = app.get("/login").await;
    assert_eq!(
        page.flash_messages(),
        vec!["User is logged out", "Access unauthorized."]
    );
}
