//! Common test utilities for HTTP tests

#![allow(dead_code)]

use std::collections::HashMap;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum_extra::extract::cookie::Cookie;
use http_body_util::BodyExt;
use tower::ServiceExt;
use url::form_urlencoded;
use warbler_api::session::{SESSION_COOKIE, decode_session};
use warbler_api::{AppState, AppStateInner, router};
use warbler_db::Database;

pub const SECRET: &str = "test-secret-key";

/// A browser-like client over an in-memory app. Cookies set by responses
/// are replayed on later requests.
pub struct TestApp {
    pub state: AppState,
    router: Router,
    cookies: HashMap<String, String>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub location: Option<String>,
    pub cache_control: Option<String>,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    pub fn flash_messages(&self) -> Vec<String> {
        self.json()["flashes"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["message"].as_str().unwrap().to_string())
            .collect()
    }

    pub fn assert_redirect(&self, to: &str) {
        assert_eq!(self.status, StatusCode::SEE_OTHER, "expected a redirect");
        assert_eq!(self.location.as_deref(), Some(to));
    }
}

impl TestApp {
    pub fn new() -> Self {
        let db = Database::open_in_memory().unwrap();
        let state = AppStateInner::new(db, SECRET.into(), chrono::Duration::days(1));
        Self {
            router: router(state.clone()),
            state,
            cookies: HashMap::new(),
        }
    }

    /// Same app, separate cookie jar: a second browser.
    pub fn other_client(&self) -> Self {
        Self {
            state: self.state.clone(),
            router: self.router.clone(),
            cookies: HashMap::new(),
        }
    }

    pub async fn get(&mut self, path: &str) -> TestResponse {
        let req = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        self.send(req).await
    }

    pub async fn post(&mut self, path: &str, form: &[(&str, &str)]) -> TestResponse {
        let req = Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(encode_form(form)))
            .unwrap();
        self.send(req).await
    }

    /// POST with the session's CSRF token filled in.
    pub async fn submit(&mut self, path: &str, form: &[(&str, &str)]) -> TestResponse {
        let token = self.csrf().await;
        let mut fields = vec![("csrf_token", token.as_str())];
        fields.extend_from_slice(form);
        self.post(path, &fields).await
    }

    /// The CSRF token of the current session, read straight from the cookie
    /// so that no page render consumes pending flashes.
    pub async fn csrf(&mut self) -> String {
        if !self.cookies.contains_key(SESSION_COOKIE) {
            self.get("/login").await;
        }
        let token = &self.cookies[SESSION_COOKIE];
        decode_session(token, SECRET).unwrap().csrf
    }

    pub async fn signup(&mut self, username: &str, password: &str) -> i64 {
        let email = format!("{username}@email.com");
        let res = self
            .submit(
                "/signup",
                &[
                    ("username", username),
                    ("password", password),
                    ("email", email.as_str()),
                ],
            )
            .await;
        res.assert_redirect("/");
        self.user_id(username)
    }

    pub async fn login(&mut self, username: &str, password: &str) -> TestResponse {
        self.submit("/login", &[("username", username), ("password", password)])
            .await
    }

    pub fn set_cookie(&mut self, name: &str, value: &str) {
        self.cookies.insert(name.to_string(), value.to_string());
    }

    pub fn user_id(&self, username: &str) -> i64 {
        self.state
            .db
            .get_user_by_username(username)
            .unwrap()
            .unwrap()
            .id
    }

    async fn send(&mut self, mut req: Request<Body>) -> TestResponse {
        if !self.cookies.is_empty() {
            let cookie = self
                .cookies
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("; ");
            req.headers_mut()
                .insert(header::COOKIE, cookie.parse().unwrap());
        }

        let res = self.router.clone().oneshot(req).await.unwrap();

        for value in res.headers().get_all(header::SET_COOKIE) {
            let cookie = Cookie::parse(value.to_str().unwrap()).unwrap();
            let removed = cookie.max_age().is_some_and(|age| age.is_zero());
            if removed {
                self.cookies.remove(cookie.name());
            } else {
                self.cookies
                    .insert(cookie.name().to_string(), cookie.value().to_string());
            }
        }

        let header_str = |name: header::HeaderName| {
            res.headers()
                .get(name)
                .map(|v| v.to_str().unwrap().to_string())
        };
        let location = header_str(header::LOCATION);
        let cache_control = header_str(header::CACHE_CONTROL);
        let status = res.status();
        let body = res.into_body().collect().await.unwrap().to_bytes().to_vec();

        TestResponse {
            status,
            location,
            cache_control,
            body,
        }
    }
}

fn encode_form(fields: &[(&str, &str)]) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(fields)
        .finish()
}
