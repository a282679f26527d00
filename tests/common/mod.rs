// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
};
use clubhouse::config::Config;
use clubhouse::db::FirestoreDb;
use clubhouse::models::{AuthProvider, Role, User};
use clubhouse::routes::create_router;
use clubhouse::services::password::hash_password;
use clubhouse::AppState;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a test app over the in-memory store (session mode).
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    create_test_app_with_config(Config::test_default())
}

#[allow(dead_code)]
pub fn create_test_app_with_config(config: Config) -> (axum::Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(config, FirestoreDb::new_in_memory()));
    (create_router(state.clone()), state)
}

/// Insert a local user directly into the store.
#[allow(dead_code)]
pub async fn seed_user(
    state: &AppState,
    email: &str,
    password: &str,
    role: Role,
    clubs: &[&str],
) -> User {
    let now = chrono::Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        email: email.to_string(),
        first_name: "Test".to_string(),
        last_name: role.as_str().to_string(),
        name: None,
        picture: None,
        password_hash: hash_password(password).expect("hash"),
        role,
        assigned_club_ids: clubs.iter().map(|c| c.to_string()).collect(),
        active: true,
        provider: AuthProvider::Local,
        provider_id: None,
        created_at: now,
        updated_at: now,
    };
    state.db.create_user(&user).await.expect("seed user");
    user
}

/// Issue credentials for `user` and return the Cookie header value.
#[allow(dead_code)]
pub async fn session_cookie(state: &AppState, user: &User) -> String {
    let credentials = state
        .auth
        .issue_credentials(user)
        .await
        .expect("issue credentials");
    format!("access_token={}", credentials.access_token)
}

/// All Set-Cookie header values of a response.
#[allow(dead_code)]
pub fn set_cookie_headers(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|value| value.to_str().unwrap().to_string())
        .collect()
}

/// Full Set-Cookie header for `name`.
#[allow(dead_code)]
pub fn find_cookie(headers: &[String], name: &str) -> String {
    headers
        .iter()
        .find(|value| value.starts_with(&format!("{name}=")))
        .cloned()
        .unwrap_or_else(|| panic!("missing Set-Cookie header for {name}: {headers:?}"))
}

/// Just the value of cookie `name` from Set-Cookie headers.
#[allow(dead_code)]
pub fn cookie_value(headers: &[String], name: &str) -> String {
    let full = find_cookie(headers, name);
    let pair = full.split(';').next().unwrap();
    pair[name.len() + 1..].to_string()
}

#[allow(dead_code)]
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    if bytes.is_empty() {
        return serde_json::Value::Null;
    }
    serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(&bytes).into_owned()))
}

/// Build a JSON request, optionally carrying a Cookie header.
#[allow(dead_code)]
pub fn json_request(
    method: &str,
    uri: &str,
    cookie: Option<&str>,
    body: serde_json::Value,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// Build a body-less request, optionally carrying a Cookie header.
#[allow(dead_code)]
pub fn empty_request(method: &str, uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

/// Send a request and return status plus JSON body.
#[allow(dead_code)]
pub async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    (status, body_json(response).await)
}
