// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Local account flows over HTTP: register, login, refresh, change
//! password and logout (session mode).

use axum::http::StatusCode;
use clubhouse::models::token_digest;
use serde_json::json;
use tower::ServiceExt;

mod common;
use common::{
    body_json, cookie_value, create_test_app, empty_request, json_request, send,
    set_cookie_headers,
};

async fn register(app: &axum::Router, email: &str, password: &str) -> axum::response::Response {
    app.clone()
        .oneshot(json_request(
            "POST",
            "/auth/register",
            None,
            json!({ "email": email, "password": password, "name": "Pat Member" }),
        ))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_register_then_login_round_trip() {
    let (app, _state) = create_test_app();

    let response = register(&app, "Pat@Example.com", "password123").await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let cookies = set_cookie_headers(&response);
    let body = body_json(response).await;

    assert_eq!(body["message"], "Registration successful");
    assert_eq!(body["user"]["email"], "pat@example.com");
    assert_eq!(body["user"]["first_name"], "Pat");
    assert_eq!(body["user"]["role"], "classes");
    assert!(body["user"].get("password_hash").is_none());
    assert!(body.get("token").is_none(), "session mode keeps tokens in cookies");
    let registered_id = body["user"]["id"].clone();

    // The registration cookie already authenticates
    let access = cookie_value(&cookies, "access_token");
    let cookie = format!("access_token={access}");
    let (status, me) = send(&app, empty_request("GET", "/api/me", Some(&cookie))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["id"], registered_id);

    // Login issues a fresh, independent session
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/login",
            None,
            json!({ "email": "pat@example.com", "password": "password123" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let login_cookies = set_cookie_headers(&response);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Login successful");
    assert_eq!(body["user"]["id"], registered_id);

    let second = cookie_value(&login_cookies, "access_token");
    assert_ne!(second, access);
    let cookie = format!("access_token={second}");
    let (status, me) = send(&app, empty_request("GET", "/api/me", Some(&cookie))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["id"], registered_id);

    // Old session still valid: concurrent sessions are allowed
    let cookie = format!("access_token={access}");
    let (status, _) = send(&app, empty_request("GET", "/api/me", Some(&cookie))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_register_validation_and_conflict() {
    let (app, _state) = create_test_app();

    let response = register(&app, "short@example.com", "abc").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "validation_error");

    let response = register(&app, "no-at-sign", "password123").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = register(&app, "", "password123").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = register(&app, "taken@example.com", "password123").await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let response = register(&app, "TAKEN@example.com", "different-pass").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["error"], "conflict");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_registration_creates_one_account() {
    let (app, state) = create_test_app();

    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let app = app.clone();
            tokio::spawn(async move {
                register(&app, "same@example.com", "password123")
                    .await
                    .status()
            })
        })
        .collect();

    let mut statuses = Vec::new();
    for task in tasks {
        statuses.push(task.await.unwrap());
    }
    assert_eq!(
        statuses.iter().filter(|s| **s == StatusCode::CREATED).count(),
        1,
        "{statuses:?}"
    );
    assert!(statuses
        .iter()
        .all(|s| *s == StatusCode::CREATED || *s == StatusCode::CONFLICT));
    assert_eq!(state.db.list_users(None, None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let (app, _state) = create_test_app();
    register(&app, "known@example.com", "password123").await;

    let (wrong_status, wrong_body) = send(
        &app,
        json_request(
            "POST",
            "/auth/login",
            None,
            json!({ "email": "known@example.com", "password": "wrong-password" }),
        ),
    )
    .await;
    let (missing_status, missing_body) = send(
        &app,
        json_request(
            "POST",
            "/auth/login",
            None,
            json!({ "email": "nobody@example.com", "password": "password123" }),
        ),
    )
    .await;

    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_status, missing_status);
    assert_eq!(wrong_body, missing_body);
    assert_eq!(wrong_body["details"], "Invalid email or password");
}

#[tokio::test]
async fn test_inactive_account_cannot_login() {
    let (app, state) = create_test_app();
    register(&app, "gone@example.com", "password123").await;

    let mut user = state
        .db
        .find_user_by_email("gone@example.com")
        .await
        .unwrap()
        .unwrap();
    user.active = false;
    state.db.upsert_user(&user).await.unwrap();

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/auth/login",
            None,
            json!({ "email": "gone@example.com", "password": "password123" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");
}

#[tokio::test]
async fn test_refresh_mints_new_access_token() {
    let (app, state) = create_test_app();
    let response = register(&app, "fresh@example.com", "password123").await;
    let cookies = set_cookie_headers(&response);
    let refresh = cookie_value(&cookies, "refresh_token");

    let cookie = format!("refresh_token={refresh}");
    let response = app
        .clone()
        .oneshot(empty_request("POST", "/auth/refresh", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let new_cookies = set_cookie_headers(&response);
    assert_eq!(body_json(response).await["message"], "Token refreshed");

    // Only the access cookie is re-issued; the refresh token is not rotated
    let access = cookie_value(&new_cookies, "access_token");
    assert!(new_cookies.iter().all(|c| !c.starts_with("refresh_token=")));
    assert!(state
        .db
        .get_refresh_token(&token_digest(&refresh))
        .await
        .unwrap()
        .is_some());

    let cookie = format!("access_token={access}");
    let (status, _) = send(&app, empty_request("GET", "/api/me", Some(&cookie))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_refresh_rejects_missing_unknown_and_expired() {
    let (app, state) = create_test_app();

    let (status, _) = send(&app, empty_request("POST", "/auth/refresh", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &app,
        empty_request("POST", "/auth/refresh", Some("refresh_token=bogus")),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_token");

    let user = common::seed_user(
        &state,
        "old@example.com",
        "password123",
        clubhouse::models::Role::Office,
        &[],
    )
    .await;
    let expired = clubhouse::models::StoredToken::new(
        user.id,
        "expired-refresh",
        chrono::Duration::seconds(-5),
    );
    state.db.insert_refresh_token(&expired).await.unwrap();

    let (status, _) = send(
        &app,
        empty_request("POST", "/auth/refresh", Some("refresh_token=expired-refresh")),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(state
        .db
        .get_refresh_token(&token_digest("expired-refresh"))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_change_password() {
    let (app, _state) = create_test_app();
    let response = register(&app, "cp@example.com", "password123").await;
    let cookies = set_cookie_headers(&response);
    let cookie = format!("access_token={}", cookie_value(&cookies, "access_token"));

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/me/change-password",
            Some(&cookie),
            json!({ "current_password": "wrong-one", "new_password": "newpassword1" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["details"], "Current password is incorrect");

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            "/api/me/change-password",
            Some(&cookie),
            json!({ "current_password": "password123", "new_password": "short" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/me/change-password",
            Some(&cookie),
            json!({ "current_password": "password123", "new_password": "newpassword1" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Password changed successfully");

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            "/auth/login",
            None,
            json!({ "email": "cp@example.com", "password": "password123" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            "/auth/login",
            None,
            json!({ "email": "cp@example.com", "password": "newpassword1" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_change_password_requires_auth() {
    let (app, _state) = create_test_app();
    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/me/change-password",
            None,
            json!({ "current_password": "password123", "new_password": "newpassword1" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn test_logout_revokes_session_and_refresh() {
    let (app, state) = create_test_app();
    let response = register(&app, "bye@example.com", "password123").await;
    let cookies = set_cookie_headers(&response);
    let access = cookie_value(&cookies, "access_token");
    let refresh = cookie_value(&cookies, "refresh_token");

    let cookie = format!("access_token={access}; refresh_token={refresh}");
    let (status, body) = send(&app, empty_request("POST", "/auth/logout", Some(&cookie))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Logged out successfully");

    assert!(state
        .db
        .get_session(&token_digest(&access))
        .await
        .unwrap()
        .is_none());
    assert!(state
        .db
        .get_refresh_token(&token_digest(&refresh))
        .await
        .unwrap()
        .is_none());

    let cookie = format!("access_token={access}");
    let (status, _) = send(&app, empty_request("GET", "/api/me", Some(&cookie))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_without_cookies_succeeds() {
    let (app, _state) = create_test_app();
    let (status, _) = send(&app, empty_request("GET", "/auth/logout", None)).await;
    assert_eq!(status, StatusCode::OK);
}
