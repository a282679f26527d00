// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Request authentication in session mode: cookie sessions, lazy expiry
//! cleanup, inactive accounts and optional authentication.

use axum::http::StatusCode;
use clubhouse::models::{token_digest, Role, StoredToken};

mod common;
use common::{create_test_app, empty_request, seed_user, send, session_cookie};

#[tokio::test]
async fn test_missing_credential_is_unauthorized() {
    let (app, _state) = create_test_app();
    let (status, body) = send(&app, empty_request("GET", "/api/me", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn test_unknown_session_is_rejected() {
    let (app, _state) = create_test_app();
    let (status, body) = send(
        &app,
        empty_request("GET", "/api/me", Some("access_token=not-a-session")),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_token");
}

#[tokio::test]
async fn test_valid_session_resolves_principal() {
    let (app, state) = create_test_app();
    let user = seed_user(&state, "desk@example.com", "password123", Role::Office, &[]).await;
    let cookie = session_cookie(&state, &user).await;

    let (status, body) = send(&app, empty_request("GET", "/api/me", Some(&cookie))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], user.id.to_string());
    assert_eq!(body["role"], "office");
    assert!(body.get("password_hash").is_none());
}

#[tokio::test]
async fn test_expired_session_is_purged() {
    let (app, state) = create_test_app();
    let user = seed_user(&state, "late@example.com", "password123", Role::Classes, &[]).await;

    let session = StoredToken::new(user.id, "stale-session", chrono::Duration::seconds(-1));
    state.db.insert_session(&session).await.unwrap();

    let cookie = "access_token=stale-session";
    let (first_status, first_body) = send(&app, empty_request("GET", "/api/me", Some(cookie))).await;
    assert_eq!(first_status, StatusCode::UNAUTHORIZED);

    // Row was removed as a side effect
    assert!(state
        .db
        .get_session(&token_digest("stale-session"))
        .await
        .unwrap()
        .is_none());

    // Presenting it again fails the same way
    let (second_status, second_body) =
        send(&app, empty_request("GET", "/api/me", Some(cookie))).await;
    assert_eq!(second_status, first_status);
    assert_eq!(second_body, first_body);
}

#[tokio::test]
async fn test_inactive_principal_is_forbidden() {
    let (app, state) = create_test_app();
    let mut user = seed_user(&state, "paused@example.com", "password123", Role::Office, &[]).await;
    let cookie = session_cookie(&state, &user).await;

    user.active = false;
    state.db.upsert_user(&user).await.unwrap();

    let (status, body) = send(&app, empty_request("GET", "/api/me", Some(&cookie))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["details"], "Account is inactive");
}

#[tokio::test]
async fn test_session_for_deleted_user_is_rejected() {
    let (app, state) = create_test_app();
    let user = seed_user(&state, "ghost@example.com", "password123", Role::Office, &[]).await;
    let cookie = session_cookie(&state, &user).await;
    assert!(state.db.delete_user(user.id).await.unwrap());

    let (status, _) = send(&app, empty_request("GET", "/api/me", Some(&cookie))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_bearer_header_ignored_in_session_mode() {
    let (app, state) = create_test_app();
    let user = seed_user(&state, "hdr@example.com", "password123", Role::Office, &[]).await;
    let token = state.auth.issuer().sign_access_token(&user).unwrap();

    let request = axum::http::Request::builder()
        .uri("/api/me")
        .header("Authorization", format!("Bearer {token}"))
        .body(axum::body::Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_health_reports_optional_auth() {
    let (app, state) = create_test_app();

    let (status, body) = send(&app, empty_request("GET", "/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["authenticated"], false);

    // A bad credential degrades to anonymous instead of failing
    let (status, body) = send(
        &app,
        empty_request("GET", "/health", Some("access_token=garbage")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["authenticated"], false);

    let user = seed_user(&state, "hc@example.com", "password123", Role::Office, &[]).await;
    let cookie = session_cookie(&state, &user).await;
    let (status, body) = send(&app, empty_request("GET", "/health", Some(&cookie))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["authenticated"], true);
}
