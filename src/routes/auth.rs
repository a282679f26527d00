// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authentication routes: local accounts, token refresh, logout and OAuth.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Redirect,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::config::{
    AuthMode, Config, ACCESS_COOKIE, OAUTH_STATE_COOKIE, OAUTH_STATE_MAX_AGE_SECS,
    REFRESH_COOKIE,
};
use crate::error::{AppError, Result};
use crate::models::{User, UserResponse};
use crate::routes::MessageResponse;
use crate::services::local_auth::{LoginRequest, RegisterRequest};
use crate::services::{Credentials, OAuthProvider};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout).get(logout))
        .route("/auth/google", get(google_start))
        .route("/auth/github", get(github_start))
        .route("/auth/callback/{provider}", get(oauth_callback))
}

/// Response for register and login.
#[derive(Serialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub message: String,
    /// Signed access token (jwt mode only; session mode uses a cookie)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Serialize)]
pub struct RefreshResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

// ─── Cookies ─────────────────────────────────────────────────

fn auth_cookie(name: &'static str, value: String, max_age_secs: i64, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .secure(secure)
        .max_age(time::Duration::seconds(max_age_secs))
        .build()
}

/// Removal cookie with the same attributes the cookie was set with.
fn removal_cookie(name: &'static str, secure: bool) -> Cookie<'static> {
    Cookie::build((name, ""))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .secure(secure)
        .build()
}

/// Attach the issued credentials as cookies.
///
/// The access cookie is only used in session mode; signed tokens travel
/// in the Authorization header instead.
pub(crate) fn with_credentials(jar: CookieJar, config: &Config, credentials: &Credentials) -> CookieJar {
    let mut jar = jar;
    if config.auth_mode == AuthMode::Session {
        jar = jar.add(auth_cookie(
            ACCESS_COOKIE,
            credentials.access_token.clone(),
            config.access_token_ttl.num_seconds(),
            config.cookie_secure,
        ));
    }
    if let Some(refresh) = &credentials.refresh_token {
        jar = jar.add(auth_cookie(
            REFRESH_COOKIE,
            refresh.clone(),
            config.refresh_token_ttl.num_seconds(),
            config.cookie_secure,
        ));
    }
    jar
}

fn body_token(config: &Config, credentials: &Credentials) -> Option<String> {
    (config.auth_mode == AuthMode::Jwt).then(|| credentials.access_token.clone())
}

fn auth_response(config: &Config, user: &User, credentials: &Credentials, message: &str) -> AuthResponse {
    AuthResponse {
        user: UserResponse::from(user),
        message: message.to_string(),
        token: body_token(config, credentials),
    }
}

// ─── Local Accounts ──────────────────────────────────────────

async fn register(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, CookieJar, Json<AuthResponse>)> {
    let (user, credentials) = state.auth.register(request).await?;

    let body = auth_response(&state.config, &user, &credentials, "Registration successful");
    let jar = with_credentials(jar, &state.config, &credentials);
    Ok((StatusCode::CREATED, jar, Json(body)))
}

async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(request): Json<LoginRequest>,
) -> Result<(CookieJar, Json<AuthResponse>)> {
    let (user, credentials) = state.auth.login(request).await?;

    let body = auth_response(&state.config, &user, &credentials, "Login successful");
    let jar = with_credentials(jar, &state.config, &credentials);
    Ok((jar, Json(body)))
}

async fn refresh(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<RefreshResponse>)> {
    let refresh_token = jar.get(REFRESH_COOKIE).map(|c| c.value().to_string());
    let credentials = state.auth.refresh(refresh_token.as_deref()).await?;

    let body = RefreshResponse {
        message: "Token refreshed".to_string(),
        token: body_token(&state.config, &credentials),
    };
    let jar = with_credentials(jar, &state.config, &credentials);
    Ok((jar, Json(body)))
}

async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<MessageResponse>)> {
    let access = jar.get(ACCESS_COOKIE).map(|c| c.value().to_string());
    let refresh = jar.get(REFRESH_COOKIE).map(|c| c.value().to_string());

    state
        .auth
        .logout(access.as_deref(), refresh.as_deref())
        .await?;

    let secure = state.config.cookie_secure;
    let jar = jar
        .remove(removal_cookie(ACCESS_COOKIE, secure))
        .remove(removal_cookie(REFRESH_COOKIE, secure));
    Ok((jar, Json(MessageResponse::new("Logged out successfully"))))
}

// ─── OAuth ───────────────────────────────────────────────────

async fn google_start(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect)> {
    oauth_start(&state, jar, OAuthProvider::Google)
}

async fn github_start(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect)> {
    oauth_start(&state, jar, OAuthProvider::Github)
}

/// Start OAuth flow: remember a random state in a short-lived cookie and
/// redirect to the provider.
fn oauth_start(
    state: &AppState,
    jar: CookieJar,
    provider: OAuthProvider,
) -> Result<(CookieJar, Redirect)> {
    let oauth_state = state.auth.issuer().issue_token()?;
    let url = state.oauth.authorize_url(provider, &oauth_state);

    let jar = jar.add(auth_cookie(
        OAUTH_STATE_COOKIE,
        oauth_state,
        OAUTH_STATE_MAX_AGE_SECS,
        state.config.cookie_secure,
    ));

    tracing::info!(provider = provider.as_str(), "Starting OAuth flow");
    Ok((jar, Redirect::temporary(&url)))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Compare the state cookie with the state echoed by the provider.
fn check_state(expected: Option<&str>, received: Option<&str>) -> Result<()> {
    let expected = expected
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::Validation("State token not found".to_string()))?;
    let received = received.unwrap_or_default();

    if !bool::from(expected.as_bytes().ct_eq(received.as_bytes())) {
        tracing::warn!("OAuth state mismatch");
        return Err(AppError::Validation("Invalid state token".to_string()));
    }
    Ok(())
}

/// OAuth callback: verify state, resolve the account, sign the user in.
///
/// The state cookie is cleared on every outcome.
async fn oauth_callback(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    Query(params): Query<CallbackParams>,
    jar: CookieJar,
) -> std::result::Result<(CookieJar, Redirect), (CookieJar, AppError)> {
    let expected = jar.get(OAUTH_STATE_COOKIE).map(|c| c.value().to_string());
    let jar = jar.remove(removal_cookie(OAUTH_STATE_COOKIE, state.config.cookie_secure));

    let outcome = async {
        let provider: OAuthProvider = provider.parse()?;
        check_state(expected.as_deref(), params.state.as_deref())?;

        if let Some(error) = &params.error {
            return Err(AppError::OAuthProvider(format!(
                "{} returned error: {}",
                provider.as_str(),
                error
            )));
        }
        let code = params
            .code
            .as_deref()
            .ok_or_else(|| AppError::Validation("Missing authorization code".to_string()))?;

        let user = state.oauth.complete_login(provider, code).await?;
        if !user.active {
            return Err(AppError::Forbidden("Account is inactive".to_string()));
        }
        state.auth.issue_credentials(&user).await
    }
    .await;

    match outcome {
        Ok(credentials) => {
            let mut target = state.config.post_login_redirect.clone();
            if let Some(token) = body_token(&state.config, &credentials) {
                target = format!("{}#token={}", target, token);
            }
            let jar = with_credentials(jar, &state.config, &credentials);
            Ok((jar, Redirect::temporary(&target)))
        }
        Err(e) => Err((jar, e)),
    }
}
