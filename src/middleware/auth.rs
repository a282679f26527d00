// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authentication middleware.
//!
//! The credential shape depends on the deployment's auth mode: an opaque
//! session token in the `access_token` cookie, or a signed token in an
//! `Authorization: Bearer` header. Either way the owning user is loaded
//! and attached to the request.

use crate::config::{AuthMode, Config, ACCESS_COOKIE};
use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::{token_digest, User};
use crate::services::tokens::verify_access_token;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use futures_util::future::BoxFuture;
use jsonwebtoken::DecodingKey;
use std::sync::Arc;
use uuid::Uuid;

/// Authenticated user attached by [`require_auth`].
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
}

/// Attached by [`optional_auth`]; `None` for anonymous callers.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser {
    pub user: Option<User>,
}

/// Resolves a bearer credential to the owning user ID.
pub trait TokenVerifier: Send + Sync {
    /// Pull the credential out of the request, if one was sent.
    fn credential(&self, headers: &HeaderMap, jar: &CookieJar) -> Option<String>;

    /// Check the credential and return its subject.
    fn verify<'a>(&'a self, credential: &'a str) -> BoxFuture<'a, Result<Uuid, AppError>>;
}

/// Build the verifier for the configured auth mode.
pub fn verifier_for(config: &Config, db: FirestoreDb) -> Arc<dyn TokenVerifier> {
    match config.auth_mode {
        AuthMode::Session => Arc::new(SessionVerifier { db }),
        AuthMode::Jwt => Arc::new(JwtVerifier {
            key: DecodingKey::from_secret(&config.jwt_signing_key),
        }),
    }
}

/// Opaque session tokens backed by `sessions` rows.
pub struct SessionVerifier {
    db: FirestoreDb,
}

impl TokenVerifier for SessionVerifier {
    fn credential(&self, _headers: &HeaderMap, jar: &CookieJar) -> Option<String> {
        jar.get(ACCESS_COOKIE)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty())
    }

    fn verify<'a>(&'a self, credential: &'a str) -> BoxFuture<'a, Result<Uuid, AppError>> {
        Box::pin(async move {
            let digest = token_digest(credential);
            let session = self
                .db
                .get_session(&digest)
                .await?
                .ok_or(AppError::InvalidToken)?;

            if session.is_expired(chrono::Utc::now()) {
                self.db.delete_session(&digest).await?;
                tracing::debug!(user_id = %session.user_id, "Removed expired session");
                return Err(AppError::InvalidToken);
            }

            Ok(session.user_id)
        })
    }
}

/// HS256 signed access tokens in the Authorization header.
pub struct JwtVerifier {
    key: DecodingKey,
}

impl TokenVerifier for JwtVerifier {
    fn credential(&self, headers: &HeaderMap, _jar: &CookieJar) -> Option<String> {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }

    fn verify<'a>(&'a self, credential: &'a str) -> BoxFuture<'a, Result<Uuid, AppError>> {
        Box::pin(async move { verify_access_token(credential, &self.key) })
    }
}

/// Resolve the request's principal: credential, then token, then user.
async fn resolve_principal(
    state: &AppState,
    headers: &HeaderMap,
    jar: &CookieJar,
) -> Result<User, AppError> {
    let credential = state
        .verifier
        .credential(headers, jar)
        .ok_or(AppError::Unauthorized)?;

    let user_id = state.verifier.verify(&credential).await?;

    let user = state
        .db
        .get_user(user_id)
        .await?
        .ok_or(AppError::InvalidToken)?;

    if !user.active {
        return Err(AppError::Forbidden("Account is inactive".to_string()));
    }

    Ok(user)
}

/// Middleware that requires a valid credential.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    match resolve_principal(&state, request.headers(), &jar).await {
        Ok(user) => {
            request.extensions_mut().insert(AuthUser { user });
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

/// Middleware that attaches the principal when one resolves, and lets
/// anonymous requests through otherwise.
pub async fn optional_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let user = match resolve_principal(&state, request.headers(), &jar).await {
        Ok(user) => Some(user),
        Err(AppError::Unauthorized) => None,
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring invalid credential on optional route");
            None
        }
    };

    if let Some(user) = &user {
        request
            .extensions_mut()
            .insert(AuthUser { user: user.clone() });
    }
    request.extensions_mut().insert(MaybeAuthUser { user });

    next.run(request).await
}
