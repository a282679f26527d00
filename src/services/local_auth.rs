// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Local (email + password) accounts and the token lifecycle.
//!
//! Handles:
//! - Registration and login
//! - Access/refresh credential issuing for both auth modes
//! - Access token refresh (refresh tokens are never rotated)
//! - Password changes and logout

use crate::config::{AuthMode, Config};
use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::{split_name, token_digest, AuthProvider, Role, StoredToken, User, UserUpdate};
use crate::services::password::{hash_password_async, verify_password_async};
use crate::services::tokens::TokenIssuer;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

/// Registration request body.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(
        length(min = 1, message = "is required"),
        contains(pattern = "@", message = "must be a valid email address")
    )]
    pub email: String,
    #[validate(length(min = 8, message = "must be at least 8 characters"))]
    pub password: String,
    /// Full name, split into first/last on storage
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "is required"))]
    pub current_password: String,
    #[validate(length(min = 8, message = "must be at least 8 characters"))]
    pub new_password: String,
}

/// Freshly issued bearer values, before they are turned into cookies or
/// a response body.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Opaque session token (session mode) or signed token (jwt mode)
    pub access_token: String,
    /// Present on login; absent when only the access token was re-minted
    pub refresh_token: Option<String>,
}

/// Normalize an email for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Local authentication service.
#[derive(Clone)]
pub struct AuthService {
    db: FirestoreDb,
    issuer: TokenIssuer,
    auth_mode: AuthMode,
    default_role: Role,
}

impl AuthService {
    pub fn new(config: &Config, db: FirestoreDb) -> Self {
        Self {
            db,
            issuer: TokenIssuer::new(config),
            auth_mode: config.auth_mode,
            default_role: config.default_role,
        }
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    /// Register a new local account and sign it in.
    pub async fn register(&self, request: RegisterRequest) -> Result<(User, Credentials), AppError> {
        request.validate()?;

        let email = normalize_email(&request.email);
        let password_hash = hash_password_async(request.password).await?;
        let (first_name, last_name) = split_name(&request.name);
        let now = chrono::Utc::now();

        let user = User {
            id: Uuid::new_v4(),
            email,
            first_name,
            last_name,
            name: None,
            picture: None,
            password_hash,
            role: self.default_role,
            assigned_club_ids: vec![],
            active: true,
            provider: AuthProvider::Local,
            provider_id: None,
            created_at: now,
            updated_at: now,
        };
        self.db.create_user(&user).await?;

        tracing::info!(user_id = %user.id, role = %user.role, "Registered local account");

        let credentials = self.issue_credentials(&user).await?;
        Ok((user, credentials))
    }

    /// Verify email and password, then issue fresh credentials.
    ///
    /// Unknown accounts and wrong passwords fail identically.
    pub async fn login(&self, request: LoginRequest) -> Result<(User, Credentials), AppError> {
        request.validate()?;

        let email = normalize_email(&request.email);
        let Some(user) = self.db.find_user_by_email(&email).await? else {
            tracing::debug!("Login for unknown email");
            return Err(AppError::InvalidCredentials);
        };

        if !verify_password_async(request.password, user.password_hash.clone()).await? {
            tracing::debug!(user_id = %user.id, "Login with wrong password");
            return Err(AppError::InvalidCredentials);
        }

        // Re-read through the touch so a deactivation during verification
        // is seen here.
        let user = self
            .db
            .update_user(user.id, &UserUpdate::touch())
            .await?
            .ok_or(AppError::InvalidCredentials)?;
        if !user.active {
            return Err(AppError::Forbidden("Account is inactive".to_string()));
        }

        tracing::info!(user_id = %user.id, "Local login");

        let credentials = self.issue_credentials(&user).await?;
        Ok((user, credentials))
    }

    /// Issue an access token and a refresh token for `user`.
    ///
    /// Existing credentials stay valid; a user may hold many sessions.
    pub async fn issue_credentials(&self, user: &User) -> Result<Credentials, AppError> {
        let access_token = self.mint_access(user).await?;

        let refresh_token = self.issuer.issue_token()?;
        let row = StoredToken::new(user.id, &refresh_token, self.issuer.refresh_ttl());
        self.db.insert_refresh_token(&row).await?;

        Ok(Credentials {
            access_token,
            refresh_token: Some(refresh_token),
        })
    }

    async fn mint_access(&self, user: &User) -> Result<String, AppError> {
        match self.auth_mode {
            AuthMode::Session => {
                let token = self.issuer.issue_token()?;
                let session = StoredToken::new(user.id, &token, self.issuer.access_ttl());
                self.db.insert_session(&session).await?;
                Ok(token)
            }
            AuthMode::Jwt => self.issuer.sign_access_token(user),
        }
    }

    /// Mint a new access token from a refresh token.
    ///
    /// The refresh token's own expiry is absolute and is not extended.
    pub async fn refresh(&self, refresh_token: Option<&str>) -> Result<Credentials, AppError> {
        let refresh_token = refresh_token.ok_or(AppError::Unauthorized)?;
        let digest = token_digest(refresh_token);

        let row = self
            .db
            .get_refresh_token(&digest)
            .await?
            .ok_or(AppError::InvalidToken)?;

        if row.is_expired(chrono::Utc::now()) {
            self.db.delete_refresh_token(&digest).await?;
            tracing::debug!(user_id = %row.user_id, "Removed expired refresh token");
            return Err(AppError::InvalidToken);
        }

        let user = self
            .db
            .get_user(row.user_id)
            .await?
            .ok_or(AppError::InvalidToken)?;
        if !user.active {
            return Err(AppError::Forbidden("Account is inactive".to_string()));
        }

        let access_token = self.mint_access(&user).await?;
        Ok(Credentials {
            access_token,
            refresh_token: None,
        })
    }

    /// Change the password of an authenticated user.
    pub async fn change_password(
        &self,
        user: &User,
        request: ChangePasswordRequest,
    ) -> Result<(), AppError> {
        request.validate()?;

        if !verify_password_async(request.current_password, user.password_hash.clone()).await? {
            return Err(AppError::IncorrectPassword);
        }

        let update = UserUpdate {
            password_hash: Some(hash_password_async(request.new_password).await?),
            ..Default::default()
        };
        self.db
            .update_user(user.id, &update)
            .await?
            .ok_or(AppError::InvalidToken)?;

        tracing::info!(user_id = %user.id, "Password changed");
        Ok(())
    }

    /// Revoke whatever server-side rows the presented tokens reference.
    ///
    /// A signed access token has no row; it simply expires.
    pub async fn logout(
        &self,
        access_token: Option<&str>,
        refresh_token: Option<&str>,
    ) -> Result<(), AppError> {
        if let (AuthMode::Session, Some(token)) = (self.auth_mode, access_token) {
            self.db.delete_session(&token_digest(token)).await?;
        }
        if let Some(token) = refresh_token {
            self.db.delete_refresh_token(&token_digest(token)).await?;
        }
        Ok(())
    }
}
