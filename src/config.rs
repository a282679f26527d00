// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Every setting has a local-development fallback. Fallback secrets are
//! logged loudly and must never be relied on in production.

use crate::models::Role;
use std::env;
use std::str::FromStr;
use std::time::Duration;

const DEV_SIGNING_KEY: &str = "dev-only-signing-key-change-this-in-production";

/// Upper bounds for configured token lifetimes, in seconds
const MAX_ACCESS_TTL_SECS: i64 = 86400;
const MAX_REFRESH_TTL_SECS: i64 = 86400 * 365;

/// Which credential the auth middleware accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Opaque session token in an httpOnly cookie, backed by a `sessions` row.
    Session,
    /// HS256 signed claims in an `Authorization: Bearer` header.
    Jwt,
}

impl FromStr for AuthMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "session" => Ok(AuthMode::Session),
            "jwt" => Ok(AuthMode::Jwt),
            other => Err(format!("unknown auth mode '{other}', expected 'session' or 'jwt'")),
        }
    }
}

/// OAuth application settings for one provider.
#[derive(Debug, Clone)]
pub struct OAuthProviderConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Callback URL registered with the provider
    pub redirect_url: String,
    pub scopes: Vec<String>,
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    /// Secondary endpoint listing the account's emails (GitHub only)
    pub emails_url: Option<String>,
}

impl OAuthProviderConfig {
    pub fn google(client_id: String, client_secret: String, redirect_base: &str) -> Self {
        Self {
            client_id,
            client_secret,
            redirect_url: format!("{}/google", redirect_base.trim_end_matches('/')),
            scopes: vec![
                "https://www.googleapis.com/auth/userinfo.email".to_string(),
                "https://www.googleapis.com/auth/userinfo.profile".to_string(),
            ],
            auth_url: "https://accounts.google.com/o/oauth2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            userinfo_url: "https://www.googleapis.com/oauth2/v2/userinfo".to_string(),
            emails_url: None,
        }
    }

    pub fn github(client_id: String, client_secret: String, redirect_base: &str) -> Self {
        Self {
            client_id,
            client_secret,
            redirect_url: format!("{}/github", redirect_base.trim_end_matches('/')),
            scopes: vec!["user:email".to_string(), "read:user".to_string()],
            auth_url: "https://github.com/login/oauth/authorize".to_string(),
            token_url: "https://github.com/login/oauth/access_token".to_string(),
            userinfo_url: "https://api.github.com/user".to_string(),
            emails_url: Some("https://api.github.com/user/emails".to_string()),
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// GCP project ID for Firestore
    pub gcp_project_id: String,
    pub auth_mode: AuthMode,
    /// HS256 key for signed access tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    pub access_token_ttl: chrono::Duration,
    pub refresh_token_ttl: chrono::Duration,
    /// Role assigned to self-registered and first-time OAuth accounts
    pub default_role: Role,
    pub cookie_secure: bool,
    /// Upper bound for a single store operation
    pub store_timeout: Duration,
    /// Where the OAuth callback sends the browser after login
    pub post_login_redirect: String,
    pub google: OAuthProviderConfig,
    pub github: OAuthProviderConfig,
}

/// Cookie names.
pub const ACCESS_COOKIE: &str = "access_token";
pub const REFRESH_COOKIE: &str = "refresh_token";
pub const OAUTH_STATE_COOKIE: &str = "oauth_state";
/// Lifetime of the OAuth state cookie.
pub const OAUTH_STATE_MAX_AGE_SECS: i64 = 300;

impl Config {
    /// Deterministic config for tests.
    pub fn test_default() -> Self {
        let redirect_base = "http://localhost:8080/auth/callback";
        Self {
            port: 8080,
            frontend_url: "http://localhost:3000".to_string(),
            gcp_project_id: "test-project".to_string(),
            auth_mode: AuthMode::Session,
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            access_token_ttl: chrono::Duration::hours(1),
            refresh_token_ttl: chrono::Duration::days(7),
            default_role: Role::Classes,
            cookie_secure: false,
            store_timeout: Duration::from_secs(5),
            post_login_redirect: "/api/me".to_string(),
            google: OAuthProviderConfig::google(
                "test_google_id".to_string(),
                "test_google_secret".to_string(),
                redirect_base,
            ),
            github: OAuthProviderConfig::github(
                "test_github_id".to_string(),
                "test_github_secret".to_string(),
                redirect_base,
            ),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// A `.env` file is read first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let jwt_signing_key = match env::var("JWT_SIGNING_KEY").or_else(|_| env::var("SESSION_SECRET")) {
            Ok(key) if !key.trim().is_empty() => key.trim().as_bytes().to_vec(),
            _ => {
                tracing::warn!("JWT_SIGNING_KEY not set, using development signing key");
                DEV_SIGNING_KEY.as_bytes().to_vec()
            }
        };

        let redirect_base = env::var("OAUTH_REDIRECT_URL")
            .unwrap_or_else(|_| "http://localhost:8080/auth/callback".to_string());

        Ok(Self {
            port: parse_var("PORT", 8080)?,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            auth_mode: parse_var("AUTH_MODE", AuthMode::Session)?,
            jwt_signing_key,
            access_token_ttl: parse_ttl("ACCESS_TOKEN_TTL_SECS", 3600, MAX_ACCESS_TTL_SECS)?,
            refresh_token_ttl: parse_ttl(
                "REFRESH_TOKEN_TTL_SECS",
                86400 * 7,
                MAX_REFRESH_TTL_SECS,
            )?,
            default_role: parse_var("DEFAULT_USER_ROLE", Role::Classes)?,
            cookie_secure: parse_var("COOKIE_SECURE", false)?,
            store_timeout: Duration::from_secs(parse_var("STORE_TIMEOUT_SECS", 5)?),
            post_login_redirect: env::var("POST_LOGIN_REDIRECT")
                .unwrap_or_else(|_| "/api/me".to_string()),
            google: OAuthProviderConfig::google(
                env::var("GOOGLE_CLIENT_ID").unwrap_or_default(),
                env::var("GOOGLE_CLIENT_SECRET")
                    .map(|v| v.trim().to_string())
                    .unwrap_or_default(),
                &redirect_base,
            ),
            github: OAuthProviderConfig::github(
                env::var("GITHUB_CLIENT_ID").unwrap_or_default(),
                env::var("GITHUB_CLIENT_SECRET")
                    .map(|v| v.trim().to_string())
                    .unwrap_or_default(),
                &redirect_base,
            ),
        })
    }
}

/// Parse an optional variable, falling back to `default` when unset.
fn parse_var<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => {
            raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                var: name,
                reason: e.to_string(),
            })
        }
        _ => Ok(default),
    }
}

/// Parse a token lifetime in seconds, accepting `1..=max`.
fn parse_ttl(name: &'static str, default: i64, max: i64) -> Result<chrono::Duration, ConfigError> {
    let secs: i64 = parse_var(name, default)?;
    if !(1..=max).contains(&secs) {
        return Err(ConfigError::Invalid {
            var: name,
            reason: format!("must be between 1 and {max} seconds"),
        });
    }
    Ok(chrono::Duration::seconds(secs))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}
