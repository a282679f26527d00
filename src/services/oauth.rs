// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth login through Google and GitHub.
//!
//! Handles:
//! - Building the provider authorization URL
//! - Authorization code exchange
//! - Profile fetch and normalization (GitHub primary-email fallback)
//! - Account upsert keyed by (provider, provider_id)

use crate::config::{Config, OAuthProviderConfig};
use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::{split_name, AuthProvider, Role, User, UserUpdate};
use crate::services::local_auth::normalize_email;
use serde::Deserialize;
use std::str::FromStr;
use uuid::Uuid;

const USER_AGENT: &str = concat!("clubhouse/", env!("CARGO_PKG_VERSION"));

/// External identity providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthProvider {
    Google,
    Github,
}

impl OAuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
            OAuthProvider::Github => "github",
        }
    }

    fn account_provider(&self) -> AuthProvider {
        match self {
            OAuthProvider::Google => AuthProvider::Google,
            OAuthProvider::Github => AuthProvider::Github,
        }
    }
}

impl FromStr for OAuthProvider {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google" => Ok(OAuthProvider::Google),
            "github" => Ok(OAuthProvider::Github),
            other => Err(AppError::NotFound(format!("Unknown OAuth provider: {other}"))),
        }
    }
}

/// Normalized profile returned by a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderProfile {
    pub provider_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub picture: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    given_name: Option<String>,
    #[serde(default)]
    family_name: Option<String>,
    #[serde(default)]
    picture: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GithubUser {
    id: u64,
    login: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GithubEmail {
    email: String,
    #[serde(default)]
    primary: bool,
}

/// OAuth service: provider HTTP calls plus account resolution.
#[derive(Clone)]
pub struct OAuthService {
    http: reqwest::Client,
    google: OAuthProviderConfig,
    github: OAuthProviderConfig,
    db: FirestoreDb,
    default_role: Role,
}

impl OAuthService {
    pub fn new(config: &Config, db: FirestoreDb) -> Self {
        Self {
            http: reqwest::Client::new(),
            google: config.google.clone(),
            github: config.github.clone(),
            db,
            default_role: config.default_role,
        }
    }

    fn provider_config(&self, provider: OAuthProvider) -> &OAuthProviderConfig {
        match provider {
            OAuthProvider::Google => &self.google,
            OAuthProvider::Github => &self.github,
        }
    }

    /// Provider authorization URL carrying `state`.
    pub fn authorize_url(&self, provider: OAuthProvider, state: &str) -> String {
        let cfg = self.provider_config(provider);
        let mut url = format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}",
            cfg.auth_url,
            urlencoding::encode(&cfg.client_id),
            urlencoding::encode(&cfg.redirect_url),
            urlencoding::encode(&cfg.scopes.join(" ")),
            urlencoding::encode(state),
        );
        if provider == OAuthProvider::Google {
            url.push_str("&access_type=offline");
        }
        url
    }

    /// Run the callback phase: exchange the code, fetch the profile and
    /// resolve the local account.
    pub async fn complete_login(&self, provider: OAuthProvider, code: &str) -> Result<User, AppError> {
        let access_token = self.exchange_code(provider, code).await?;
        let profile = self.fetch_profile(provider, &access_token).await?;
        self.upsert_account(provider, profile).await
    }

    /// Exchange an authorization code for a provider access token.
    pub async fn exchange_code(&self, provider: OAuthProvider, code: &str) -> Result<String, AppError> {
        let cfg = self.provider_config(provider);

        let response = self
            .http
            .post(&cfg.token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[
                ("client_id", cfg.client_id.as_str()),
                ("client_secret", cfg.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", cfg.redirect_url.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| AppError::OAuthProvider(format!("Token request failed: {}", e)))?;

        let token: TokenResponse = check_response_json(response).await?;

        // GitHub reports exchange failures with a 200 and an error field
        if let Some(error) = token.error {
            return Err(AppError::OAuthProvider(format!(
                "{} token exchange failed: {} {}",
                provider.as_str(),
                error,
                token.error_description.unwrap_or_default()
            )));
        }

        token.access_token.ok_or_else(|| {
            AppError::OAuthProvider("Token response missing access_token".to_string())
        })
    }

    /// Fetch and normalize the provider's user profile.
    pub async fn fetch_profile(
        &self,
        provider: OAuthProvider,
        access_token: &str,
    ) -> Result<ProviderProfile, AppError> {
        match provider {
            OAuthProvider::Google => {
                let info: GoogleUserInfo = self.get_json(&self.google.userinfo_url, access_token).await?;
                let (first_name, last_name) = match (info.given_name, info.family_name) {
                    (Some(first), last) => (first, last.unwrap_or_default()),
                    (None, _) => split_name(info.name.as_deref().unwrap_or_default()),
                };
                Ok(ProviderProfile {
                    provider_id: info.id,
                    email: info.email.unwrap_or_default(),
                    first_name,
                    last_name,
                    picture: info.picture,
                })
            }
            OAuthProvider::Github => {
                let info: GithubUser = self.get_json(&self.github.userinfo_url, access_token).await?;

                let email = match info.email.filter(|e| !e.is_empty()) {
                    Some(email) => email,
                    None => self.github_primary_email(access_token).await?,
                };

                let display = info.name.filter(|n| !n.trim().is_empty()).unwrap_or(info.login);
                let (first_name, last_name) = split_name(&display);

                Ok(ProviderProfile {
                    provider_id: info.id.to_string(),
                    email,
                    first_name,
                    last_name,
                    picture: info.avatar_url,
                })
            }
        }
    }

    /// GitHub hides private emails from `/user`; pick the primary one.
    async fn github_primary_email(&self, access_token: &str) -> Result<String, AppError> {
        let Some(url) = self.github.emails_url.as_deref() else {
            return Ok(String::new());
        };
        let emails: Vec<GithubEmail> = self.get_json(url, access_token).await?;
        Ok(emails
            .into_iter()
            .find(|e| e.primary)
            .map(|e| e.email)
            .unwrap_or_default())
    }

    /// Create or refresh the local account for a provider identity.
    pub async fn upsert_account(
        &self,
        provider: OAuthProvider,
        profile: ProviderProfile,
    ) -> Result<User, AppError> {
        let email = normalize_email(&profile.email);
        if email.is_empty() {
            return Err(AppError::OAuthProvider(format!(
                "{} did not return an email address",
                provider.as_str()
            )));
        }

        let existing = self
            .db
            .find_user_by_provider(provider.as_str(), &profile.provider_id)
            .await?;

        let Some(user) = existing else {
            return self.create_account(provider, profile, email).await;
        };

        let update = UserUpdate {
            first_name: Some(profile.first_name),
            last_name: Some(profile.last_name),
            picture: Some(profile.picture),
            ..Default::default()
        };
        let mut user = self
            .db
            .update_user(user.id, &update)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        if user.email != email {
            match self.db.change_user_email(user.id, &email).await {
                Ok(Some(changed)) => user = changed,
                Ok(None) => return Err(AppError::NotFound("User not found".to_string())),
                Err(AppError::Conflict(_)) => {
                    tracing::warn!(
                        user_id = %user.id,
                        provider = provider.as_str(),
                        "Provider email belongs to another account; keeping stored email"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        tracing::info!(user_id = %user.id, provider = provider.as_str(), "OAuth login");
        Ok(user)
    }

    async fn create_account(
        &self,
        provider: OAuthProvider,
        profile: ProviderProfile,
        email: String,
    ) -> Result<User, AppError> {
        let now = chrono::Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email,
            first_name: profile.first_name,
            last_name: profile.last_name,
            name: None,
            picture: profile.picture,
            password_hash: String::new(),
            role: self.default_role,
            assigned_club_ids: vec![],
            active: true,
            provider: provider.account_provider(),
            provider_id: Some(profile.provider_id),
            created_at: now,
            updated_at: now,
        };
        self.db.create_user(&user).await?;

        tracing::info!(
            user_id = %user.id,
            provider = provider.as_str(),
            "Created account from OAuth login"
        );
        Ok(user)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        access_token: &str,
    ) -> Result<T, AppError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| AppError::OAuthProvider(e.to_string()))?;

        check_response_json(response).await
    }
}

/// Check response status and parse the JSON body.
async fn check_response_json<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<T, AppError> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(AppError::OAuthProvider(format!("HTTP {}: {}", status, body)));
    }

    response
        .json()
        .await
        .map_err(|e| AppError::OAuthProvider(format!("Failed to parse response: {}", e)))
}
