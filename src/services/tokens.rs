// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Token issuing: opaque random tokens and HS256 signed access tokens.

use crate::config::Config;
use crate::error::AppError;
use crate::models::{Role, User};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Random bytes per opaque token (256 bits).
const TOKEN_BYTES: usize = 32;

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    pub email: String,
    pub role: Role,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

/// Issues bearer credentials with the configured lifetimes.
#[derive(Clone)]
pub struct TokenIssuer {
    rng: SystemRandom,
    signing_key: Vec<u8>,
    access_ttl: chrono::Duration,
    refresh_ttl: chrono::Duration,
}

impl TokenIssuer {
    pub fn new(config: &Config) -> Self {
        Self {
            rng: SystemRandom::new(),
            signing_key: config.jwt_signing_key.clone(),
            access_ttl: config.access_token_ttl,
            refresh_ttl: config.refresh_token_ttl,
        }
    }

    pub fn access_ttl(&self) -> chrono::Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> chrono::Duration {
        self.refresh_ttl
    }

    /// Generate an unguessable, URL-safe opaque token.
    pub fn issue_token(&self) -> Result<String, AppError> {
        let mut bytes = [0u8; TOKEN_BYTES];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("Failed to generate random token")))?;
        Ok(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Sign an access token for `user`, valid for the access TTL.
    pub fn sign_access_token(&self, user: &User) -> Result<String, AppError> {
        let now = chrono::Utc::now();
        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            role: user.role,
            iat: now.timestamp() as usize,
            exp: (now + self.access_ttl).timestamp() as usize,
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(&self.signing_key),
        )
        .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))
    }
}

/// Validate an HS256 token's signature and expiry, returning its subject.
pub fn verify_access_token(token: &str, key: &DecodingKey) -> Result<Uuid, AppError> {
    let validation = Validation::new(Algorithm::HS256);
    let data = decode::<Claims>(token, key, &validation).map_err(|e| {
        tracing::debug!(error = %e, "Rejected signed access token");
        AppError::InvalidToken
    })?;
    data.claims.sub.parse().map_err(|_| AppError::InvalidToken)
}
