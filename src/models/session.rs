// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Server-side session and refresh token records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// An opaque bearer token stored server-side.
///
/// Used both for access sessions (`sessions` collection) and refresh
/// tokens (`refresh_tokens` collection). The document ID is the SHA-256
/// digest of the token; the raw value only ever lives in the client's cookie.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Hex SHA-256 of the token (also the document ID)
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl StoredToken {
    pub fn new(user_id: Uuid, token: &str, ttl: chrono::Duration) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            token_hash: token_digest(token),
            expires_at: now + ttl,
            created_at: now,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Digest used as the lookup key for a bearer token.
pub fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
