// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User model for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Staff role. Stored and transmitted in snake_case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    ClubManager,
    AllServices,
    Restaurant,
    Office,
    Classes,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::Admin,
        Role::ClubManager,
        Role::AllServices,
        Role::Restaurant,
        Role::Office,
        Role::Classes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::ClubManager => "club_manager",
            Role::AllServices => "all_services",
            Role::Restaurant => "restaurant",
            Role::Office => "office",
            Role::Classes => "classes",
        }
    }

    /// Roles that manage other staff accounts.
    pub fn is_privileged(&self) -> bool {
        matches!(self, Role::Admin | Role::ClubManager)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Invalid role. Valid roles: admin, club_manager, all_services, restaurant, office, classes")]
pub struct InvalidRole;

impl FromStr for Role {
    type Err = InvalidRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or(InvalidRole)
    }
}

/// How an account authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    Local,
    Google,
    Github,
}

impl AuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthProvider::Local => "local",
            AuthProvider::Google => "google",
            AuthProvider::Github => "github",
        }
    }
}

/// User profile stored in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// User ID (also used as document ID)
    pub id: Uuid,
    /// Lowercased email address
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    /// Legacy single-field name, cleared by the `backfill-names` tool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    /// Argon2 PHC string. Empty for OAuth-only accounts.
    #[serde(default)]
    pub password_hash: String,
    pub role: Role,
    #[serde(default)]
    pub assigned_club_ids: Vec<String>,
    pub active: bool,
    pub provider: AuthProvider,
    /// Provider-assigned account ID (OAuth accounts only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Human readable name, falling back to the email address.
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.email.clone()
        } else {
            full.to_string()
        }
    }

    /// Whether the actor and this user share at least one assigned club.
    pub fn shares_club_with(&self, other: &User) -> bool {
        self.assigned_club_ids
            .iter()
            .any(|club| other.assigned_club_ids.contains(club))
    }

    /// Move a legacy `name` into `first_name`/`last_name`.
    ///
    /// Returns `true` if the record changed and needs to be written back.
    pub fn backfill_split_name(&mut self) -> bool {
        let Some(legacy) = self.name.take() else {
            return false;
        };
        if self.first_name.is_empty() && self.last_name.is_empty() {
            let (first, last) = split_name(&legacy);
            self.first_name = first;
            self.last_name = last;
        }
        true
    }
}

/// Field-level change to a stored user.
///
/// Only the fields that are set (plus `updated_at`) are written, so
/// concurrent changes to other fields are not overwritten.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub picture: Option<Option<String>>,
    pub password_hash: Option<String>,
    pub role: Option<Role>,
    pub assigned_club_ids: Option<Vec<String>>,
    pub active: Option<bool>,
}

impl UserUpdate {
    /// An update that only bumps `updated_at`.
    pub fn touch() -> Self {
        Self::default()
    }

    pub fn apply(&self, user: &mut User, now: DateTime<Utc>) {
        if let Some(first_name) = &self.first_name {
            user.first_name = first_name.clone();
        }
        if let Some(last_name) = &self.last_name {
            user.last_name = last_name.clone();
        }
        if let Some(picture) = &self.picture {
            user.picture = picture.clone();
        }
        if let Some(hash) = &self.password_hash {
            user.password_hash = hash.clone();
        }
        if let Some(role) = self.role {
            user.role = role;
        }
        if let Some(clubs) = &self.assigned_club_ids {
            user.assigned_club_ids = clubs.clone();
        }
        if let Some(active) = self.active {
            user.active = active;
        }
        user.updated_at = now;
    }

    /// Document field paths written by this update.
    pub fn field_paths(&self) -> Vec<&'static str> {
        let mut paths = vec!["updated_at"];
        let set = [
            ("first_name", self.first_name.is_some()),
            ("last_name", self.last_name.is_some()),
            ("picture", self.picture.is_some()),
            ("password_hash", self.password_hash.is_some()),
            ("role", self.role.is_some()),
            ("assigned_club_ids", self.assigned_club_ids.is_some()),
            ("active", self.active.is_some()),
        ];
        paths.extend(set.into_iter().filter(|(_, on)| *on).map(|(path, _)| path));
        paths
    }
}

/// Ownership record for a normalized email address.
///
/// Stored in the `user_emails` collection and created only if absent, which
/// makes it the arbiter of email uniqueness across accounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailClaim {
    pub user_id: Uuid,
}

/// Document ID of the claim for `email`.
pub fn email_claim_key(email: &str) -> String {
    hex::encode(Sha256::digest(email.as_bytes()))
}

/// Split a full name on the first whitespace.
pub fn split_name(full: &str) -> (String, String) {
    let full = full.trim();
    match full.split_once(char::is_whitespace) {
        Some((first, last)) => (first.to_string(), last.trim().to_string()),
        None => (full.to_string(), String::new()),
    }
}

/// User as returned by the API (no password hash).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub display_name: String,
    pub picture: Option<String>,
    pub role: Role,
    pub assigned_club_ids: Vec<String>,
    pub active: bool,
    pub provider: AuthProvider,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            display_name: user.display_name(),
            picture: user.picture.clone(),
            role: user.role,
            assigned_club_ids: user.assigned_club_ids.clone(),
            active: user.active,
            provider: user.provider,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self::from(&user)
    }
}
