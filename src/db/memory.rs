// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process document store with the same semantics as the Firestore backend.
//!
//! Each collection is a `DashMap`; single-document mutations hold the shard
//! lock for that key, which gives the same atomicity as a Firestore transaction.

use crate::error::AppError;
use crate::models::{Class, EnrollOutcome, Role, StoredToken, User, UserUpdate};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryStore {
    users: DashMap<Uuid, User>,
    /// Email claims. Always locked before `users` when both are held.
    user_emails: DashMap<String, Uuid>,
    sessions: DashMap<String, StoredToken>,
    refresh_tokens: DashMap<String, StoredToken>,
    classes: DashMap<String, Class>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ─── Users ───────────────────────────────────────────────────

    pub fn get_user(&self, id: Uuid) -> Option<User> {
        self.users.get(&id).map(|u| u.clone())
    }

    pub fn find_user_by_email(&self, email: &str) -> Option<User> {
        self.users
            .iter()
            .find(|u| u.email == email)
            .map(|u| u.clone())
    }

    pub fn find_user_by_provider(&self, provider: &str, provider_id: &str) -> Option<User> {
        self.users
            .iter()
            .find(|u| {
                u.provider.as_str() == provider && u.provider_id.as_deref() == Some(provider_id)
            })
            .map(|u| u.clone())
    }

    pub fn list_users(&self, role: Option<Role>, club_id: Option<&str>) -> Vec<User> {
        let mut users: Vec<User> = self
            .users
            .iter()
            .filter(|u| role.map_or(true, |r| u.role == r))
            .filter(|u| club_id.map_or(true, |c| u.assigned_club_ids.iter().any(|id| id == c)))
            .map(|u| u.clone())
            .collect();
        users.sort_by(|a, b| a.email.cmp(&b.email));
        users
    }

    /// Insert a new user if nobody holds its email.
    pub fn create_user(&self, user: &User) -> Result<(), AppError> {
        match self.user_emails.entry(user.email.clone()) {
            Entry::Occupied(_) => Err(AppError::email_taken()),
            Entry::Vacant(slot) => {
                slot.insert(user.id);
                self.users.insert(user.id, user.clone());
                Ok(())
            }
        }
    }

    /// Overwrite a stored user. Email claims are left as they are.
    pub fn upsert_user(&self, user: &User) {
        self.users.insert(user.id, user.clone());
    }

    pub fn update_user(&self, id: Uuid, update: &UserUpdate, now: DateTime<Utc>) -> Option<User> {
        let mut user = self.users.get_mut(&id)?;
        update.apply(&mut user, now);
        Some(user.clone())
    }

    /// Move a user to a new email, claiming it first.
    pub fn change_user_email(
        &self,
        id: Uuid,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, AppError> {
        let claim = match self.user_emails.entry(email.to_string()) {
            Entry::Occupied(owner) if *owner.get() != id => return Err(AppError::email_taken()),
            entry => entry.or_insert(id),
        };

        let Some(mut user) = self.users.get_mut(&id) else {
            drop(claim);
            self.user_emails.remove_if(email, |_, owner| *owner == id);
            return Ok(None);
        };
        let previous = std::mem::replace(&mut user.email, email.to_string());
        user.updated_at = now;
        let updated = user.clone();
        drop(user);
        drop(claim);

        if previous != email {
            self.user_emails.remove_if(&previous, |_, owner| *owner == id);
        }
        Ok(Some(updated))
    }

    pub fn delete_user(&self, id: Uuid) -> bool {
        let Some((_, user)) = self.users.remove(&id) else {
            return false;
        };
        self.user_emails.remove_if(&user.email, |_, owner| *owner == id);
        true
    }

    // ─── Tokens ──────────────────────────────────────────────────

    pub fn insert_session(&self, session: &StoredToken) {
        self.sessions
            .insert(session.token_hash.clone(), session.clone());
    }

    pub fn get_session(&self, token_hash: &str) -> Option<StoredToken> {
        self.sessions.get(token_hash).map(|s| s.clone())
    }

    pub fn delete_session(&self, token_hash: &str) {
        self.sessions.remove(token_hash);
    }

    pub fn insert_refresh_token(&self, token: &StoredToken) {
        self.refresh_tokens
            .insert(token.token_hash.clone(), token.clone());
    }

    pub fn get_refresh_token(&self, token_hash: &str) -> Option<StoredToken> {
        self.refresh_tokens.get(token_hash).map(|t| t.clone())
    }

    pub fn delete_refresh_token(&self, token_hash: &str) {
        self.refresh_tokens.remove(token_hash);
    }

    // ─── Classes ─────────────────────────────────────────────────

    pub fn insert_class(&self, class: &Class) {
        self.classes.insert(class.id.clone(), class.clone());
    }

    pub fn get_class(&self, id: &str) -> Option<Class> {
        self.classes.get(id).map(|c| c.clone())
    }

    pub fn list_classes(&self) -> Vec<Class> {
        let mut classes: Vec<Class> = self.classes.iter().map(|c| c.clone()).collect();
        classes.sort_by(|a, b| a.starts_at.cmp(&b.starts_at));
        classes
    }

    pub fn enroll_member(&self, class_id: &str, member_id: &str) -> Result<EnrollOutcome, AppError> {
        let mut class = self
            .classes
            .get_mut(class_id)
            .ok_or_else(|| AppError::NotFound("Class not found".to_string()))?;
        class
            .enroll(member_id, chrono::Utc::now())
            .map_err(|e| AppError::Validation(e.to_string()))
    }

    pub fn unenroll_member(&self, class_id: &str, member_id: &str) -> Result<Option<String>, AppError> {
        let mut class = self
            .classes
            .get_mut(class_id)
            .ok_or_else(|| AppError::NotFound("Class not found".to_string()))?;
        Ok(class.unenroll(member_id, chrono::Utc::now()))
    }
}
