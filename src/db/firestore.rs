// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (staff accounts, local and OAuth)
//! - Sessions and refresh tokens (keyed by token digest)
//! - Classes (enrollment and waitlist)
//!
//! Every operation is bounded by the configured store timeout.

use crate::db::collections;
use crate::db::memory::MemoryStore;
use crate::error::AppError;
use crate::models::user::email_claim_key;
use crate::models::{
    Class, EmailClaim, EnrollOutcome, EnrollmentError, Role, StoredToken, User, UserUpdate,
};
use dashmap::DashMap;
use firestore::{FirestoreTransaction, FirestoreWritePrecondition};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

type KeyLocks = DashMap<String, Arc<Mutex<()>>>;

/// Held per-key lock. Dropping it removes the map entry once no other task
/// holds or waits on the same key.
struct KeyGuard<'a> {
    locks: &'a KeyLocks,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        self.locks
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

async fn lock_key<'a>(locks: &'a KeyLocks, key: &str) -> KeyGuard<'a> {
    let mut held = KeyGuard {
        locks,
        key: key.to_string(),
        guard: None,
    };
    let lock = locks.entry(key.to_string()).or_default().clone();
    held.guard = Some(lock.lock_owned().await);
    held
}

#[derive(Clone)]
enum Backend {
    Firestore(firestore::FirestoreDb),
    Memory(Arc<MemoryStore>),
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    backend: Backend,
    timeout: Duration,
    /// Serializes roster read-modify-write per class within this process
    class_locks: Arc<KeyLocks>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            backend: Backend::Firestore(client),
            timeout: DEFAULT_TIMEOUT,
            class_locks: Arc::default(),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            backend: Backend::Firestore(client),
            timeout: DEFAULT_TIMEOUT,
            class_locks: Arc::default(),
        })
    }

    /// Create an in-process store (tests and local runs without Firestore).
    pub fn new_in_memory() -> Self {
        Self {
            backend: Backend::Memory(Arc::new(MemoryStore::new())),
            timeout: DEFAULT_TIMEOUT,
            class_locks: Arc::default(),
        }
    }

    /// Set the upper bound for a single store operation.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run a store operation under the configured timeout.
    async fn bounded<T>(
        &self,
        op: &'static str,
        fut: impl Future<Output = Result<T, AppError>>,
    ) -> Result<T, AppError> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| AppError::Database(format!("{op} timed out after {:?}", self.timeout)))?
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Get a user by ID.
    pub async fn get_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        self.bounded("get_user", async {
            match &self.backend {
                Backend::Memory(store) => Ok(store.get_user(id)),
                Backend::Firestore(client) => client
                    .fluent()
                    .select()
                    .by_id_in(collections::USERS)
                    .obj()
                    .one(&id.to_string())
                    .await
                    .map_err(|e| AppError::Database(e.to_string())),
            }
        })
        .await
    }

    /// Find a user by normalized email, regardless of provider.
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        self.bounded("find_user_by_email", async {
            match &self.backend {
                Backend::Memory(store) => Ok(store.find_user_by_email(email)),
                Backend::Firestore(client) => {
                    let email = email.to_string();
                    let users: Vec<User> = client
                        .fluent()
                        .select()
                        .from(collections::USERS)
                        .filter(move |q| q.for_all([q.field("email").eq(email.clone())]))
                        .limit(1)
                        .obj()
                        .query()
                        .await
                        .map_err(|e| AppError::Database(e.to_string()))?;
                    Ok(users.into_iter().next())
                }
            }
        })
        .await
    }

    /// Find an OAuth account by (provider, provider_id).
    pub async fn find_user_by_provider(
        &self,
        provider: &str,
        provider_id: &str,
    ) -> Result<Option<User>, AppError> {
        self.bounded("find_user_by_provider", async {
            match &self.backend {
                Backend::Memory(store) => Ok(store.find_user_by_provider(provider, provider_id)),
                Backend::Firestore(client) => {
                    let provider = provider.to_string();
                    let provider_id = provider_id.to_string();
                    let users: Vec<User> = client
                        .fluent()
                        .select()
                        .from(collections::USERS)
                        .filter(move |q| {
                            q.for_all([
                                q.field("provider").eq(provider.clone()),
                                q.field("provider_id").eq(provider_id.clone()),
                            ])
                        })
                        .limit(1)
                        .obj()
                        .query()
                        .await
                        .map_err(|e| AppError::Database(e.to_string()))?;
                    Ok(users.into_iter().next())
                }
            }
        })
        .await
    }

    /// List users, optionally filtered by role and assigned club.
    pub async fn list_users(
        &self,
        role: Option<Role>,
        club_id: Option<&str>,
    ) -> Result<Vec<User>, AppError> {
        self.bounded("list_users", async {
            match &self.backend {
                Backend::Memory(store) => Ok(store.list_users(role, club_id)),
                Backend::Firestore(client) => {
                    let club_id = club_id.map(str::to_string);
                    client
                        .fluent()
                        .select()
                        .from(collections::USERS)
                        .filter(move |q| {
                            q.for_all([
                                role.and_then(|r| q.field("role").eq(r.as_str())),
                                club_id
                                    .clone()
                                    .and_then(|c| q.field("assigned_club_ids").array_contains(c)),
                            ])
                        })
                        .order_by([("email", firestore::FirestoreQueryDirection::Ascending)])
                        .obj()
                        .query()
                        .await
                        .map_err(|e| AppError::Database(e.to_string()))
                }
            }
        })
        .await
    }

    /// Create a new user and claim its email address.
    ///
    /// The claim and the user document commit together; if another account
    /// already holds the email this fails with `Conflict` and writes nothing.
    pub async fn create_user(&self, user: &User) -> Result<(), AppError> {
        self.bounded("create_user", async {
            match &self.backend {
                Backend::Memory(store) => store.create_user(user),
                Backend::Firestore(client) => {
                    if self.email_owner(client, &user.email).await?.is_some() {
                        return Err(AppError::email_taken());
                    }

                    let mut transaction = begin_transaction(client).await?;
                    claim_email(client, &mut transaction, &user.email, user.id)?;
                    client
                        .fluent()
                        .update()
                        .in_col(collections::USERS)
                        .document_id(user.id.to_string())
                        .object(user)
                        .add_to_transaction(&mut transaction)
                        .map_err(|e| {
                            AppError::Database(format!("Failed to add user to transaction: {}", e))
                        })?;
                    self.commit_claim(client, transaction, &user.email, user.id)
                        .await
                }
            }
        })
        .await
    }

    /// Overwrite a user document. Email claims are not touched, so this is
    /// only for rewriting existing records.
    pub async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        self.bounded("upsert_user", async {
            match &self.backend {
                Backend::Memory(store) => {
                    store.upsert_user(user);
                    Ok(())
                }
                Backend::Firestore(client) => {
                    let _: () = client
                        .fluent()
                        .update()
                        .in_col(collections::USERS)
                        .document_id(user.id.to_string())
                        .object(user)
                        .execute()
                        .await
                        .map_err(|e| AppError::Database(e.to_string()))?;
                    Ok(())
                }
            }
        })
        .await
    }

    /// Write only the fields set in `update` (and `updated_at`).
    ///
    /// Returns the user as it stands after the update, or `None` if it does
    /// not exist.
    pub async fn update_user(
        &self,
        id: Uuid,
        update: &UserUpdate,
    ) -> Result<Option<User>, AppError> {
        self.bounded("update_user", async {
            let now = chrono::Utc::now();
            match &self.backend {
                Backend::Memory(store) => Ok(store.update_user(id, update, now)),
                Backend::Firestore(client) => {
                    let Some(mut user) = self.get_user_unbounded(id).await? else {
                        return Ok(None);
                    };
                    update.apply(&mut user, now);

                    let _: () = client
                        .fluent()
                        .update()
                        .fields(update.field_paths())
                        .in_col(collections::USERS)
                        .precondition(FirestoreWritePrecondition::Exists(true))
                        .document_id(id.to_string())
                        .object(&user)
                        .execute()
                        .await
                        .map_err(|e| AppError::Database(e.to_string()))?;
                    Ok(Some(user))
                }
            }
        })
        .await
    }

    /// Move a user to a new email address.
    ///
    /// The new address is claimed and the old claim released in the same
    /// commit. Fails with `Conflict` if another account holds the address.
    pub async fn change_user_email(
        &self,
        id: Uuid,
        email: &str,
    ) -> Result<Option<User>, AppError> {
        self.bounded("change_user_email", async {
            let now = chrono::Utc::now();
            match &self.backend {
                Backend::Memory(store) => store.change_user_email(id, email, now),
                Backend::Firestore(client) => {
                    let Some(mut user) = self.get_user_unbounded(id).await? else {
                        return Ok(None);
                    };
                    if user.email == email {
                        return Ok(Some(user));
                    }

                    let new_owner = self.email_owner(client, email).await?;
                    if new_owner.is_some_and(|owner| owner != id) {
                        return Err(AppError::email_taken());
                    }
                    let old_owner = self.email_owner(client, &user.email).await?;

                    let previous = std::mem::replace(&mut user.email, email.to_string());
                    user.updated_at = now;

                    let mut transaction = begin_transaction(client).await?;
                    if new_owner.is_none() {
                        claim_email(client, &mut transaction, email, id)?;
                    }
                    if old_owner == Some(id) {
                        client
                            .fluent()
                            .delete()
                            .from(collections::USER_EMAILS)
                            .document_id(email_claim_key(&previous))
                            .add_to_transaction(&mut transaction)
                            .map_err(|e| {
                                AppError::Database(format!(
                                    "Failed to add claim release to transaction: {}",
                                    e
                                ))
                            })?;
                    }
                    client
                        .fluent()
                        .update()
                        .fields(["email", "updated_at"])
                        .in_col(collections::USERS)
                        .precondition(FirestoreWritePrecondition::Exists(true))
                        .document_id(id.to_string())
                        .object(&user)
                        .add_to_transaction(&mut transaction)
                        .map_err(|e| {
                            AppError::Database(format!("Failed to add user to transaction: {}", e))
                        })?;
                    self.commit_claim(client, transaction, email, id).await?;

                    tracing::info!(user_id = %id, "User email changed");
                    Ok(Some(user))
                }
            }
        })
        .await
    }

    /// Delete a user and release its email. Returns `false` if no such user
    /// existed.
    pub async fn delete_user(&self, id: Uuid) -> Result<bool, AppError> {
        self.bounded("delete_user", async {
            match &self.backend {
                Backend::Memory(store) => Ok(store.delete_user(id)),
                Backend::Firestore(client) => {
                    let Some(user) = self.get_user_unbounded(id).await? else {
                        return Ok(false);
                    };
                    let owns_email = self.email_owner(client, &user.email).await? == Some(id);

                    let mut transaction = begin_transaction(client).await?;
                    let mut deletes = vec![(collections::USERS, id.to_string())];
                    if owns_email {
                        deletes.push((collections::USER_EMAILS, email_claim_key(&user.email)));
                    }
                    for (collection, doc_id) in deletes {
                        client
                            .fluent()
                            .delete()
                            .from(collection)
                            .document_id(&doc_id)
                            .add_to_transaction(&mut transaction)
                            .map_err(|e| {
                                AppError::Database(format!(
                                    "Failed to add delete to transaction: {}",
                                    e
                                ))
                            })?;
                    }
                    transaction
                        .commit()
                        .await
                        .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;
                    Ok(true)
                }
            }
        })
        .await
    }

    async fn get_user_unbounded(&self, id: Uuid) -> Result<Option<User>, AppError> {
        match &self.backend {
            Backend::Memory(store) => Ok(store.get_user(id)),
            Backend::Firestore(client) => client
                .fluent()
                .select()
                .by_id_in(collections::USERS)
                .obj()
                .one(&id.to_string())
                .await
                .map_err(|e| AppError::Database(e.to_string())),
        }
    }

    // ─── Session / Refresh Token Operations ──────────────────────

    /// Store a new access session.
    pub async fn insert_session(&self, session: &StoredToken) -> Result<(), AppError> {
        self.bounded("insert_session", async {
            match &self.backend {
                Backend::Memory(store) => {
                    store.insert_session(session);
                    Ok(())
                }
                Backend::Firestore(_) => self.insert_token_doc(collections::SESSIONS, session).await,
            }
        })
        .await
    }

    /// Look up a session by token digest.
    pub async fn get_session(&self, token_hash: &str) -> Result<Option<StoredToken>, AppError> {
        self.bounded("get_session", async {
            match &self.backend {
                Backend::Memory(store) => Ok(store.get_session(token_hash)),
                Backend::Firestore(_) => self.get_token_doc(collections::SESSIONS, token_hash).await,
            }
        })
        .await
    }

    /// Delete a session. Deleting a missing session is not an error.
    pub async fn delete_session(&self, token_hash: &str) -> Result<(), AppError> {
        self.bounded("delete_session", async {
            match &self.backend {
                Backend::Memory(store) => {
                    store.delete_session(token_hash);
                    Ok(())
                }
                Backend::Firestore(_) => self.delete_doc(collections::SESSIONS, token_hash).await,
            }
        })
        .await
    }

    pub async fn insert_refresh_token(&self, token: &StoredToken) -> Result<(), AppError> {
        self.bounded("insert_refresh_token", async {
            match &self.backend {
                Backend::Memory(store) => {
                    store.insert_refresh_token(token);
                    Ok(())
                }
                Backend::Firestore(_) => {
                    self.insert_token_doc(collections::REFRESH_TOKENS, token)
                        .await
                }
            }
        })
        .await
    }

    pub async fn get_refresh_token(
        &self,
        token_hash: &str,
    ) -> Result<Option<StoredToken>, AppError> {
        self.bounded("get_refresh_token", async {
            match &self.backend {
                Backend::Memory(store) => Ok(store.get_refresh_token(token_hash)),
                Backend::Firestore(_) => {
                    self.get_token_doc(collections::REFRESH_TOKENS, token_hash)
                        .await
                }
            }
        })
        .await
    }

    pub async fn delete_refresh_token(&self, token_hash: &str) -> Result<(), AppError> {
        self.bounded("delete_refresh_token", async {
            match &self.backend {
                Backend::Memory(store) => {
                    store.delete_refresh_token(token_hash);
                    Ok(())
                }
                Backend::Firestore(_) => {
                    self.delete_doc(collections::REFRESH_TOKENS, token_hash)
                        .await
                }
            }
        })
        .await
    }

    // ─── Class Operations ────────────────────────────────────────

    pub async fn insert_class(&self, class: &Class) -> Result<(), AppError> {
        self.bounded("insert_class", async {
            match &self.backend {
                Backend::Memory(store) => {
                    store.insert_class(class);
                    Ok(())
                }
                Backend::Firestore(client) => {
                    let _: () = client
                        .fluent()
                        .update()
                        .in_col(collections::CLASSES)
                        .document_id(&class.id)
                        .object(class)
                        .execute()
                        .await
                        .map_err(|e| AppError::Database(e.to_string()))?;
                    Ok(())
                }
            }
        })
        .await
    }

    pub async fn get_class(&self, id: &str) -> Result<Option<Class>, AppError> {
        self.bounded("get_class", async {
            match &self.backend {
                Backend::Memory(store) => Ok(store.get_class(id)),
                Backend::Firestore(client) => client
                    .fluent()
                    .select()
                    .by_id_in(collections::CLASSES)
                    .obj()
                    .one(id)
                    .await
                    .map_err(|e| AppError::Database(e.to_string())),
            }
        })
        .await
    }

    pub async fn list_classes(&self) -> Result<Vec<Class>, AppError> {
        self.bounded("list_classes", async {
            match &self.backend {
                Backend::Memory(store) => Ok(store.list_classes()),
                Backend::Firestore(client) => client
                    .fluent()
                    .select()
                    .from(collections::CLASSES)
                    .order_by([("starts_at", firestore::FirestoreQueryDirection::Ascending)])
                    .obj()
                    .query()
                    .await
                    .map_err(|e| AppError::Database(e.to_string())),
            }
        })
        .await
    }

    /// Atomically enroll a member or add them to the waitlist.
    ///
    /// The roster write is committed in a Firestore transaction.
    pub async fn enroll_member(
        &self,
        class_id: &str,
        member_id: &str,
    ) -> Result<EnrollOutcome, AppError> {
        self.bounded("enroll_member", async {
            match &self.backend {
                Backend::Memory(store) => store.enroll_member(class_id, member_id),
                Backend::Firestore(client) => {
                    let result = self
                        .mutate_class(client, class_id, |class| {
                            let outcome = class.enroll(member_id, chrono::Utc::now());
                            let write = outcome.is_ok();
                            (outcome, write)
                        })
                        .await?;
                    match result {
                        None => Err(AppError::NotFound("Class not found".to_string())),
                        Some(Err(EnrollmentError::AlreadyEnrolled)) => Err(AppError::Validation(
                            EnrollmentError::AlreadyEnrolled.to_string(),
                        )),
                        Some(Ok(outcome)) => Ok(outcome),
                    }
                }
            }
        })
        .await
    }

    /// Atomically remove a member from a class and promote the head of the
    /// waitlist into the freed seat.
    ///
    /// Returns the promoted member, if any.
    pub async fn unenroll_member(
        &self,
        class_id: &str,
        member_id: &str,
    ) -> Result<Option<String>, AppError> {
        self.bounded("unenroll_member", async {
            match &self.backend {
                Backend::Memory(store) => store.unenroll_member(class_id, member_id),
                Backend::Firestore(client) => {
                    let result = self
                        .mutate_class(client, class_id, |class| {
                            let promoted = class.unenroll(member_id, chrono::Utc::now());
                            (promoted, true)
                        })
                        .await?;
                    result.ok_or_else(|| AppError::NotFound("Class not found".to_string()))
                }
            }
        })
        .await
    }

    // ─── Helper Methods ────────────────────────────────────────────

    /// Read-modify-write a class document and commit the write in a
    /// transaction.
    ///
    /// `apply` returns the result plus whether the document must be written.
    /// Returns `None` if the class does not exist.
    async fn mutate_class<T>(
        &self,
        client: &firestore::FirestoreDb,
        class_id: &str,
        apply: impl FnOnce(&mut Class) -> (T, bool),
    ) -> Result<Option<T>, AppError> {
        let _guard = lock_key(&self.class_locks, class_id).await;

        let mut transaction = begin_transaction(client).await?;

        let class: Option<Class> = client
            .fluent()
            .select()
            .by_id_in(collections::CLASSES)
            .obj()
            .one(class_id)
            .await
            .map_err(|e| {
                AppError::Database(format!("Failed to read class in transaction: {}", e))
            })?;

        let Some(mut class) = class else {
            let _ = transaction.rollback().await;
            return Ok(None);
        };

        let (result, write) = apply(&mut class);
        if !write {
            let _ = transaction.rollback().await;
            return Ok(Some(result));
        }

        client
            .fluent()
            .update()
            .in_col(collections::CLASSES)
            .document_id(class_id)
            .object(&class)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add class to transaction: {}", e))
            })?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        tracing::debug!(class_id, "Class roster updated");

        Ok(Some(result))
    }

    /// Current owner of an email claim, if any.
    async fn email_owner(
        &self,
        client: &firestore::FirestoreDb,
        email: &str,
    ) -> Result<Option<Uuid>, AppError> {
        let claim: Option<EmailClaim> = client
            .fluent()
            .select()
            .by_id_in(collections::USER_EMAILS)
            .obj()
            .one(&email_claim_key(email))
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(claim.map(|c| c.user_id))
    }

    /// Commit a transaction that claims `email` for `user_id`.
    ///
    /// A commit that lost the race for the claim is reported as `Conflict`.
    async fn commit_claim(
        &self,
        client: &firestore::FirestoreDb,
        transaction: FirestoreTransaction<'_>,
        email: &str,
        user_id: Uuid,
    ) -> Result<(), AppError> {
        if let Err(e) = transaction.commit().await {
            return match self.email_owner(client, email).await? {
                Some(owner) if owner != user_id => Err(AppError::email_taken()),
                _ => Err(AppError::Database(format!("Transaction commit failed: {}", e))),
            };
        }
        Ok(())
    }

    async fn insert_token_doc(&self, collection: &str, token: &StoredToken) -> Result<(), AppError> {
        let Backend::Firestore(client) = &self.backend else {
            return Err(AppError::Database("Firestore backend required".to_string()));
        };
        let _: () = client
            .fluent()
            .update()
            .in_col(collection)
            .document_id(&token.token_hash)
            .object(token)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn get_token_doc(
        &self,
        collection: &str,
        token_hash: &str,
    ) -> Result<Option<StoredToken>, AppError> {
        let Backend::Firestore(client) = &self.backend else {
            return Err(AppError::Database("Firestore backend required".to_string()));
        };
        client
            .fluent()
            .select()
            .by_id_in(collection)
            .obj()
            .one(token_hash)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn delete_doc(&self, collection: &str, doc_id: &str) -> Result<(), AppError> {
        let Backend::Firestore(client) = &self.backend else {
            return Err(AppError::Database("Firestore backend required".to_string()));
        };
        client
            .fluent()
            .delete()
            .from(collection)
            .document_id(doc_id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}

async fn begin_transaction(
    client: &firestore::FirestoreDb,
) -> Result<FirestoreTransaction<'_>, AppError> {
    client
        .begin_transaction()
        .await
        .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))
}

/// Add a create-only write of the claim for `email` to `transaction`.
fn claim_email(
    client: &firestore::FirestoreDb,
    transaction: &mut FirestoreTransaction<'_>,
    email: &str,
    user_id: Uuid,
) -> Result<(), AppError> {
    client
        .fluent()
        .update()
        .in_col(collections::USER_EMAILS)
        .precondition(FirestoreWritePrecondition::Exists(false))
        .document_id(email_claim_key(email))
        .object(&EmailClaim { user_id })
        .add_to_transaction(transaction)
        .map_err(|e| AppError::Database(format!("Failed to add email claim to transaction: {}", e)))?;
    Ok(())
}
