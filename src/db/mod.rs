// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer (Firestore, with an in-process backend for tests).

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryStore;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    /// Email ownership claims, keyed by digest of the normalized email
    pub const USER_EMAILS: &str = "user_emails";
    /// Access sessions, keyed by token digest
    pub const SESSIONS: &str = "sessions";
    /// Refresh tokens, keyed by token digest
    pub const REFRESH_TOKENS: &str = "refresh_tokens";
    pub const CLASSES: &str = "classes";
}
