// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod class;
pub mod session;
pub mod user;

pub use class::{Class, EnrollOutcome, EnrollmentError};
pub use session::{token_digest, StoredToken};
pub use user::{split_name, AuthProvider, EmailClaim, Role, User, UserResponse, UserUpdate};
