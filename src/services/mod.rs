// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod local_auth;
pub mod oauth;
pub mod password;
pub mod policy;
pub mod tokens;

pub use local_auth::{AuthService, Credentials};
pub use oauth::{OAuthProvider, OAuthService};
pub use tokens::TokenIssuer;
