// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Clubhouse: staff authentication and class enrollment for a club
//! management backend.
//!
//! This crate provides local and OAuth sign-in, session and refresh token
//! lifecycles, role-based user management, and capacity-bounded class
//! enrollment with a FIFO waitlist.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use db::FirestoreDb;
use middleware::auth::{verifier_for, TokenVerifier};
use services::{AuthService, OAuthService};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub auth: AuthService,
    pub oauth: OAuthService,
    /// Credential strategy for the configured auth mode
    pub verifier: Arc<dyn TokenVerifier>,
}

impl AppState {
    pub fn new(config: Config, db: FirestoreDb) -> Self {
        Self {
            auth: AuthService::new(&config, db.clone()),
            oauth: OAuthService::new(&config, db.clone()),
            verifier: verifier_for(&config, db.clone()),
            config,
            db,
        }
    }
}
