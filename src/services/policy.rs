// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Role-based rules for managing staff accounts.
//!
//! Club managers are scoped: they may not grant or touch the privileged
//! roles, and may only edit users that share one of their clubs. Every
//! other role is unrestricted for user management, except deletion which
//! is reserved for admins.

use crate::error::AppError;
use crate::models::{Role, User};

/// May `actor` create an account with `role`?
pub fn authorize_create(actor: &User, role: Role) -> Result<(), AppError> {
    if actor.role == Role::ClubManager && role.is_privileged() {
        return Err(AppError::Forbidden(
            "Club managers cannot create admin or club manager accounts".to_string(),
        ));
    }
    Ok(())
}

/// May `actor` update `target`, optionally assigning `new_role`?
pub fn authorize_update(actor: &User, target: &User, new_role: Option<Role>) -> Result<(), AppError> {
    if actor.role != Role::ClubManager {
        return Ok(());
    }

    if target.role.is_privileged() || new_role.is_some_and(|r| r.is_privileged()) {
        return Err(AppError::Forbidden(
            "Club managers cannot modify admin or club manager accounts".to_string(),
        ));
    }

    if !actor.shares_club_with(target) {
        return Err(AppError::Forbidden("No shared club with this user".to_string()));
    }

    Ok(())
}

pub fn authorize_delete(actor: &User) -> Result<(), AppError> {
    if actor.role != Role::Admin {
        return Err(AppError::Forbidden("Only admins can delete users".to_string()));
    }
    Ok(())
}
