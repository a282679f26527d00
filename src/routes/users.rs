// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Staff account management.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{split_name, AuthProvider, Role, User, UserResponse, UserUpdate};
use crate::services::local_auth::normalize_email;
use crate::services::password::{hash_password_async, MIN_PASSWORD_LEN};
use crate::services::policy;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/users", get(list_users).post(create_user))
        .route(
            "/api/users/{id}",
            get(get_user).put(update_user).delete(delete_user),
        )
}

#[derive(Debug, Deserialize)]
pub struct ListUsersParams {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    club_id: Option<String>,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(
        length(min = 1, message = "is required"),
        contains(pattern = "@", message = "must be a valid email address")
    )]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    /// Legacy single-field name, used when first/last are absent
    #[serde(default)]
    pub name: Option<String>,
    #[validate(length(min = 8, message = "must be at least 8 characters"))]
    pub password: String,
    #[validate(length(min = 1, message = "is required"))]
    pub role: String,
    #[serde(default)]
    pub assigned_club_ids: Vec<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Option<String>,
    pub assigned_club_ids: Option<Vec<String>>,
    pub active: Option<bool>,
    pub password: Option<String>,
}

fn parse_role(raw: &str) -> Result<Role> {
    raw.parse()
        .map_err(|e: crate::models::user::InvalidRole| AppError::Validation(e.to_string()))
}

fn parse_user_id(raw: &str) -> Result<Uuid> {
    raw.parse()
        .map_err(|_| AppError::NotFound("User not found".to_string()))
}

async fn list_users(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListUsersParams>,
) -> Result<Json<Vec<UserResponse>>> {
    let role = params.role.as_deref().map(parse_role).transpose()?;
    let users = state
        .db
        .list_users(role, params.club_id.as_deref())
        .await?;
    Ok(Json(users.iter().map(UserResponse::from).collect()))
}

async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>> {
    let user = state
        .db
        .get_user(parse_user_id(&id)?)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    Ok(Json(UserResponse::from(user)))
}

async fn create_user(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    request.validate()?;

    let (first_name, last_name) = match &request.name {
        Some(full) if request.first_name.is_empty() && request.last_name.is_empty() => {
            split_name(full)
        }
        _ => (request.first_name.clone(), request.last_name.clone()),
    };
    if first_name.trim().is_empty() || last_name.trim().is_empty() {
        return Err(AppError::Validation(
            "first_name and last_name are required".to_string(),
        ));
    }

    let role = parse_role(&request.role)?;
    policy::authorize_create(&auth.user, role)?;

    let email = normalize_email(&request.email);
    let now = chrono::Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        email,
        first_name,
        last_name,
        name: None,
        picture: None,
        password_hash: hash_password_async(request.password).await?,
        role,
        assigned_club_ids: request.assigned_club_ids,
        active: request.active,
        provider: AuthProvider::Local,
        provider_id: None,
        created_at: now,
        updated_at: now,
    };
    state.db.create_user(&user).await?;

    tracing::info!(
        actor = %auth.user.id,
        user_id = %user.id,
        role = %user.role,
        "User created"
    );

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

async fn update_user(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>> {
    let user = state
        .db
        .get_user(parse_user_id(&id)?)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let new_role = request.role.as_deref().map(parse_role).transpose()?;
    policy::authorize_update(&auth.user, &user, new_role)?;

    let password_hash = match request.password {
        Some(password) if password.chars().count() < MIN_PASSWORD_LEN => {
            return Err(AppError::Validation(
                "password must be at least 8 characters".to_string(),
            ));
        }
        Some(password) => Some(hash_password_async(password).await?),
        None => None,
    };
    let update = UserUpdate {
        first_name: request.first_name,
        last_name: request.last_name,
        password_hash,
        role: new_role,
        assigned_club_ids: request.assigned_club_ids,
        active: request.active,
        ..Default::default()
    };

    let user = state
        .db
        .update_user(user.id, &update)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    tracing::info!(actor = %auth.user.id, user_id = %user.id, "User updated");

    Ok(Json(UserResponse::from(user)))
}

async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    policy::authorize_delete(&auth.user)?;

    if !state.db.delete_user(parse_user_id(&id)?).await? {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    tracing::info!(actor = %auth.user.id, user_id = %id, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}
