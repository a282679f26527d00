// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Class scheduling and enrollment routes.

use crate::error::{AppError, Result};
use crate::models::{Class, EnrollOutcome};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/classes", get(list_classes).post(create_class))
        .route("/api/classes/{id}", get(get_class))
        .route("/api/classes/{id}/enroll", post(enroll))
        .route("/api/classes/{id}/unenroll/{member_id}", delete(unenroll))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateClassRequest {
    #[validate(length(min = 1, message = "is required"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[validate(length(min = 1, message = "is required"))]
    pub instructor: String,
    pub starts_at: DateTime<Utc>,
    #[validate(range(min = 1, message = "must be at least 1"))]
    pub duration_minutes: u32,
    #[validate(range(min = 1, message = "must be at least 1"))]
    pub capacity: u32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct EnrollRequest {
    #[validate(length(min = 1, message = "is required"))]
    pub member_id: String,
}

#[derive(Serialize)]
pub struct EnrollResponse {
    pub message: String,
    /// "enrolled" or "waitlisted"
    pub status: &'static str,
}

async fn create_class(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateClassRequest>,
) -> Result<(StatusCode, Json<Class>)> {
    request.validate()?;

    let now = Utc::now();
    let class = Class {
        id: uuid::Uuid::new_v4().to_string(),
        name: request.name,
        description: request.description,
        instructor: request.instructor,
        starts_at: request.starts_at,
        duration_minutes: request.duration_minutes,
        capacity: request.capacity,
        enrolled_members: vec![],
        wait_list: vec![],
        created_at: now,
        updated_at: now,
    };
    state.db.insert_class(&class).await?;

    tracing::info!(class_id = %class.id, capacity = class.capacity, "Class created");
    Ok((StatusCode::CREATED, Json(class)))
}

async fn list_classes(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Class>>> {
    Ok(Json(state.db.list_classes().await?))
}

async fn get_class(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Class>> {
    state
        .db
        .get_class(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Class not found".to_string()))
}

/// Enroll a member; a full class puts them on the waitlist instead.
async fn enroll(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<EnrollRequest>,
) -> Result<Json<EnrollResponse>> {
    request.validate()?;

    let outcome = state.db.enroll_member(&id, &request.member_id).await?;
    let status = match outcome {
        EnrollOutcome::Enrolled => "enrolled",
        EnrollOutcome::Waitlisted => "waitlisted",
    };

    tracing::info!(class_id = %id, member_id = %request.member_id, status, "Enrollment");

    Ok(Json(EnrollResponse {
        message: outcome.message().to_string(),
        status,
    }))
}

/// Remove a member; the head of the waitlist takes the freed seat.
async fn unenroll(
    State(state): State<Arc<AppState>>,
    Path((id, member_id)): Path<(String, String)>,
) -> Result<StatusCode> {
    let promoted = state.db.unenroll_member(&id, &member_id).await?;

    match promoted {
        Some(promoted) => tracing::info!(
            class_id = %id,
            member_id = %member_id,
            promoted = %promoted,
            "Unenrolled, promoted from waitlist"
        ),
        None => tracing::info!(class_id = %id, member_id = %member_id, "Unenrolled"),
    }

    Ok(StatusCode::NO_CONTENT)
}
