use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::CurrentUser;
use crate::ai::{BreakdownError, DecompositionRequest, TaskBreakdown};
use crate::db::{Database, ValidationError};
use crate::models::*;

// ============================================================
// Error Handling
// ============================================================

/// Log an internal error and return a sanitized response to the client.
///
/// Validation failures from the store are safe to expose and come back as
/// BAD_REQUEST; anything else is logged and replaced by a generic message.
fn internal_error(e: anyhow::Error) -> (StatusCode, String) {
    if let Some(validation) = e.downcast_ref::<ValidationError>() {
        tracing::warn!("Validation error: {}", validation);
        return (StatusCode::BAD_REQUEST, validation.to_string());
    }

    tracing::error!("Internal error: {:#}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

fn breakdown_error(e: BreakdownError) -> (StatusCode, String) {
    match e {
        BreakdownError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
        BreakdownError::NotFound => (StatusCode::NOT_FOUND, "Task not found".to_string()),
        BreakdownError::Auth { status } => {
            tracing::error!("Completion service rejected credentials (HTTP {})", status);
            (
                StatusCode::UNAUTHORIZED,
                "Authentication with the completion service failed".to_string(),
            )
        }
        BreakdownError::Configuration(msg) => {
            tracing::error!("Completion service not configured: {}", msg);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Task breakdown is not configured".to_string(),
            )
        }
        BreakdownError::Unavailable(msg) => {
            tracing::warn!("Completion service unavailable: {}", msg);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Completion service unavailable, try again later".to_string(),
            )
        }
        BreakdownError::Persistence(e) => internal_error(e),
    }
}

fn task_not_found() -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, "Task not found".to_string())
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Tasks
// ============================================================

pub async fn list_tasks(
    State(db): State<Database>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<Vec<Task>>, (StatusCode, String)> {
    db.get_tasks_by_user(&user_id)
        .map(Json)
        .map_err(internal_error)
}

pub async fn get_task(
    State(db): State<Database>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Task>, (StatusCode, String)> {
    db.get_task(id, &user_id)
        .map_err(internal_error)?
        .map(Json)
        .ok_or_else(task_not_found)
}

pub async fn create_task(
    State(db): State<Database>,
    CurrentUser(user_id): CurrentUser,
    Json(input): Json<CreateTaskInput>,
) -> Result<(StatusCode, Json<Task>), (StatusCode, String)> {
    db.create_task(&user_id, input)
        .map(|t| (StatusCode::CREATED, Json(t)))
        .map_err(internal_error)
}

pub async fn update_task(
    State(db): State<Database>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateTaskInput>,
) -> Result<Json<Task>, (StatusCode, String)> {
    db.update_task(id, &user_id, input)
        .map_err(internal_error)?
        .map(Json)
        .ok_or_else(task_not_found)
}

pub async fn delete_task(
    State(db): State<Database>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    if db.delete_task(id, &user_id).map_err(internal_error)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(task_not_found())
    }
}

pub async fn list_subtasks(
    State(db): State<Database>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Task>>, (StatusCode, String)> {
    db.get_task(id, &user_id)
        .map_err(internal_error)?
        .ok_or_else(task_not_found)?;

    db.get_subtasks(id, &user_id)
        .map(Json)
        .map_err(internal_error)
}

// ============================================================
// Breakdown
// ============================================================

/// Optional body for a breakdown request.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct BreakdownTaskInput {
    /// Priority for every generated subtask, instead of the inferred ones.
    #[serde(default)]
    pub priority: Option<Priority>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BreakdownResponse {
    pub message: String,
    pub original_task: Task,
    pub subtasks: Vec<Task>,
}

/// Break a task down into subtasks with the completion service.
///
/// The body may be empty. An answer with no usable subtasks is still a 200
/// with an empty `subtasks` list.
pub async fn breakdown_task(
    State(breakdown): State<TaskBreakdown>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<BreakdownResponse>, (StatusCode, String)> {
    let input: BreakdownTaskInput = if body.iter().all(u8::is_ascii_whitespace) {
        BreakdownTaskInput::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| {
            (
                StatusCode::BAD_REQUEST,
                format!("Invalid request body: {}", e),
            )
        })?
    };

    let result = breakdown
        .decompose(DecompositionRequest {
            task_id: id,
            user_id,
            priority_override: input.priority,
        })
        .await
        .map_err(breakdown_error)?;

    let message = if result.subtasks.is_empty() {
        "No subtasks were generated for this task"
    } else {
        "Task has been broken down successfully"
    };

    Ok(Json(BreakdownResponse {
        message: message.to_string(),
        original_task: result.original_task,
        subtasks: result.subtasks,
    }))
}
