// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use crate::auth::CurrentUser;
use crate::clock;
use crate::database::{self, CompletionChange, NewTask};
use crate::state::AppState;
use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use common::{
    parse_time_of_day, CreateTaskPayload, Profile, Task, TaskAnalytics, TaskCompletionResponse,
    UpdateProfilePayload, UpdateTaskPayload,
};
use serde::Deserialize;
use tracing::{debug, error, info};

#[derive(Deserialize, Debug, Default)]
pub struct ListTasksQuery {
    pub due: Option<NaiveDate>,
}

/// Handler for listing the caller's tasks, optionally narrowed to a
/// single due date (`?due=2024-01-15`).
pub async fn list_tasks(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ListTasksQuery>,
) -> Result<Json<Vec<Task>>, AppError> {
    let tasks = match query.due {
        Some(date) => database::get_tasks_for_date(&state.pool, user.profile.id, date).await?,
        None => database::get_tasks_for_profile(&state.pool, user.profile.id).await?,
    };
    info!("Successfully retrieved {} tasks.", tasks.len());
    Ok(Json(tasks))
}

/// Handler for creating a new task.
pub async fn create_task(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<CreateTaskPayload>, // Extracting the request body as JSON
) -> Result<(StatusCode, Json<Task>), AppError> {
    debug!("Received request to create task: {}", payload.name);

    if payload.name.trim().is_empty() {
        error!("Validation failed: Task name is empty.");
        return Err(AppError::new(
            StatusCode::BAD_REQUEST,
            "Task name cannot be empty.",
        ));
    }

    let new_task = validate_task_payload(payload, &user.profile.timezone)?;
    let task = database::create_task_in_db(&state.pool, user.profile.id, new_task).await?;

    info!("Task created successfully with ID: {}", task.id);

    // Return a 201 Created status with the new task as JSON.
    Ok((StatusCode::CREATED, Json(task)))
}

/// Turns the API payload into a validated `NewTask`. Scheduled times are
/// wall-clock in the owner's timezone and only make sense against a due
/// date, so times without one are rejected rather than guessed at.
fn validate_task_payload(payload: CreateTaskPayload, timezone: &str) -> Result<NewTask, AppError> {
    let has_times = payload.start_time.is_some() || payload.end_time.is_some();

    let Some(due_date) = payload.due_date else {
        if has_times {
            error!("Validation failed: Scheduled times without a due date.");
            return Err(AppError::new(
                StatusCode::BAD_REQUEST,
                "Start and end times require a due date.",
            ));
        }
        return Ok(NewTask {
            name: payload.name,
            due_date: None,
            start_time: None,
            end_time: None,
            priority: payload.priority.unwrap_or_default(),
        });
    };

    let tz = clock::timezone_or_utc(timezone);
    let start_time = resolve_time(payload.start_time.as_deref(), due_date, tz, "start_time")?;
    let end_time = resolve_time(payload.end_time.as_deref(), due_date, tz, "end_time")?;

    if let (Some(start), Some(end)) = (start_time, end_time) {
        if end < start {
            return Err(AppError::new(
                StatusCode::BAD_REQUEST,
                "End time cannot be before start time.",
            ));
        }
    }

    Ok(NewTask {
        name: payload.name,
        due_date: Some(due_date),
        start_time,
        end_time,
        priority: payload.priority.unwrap_or_default(),
    })
}

fn resolve_time(
    value: Option<&str>,
    due_date: NaiveDate,
    tz: Tz,
    field: &str,
) -> Result<Option<DateTime<Utc>>, AppError> {
    let Some(raw) = value else {
        return Ok(None);
    };

    let time = parse_time_of_day(raw).ok_or_else(|| {
        AppError::new(
            StatusCode::BAD_REQUEST,
            &format!("{field} must be a time of day like 14:30."),
        )
    })?;

    let instant = clock::local_to_utc(due_date, time, tz).ok_or_else(|| {
        AppError::new(
            StatusCode::BAD_REQUEST,
            &format!("{field} does not exist on that date in your timezone."),
        )
    })?;

    Ok(Some(instant))
}

/// Handler for updating a task's completion state.
///
/// The response carries the streak value that resulted from this exact
/// request, so clients can render it without a second read. Only a real
/// false-to-true transition counts as a completion event; repeating a
/// state the task is already in leaves the streak alone.
pub async fn update_task(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(task_id): Path<i64>, // Extract task ID from the URL path
    Json(payload): Json<UpdateTaskPayload>,
) -> Result<Json<TaskCompletionResponse>, AppError> {
    let change =
        database::set_task_completed(&state.pool, user.profile.id, task_id, payload.completed)
            .await?;

    match change {
        CompletionChange::NotFound => Err(AppError::new(
            StatusCode::NOT_FOUND,
            &format!("Task with ID {task_id} not found."),
        )),
        CompletionChange::Unchanged(task) => Ok(Json(TaskCompletionResponse {
            task,
            current_streak: user.profile.current_streak,
        })),
        CompletionChange::Changed(task) => {
            let current_streak = if payload.completed {
                let tz = clock::timezone_or_utc(&user.profile.timezone);
                let today = clock::calendar_date(Utc::now(), tz);
                database::record_completion(&state.pool, user.profile.id, today).await?
            } else {
                // Un-completing never takes a streak away.
                user.profile.current_streak
            };

            Ok(Json(TaskCompletionResponse {
                task,
                current_streak,
            }))
        }
    }
}

/// Handler for deleting a task by ID.
#[allow(clippy::needless_return)]
pub async fn delete_task(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(task_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    debug!("Attempting to delete task with ID: {}", task_id);

    let deleted = database::delete_task_in_db(&state.pool, user.profile.id, task_id).await?;

    if deleted {
        info!("Task with ID {} deleted successfully.", task_id);
        Ok(StatusCode::NO_CONTENT) // 204 No Content for successful deletion
    } else {
        error!("Task with ID {} not found for deletion.", task_id);
        return Err(AppError::new(
            StatusCode::NOT_FOUND,
            &format!("Task with ID {task_id} not found for deletion."),
        ));
    }
}

/// Handler for the analytics overview of the caller's tasks.
pub async fn get_analytics(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<TaskAnalytics>, AppError> {
    let analytics =
        database::get_task_analytics(&state.pool, user.profile.id, user.profile.current_streak)
            .await?;
    Ok(Json(analytics))
}

/// Handler for partial profile edits (username, mobile, timezone,
/// notification toggle).
pub async fn update_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<UpdateProfilePayload>,
) -> Result<Json<Profile>, AppError> {
    if let Some(username) = &payload.username {
        if username.trim().is_empty() {
            return Err(AppError::new(
                StatusCode::BAD_REQUEST,
                "Username cannot be empty.",
            ));
        }
    }
    if let Some(timezone) = &payload.timezone {
        if timezone.parse::<Tz>().is_err() {
            return Err(AppError::new(
                StatusCode::BAD_REQUEST,
                "Timezone must be a valid IANA name like Europe/Paris.",
            ));
        }
    }

    let profile = database::update_profile(&state.pool, user.profile.id, payload)
        .await?
        .ok_or_else(|| AppError::new(StatusCode::NOT_FOUND, "Profile not found."))?;

    info!("Profile {} updated.", profile.id);
    Ok(Json(profile))
}

// --- Custom Error Handling ---
// This is a good practice for transforming our internal errors
// (e.g., from the database) into appropriate HTTP responses.

/// Our custom error type for the application.
#[derive(Debug)]
pub struct AppError {
    pub(crate) code: StatusCode,
    pub(crate) message: String,
}

impl AppError {
    pub(crate) fn new(code: StatusCode, message: &str) -> Self {
        Self {
            code,
            message: message.to_string(),
        }
    }
}

/// Allows converting an `anyhow::Error` (coming from `database.rs`)
/// into our `AppError`.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        // Log the internal error for debugging.
        tracing::error!("Internal server error: {:?}", err);
        Self {
            code: StatusCode::INTERNAL_SERVER_ERROR,
            message: "An internal error occurred.".to_string(),
        }
    }
}

/// Allows Axum to convert our `AppError` into an HTTP `Response`.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!(
            "Responding with error: status_code={}, message={}",
            self.code.as_u16(),
            self.message
        );
        (
            self.code,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}
