// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use crate::state::AppState;
use crate::{auth, handlers, jobs};
use axum::{
    routing::{delete, get, patch, post},
    Router,
};

/// Creates and configures the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Account lifecycle and session management
        .route("/api/auth/signup", post(auth::signup))
        .route("/api/auth/signin", post(auth::signin))
        .route("/api/auth/signout", post(auth::signout))
        .route("/api/auth/me", get(auth::me))
        // Profile edits for the signed-in user
        .route("/api/profile", patch(handlers::update_profile))
        // Task CRUD, scoped to the signed-in user
        .route("/api/tasks", get(handlers::list_tasks))
        .route("/api/tasks", post(handlers::create_task))
        .route("/api/tasks/{id}", patch(handlers::update_task))
        .route("/api/tasks/{id}", delete(handlers::delete_task))
        // Aggregated counts for the dashboard
        .route("/api/analytics", get(handlers::get_analytics))
        // Scheduler-only maintenance endpoints, gated by a shared token
        .route("/api/jobs/check-streaks", post(jobs::check_streaks))
        .route(
            "/api/jobs/send-task-reminders",
            post(jobs::send_task_reminders),
        )
        // Adds the shared application state (pool, mailer, config)
        .with_state(state)
}
