// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use crate::clock;
use crate::database::{self, ReminderKind};
use crate::handlers::AppError;
use crate::mailer::{self, Mailer};
use crate::state::AppState;
use crate::streak::{self, StreakState};

use axum::extract::{Json, State};
use axum::http::{HeaderMap, StatusCode};
use chrono::{Duration, Utc};
use common::Profile;
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{error, info};

/// Header the scheduler presents on every job call.
pub const SCHEDULER_TOKEN_HEADER: &str = "x-scheduler-token";

/// The reminder sweep looks back over the scheduler's own cadence, so a
/// boundary that passed between two runs is caught by the next one.
const REMINDER_WINDOW_SECS: i64 = 60;

/// Per-recipient outcome of a sweep, reported back to the scheduler.
#[derive(Serialize, Debug)]
pub struct SweepOutcome {
    pub success: bool,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct SweepReport {
    pub message: String,
    pub results: Vec<SweepOutcome>,
}

/// The job endpoints are reserved for the scheduler: the caller must
/// present the configured shared secret. No configured secret means the
/// endpoints cannot run at all, which is a server problem, not a caller
/// problem.
fn authorize_scheduler(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    let Some(expected) = state.config.scheduler_token.as_deref() else {
        return Err(AppError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "SCHEDULER_TOKEN is not configured.",
        ));
    };

    let presented = headers
        .get(SCHEDULER_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok());

    match presented {
        Some(token) if token == expected => Ok(()),
        _ => Err(AppError::new(
            StatusCode::UNAUTHORIZED,
            "Unauthorized: this endpoint is reserved for the scheduler.",
        )),
    }
}

fn require_mailer(state: &AppState) -> Result<Arc<dyn Mailer>, AppError> {
    state.mailer.clone().ok_or_else(|| {
        AppError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Email delivery is not configured.",
        )
    })
}

/// Handler for the scheduled streak sweep.
///
/// Re-derives the break decision for every candidate profile from
/// durable state, using each profile's own timezone for "today". Broken
/// streaks are zeroed, their stored date cleared, and the owner emailed.
/// One profile's failure never aborts the sweep for the others.
pub async fn check_streaks(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SweepReport>, AppError> {
    authorize_scheduler(&state, &headers)?;
    let mailer = require_mailer(&state)?;

    let profiles = database::profiles_with_active_streaks(&state.pool).await?;
    let now = Utc::now();

    let mut results = Vec::new();
    for profile in profiles {
        let tz = clock::timezone_or_utc(&profile.timezone);
        let today = clock::calendar_date(now, tz);
        let streak_state = StreakState {
            current_streak: profile.current_streak,
            last_streak_updated: profile.last_streak_updated,
        };

        if !streak::is_broken(streak_state, today) {
            continue;
        }

        match reset_and_notify(&state.pool, mailer.as_ref(), &profile).await {
            Ok(()) => results.push(SweepOutcome {
                success: true,
                email: profile.email,
                error: None,
            }),
            Err(err) => {
                error!("Streak sweep failed for {}: {:#}", profile.email, err);
                results.push(SweepOutcome {
                    success: false,
                    email: profile.email,
                    error: Some(format!("{err:#}")),
                });
            }
        }
    }

    let sent = results.iter().filter(|r| r.success).count();
    let failed = results.len() - sent;
    info!("Streak sweep finished: {} sent, {} failed.", sent, failed);

    Ok(Json(SweepReport {
        message: format!("Streak check completed. Sent: {sent}. Failed: {failed}."),
        results,
    }))
}

async fn reset_and_notify(
    pool: &SqlitePool,
    mailer: &dyn Mailer,
    profile: &Profile,
) -> anyhow::Result<()> {
    // The email quotes the streak the user lost, so capture it before
    // the reset.
    let lost_streak = profile.current_streak;
    database::reset_streak_for_sweep(pool, profile.id).await?;

    let email = mailer::streak_reset_email(&profile.username, &profile.email, lost_streak);
    let receipt = mailer.send(&email).await?;
    info!("Streak reset email sent to {} ({}).", profile.email, receipt);
    Ok(())
}

/// Handler for the scheduled task reminder sweep: one email per start or
/// end boundary that passed within the last minute.
pub async fn send_task_reminders(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SweepReport>, AppError> {
    authorize_scheduler(&state, &headers)?;
    let mailer = require_mailer(&state)?;

    let now = Utc::now();
    let window_start = now - Duration::seconds(REMINDER_WINDOW_SECS);
    let reminders = database::due_reminders(&state.pool, window_start, now).await?;

    if reminders.is_empty() {
        return Ok(Json(SweepReport {
            message: "No tasks to notify.".to_string(),
            results: Vec::new(),
        }));
    }

    let mut results = Vec::new();
    for reminder in reminders {
        let email = match reminder.kind {
            ReminderKind::Start => {
                mailer::task_starting_email(&reminder.task_name, &reminder.username, &reminder.email)
            }
            ReminderKind::End => {
                mailer::task_ending_email(&reminder.task_name, &reminder.username, &reminder.email)
            }
        };

        match mailer.send(&email).await {
            Ok(receipt) => {
                info!("Reminder email sent to {} ({}).", reminder.email, receipt);
                results.push(SweepOutcome {
                    success: true,
                    email: reminder.email,
                    error: None,
                });
            }
            Err(err) => {
                error!("Reminder email to {} failed: {}", reminder.email, err);
                results.push(SweepOutcome {
                    success: false,
                    email: reminder.email,
                    error: Some(err.to_string()),
                });
            }
        }
    }

    let sent = results.iter().filter(|r| r.success).count();
    let failed = results.len() - sent;

    Ok(Json(SweepReport {
        message: format!("Task reminder check complete. Sent: {sent}. Failed: {failed}."),
        results,
    }))
}
