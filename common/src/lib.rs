// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Task priority, stored as lowercase TEXT and exposed as lowercase JSON
/// ("high" / "medium" / "low") so the database, the API and the clients
/// all speak the same three words.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Low
    }
}

#[allow(clippy::doc_overindented_list_items)]
/// Represents a task within the system.
///
/// Derivation attributes (derive):
/// - `Serialize`, `Deserialize`: Allows conversion to/from JSON.
/// - `Debug`: Enables displaying the structure for debugging (e.g., `println!("{:?}", task)`).
/// - `Clone`: Allows creating copies of the object.
/// - `sqlx::FromRow`: Allows `sqlx` to create a `Task` instance directly
///    from a database result row.
#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct Task {
    #[sqlx(rename = "id")]
    pub id: i64,

    #[sqlx(rename = "profile_id")]
    pub profile_id: i64,

    #[sqlx(rename = "name")]
    pub name: String,

    // We use NaiveDate because the day a task is due is a calendar
    // concept, independent of any timezone.
    #[sqlx(rename = "due_date")]
    pub due_date: Option<NaiveDate>,

    // Start/end are real instants (UTC). When set, the task also carries
    // the due_date they were scheduled against.
    #[sqlx(rename = "start_time")]
    pub start_time: Option<DateTime<Utc>>,

    #[sqlx(rename = "end_time")]
    pub end_time: Option<DateTime<Utc>>,

    #[sqlx(rename = "priority")]
    pub priority: Priority,

    #[sqlx(rename = "completed")]
    pub completed: bool,

    #[sqlx(rename = "created_at")]
    pub created_at: DateTime<Utc>,
}

/// A user profile, including the streak counters the server maintains.
///
/// The password hash travels with the row for the server's own use but is
/// never serialized into API responses.
#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct Profile {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub mobile: Option<String>,
    /// IANA timezone name (e.g. "Europe/Paris"). Calendar-date decisions
    /// for this user are made in this timezone.
    pub timezone: String,
    pub current_streak: i64,
    /// The calendar day (in the user's timezone) the streak last moved.
    pub last_streak_updated: Option<NaiveDate>,
    pub email_notifications_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Structure used to receive task creation data from the API.
/// It's a good practice to separate database models (`Task`)
/// from API models (`CreateTaskPayload`), as they may have different fields.
/// Times arrive as times-of-day ("HH:MM" or "HH:MM:SS") and are combined
/// with `due_date` in the owner's timezone on the server side.
#[derive(Deserialize, Debug)]
pub struct CreateTaskPayload {
    pub name: String,
    pub due_date: Option<NaiveDate>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub priority: Option<Priority>,
}

/// Payload for `PATCH /api/tasks/{id}`. Completion is the only mutable
/// task field; everything else is fixed at creation.
#[derive(Deserialize, Debug)]
pub struct UpdateTaskPayload {
    pub completed: bool,
}

#[derive(Deserialize, Debug)]
pub struct SignupPayload {
    pub username: String,
    pub email: String,
    pub password: String,
    pub mobile: Option<String>,
    pub timezone: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct SigninPayload {
    pub email: String,
    pub password: String,
}

/// Partial profile update; absent fields are left untouched.
#[derive(Deserialize, Debug, Default)]
pub struct UpdateProfilePayload {
    pub username: Option<String>,
    pub mobile: Option<String>,
    pub timezone: Option<String>,
    pub email_notifications_enabled: Option<bool>,
}

/// Response of a successful signin: the session token plus the profile
/// (with any session-start streak reset already applied).
#[derive(Serialize, Deserialize, Debug)]
pub struct SignInResponse {
    pub token: String,
    pub profile: Profile,
}

/// Response of a task completion update. Carries the streak value that
/// resulted from this exact request so the client never has to guess.
#[derive(Serialize, Deserialize, Debug)]
pub struct TaskCompletionResponse {
    pub task: Task,
    pub current_streak: i64,
}

/// Aggregated task counts for the analytics endpoint.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TaskAnalytics {
    pub total: i64,
    pub completed: i64,
    pub pending: i64,
    pub high_priority_pending: i64,
    /// completed / total, rounded to the nearest percent; 0 when there
    /// are no tasks at all.
    pub completion_rate_percent: i64,
    pub current_streak: i64,
}

/// Parses a time-of-day as sent by clients. Accepts "HH:MM:SS" and the
/// shorter "HH:MM" form that date-time pickers usually produce.
pub fn parse_time_of_day(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .ok()
}
