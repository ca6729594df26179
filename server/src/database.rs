// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use crate::streak::{self, StreakState};

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use common::{Priority, Profile, Task, UpdateProfilePayload};
use sqlx::{migrate::MigrateDatabase, Sqlite, SqlitePool}; // Added MigrateDatabase for database_exists/create_database
use tracing::{debug, info};
use uuid::Uuid;

/// Establishes the database connection pool.
/// If the database does not exist, it creates it.
/// It also ensures all tables have the correct schema.
pub async fn establish_connection_pool(database_url: &str) -> Result<SqlitePool> {
    if !Sqlite::database_exists(database_url).await.unwrap_or(false) {
        info!("Creating database {}", database_url);
        Sqlite::create_database(database_url)
            .await
            .context("Failed to create database")?;
    } else {
        info!("Database already exists.");
    }

    let pool = SqlitePool::connect(database_url)
        .await
        .context("Failed to connect to database")?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Creates the tables if they are missing. Tests run this against their
/// in-memory pools so there is exactly one copy of the schema.
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS profiles (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            mobile TEXT NULL,
            timezone TEXT NOT NULL DEFAULT 'UTC',
            current_streak INTEGER NOT NULL DEFAULT 0,
            last_streak_updated DATE NULL,
            email_notifications_enabled BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create 'profiles' table")?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            token TEXT PRIMARY KEY,
            profile_id INTEGER NOT NULL REFERENCES profiles(id),
            created_at TIMESTAMP NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create 'sessions' table")?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tasks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            profile_id INTEGER NOT NULL REFERENCES profiles(id),
            name TEXT NOT NULL,
            due_date DATE NULL,
            start_time TIMESTAMP NULL,
            end_time TIMESTAMP NULL,
            priority TEXT NOT NULL DEFAULT 'low',
            completed BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMP NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create 'tasks' table")?;

    info!("Database schema is ready.");

    Ok(())
}

/// Validated task data, ready for insertion. Handlers build this after
/// checking the payload, so a `NewTask` with times always has the
/// due_date they were scheduled against.
#[derive(Debug)]
pub struct NewTask {
    pub name: String,
    pub due_date: Option<NaiveDate>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub priority: Priority,
}

/// Profile data for signup, with the password already hashed.
#[derive(Debug)]
pub struct NewProfile {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub mobile: Option<String>,
    pub timezone: String,
}

#[derive(Debug, thiserror::Error)]
pub enum CreateProfileError {
    #[error("a profile with this email already exists")]
    EmailTaken,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Result of a completion update. Only `Changed` counts as a completion
/// event for the streak; re-sending the state a task is already in must
/// not move the streak again.
#[derive(Debug)]
pub enum CompletionChange {
    Changed(Task),
    Unchanged(Task),
    NotFound,
}

/// Retrieves every task owned by a profile, newest first.
pub async fn get_tasks_for_profile(pool: &SqlitePool, profile_id: i64) -> Result<Vec<Task>> {
    let tasks = sqlx::query_as::<_, Task>(
        "SELECT * FROM tasks WHERE profile_id = ? ORDER BY created_at DESC, id DESC;",
    )
    .bind(profile_id)
    .fetch_all(pool)
    .await
    .context("Failed to retrieve tasks from DB")?;

    Ok(tasks)
}

/// Retrieves a profile's tasks due on one calendar date, newest first.
pub async fn get_tasks_for_date(
    pool: &SqlitePool,
    profile_id: i64,
    date: NaiveDate,
) -> Result<Vec<Task>> {
    let tasks = sqlx::query_as::<_, Task>(
        "SELECT * FROM tasks WHERE profile_id = ? AND due_date = ? ORDER BY created_at DESC, id DESC;",
    )
    .bind(profile_id)
    .bind(date)
    .fetch_all(pool)
    .await
    .context("Failed to retrieve tasks for date from DB")?;

    Ok(tasks)
}

/// Inserts a new task into the database.
pub async fn create_task_in_db(
    pool: &SqlitePool,
    profile_id: i64,
    new_task: NewTask,
) -> Result<Task> {
    let created_at = Utc::now();

    debug!(
        "Insert values: profile_id={}, name={}, due_date={:?}, start_time={:?}, end_time={:?}, priority={:?}",
        profile_id, new_task.name, new_task.due_date, new_task.start_time, new_task.end_time, new_task.priority
    );

    let id = sqlx::query(
        "INSERT INTO tasks (profile_id, name, due_date, start_time, end_time, priority, completed, created_at) VALUES (?, ?, ?, ?, ?, ?, FALSE, ?)"
    )
    .bind(profile_id)
    .bind(&new_task.name)
    .bind(new_task.due_date)
    .bind(new_task.start_time)
    .bind(new_task.end_time)
    .bind(new_task.priority)
    .bind(created_at)
    .execute(pool)
    .await
    .context("Failed to insert task into DB")?
    .last_insert_rowid();

    let task = Task {
        id,
        profile_id,
        name: new_task.name,
        due_date: new_task.due_date,
        start_time: new_task.start_time,
        end_time: new_task.end_time,
        priority: new_task.priority,
        completed: false,
        created_at,
    };

    Ok(task)
}

/// Sets a task's completed flag, owner-scoped.
///
/// The UPDATE only matches when the flag actually flips, which is what
/// makes completion events edge-triggered: two clients marking the same
/// task done produce one `Changed` and one `Unchanged`.
pub async fn set_task_completed(
    pool: &SqlitePool,
    profile_id: i64,
    task_id: i64,
    completed: bool,
) -> Result<CompletionChange> {
    let result = sqlx::query(
        "UPDATE tasks SET completed = ?1 WHERE id = ?2 AND profile_id = ?3 AND completed <> ?1",
    )
    .bind(completed)
    .bind(task_id)
    .bind(profile_id)
    .execute(pool)
    .await
    .context(format!("Failed to update completion of task {task_id}"))?;

    let task = sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = ? AND profile_id = ?")
        .bind(task_id)
        .bind(profile_id)
        .fetch_optional(pool)
        .await
        .context(format!("Failed to re-read task {task_id}"))?;

    match task {
        None => Ok(CompletionChange::NotFound),
        Some(task) if result.rows_affected() > 0 => {
            info!("Task {} is now completed={}.", task_id, completed);
            Ok(CompletionChange::Changed(task))
        }
        Some(task) => {
            debug!("Task {} was already completed={}.", task_id, completed);
            Ok(CompletionChange::Unchanged(task))
        }
    }
}

/// Deletes a task owned by `profile_id`.
/// Returns true if a task was removed, false if no such task exists for
/// this owner.
pub async fn delete_task_in_db(pool: &SqlitePool, profile_id: i64, task_id: i64) -> Result<bool> {
    debug!("Attempting to delete task with ID: {}", task_id);
    let result = sqlx::query("DELETE FROM tasks WHERE id = ? AND profile_id = ?")
        .bind(task_id)
        .bind(profile_id)
        .execute(pool)
        .await
        .context(format!("Failed to delete task with ID: {task_id}"))?;

    let rows_affected = result.rows_affected();
    info!("Deleted {} rows for task ID: {}", rows_affected, task_id);

    Ok(rows_affected > 0)
}

#[derive(sqlx::FromRow)]
struct TaskCounts {
    total: i64,
    completed: i64,
    high_priority_pending: i64,
}

/// Aggregates a profile's task counts for the analytics endpoint.
/// `current_streak` is passed in by the caller, which already holds the
/// profile row.
pub async fn get_task_analytics(
    pool: &SqlitePool,
    profile_id: i64,
    current_streak: i64,
) -> Result<common::TaskAnalytics> {
    let counts = sqlx::query_as::<_, TaskCounts>(
        r#"
        SELECT
            COUNT(*) AS total,
            COALESCE(SUM(CASE WHEN completed THEN 1 ELSE 0 END), 0) AS completed,
            COALESCE(SUM(CASE WHEN NOT completed AND priority = 'high' THEN 1 ELSE 0 END), 0) AS high_priority_pending
        FROM tasks WHERE profile_id = ?;
        "#,
    )
    .bind(profile_id)
    .fetch_one(pool)
    .await
    .context("Failed to compute task analytics")?;

    let completion_rate_percent = if counts.total > 0 {
        ((counts.completed as f64 / counts.total as f64) * 100.0).round() as i64
    } else {
        0
    };

    Ok(common::TaskAnalytics {
        total: counts.total,
        completed: counts.completed,
        pending: counts.total - counts.completed,
        high_priority_pending: counts.high_priority_pending,
        completion_rate_percent,
        current_streak,
    })
}

/// Which side of a task's schedule a reminder refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderKind {
    Start,
    End,
}

/// One email-worthy event found by the reminder sweep.
#[derive(Debug, Clone)]
pub struct DueReminder {
    pub task_id: i64,
    pub task_name: String,
    pub username: String,
    pub email: String,
    pub kind: ReminderKind,
}

#[derive(sqlx::FromRow)]
struct ReminderRow {
    task_id: i64,
    task_name: String,
    username: String,
    email: String,
}

/// Finds incomplete tasks of notification-enabled profiles whose start
/// or end time fell inside the half-open window `(window_start, now]`.
pub async fn due_reminders(
    pool: &SqlitePool,
    window_start: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<Vec<DueReminder>> {
    let mut reminders = Vec::new();

    for (kind, column) in [(ReminderKind::Start, "start_time"), (ReminderKind::End, "end_time")] {
        let query = format!(
            "SELECT t.id AS task_id, t.name AS task_name, p.username AS username, p.email AS email
             FROM tasks t
             JOIN profiles p ON p.id = t.profile_id
             WHERE t.completed = FALSE
               AND p.email_notifications_enabled = TRUE
               AND t.{column} > ? AND t.{column} <= ?
             ORDER BY t.id;"
        );

        let rows = sqlx::query_as::<_, ReminderRow>(&query)
            .bind(window_start)
            .bind(now)
            .fetch_all(pool)
            .await
            .context("Failed to query tasks due for reminders")?;

        reminders.extend(rows.into_iter().map(|row| DueReminder {
            task_id: row.task_id,
            task_name: row.task_name,
            username: row.username,
            email: row.email,
            kind,
        }));
    }

    Ok(reminders)
}

/// Inserts a new profile with a fresh (empty) streak.
pub async fn create_profile(
    pool: &SqlitePool,
    new_profile: NewProfile,
) -> Result<Profile, CreateProfileError> {
    let now = Utc::now();

    let result = sqlx::query(
        "INSERT INTO profiles (username, email, password_hash, mobile, timezone, current_streak, last_streak_updated, email_notifications_enabled, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, 0, NULL, TRUE, ?, ?)",
    )
    .bind(&new_profile.username)
    .bind(&new_profile.email)
    .bind(&new_profile.password_hash)
    .bind(&new_profile.mobile)
    .bind(&new_profile.timezone)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await;

    let id = match result {
        Ok(done) => done.last_insert_rowid(),
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            return Err(CreateProfileError::EmailTaken);
        }
        Err(err) => return Err(CreateProfileError::Database(err)),
    };

    info!("Created profile {} for {}.", id, new_profile.email);

    Ok(Profile {
        id,
        username: new_profile.username,
        email: new_profile.email,
        password_hash: new_profile.password_hash,
        mobile: new_profile.mobile,
        timezone: new_profile.timezone,
        current_streak: 0,
        last_streak_updated: None,
        email_notifications_enabled: true,
        created_at: now,
        updated_at: now,
    })
}

pub async fn get_profile(pool: &SqlitePool, profile_id: i64) -> Result<Option<Profile>> {
    let profile = sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE id = ?")
        .bind(profile_id)
        .fetch_optional(pool)
        .await
        .context("Failed to load profile")?;

    Ok(profile)
}

/// Loads a profile by email, hash included, for credential checks.
pub async fn get_profile_by_email(pool: &SqlitePool, email: &str) -> Result<Option<Profile>> {
    let profile = sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await
        .context("Failed to load profile by email")?;

    Ok(profile)
}

/// Applies a partial profile edit and returns the updated row, or `None`
/// when the profile does not exist. Fields absent from the payload keep
/// their current values.
pub async fn update_profile(
    pool: &SqlitePool,
    profile_id: i64,
    changes: UpdateProfilePayload,
) -> Result<Option<Profile>> {
    let Some(mut profile) = get_profile(pool, profile_id).await? else {
        return Ok(None);
    };

    if let Some(username) = changes.username {
        profile.username = username;
    }
    if let Some(mobile) = changes.mobile {
        profile.mobile = Some(mobile);
    }
    if let Some(timezone) = changes.timezone {
        profile.timezone = timezone;
    }
    if let Some(enabled) = changes.email_notifications_enabled {
        profile.email_notifications_enabled = enabled;
    }
    profile.updated_at = Utc::now();

    sqlx::query(
        "UPDATE profiles SET username = ?, mobile = ?, timezone = ?, email_notifications_enabled = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&profile.username)
    .bind(&profile.mobile)
    .bind(&profile.timezone)
    .bind(profile.email_notifications_enabled)
    .bind(profile.updated_at)
    .bind(profile_id)
    .execute(pool)
    .await
    .context("Failed to update profile")?;

    Ok(Some(profile))
}

/// Applies a completion event to the owner's streak and returns the
/// streak value that results. A missing profile is a silent no-op
/// reported as a zero streak.
pub async fn record_completion(
    pool: &SqlitePool,
    profile_id: i64,
    today: NaiveDate,
) -> Result<i64> {
    let Some(profile) = get_profile(pool, profile_id).await? else {
        debug!("No profile {} for streak update, skipping.", profile_id);
        return Ok(0);
    };

    let state = StreakState {
        current_streak: profile.current_streak,
        last_streak_updated: profile.last_streak_updated,
    };

    match streak::on_completion(state, today) {
        Some(next) => {
            sqlx::query(
                "UPDATE profiles SET current_streak = ?, last_streak_updated = ?, updated_at = ? WHERE id = ?",
            )
            .bind(next.current_streak)
            .bind(next.last_streak_updated)
            .bind(Utc::now())
            .bind(profile_id)
            .execute(pool)
            .await
            .context("Failed to update streak after completion")?;

            info!(
                "Streak for profile {} is now {}.",
                profile_id, next.current_streak
            );
            Ok(next.current_streak)
        }
        None => Ok(state.current_streak),
    }
}

/// Session-start break check: zeroes a broken streak and returns the
/// current value either way. The stored date stays put; only the server
/// sweep clears it (and notifies the user).
pub async fn check_and_reset_streak(
    pool: &SqlitePool,
    profile_id: i64,
    today: NaiveDate,
) -> Result<i64> {
    let Some(profile) = get_profile(pool, profile_id).await? else {
        return Ok(0);
    };

    let state = StreakState {
        current_streak: profile.current_streak,
        last_streak_updated: profile.last_streak_updated,
    };

    if !streak::is_broken(state, today) {
        return Ok(state.current_streak);
    }

    sqlx::query("UPDATE profiles SET current_streak = 0, updated_at = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(profile_id)
        .execute(pool)
        .await
        .context("Failed to reset broken streak")?;

    info!(
        "Streak for profile {} was broken and has been reset.",
        profile_id
    );
    Ok(0)
}

/// Sweep-side reset: zeroes the streak and clears the stored date so a
/// later sweep has nothing left to flag for this profile.
pub async fn reset_streak_for_sweep(pool: &SqlitePool, profile_id: i64) -> Result<()> {
    sqlx::query(
        "UPDATE profiles SET current_streak = 0, last_streak_updated = NULL, updated_at = ? WHERE id = ?",
    )
    .bind(Utc::now())
    .bind(profile_id)
    .execute(pool)
    .await
    .context("Failed to reset streak during sweep")?;

    Ok(())
}

/// Profiles the streak sweep must examine: a live streak and email
/// notifications still on.
pub async fn profiles_with_active_streaks(pool: &SqlitePool) -> Result<Vec<Profile>> {
    let profiles = sqlx::query_as::<_, Profile>(
        "SELECT * FROM profiles WHERE current_streak > 0 AND email_notifications_enabled = TRUE ORDER BY id;",
    )
    .fetch_all(pool)
    .await
    .context("Failed to load profiles with active streaks")?;

    Ok(profiles)
}

/// Creates a session row and returns its token.
pub async fn create_session(pool: &SqlitePool, profile_id: i64) -> Result<String> {
    let token = Uuid::new_v4().to_string();

    sqlx::query("INSERT INTO sessions (token, profile_id, created_at) VALUES (?, ?, ?)")
        .bind(&token)
        .bind(profile_id)
        .bind(Utc::now())
        .execute(pool)
        .await
        .context("Failed to create session")?;

    Ok(token)
}

/// Resolves a session token to its profile.
pub async fn get_session_profile(pool: &SqlitePool, token: &str) -> Result<Option<Profile>> {
    let profile = sqlx::query_as::<_, Profile>(
        "SELECT p.* FROM profiles p JOIN sessions s ON s.profile_id = p.id WHERE s.token = ?",
    )
    .bind(token)
    .fetch_optional(pool)
    .await
    .context("Failed to resolve session")?;

    Ok(profile)
}

pub async fn delete_session(pool: &SqlitePool, token: &str) -> Result<()> {
    sqlx::query("DELETE FROM sessions WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await
        .context("Failed to delete session")?;

    Ok(())
}

/// Helper to set up an in-memory SQLite database for testing.
/// Pinned to a single connection: each connection to `sqlite::memory:`
/// is its own empty database, so a wider pool would hand tests a
/// different (empty) database mid-test.
#[cfg(test)]
pub(crate) async fn setup_test_db() -> Result<SqlitePool> {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Inserts a profile with defaults the tests can lean on (UTC timezone,
/// notifications enabled, zero streak).
#[cfg(test)]
pub(crate) async fn seed_profile(pool: &SqlitePool, username: &str, email: &str) -> Profile {
    create_profile(
        pool,
        NewProfile {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: "test-hash".to_string(),
            mobile: None,
            timezone: "UTC".to_string(),
        },
    )
    .await
    .unwrap()
}

/// Overwrites a profile's streak columns directly.
#[cfg(test)]
pub(crate) async fn set_streak(
    pool: &SqlitePool,
    profile_id: i64,
    current_streak: i64,
    last_streak_updated: Option<NaiveDate>,
) {
    sqlx::query("UPDATE profiles SET current_streak = ?, last_streak_updated = ? WHERE id = ?")
        .bind(current_streak)
        .bind(last_streak_updated)
        .bind(profile_id)
        .execute(pool)
        .await
        .unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn new_task(name: &str) -> NewTask {
        NewTask {
            name: name.to_string(),
            due_date: None,
            start_time: None,
            end_time: None,
            priority: Priority::Low,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_task() {
        let pool = setup_test_db().await.unwrap();
        let profile = seed_profile(&pool, "ada", "ada@example.com").await;

        let created_task = create_task_in_db(&pool, profile.id, new_task("Test the database"))
            .await
            .unwrap();

        assert_eq!(created_task.name, "Test the database");
        assert_eq!(created_task.profile_id, profile.id);
        assert_eq!(created_task.priority, Priority::Low);
        assert!(!created_task.completed);
        assert!(created_task.id > 0); // Should have been assigned an ID by the DB

        let tasks = get_tasks_for_profile(&pool, profile.id).await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, created_task.id);
    }

    #[tokio::test]
    async fn test_tasks_are_listed_newest_first() {
        let pool = setup_test_db().await.unwrap();
        let profile = seed_profile(&pool, "ada", "ada@example.com").await;

        let first = create_task_in_db(&pool, profile.id, new_task("first"))
            .await
            .unwrap();
        let second = create_task_in_db(&pool, profile.id, new_task("second"))
            .await
            .unwrap();

        let tasks = get_tasks_for_profile(&pool, profile.id).await.unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].id, second.id);
        assert_eq!(tasks[1].id, first.id);
    }

    #[tokio::test]
    async fn test_tasks_filtered_by_due_date() {
        let pool = setup_test_db().await.unwrap();
        let profile = seed_profile(&pool, "ada", "ada@example.com").await;

        let monday = date(2024, 1, 1);
        let tuesday = date(2024, 1, 2);

        let mut on_monday = new_task("monday task");
        on_monday.due_date = Some(monday);
        create_task_in_db(&pool, profile.id, on_monday).await.unwrap();

        let mut on_tuesday = new_task("tuesday task");
        on_tuesday.due_date = Some(tuesday);
        create_task_in_db(&pool, profile.id, on_tuesday)
            .await
            .unwrap();

        let tasks = get_tasks_for_date(&pool, profile.id, monday).await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].name, "monday task");
    }

    #[tokio::test]
    async fn test_set_task_completed_detects_the_edge() {
        let pool = setup_test_db().await.unwrap();
        let profile = seed_profile(&pool, "ada", "ada@example.com").await;
        let task = create_task_in_db(&pool, profile.id, new_task("flip me"))
            .await
            .unwrap();

        // First transition flips the flag.
        match set_task_completed(&pool, profile.id, task.id, true).await.unwrap() {
            CompletionChange::Changed(updated) => assert!(updated.completed),
            other => panic!("Expected Changed, got {:?}", other),
        }

        // Re-sending the same state is not a new completion event.
        match set_task_completed(&pool, profile.id, task.id, true).await.unwrap() {
            CompletionChange::Unchanged(updated) => assert!(updated.completed),
            other => panic!("Expected Unchanged, got {:?}", other),
        }

        // Unknown task.
        assert!(matches!(
            set_task_completed(&pool, profile.id, 9999, true).await.unwrap(),
            CompletionChange::NotFound
        ));

        // Someone else's task looks like it does not exist.
        let other = seed_profile(&pool, "bob", "bob@example.com").await;
        assert!(matches!(
            set_task_completed(&pool, other.id, task.id, false).await.unwrap(),
            CompletionChange::NotFound
        ));
    }

    #[tokio::test]
    async fn test_delete_task_is_owner_scoped() {
        let pool = setup_test_db().await.unwrap();
        let ada = seed_profile(&pool, "ada", "ada@example.com").await;
        let bob = seed_profile(&pool, "bob", "bob@example.com").await;
        let task = create_task_in_db(&pool, ada.id, new_task("ada's task"))
            .await
            .unwrap();

        // Bob cannot delete Ada's task.
        let deleted = delete_task_in_db(&pool, bob.id, task.id).await.unwrap();
        assert!(!deleted);
        assert_eq!(get_tasks_for_profile(&pool, ada.id).await.unwrap().len(), 1);

        // Ada can.
        let deleted = delete_task_in_db(&pool, ada.id, task.id).await.unwrap();
        assert!(deleted);
        assert!(get_tasks_for_profile(&pool, ada.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_record_completion_moves_streak_once_per_day() {
        let pool = setup_test_db().await.unwrap();
        let profile = seed_profile(&pool, "ada", "ada@example.com").await;
        let today = date(2024, 1, 2);

        // First completion ever starts the streak.
        assert_eq!(record_completion(&pool, profile.id, today).await.unwrap(), 1);

        // A second completion the same day holds.
        assert_eq!(record_completion(&pool, profile.id, today).await.unwrap(), 1);

        let stored = get_profile(&pool, profile.id).await.unwrap().unwrap();
        assert_eq!(stored.current_streak, 1);
        assert_eq!(stored.last_streak_updated, Some(today));
    }

    #[tokio::test]
    async fn test_record_completion_extends_after_yesterday() {
        let pool = setup_test_db().await.unwrap();
        let profile = seed_profile(&pool, "ada", "ada@example.com").await;
        set_streak(&pool, profile.id, 3, Some(date(2024, 1, 1))).await;

        let streak = record_completion(&pool, profile.id, date(2024, 1, 2))
            .await
            .unwrap();
        assert_eq!(streak, 4);
    }

    #[tokio::test]
    async fn test_record_completion_restarts_after_gap() {
        let pool = setup_test_db().await.unwrap();
        let profile = seed_profile(&pool, "ada", "ada@example.com").await;
        set_streak(&pool, profile.id, 3, Some(date(2024, 1, 1))).await;

        let streak = record_completion(&pool, profile.id, date(2024, 1, 4))
            .await
            .unwrap();
        assert_eq!(streak, 1);

        let stored = get_profile(&pool, profile.id).await.unwrap().unwrap();
        assert_eq!(stored.last_streak_updated, Some(date(2024, 1, 4)));
    }

    #[tokio::test]
    async fn test_record_completion_without_profile_is_a_no_op() {
        let pool = setup_test_db().await.unwrap();
        assert_eq!(record_completion(&pool, 42, date(2024, 1, 2)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_check_and_reset_streak() {
        let pool = setup_test_db().await.unwrap();
        let profile = seed_profile(&pool, "ada", "ada@example.com").await;
        set_streak(&pool, profile.id, 3, Some(date(2024, 1, 1))).await;

        // One-day gap: nothing to reset.
        assert_eq!(
            check_and_reset_streak(&pool, profile.id, date(2024, 1, 2)).await.unwrap(),
            3
        );

        // Three-day gap: reset to zero, but the date stays for the sweep.
        assert_eq!(
            check_and_reset_streak(&pool, profile.id, date(2024, 1, 4)).await.unwrap(),
            0
        );
        let stored = get_profile(&pool, profile.id).await.unwrap().unwrap();
        assert_eq!(stored.current_streak, 0);
        assert_eq!(stored.last_streak_updated, Some(date(2024, 1, 1)));

        // Checking again is a no-op.
        assert_eq!(
            check_and_reset_streak(&pool, profile.id, date(2024, 1, 4)).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_reset_streak_for_sweep_clears_the_date() {
        let pool = setup_test_db().await.unwrap();
        let profile = seed_profile(&pool, "ada", "ada@example.com").await;
        set_streak(&pool, profile.id, 5, Some(date(2024, 1, 1))).await;

        reset_streak_for_sweep(&pool, profile.id).await.unwrap();

        let stored = get_profile(&pool, profile.id).await.unwrap().unwrap();
        assert_eq!(stored.current_streak, 0);
        assert_eq!(stored.last_streak_updated, None);
    }

    #[tokio::test]
    async fn test_profiles_with_active_streaks_filters() {
        let pool = setup_test_db().await.unwrap();

        let active = seed_profile(&pool, "active", "active@example.com").await;
        set_streak(&pool, active.id, 2, Some(date(2024, 1, 1))).await;

        let zero = seed_profile(&pool, "zero", "zero@example.com").await;
        set_streak(&pool, zero.id, 0, Some(date(2024, 1, 1))).await;

        let muted = seed_profile(&pool, "muted", "muted@example.com").await;
        set_streak(&pool, muted.id, 4, Some(date(2024, 1, 1))).await;
        sqlx::query("UPDATE profiles SET email_notifications_enabled = FALSE WHERE id = ?")
            .bind(muted.id)
            .execute(&pool)
            .await
            .unwrap();

        let profiles = profiles_with_active_streaks(&pool).await.unwrap();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].id, active.id);
    }

    #[tokio::test]
    async fn test_due_reminders_window_membership() {
        let pool = setup_test_db().await.unwrap();
        let profile = seed_profile(&pool, "ada", "ada@example.com").await;

        let now = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        let window_start = now - Duration::seconds(60);

        // Inside the window: 30 seconds ago.
        let mut inside = new_task("inside");
        inside.due_date = Some(date(2024, 1, 1));
        inside.start_time = Some(now - Duration::seconds(30));
        create_task_in_db(&pool, profile.id, inside).await.unwrap();

        // Exactly now: included (window is half-open on the left).
        let mut at_now = new_task("at now");
        at_now.due_date = Some(date(2024, 1, 1));
        at_now.end_time = Some(now);
        create_task_in_db(&pool, profile.id, at_now).await.unwrap();

        // Exactly at window start: excluded.
        let mut at_start = new_task("at window start");
        at_start.due_date = Some(date(2024, 1, 1));
        at_start.start_time = Some(window_start);
        create_task_in_db(&pool, profile.id, at_start).await.unwrap();

        // In the window but already completed: excluded.
        let mut done = new_task("done");
        done.due_date = Some(date(2024, 1, 1));
        done.start_time = Some(now - Duration::seconds(10));
        let done = create_task_in_db(&pool, profile.id, done).await.unwrap();
        set_task_completed(&pool, profile.id, done.id, true).await.unwrap();

        let reminders = due_reminders(&pool, window_start, now).await.unwrap();
        assert_eq!(reminders.len(), 2);

        let starts: Vec<_> = reminders
            .iter()
            .filter(|r| r.kind == ReminderKind::Start)
            .collect();
        let ends: Vec<_> = reminders
            .iter()
            .filter(|r| r.kind == ReminderKind::End)
            .collect();
        assert_eq!(starts.len(), 1);
        assert_eq!(starts[0].task_name, "inside");
        assert_eq!(ends.len(), 1);
        assert_eq!(ends[0].task_name, "at now");
        assert_eq!(ends[0].email, "ada@example.com");
    }

    #[tokio::test]
    async fn test_due_reminders_skip_muted_profiles() {
        let pool = setup_test_db().await.unwrap();
        let profile = seed_profile(&pool, "muted", "muted@example.com").await;
        sqlx::query("UPDATE profiles SET email_notifications_enabled = FALSE WHERE id = ?")
            .bind(profile.id)
            .execute(&pool)
            .await
            .unwrap();

        let now = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        let mut task = new_task("silent");
        task.due_date = Some(date(2024, 1, 1));
        task.start_time = Some(now - Duration::seconds(30));
        create_task_in_db(&pool, profile.id, task).await.unwrap();

        let reminders = due_reminders(&pool, now - Duration::seconds(60), now)
            .await
            .unwrap();
        assert!(reminders.is_empty());
    }

    #[tokio::test]
    async fn test_create_profile_rejects_duplicate_email() {
        let pool = setup_test_db().await.unwrap();
        seed_profile(&pool, "ada", "ada@example.com").await;

        let result = create_profile(
            &pool,
            NewProfile {
                username: "imposter".to_string(),
                email: "ada@example.com".to_string(),
                password_hash: "other-hash".to_string(),
                mobile: None,
                timezone: "UTC".to_string(),
            },
        )
        .await;

        assert!(matches!(result, Err(CreateProfileError::EmailTaken)));
    }

    #[tokio::test]
    async fn test_sessions_round_trip() {
        let pool = setup_test_db().await.unwrap();
        let profile = seed_profile(&pool, "ada", "ada@example.com").await;

        let token = create_session(&pool, profile.id).await.unwrap();
        let resolved = get_session_profile(&pool, &token).await.unwrap().unwrap();
        assert_eq!(resolved.id, profile.id);

        delete_session(&pool, &token).await.unwrap();
        assert!(get_session_profile(&pool, &token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_profile_merges_fields() {
        let pool = setup_test_db().await.unwrap();
        let profile = seed_profile(&pool, "ada", "ada@example.com").await;

        let updated = update_profile(
            &pool,
            profile.id,
            UpdateProfilePayload {
                username: Some("ada.l".to_string()),
                timezone: Some("Europe/Paris".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(updated.username, "ada.l");
        assert_eq!(updated.timezone, "Europe/Paris");
        // Untouched fields survive.
        assert_eq!(updated.email, "ada@example.com");
        assert!(updated.email_notifications_enabled);

        // Unknown profile.
        let missing = update_profile(&pool, 9999, UpdateProfilePayload::default())
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_task_analytics_counts() {
        let pool = setup_test_db().await.unwrap();
        let profile = seed_profile(&pool, "ada", "ada@example.com").await;

        let mut urgent = new_task("urgent");
        urgent.priority = Priority::High;
        create_task_in_db(&pool, profile.id, urgent).await.unwrap();

        let a = create_task_in_db(&pool, profile.id, new_task("a")).await.unwrap();
        let b = create_task_in_db(&pool, profile.id, new_task("b")).await.unwrap();
        create_task_in_db(&pool, profile.id, new_task("c")).await.unwrap();

        set_task_completed(&pool, profile.id, a.id, true).await.unwrap();
        set_task_completed(&pool, profile.id, b.id, true).await.unwrap();

        let analytics = get_task_analytics(&pool, profile.id, 7).await.unwrap();
        assert_eq!(analytics.total, 4);
        assert_eq!(analytics.completed, 2);
        assert_eq!(analytics.pending, 2);
        assert_eq!(analytics.high_priority_pending, 1);
        assert_eq!(analytics.completion_rate_percent, 50);
        assert_eq!(analytics.current_streak, 7);
    }

    #[tokio::test]
    async fn test_task_analytics_empty_profile() {
        let pool = setup_test_db().await.unwrap();
        let profile = seed_profile(&pool, "ada", "ada@example.com").await;

        let analytics = get_task_analytics(&pool, profile.id, 0).await.unwrap();
        assert_eq!(analytics.total, 0);
        assert_eq!(analytics.completion_rate_percent, 0);
    }
}
