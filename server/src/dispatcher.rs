// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use crate::database;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{error, info, warn};

/// The desktop-notification collaborator. `request_permission` is asked
/// once before the loop starts; `show` raises a single alert and is free
/// to drop it silently.
pub trait AlertSurface: Send + Sync {
    fn request_permission(&self) -> bool;
    fn show(&self, title: &str, body: &str);
}

/// Surface for headless deployments: alerts land in the log.
pub struct TracingAlertSurface;

impl AlertSurface for TracingAlertSurface {
    fn request_permission(&self) -> bool {
        true
    }

    fn show(&self, title: &str, body: &str) {
        info!("Notification: {} - {}", title, body);
    }
}

/// Polls one profile's task list and raises each start/end alert at most
/// once per dispatcher lifetime.
///
/// The look-back window is matched to the poll interval so no boundary
/// between two polls is ever missed, and the sent-sets take care of the
/// overlap case where two polls both cover the same instant.
pub struct NotificationDispatcher {
    pool: SqlitePool,
    surface: Arc<dyn AlertSurface>,
    profile_id: i64,
    window: Duration,
    start_alerted: HashSet<i64>,
    end_alerted: HashSet<i64>,
}

impl NotificationDispatcher {
    pub fn new(
        pool: SqlitePool,
        surface: Arc<dyn AlertSurface>,
        profile_id: i64,
        window: Duration,
    ) -> Self {
        Self {
            pool,
            surface,
            profile_id,
            window,
            start_alerted: HashSet::new(),
            end_alerted: HashSet::new(),
        }
    }

    /// One poll. Alerts on every incomplete task whose start or end time
    /// fell in `(now - window, now]` and was not alerted before; a task
    /// completed in the meantime is exempt even if its time is in the
    /// window. Returns the number of alerts raised.
    pub async fn check_once(&mut self, now: DateTime<Utc>) -> Result<usize> {
        let tasks = database::get_tasks_for_profile(&self.pool, self.profile_id).await?;
        let window_start = now - self.window;
        let mut raised = 0;

        for task in tasks {
            if task.completed {
                continue;
            }

            if let Some(start) = task.start_time {
                if start > window_start && start <= now && !self.start_alerted.contains(&task.id) {
                    self.surface.show(
                        &format!("Task Starting: {}", task.name),
                        "Your task is scheduled to start now. You got this!",
                    );
                    self.start_alerted.insert(task.id);
                    raised += 1;
                }
            }

            if let Some(end) = task.end_time {
                if end > window_start && end <= now && !self.end_alerted.contains(&task.id) {
                    self.surface.show(
                        &format!("Task Ending: {}", task.name),
                        "Your task is scheduled to end now. Time to wrap up!",
                    );
                    self.end_alerted.insert(task.id);
                    raised += 1;
                }
            }
        }

        Ok(raised)
    }
}

/// Handle to a running dispatcher loop.
pub struct DispatcherHandle {
    stop: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl DispatcherHandle {
    /// Stops the loop and waits for it to finish. No alert fires after
    /// this returns.
    pub async fn shutdown(self) {
        let _ = self.stop.send(true);
        if let Err(err) = self.join.await {
            error!("Notification dispatcher task panicked: {:?}", err);
        }
    }
}

/// Asks the surface for permission and, when granted, spawns the polling
/// loop for one profile. Returns `None` (and spawns nothing) when
/// permission is denied. Poll errors are logged and the loop keeps
/// going.
pub fn spawn(
    pool: SqlitePool,
    surface: Arc<dyn AlertSurface>,
    profile_id: i64,
    poll_secs: u64,
) -> Option<DispatcherHandle> {
    if !surface.request_permission() {
        warn!("Notification permission denied; dispatcher not started.");
        return None;
    }

    let poll_secs = poll_secs.max(1);
    let (stop, mut stopped) = watch::channel(false);
    let mut dispatcher = NotificationDispatcher::new(
        pool,
        surface,
        profile_id,
        Duration::seconds(poll_secs as i64),
    );

    let join = tokio::spawn(async move {
        let mut interval = time::interval(std::time::Duration::from_secs(poll_secs));

        // The first tick completes immediately and doubles as the
        // initial check.
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(err) = dispatcher.check_once(Utc::now()).await {
                        error!("Error checking for task notifications: {:?}", err);
                    }
                }
                _ = stopped.changed() => {
                    info!(
                        "Notification dispatcher for profile {} stopped.",
                        dispatcher.profile_id
                    );
                    break;
                }
            }
        }
    });

    Some(DispatcherHandle { stop, join })
}
