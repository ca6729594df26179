// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use crate::config::AppConfig;
use crate::mailer::Mailer;
use sqlx::SqlitePool;
use std::sync::Arc;

/// Everything a handler needs, constructed once in `main` and cloned
/// into the router. Handlers never reach for globals or the
/// environment; if it isn't here, they can't use it.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    /// Absent when SMTP is not configured; the job endpoints turn that
    /// into a configuration error instead of silently skipping emails.
    pub mailer: Option<Arc<dyn Mailer>>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(pool: SqlitePool, mailer: Option<Arc<dyn Mailer>>, config: AppConfig) -> Self {
        Self {
            pool,
            mailer,
            config: Arc::new(config),
        }
    }
}
