// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use anyhow::{bail, Context, Result};
use std::env;
use std::net::SocketAddr;

// Define the default DB_URL here for the main application's use.
const DEFAULT_DB_URL: &str = "sqlite://database/taskpulse.db";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_ALERT_POLL_SECS: u64 = 60;

/// Runtime configuration, read once at startup. Everything downstream
/// receives this by value; nothing re-reads the environment later.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    /// Shared secret the scheduler must present to call the job
    /// endpoints. When unset, those endpoints answer 500.
    pub scheduler_token: Option<String>,
    pub smtp: Option<SmtpConfig>,
    /// Profile to watch with the local notification dispatcher, if any.
    pub alert_profile_id: Option<i64>,
    pub alert_poll_secs: u64,
}

/// SMTP settings; either all four variables are set or the mailer is
/// considered unconfigured.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub username: String,
    pub password: String,
    pub mail_from: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DB_URL.to_string(),
            bind_addr: DEFAULT_BIND_ADDR.parse().unwrap(),
            scheduler_token: None,
            smtp: None,
            alert_profile_id: None,
            alert_poll_secs: DEFAULT_ALERT_POLL_SECS,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DB_URL.to_string());

        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string())
            .parse()
            .context("BIND_ADDR must be a socket address like 0.0.0.0:3000")?;

        let scheduler_token = env::var("SCHEDULER_TOKEN").ok().filter(|t| !t.is_empty());

        let smtp = match (
            env::var("SMTP_HOST").ok(),
            env::var("SMTP_USERNAME").ok(),
            env::var("SMTP_PASSWORD").ok(),
            env::var("MAIL_FROM").ok(),
        ) {
            (Some(host), Some(username), Some(password), Some(mail_from)) => Some(SmtpConfig {
                host,
                username,
                password,
                mail_from,
            }),
            (None, None, None, None) => None,
            _ => bail!(
                "Incomplete SMTP configuration: set SMTP_HOST, SMTP_USERNAME, SMTP_PASSWORD and MAIL_FROM together, or none of them."
            ),
        };

        let alert_profile_id = env::var("ALERT_PROFILE_ID")
            .ok()
            .map(|v| v.parse::<i64>())
            .transpose()
            .context("ALERT_PROFILE_ID must be an integer profile id")?;

        let alert_poll_secs = env::var("ALERT_POLL_SECS")
            .ok()
            .map(|v| v.parse::<u64>())
            .transpose()
            .context("ALERT_POLL_SECS must be a number of seconds")?
            .unwrap_or(DEFAULT_ALERT_POLL_SECS);

        Ok(Self {
            database_url,
            bind_addr,
            scheduler_token,
            smtp,
            alert_profile_id,
            alert_poll_secs,
        })
    }
}
