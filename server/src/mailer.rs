// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use crate::config::SmtpConfig;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::debug;

/// A fully rendered email, ready to hand to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to_name: String,
    pub to_email: String,
    pub subject: String,
    pub html_body: String,
}

#[derive(Debug, thiserror::Error)]
pub enum MailerError {
    #[error("invalid email address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("failed to build email: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("smtp transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
    #[error("smtp rejected the message: {0}")]
    Rejected(String),
}

/// The transactional email collaborator. The job sweeps only ever see
/// this trait; the SMTP details (and the test doubles) live behind it.
/// `send` returns the provider's receipt for logging.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<String, MailerError>;
}

/// Production mailer over an async SMTP relay.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn from_config(config: &SmtpConfig) -> Result<Self, MailerError> {
        let from = config.mail_from.parse::<Mailbox>()?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();
        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<String, MailerError> {
        let to = Mailbox::new(Some(email.to_name.clone()), email.to_email.parse()?);
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(email.html_body.clone())?;

        debug!("Sending email '{}' to {}.", email.subject, email.to_email);
        let response = self.transport.send(message).await?;
        if !response.is_positive() {
            return Err(MailerError::Rejected(response.code().to_string()));
        }
        Ok(response.code().to_string())
    }
}

// --- Email content ---
// The wording below is part of the product surface; tests pin the
// pieces clients and support staff grep for.

/// Email sent by the streak sweep when a streak breaks. `lost_streak` is
/// the value the user had before the reset.
pub fn streak_reset_email(username: &str, email: &str, lost_streak: i64) -> OutgoingEmail {
    OutgoingEmail {
        to_name: username.to_string(),
        to_email: email.to_string(),
        subject: "Your Productivity Streak on TaskPulse has been Reset".to_string(),
        html_body: format!(
            "<p>Hi {username},</p>\
             <p>It looks like you missed a day, and your productivity streak of {lost_streak} days has been reset. Don't worry, you can start a new one today!</p>\
             <p>Complete any task to begin a new streak.</p>\
             <p>Best,</p>\
             <p>The TaskPulse Team</p>"
        ),
    }
}

/// Reminder for a task whose start time just came up.
pub fn task_starting_email(task_name: &str, username: &str, email: &str) -> OutgoingEmail {
    OutgoingEmail {
        to_name: username.to_string(),
        to_email: email.to_string(),
        subject: format!("⏰ Reminder: Task \"{task_name}\" is starting soon!"),
        html_body: format!(
            "<p>Hi {username},</p>\
             <p>Just a friendly reminder that your task, <strong>\"{task_name}\"</strong>, is scheduled to begin shortly.</p>\
             <p>You got this!</p>"
        ),
    }
}

/// Reminder for a task whose end time just came up.
pub fn task_ending_email(task_name: &str, username: &str, email: &str) -> OutgoingEmail {
    OutgoingEmail {
        to_name: username.to_string(),
        to_email: email.to_string(),
        subject: format!("✅ Reminder: Task \"{task_name}\" is ending soon!"),
        html_body: format!(
            "<p>Hi {username},</p>\
             <p>Just a friendly reminder that your task, <strong>\"{task_name}\"</strong>, is scheduled to end shortly. Time to wrap things up!</p>\
             <p>Keep up the great work!</p>"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streak_reset_email_mentions_the_lost_streak() {
        let email = streak_reset_email("ada", "ada@example.com", 7);
        assert_eq!(email.to_email, "ada@example.com");
        assert!(email.subject.contains("Streak"));
        assert!(email.html_body.contains("Hi ada"));
        assert!(email.html_body.contains("streak of 7 days"));
    }

    #[test]
    fn reminder_emails_name_the_task() {
        let start = task_starting_email("Write report", "ada", "ada@example.com");
        assert!(start.subject.contains("starting soon"));
        assert!(start.html_body.contains("Write report"));

        let end = task_ending_email("Write report", "ada", "ada@example.com");
        assert!(end.subject.contains("ending soon"));
        assert!(end.html_body.contains("wrap things up"));
    }
}
