use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum MailerError {
    #[error("Mail delivery failed: {0}")]
    Delivery(String),
}

/// Outbound mail. Delivery is pluggable; the server ships with `LogMailer`.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: Email) -> Result<(), MailerError>;
}

/// Writes messages to the log instead of delivering them
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: Email) -> Result<(), MailerError> {
        tracing::info!(to = %email.to, subject = %email.subject, "Mail: {}", email.body);
        Ok(())
    }
}

pub fn welcome_email(name: &str, to: &str) -> Email {
    Email {
        to: to.to_string(),
        subject: "Welcome to the Tourbook family!".to_string(),
        body: format!("Hi {}, welcome aboard. Upload a profile photo from your account page.", first_name(name)),
    }
}

/// Carries the plain reset token; only its hash is stored
pub fn password_reset_email(name: &str, to: &str, reset_url: &str, ttl_minutes: i64) -> Email {
    Email {
        to: to.to_string(),
        subject: format!("Your password reset token (valid for {} min)", ttl_minutes),
        body: format!(
            "Hi {}, forgot your password? Submit a PATCH request with your new password and passwordConfirm to: {}\nIf you didn't forget your password, please ignore this email.",
            first_name(name),
            reset_url
        ),
    }
}

fn first_name(name: &str) -> &str {
    name.split_whitespace().next().unwrap_or(name)
}
