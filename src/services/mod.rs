pub mod auth_service;
pub mod mailer;

pub use auth_service::{AuthService, Session};
pub use mailer::{Email, LogMailer, Mailer, MailerError};
