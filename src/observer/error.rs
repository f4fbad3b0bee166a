use std::time::Duration;

use thiserror::Error;

use crate::auth::PasswordError;
use crate::database::manager::DatabaseError;
use crate::database::schema::Document;
use crate::observer::traits::ObserverRing;

/// Observer system errors with structured error types
#[derive(Debug, Error)]
pub enum ObserverError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error("Timeout error: {0}")]
    TimeoutError(String),

    #[error("System error: {0}")]
    SystemError(String),
}

/// Observer warnings (non-fatal issues)
#[derive(Debug, Clone)]
pub struct ObserverWarning {
    pub observer: String,
    pub ring: u8,
    pub message: String,
}

impl ObserverWarning {
    pub fn new(observer: &str, ring: ObserverRing, message: impl Into<String>) -> Self {
        Self {
            observer: observer.to_string(),
            ring: ring as u8,
            message: message.into(),
        }
    }
}

/// Results from a successful pipeline execution
#[derive(Debug, Clone)]
pub struct ObserverResult {
    pub records: Vec<Document>,
    pub warnings: Vec<ObserverWarning>,
    pub execution_time: Duration,
    pub rings_executed: Vec<ObserverRing>,
}
