// HTTP API Error Types
use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};

use crate::config::Environment;

/// Classification of every failure the API can report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    // 400 Bad Request
    BadRequest,
    ValidationError,
    // 401 Unauthorized
    Unauthorized,
    // 403 Forbidden
    Forbidden,
    // 404 Not Found
    NotFound,
    // 409 Conflict
    Conflict,
    // 413 Payload Too Large
    PayloadTooLarge,
    // 500, anticipated (e.g. the mailer is down); message is safe to show
    InternalServerError,
    // 500, a defect or infrastructure failure; message is never shown in production
    Unexpected,
}

/// HTTP API error: an operational failure with a client-safe message, or an
/// unexpected one whose details stay server-side in production
#[derive(Debug, Clone)]
pub struct ApiError {
    kind: ErrorKind,
    message: String,
    detail: Option<String>,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: None,
        }
    }

    /// Attach the original error; only development responses show it
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self.kind {
            ErrorKind::BadRequest | ErrorKind::ValidationError => 400,
            ErrorKind::Unauthorized => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::PayloadTooLarge => 413,
            ErrorKind::InternalServerError | ErrorKind::Unexpected => 500,
        }
    }

    /// "fail" for client errors, "error" for server errors
    pub fn status(&self) -> &'static str {
        if self.status_code() < 500 {
            "fail"
        } else {
            "error"
        }
    }

    pub fn is_operational(&self) -> bool {
        self.kind != ErrorKind::Unexpected
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self.kind {
            ErrorKind::BadRequest => "BAD_REQUEST",
            ErrorKind::ValidationError => "VALIDATION_ERROR",
            ErrorKind::Unauthorized => "UNAUTHORIZED",
            ErrorKind::Forbidden => "FORBIDDEN",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            ErrorKind::InternalServerError => "INTERNAL_SERVER_ERROR",
            ErrorKind::Unexpected => "UNEXPECTED",
        }
    }

    /// Status code actually sent; unexpected errors are always 500
    pub fn response_status(&self) -> StatusCode {
        StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Convert to JSON response body for the given environment
    pub fn to_json(&self, environment: Environment) -> Value {
        if environment == Environment::Development {
            return json!({
                "status": self.status(),
                "message": self.message,
                "error": {
                    "code": self.error_code(),
                    "statusCode": self.status_code(),
                    "isOperational": self.is_operational(),
                    "detail": self.detail,
                }
            });
        }

        if self.is_operational() {
            json!({
                "status": self.status(),
                "message": self.message,
            })
        } else {
            json!({
                "status": "error",
                "message": "Something went wrong",
            })
        }
    }
}

// Static constructor methods
impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, message)
    }

    /// One message per failed field, joined the way clients display them
    pub fn validation_error(messages: &[String]) -> Self {
        Self::new(
            ErrorKind::ValidationError,
            format!("Invalid input data. {}", messages.join(". ")),
        )
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InternalServerError, message)
    }

    /// A defect or infrastructure failure
    pub fn unexpected(detail: impl std::fmt::Display) -> Self {
        let detail = detail.to_string();
        Self::new(ErrorKind::Unexpected, detail.clone()).with_detail(detail)
    }

    pub fn no_document() -> Self {
        Self::not_found("No document found with that ID")
    }
}

// Convert other error types to ApiError
impl From<crate::database::manager::DatabaseError> for ApiError {
    fn from(err: crate::database::manager::DatabaseError) -> Self {
        use crate::database::manager::DatabaseError;

        match err {
            DatabaseError::Duplicate { ref value, .. } => ApiError::conflict(format!(
                "Duplicate field value: {}. Please use another value!",
                value
            ))
            .with_detail(err.to_string()),
            DatabaseError::InvalidId(ref value) => {
                ApiError::bad_request(format!("Invalid id: {}.", value)).with_detail(err.to_string())
            }
            DatabaseError::NotFound(_) => ApiError::no_document().with_detail(err.to_string()),
            other => {
                // Don't expose storage internals to clients
                tracing::error!("Database error: {}", other);
                ApiError::unexpected(other)
            }
        }
    }
}

impl From<crate::filter::error::FilterError> for ApiError {
    fn from(err: crate::filter::error::FilterError) -> Self {
        ApiError::bad_request(err.to_string())
    }
}

impl From<crate::auth::TokenError> for ApiError {
    fn from(err: crate::auth::TokenError) -> Self {
        use crate::auth::TokenError;

        match err {
            TokenError::Expired => {
                ApiError::unauthorized("Your token has expired! Please log in again.")
            }
            TokenError::Invalid(ref reason) => {
                ApiError::unauthorized("Invalid token. Please log in again.").with_detail(reason.clone())
            }
            TokenError::MissingSecret | TokenError::Generation(_) => {
                tracing::error!("Token service error: {}", err);
                ApiError::unexpected(err)
            }
        }
    }
}

impl From<crate::auth::PasswordError> for ApiError {
    fn from(err: crate::auth::PasswordError) -> Self {
        tracing::error!("Password hashing error: {}", err);
        ApiError::unexpected(err)
    }
}

impl From<crate::observer::error::ObserverError> for ApiError {
    fn from(err: crate::observer::error::ObserverError) -> Self {
        use crate::observer::error::ObserverError;

        match err {
            ObserverError::ValidationError(msg) => ApiError::validation_error(&[msg]),
            ObserverError::BadRequest(msg) => ApiError::bad_request(msg),
            ObserverError::NotFound(_) => ApiError::no_document(),
            ObserverError::Database(e) => e.into(),
            ObserverError::Password(e) => e.into(),
            ObserverError::TimeoutError(msg) => {
                tracing::error!("Observer timeout: {}", msg);
                ApiError::unexpected(msg)
            }
            ObserverError::SystemError(msg) => {
                tracing::error!("Observer system error: {}", msg);
                ApiError::unexpected(msg)
            }
        }
    }
}

impl From<Vec<crate::observer::error::ObserverError>> for ApiError {
    /// Validation failures are reported together; anything else wins on its own
    fn from(errors: Vec<crate::observer::error::ObserverError>) -> Self {
        use crate::observer::error::ObserverError;

        let (validation, mut others): (Vec<_>, Vec<_>) = errors
            .into_iter()
            .partition(|e| matches!(e, ObserverError::ValidationError(_)));

        if !others.is_empty() {
            return others.swap_remove(0).into();
        }

        let messages: Vec<String> = validation
            .into_iter()
            .filter_map(|e| match e {
                ObserverError::ValidationError(msg) => Some(msg),
                _ => None,
            })
            .collect();

        if messages.is_empty() {
            ApiError::unexpected("observer pipeline failed without reporting an error")
        } else {
            ApiError::validation_error(&messages)
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return ApiError::new(ErrorKind::PayloadTooLarge, "Request body is too large");
        }
        ApiError::bad_request(format!("Invalid JSON body: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::bad_request(format!("Invalid query string: {}", rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON serialization error: {}", err);
        ApiError::unexpected(err)
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

// Every handler and middleware funnels its failures through here
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        if !self.is_operational() {
            tracing::error!(
                code = self.error_code(),
                detail = ?self.detail,
                "Unexpected error: {}",
                self.message
            );
        }

        let environment = crate::config::config().environment;
        let mut response = (self.response_status(), Json(self.to_json(environment))).into_response();
        // Lets the router re-render for its own environment
        response.extensions_mut().insert(self);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_class_follows_status_code() {
        assert_eq!(ApiError::not_found("x").status(), "fail");
        assert_eq!(ApiError::conflict("x").status(), "fail");
        assert_eq!(ApiError::internal_server_error("x").status(), "error");
        assert_eq!(ApiError::unexpected("boom").status(), "error");
    }

    #[test]
    fn only_unexpected_errors_are_non_operational() {
        assert!(ApiError::unauthorized("x").is_operational());
        assert!(ApiError::internal_server_error("mail down").is_operational());
        assert!(!ApiError::unexpected("null deref").is_operational());
    }

    #[test]
    fn production_hides_unexpected_messages() {
        let body = ApiError::unexpected("connection reset by peer").to_json(Environment::Production);
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], "Something went wrong");
        assert!(body.get("error").is_none());
    }

    #[test]
    fn production_keeps_operational_messages() {
        let body = ApiError::forbidden("You do not have permission to perform this action.")
            .with_detail("role=user")
            .to_json(Environment::Production);
        assert_eq!(body["status"], "fail");
        assert_eq!(body["message"], "You do not have permission to perform this action.");
        assert!(body.get("error").is_none());
    }

    #[test]
    fn development_includes_detail() {
        let body = ApiError::bad_request("Invalid id: abc.")
            .with_detail("uuid parse error")
            .to_json(Environment::Development);
        assert_eq!(body["message"], "Invalid id: abc.");
        assert_eq!(body["error"]["detail"], "uuid parse error");
        assert_eq!(body["error"]["statusCode"], 400);
    }

    #[test]
    fn validation_messages_are_joined() {
        let err = ApiError::validation_error(&[
            "Please tell us your name".to_string(),
            "Please provide a valid email".to_string(),
        ]);
        assert_eq!(
            err.message(),
            "Invalid input data. Please tell us your name. Please provide a valid email"
        );
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn duplicate_key_maps_to_conflict() {
        let err: ApiError = crate::database::manager::DatabaseError::Duplicate {
            collection: "users".to_string(),
            fields: vec!["email".to_string()],
            value: "\"a@b.io\"".to_string(),
        }
        .into();
        assert_eq!(err.status_code(), 409);
        assert_eq!(err.message(), "Duplicate field value: \"a@b.io\". Please use another value!");
    }

    #[test]
    fn token_errors_map_to_401() {
        let expired: ApiError = crate::auth::TokenError::Expired.into();
        assert_eq!(expired.status_code(), 401);
        assert_eq!(expired.message(), "Your token has expired! Please log in again.");

        let invalid: ApiError = crate::auth::TokenError::Invalid("bad signature".into()).into();
        assert_eq!(invalid.message(), "Invalid token. Please log in again.");
    }
}
