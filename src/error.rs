/// Unified error handling for the service.
///
/// Every failure a caller can see maps to one of the domain error types
/// below, which the central `AppError` wraps for control flow and renders
/// as a structured HTTP response. Token-decode failures are deliberately
/// NOT errors: the codec returns `Option<Claims>` and callers decide what
/// an invalid token means for them.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use std::error::Error as StdError;
use std::fmt;

/// Authentication and authorization failures raised by the access gate
/// and the account handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No `Authorization` header, or not the Bearer scheme.
    MissingBearer,
    /// Signature, expiry, or subject did not check out.
    InvalidToken,
    /// Cryptographically valid token with no active session row.
    RevokedToken,
    /// Valid identity, insufficient role.
    Forbidden,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::MissingBearer => write!(f, "missing or malformed authorization header"),
            AuthError::InvalidToken => write!(f, "invalid or expired token"),
            AuthError::RevokedToken => write!(f, "token has been revoked"),
            AuthError::Forbidden => write!(f, "insufficient role for this resource"),
        }
    }
}

impl StdError for AuthError {}

/// Account lifecycle failures: registration, login, password change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountError {
    InvalidCredentials,
    DuplicateEmail,
    DuplicateUsername,
    UserNotFound,
}

impl fmt::Display for AccountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountError::InvalidCredentials => write!(f, "invalid email or password"),
            AccountError::DuplicateEmail => write!(f, "email already registered"),
            AccountError::DuplicateUsername => write!(f, "username already taken"),
            AccountError::UserNotFound => write!(f, "user not found"),
        }
    }
}

impl StdError for AccountError {}

/// Request-input validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    EmptyField(&'static str),
    TooLong(&'static str, usize),
    InvalidFormat(&'static str),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyField(field) => write!(f, "{} is empty", field),
            ValidationError::TooLong(field, max) => {
                write!(f, "{} is too long (maximum {} characters)", field, max)
            }
            ValidationError::InvalidFormat(field) => write!(f, "{} has invalid format", field),
        }
    }
}

impl StdError for ValidationError {}

/// Store operation failures.
#[derive(Debug)]
pub enum StoreError {
    UniqueViolation(String),
    Unavailable(String),
    Query(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::UniqueViolation(msg) => write!(f, "duplicate entry: {}", msg),
            StoreError::Unavailable(msg) => write!(f, "store connection error: {}", msg),
            StoreError::Query(msg) => write!(f, "store error: {}", msg),
        }
    }
}

impl StdError for StoreError {}

/// Configuration failures, fatal at startup.
#[derive(Debug)]
pub enum ConfigError {
    MissingRequired(String),
    InvalidValue(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingRequired(msg) => write!(f, "missing required config: {}", msg),
            ConfigError::InvalidValue(msg) => write!(f, "invalid config value: {}", msg),
        }
    }
}

impl StdError for ConfigError {}

/// Central error type that all application errors map to.
#[derive(Debug)]
pub enum AppError {
    Auth(AuthError),
    Account(AccountError),
    Validation(ValidationError),
    Store(StoreError),
    Config(ConfigError),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Auth(e) => write!(f, "{}", e),
            AppError::Account(e) => write!(f, "{}", e),
            AppError::Validation(e) => write!(f, "{}", e),
            AppError::Store(e) => write!(f, "{}", e),
            AppError::Config(e) => write!(f, "{}", e),
            AppError::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl StdError for AppError {}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Auth(err)
    }
}

impl From<AccountError> for AppError {
    fn from(err: AccountError) -> Self {
        AppError::Account(err)
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Store(err)
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        let msg = err.to_string();

        if msg.contains("duplicate key") || msg.contains("unique constraint") {
            AppError::Store(StoreError::UniqueViolation(msg))
        } else if msg.contains("pool") || msg.contains("connect") {
            AppError::Store(StoreError::Unavailable(msg))
        } else {
            AppError::Store(StoreError::Query(msg))
        }
    }
}

/// Error response body for HTTP clients.
#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    /// Unique error id for log correlation.
    pub error_id: String,
    pub message: String,
    /// Stable machine-readable code for client-side handling.
    pub code: String,
    pub status: u16,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_id: String, message: String, code: String, status: u16) -> Self {
        Self {
            error_id,
            message,
            code,
            status,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Converts errors into HTTP responses with matching log records.
pub trait ErrorHandler {
    fn error_response(&self, error_id: &str) -> (StatusCode, ErrorResponse);
    fn log_error(&self, error_id: &str);
}

impl ErrorHandler for AppError {
    fn error_response(&self, error_id: &str) -> (StatusCode, ErrorResponse) {
        let (status, code, message) = match self {
            AppError::Auth(e) => match e {
                AuthError::MissingBearer => (
                    StatusCode::UNAUTHORIZED,
                    "UNAUTHORIZED".to_string(),
                    e.to_string(),
                ),
                AuthError::InvalidToken => (
                    StatusCode::UNAUTHORIZED,
                    "TOKEN_INVALID".to_string(),
                    e.to_string(),
                ),
                AuthError::RevokedToken => (
                    StatusCode::UNAUTHORIZED,
                    "TOKEN_REVOKED".to_string(),
                    e.to_string(),
                ),
                AuthError::Forbidden => (
                    StatusCode::FORBIDDEN,
                    "FORBIDDEN".to_string(),
                    e.to_string(),
                ),
            },

            AppError::Account(e) => match e {
                AccountError::InvalidCredentials => (
                    StatusCode::UNAUTHORIZED,
                    "INVALID_CREDENTIALS".to_string(),
                    e.to_string(),
                ),
                AccountError::DuplicateEmail | AccountError::DuplicateUsername => (
                    StatusCode::CONFLICT,
                    "DUPLICATE_ENTRY".to_string(),
                    e.to_string(),
                ),
                AccountError::UserNotFound => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND".to_string(),
                    e.to_string(),
                ),
            },

            AppError::Validation(e) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR".to_string(),
                e.to_string(),
            ),

            AppError::Store(e) => match e {
                StoreError::UniqueViolation(_) => (
                    StatusCode::CONFLICT,
                    "DUPLICATE_ENTRY".to_string(),
                    "duplicate entry".to_string(),
                ),
                StoreError::Unavailable(_) => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE".to_string(),
                    "store temporarily unavailable".to_string(),
                ),
                StoreError::Query(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORE_ERROR".to_string(),
                    "store error occurred".to_string(),
                ),
            },

            AppError::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "CONFIG_ERROR".to_string(),
                "server configuration error".to_string(),
            ),

            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR".to_string(),
                "internal server error".to_string(),
            ),
        };

        let response = ErrorResponse::new(error_id.to_string(), message, code, status.as_u16());

        (status, response)
    }

    fn log_error(&self, error_id: &str) {
        match self {
            AppError::Auth(e) => {
                tracing::warn!(error_id = error_id, error = %e, "Authentication error");
            }
            AppError::Account(AccountError::InvalidCredentials) => {
                tracing::warn!(error_id = error_id, "Invalid credentials attempt");
            }
            AppError::Account(e) => {
                tracing::warn!(error_id = error_id, error = %e, "Account error");
            }
            AppError::Validation(e) => {
                tracing::warn!(error_id = error_id, error = %e, "Validation error");
            }
            AppError::Store(e) => {
                tracing::error!(error_id = error_id, error = %e, "Store error");
            }
            AppError::Config(e) => {
                tracing::error!(error_id = error_id, error = %e, "Configuration error");
            }
            AppError::Internal(msg) => {
                tracing::error!(error_id = error_id, error = %msg, "Internal error");
            }
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let error_id = uuid::Uuid::new_v4().to_string();
        self.log_error(&error_id);

        let (status, response) = <Self as ErrorHandler>::error_response(self, &error_id);

        HttpResponse::build(status).json(response)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Auth(AuthError::Forbidden) => StatusCode::FORBIDDEN,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Account(e) => match e {
                AccountError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AccountError::DuplicateEmail | AccountError::DuplicateUsername => {
                    StatusCode::CONFLICT
                }
                AccountError::UserNotFound => StatusCode::NOT_FOUND,
            },
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Store(e) => match e {
                StoreError::UniqueViolation(_) => StatusCode::CONFLICT,
                StoreError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                StoreError::Query(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Per-request context for log correlation in handlers.
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub request_id: String,
    pub operation: &'static str,
}

impl ErrorContext {
    pub fn new(operation: &'static str) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            operation,
        }
    }
}
