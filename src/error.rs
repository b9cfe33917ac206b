/// Application Error Handling
///
/// A single error type flows through handlers, the session guard and the
/// stores. It is built from small domain-specific enums:
/// 1. Input errors (malformed bodies, invalid field formats)
/// 2. Credential errors (duplicates, bad credentials)
/// 3. Token errors (expired / malformed / unrecognized / revoked)
/// 4. Store errors (persistence failures)
/// Configuration errors are separate: they stop the process at startup and
/// never reach a handler.
///
/// Input and credential errors keep the legacy `200 {"error": true}`
/// convention; token errors map to 401/403 and may clear the auth cookies.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use std::error::Error as StdError;
use std::fmt;

use crate::auth::cookies::removal_cookies;

pub const GENERIC_FAILURE_MSG: &str = "Something went wrong, please try again later.";

/// ============================================================================
/// 1. DOMAIN-SPECIFIC ERROR TYPES
/// ============================================================================

/// Validation errors for request input
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    MalformedBody,
    EmptyField(&'static str),
    TooShort(&'static str, usize),
    TooLong(&'static str, usize),
    InvalidFormat(&'static str),
    WeakPassword,
    SuspiciousContent(&'static str),
    PossibleSQLInjection,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::MalformedBody => write!(f, "Please review your input"),
            ValidationError::EmptyField(field) => write!(f, "{} is empty", field),
            ValidationError::TooShort(field, min) => {
                write!(f, "{} is too short (minimum {} characters)", field, min)
            }
            ValidationError::TooLong(field, max) => {
                write!(f, "{} is too long (maximum {} characters)", field, max)
            }
            ValidationError::InvalidFormat(field) => write!(f, "{} has invalid format", field),
            ValidationError::WeakPassword => write!(
                f,
                "password must contain at least one digit, one lowercase letter, and one uppercase letter"
            ),
            ValidationError::SuspiciousContent(field) => {
                write!(f, "{} contains suspicious content", field)
            }
            ValidationError::PossibleSQLInjection => {
                write!(f, "input contains potentially dangerous SQL patterns")
            }
        }
    }
}

impl StdError for ValidationError {}

/// Credential errors surfaced to the user with a readable message
#[derive(Debug, Clone, PartialEq)]
pub enum CredentialError {
    EmailTaken,
    UsernameTaken,
    InvalidCredentials,
    UserNotFound,
    MedicineNotFound,
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialError::EmailTaken => write!(f, "Email is already registered"),
            CredentialError::UsernameTaken => write!(f, "Username is already registered"),
            CredentialError::InvalidCredentials => write!(f, "Invalid Credentials."),
            CredentialError::UserNotFound => write!(f, "Cannot find the User"),
            CredentialError::MedicineNotFound => write!(f, "Medicine not found"),
        }
    }
}

impl StdError for CredentialError {}

/// Token rejections produced by the session guard and the refresh flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    /// Well-formed and signed, but outside its validity window.
    Expired,
    /// Unparseable, or the signature does not verify.
    Malformed,
    /// Any other outcome, including a token of the wrong kind.
    UnrecognizedKind,
    /// No live refresh claim row matches the presented token.
    RefreshRevoked,
    RefreshExpired,
}

impl TokenError {
    /// Only an expired access token leaves the cookies in place so the
    /// client can try the refresh endpoint.
    pub fn clears_cookies(&self) -> bool {
        !matches!(self, TokenError::Expired)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            TokenError::Expired => StatusCode::UNAUTHORIZED,
            _ => StatusCode::FORBIDDEN,
        }
    }
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::Expired => write!(f, "Token Expired"),
            TokenError::Malformed => write!(f, "Malformed token"),
            TokenError::UnrecognizedKind => write!(f, "Unrecognized token"),
            TokenError::RefreshRevoked => write!(f, "Refresh token is no longer valid"),
            TokenError::RefreshExpired => write!(f, "Refresh token expired"),
        }
    }
}

impl StdError for TokenError {}

/// Database operation errors
#[derive(Debug)]
pub enum DatabaseError {
    UniqueConstraintViolation(String),
    NotFound(String),
    ConnectionPool(String),
    QueryExecution(String),
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseError::UniqueConstraintViolation(msg) => {
                write!(f, "Duplicate entry: {}", msg)
            }
            DatabaseError::NotFound(msg) => write!(f, "Not found: {}", msg),
            DatabaseError::ConnectionPool(msg) => write!(f, "Database connection error: {}", msg),
            DatabaseError::QueryExecution(msg) => write!(f, "Query error: {}", msg),
        }
    }
}

impl StdError for DatabaseError {}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                DatabaseError::UniqueConstraintViolation(
                    db.constraint().unwrap_or("unique").to_string(),
                )
            }
            sqlx::Error::RowNotFound => DatabaseError::NotFound("Record not found".to_string()),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DatabaseError::ConnectionPool(err.to_string())
            }
            _ => DatabaseError::QueryExecution(err.to_string()),
        }
    }
}

/// Configuration errors
#[derive(Debug)]
pub enum ConfigError {
    MissingRequired(String),
    InvalidValue(String),
    ParseError(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingRequired(msg) => write!(f, "Missing required config: {}", msg),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid config value: {}", msg),
            ConfigError::ParseError(msg) => write!(f, "Config parse error: {}", msg),
        }
    }
}

impl StdError for ConfigError {}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

/// ============================================================================
/// 2. UNIFIED APPLICATION ERROR TYPE
/// ============================================================================

#[derive(Debug)]
pub enum AppError {
    Input(ValidationError),
    Credential(CredentialError),
    Token(TokenError),
    Store(DatabaseError),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Input(e) => write!(f, "{}", e),
            AppError::Credential(e) => write!(f, "{}", e),
            AppError::Token(e) => write!(f, "{}", e),
            AppError::Store(e) => write!(f, "{}", e),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl StdError for AppError {}

// ============================================================================
// FROM IMPLEMENTATIONS
// ============================================================================

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Input(err)
    }
}

impl From<CredentialError> for AppError {
    fn from(err: CredentialError) -> Self {
        AppError::Credential(err)
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        AppError::Token(err)
    }
}

impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        AppError::Store(err)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Store(err.into())
    }
}

// ============================================================================
// 3. HTTP RESPONSE MAPPING
// ============================================================================

/// JSON error body. `error`/`msg` is the shape existing clients read.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct ErrorResponse {
    pub error: bool,
    pub msg: String,
    /// Correlates the response with the server-side log line.
    pub error_id: String,
}

impl ErrorResponse {
    pub fn new(error_id: String, msg: String) -> Self {
        Self {
            error: true,
            msg,
            error_id,
        }
    }
}

/// Trait for converting errors to HTTP responses with proper logging
pub trait ErrorHandler {
    fn error_response(&self, request_id: &str) -> (StatusCode, ErrorResponse);
    fn log_error(&self, request_id: &str);
}

impl ErrorHandler for AppError {
    fn error_response(&self, request_id: &str) -> (StatusCode, ErrorResponse) {
        let status = ResponseError::status_code(self);
        let message = match self {
            AppError::Input(e) => e.to_string(),
            AppError::Credential(e) => e.to_string(),
            AppError::Token(e) => e.to_string(),
            // Never leak persistence or configuration details.
            AppError::Store(_) | AppError::Internal(_) => {
                GENERIC_FAILURE_MSG.to_string()
            }
        };

        (status, ErrorResponse::new(request_id.to_string(), message))
    }

    fn log_error(&self, request_id: &str) {
        match self {
            AppError::Input(e) => {
                tracing::warn!(request_id = request_id, error = %e, "Input error");
            }
            AppError::Credential(CredentialError::InvalidCredentials) => {
                tracing::warn!(request_id = request_id, "Invalid credentials attempt");
            }
            AppError::Credential(e) => {
                tracing::info!(request_id = request_id, error = %e, "Credential error");
            }
            AppError::Token(TokenError::Expired) => {
                tracing::info!(request_id = request_id, "Expired token rejected");
            }
            AppError::Token(e) => {
                tracing::warn!(request_id = request_id, error = %e, "Token rejected");
            }
            AppError::Store(e) => {
                tracing::error!(request_id = request_id, error = %e, "Store error");
            }
            AppError::Internal(msg) => {
                tracing::error!(request_id = request_id, error = %msg, "Internal error");
            }
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let request_id = uuid::Uuid::new_v4().to_string();
        self.log_error(&request_id);

        let (status, body) = <Self as ErrorHandler>::error_response(self, &request_id);

        let mut builder = HttpResponse::build(status);
        if let AppError::Token(e) = self {
            if e.clears_cookies() {
                for cookie in removal_cookies() {
                    builder.cookie(cookie);
                }
            }
        }
        builder.json(body)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Input(_) | AppError::Credential(_) => StatusCode::OK,
            AppError::Token(e) => e.status(),
            AppError::Store(DatabaseError::ConnectionPool(_)) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Store(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

// ============================================================================
// 4. ERROR CONTEXT ENRICHMENT
// ============================================================================

/// Per-operation context attached to handler log lines
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub request_id: String,
    pub user_id: Option<String>,
    pub operation: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ErrorContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            user_id: None,
            operation: operation.into(),
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Log `error` with this context and hand it back for `?`/`map_err`.
    pub fn record(&self, error: AppError) -> AppError {
        let context = serde_json::json!({
            "request_id": self.request_id,
            "operation": self.operation,
            "user_id": self.user_id,
            "timestamp": self.timestamp.to_rfc3339(),
        });

        match &error {
            AppError::Input(_) | AppError::Credential(_) | AppError::Token(_) => {
                tracing::warn!(error = %error, context = %context, "Request rejected");
            }
            _ => {
                tracing::error!(error = %error, context = %context, "Request failed");
            }
        }
        error
    }
}
