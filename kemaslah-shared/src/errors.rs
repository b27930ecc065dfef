use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::pages::Page;

/// Application error codes following the pattern E{area}{sequence}
///
/// Ranges:
/// - E0xxx: Shared/infrastructure errors
/// - E1xxx: Credential and registration errors
/// - E2xxx: Password reset errors
/// - E3xxx: Browser login handshake errors
/// - E4xxx: Email dispatch errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Shared (E0xxx)
    InternalError,
    ValidationError,
    BadRequest,

    // Credentials (E1xxx)
    InvalidCredentials,
    UsernameAlreadyExists,
    EmailAlreadyExists,
    EmailNotVerified,
    InvalidEmail,
    PasswordTooWeak,
    PasswordMismatch,

    // Password reset (E2xxx)
    OtpInvalid,

    // Login handshake (E3xxx)
    OAuthError,
    LoginStateInvalid,
    LoginInProgress,
    LoginTimedOut,

    // Email (E4xxx)
    EmailDeliveryFailed,
}

impl ErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            // Shared
            Self::InternalError => "E0001",
            Self::ValidationError => "E0002",
            Self::BadRequest => "E0003",

            // Credentials
            Self::InvalidCredentials => "E1001",
            Self::UsernameAlreadyExists => "E1002",
            Self::EmailAlreadyExists => "E1003",
            Self::EmailNotVerified => "E1004",
            Self::InvalidEmail => "E1005",
            Self::PasswordTooWeak => "E1006",
            Self::PasswordMismatch => "E1007",

            // Password reset
            Self::OtpInvalid => "E2001",

            // Login handshake
            Self::OAuthError => "E3001",
            Self::LoginStateInvalid => "E3002",
            Self::LoginInProgress => "E3003",
            Self::LoginTimedOut => "E3004",

            // Email
            Self::EmailDeliveryFailed => "E4001",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::EmailDeliveryFailed => StatusCode::SERVICE_UNAVAILABLE,
            Self::ValidationError | Self::BadRequest | Self::InvalidEmail
            | Self::PasswordTooWeak | Self::PasswordMismatch | Self::LoginStateInvalid => StatusCode::BAD_REQUEST,
            Self::InvalidCredentials | Self::EmailNotVerified | Self::OtpInvalid => StatusCode::UNAUTHORIZED,
            Self::UsernameAlreadyExists | Self::EmailAlreadyExists | Self::LoginInProgress => StatusCode::CONFLICT,
            Self::OAuthError => StatusCode::BAD_GATEWAY,
            Self::LoginTimedOut => StatusCode::REQUEST_TIMEOUT,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    Known {
        code: ErrorCode,
        message: String,
    },

    #[error("internal error")]
    Internal(#[from] anyhow::Error),

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Known {
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Known { code, .. } => *code,
            AppError::Internal(_) | AppError::Database(_) => ErrorCode::InternalError,
            AppError::Validation(_) => ErrorCode::ValidationError,
        }
    }

    /// Text safe to show an end user. Storage and internal failures collapse
    /// into one generic sentence.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Known { code: ErrorCode::InternalError, .. }
            | AppError::Internal(_)
            | AppError::Database(_) => "Something went wrong. Please try again.".to_string(),
            AppError::Known { message, .. } => message.clone(),
            AppError::Validation(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AppError::Known { code, message } => {
                if code.status_code().is_server_error() {
                    tracing::error!(code = code.code(), error = %message, "request failed");
                } else {
                    tracing::warn!(code = code.code(), error = %message, "request rejected");
                }
                (code.status_code(), code.code())
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "E0001")
            }
            AppError::Database(err) => {
                tracing::error!(error = %err, "database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "E0001")
            }
            AppError::Validation(msg) => {
                tracing::warn!(error = %msg, "validation failed");
                (StatusCode::BAD_REQUEST, "E0002")
            }
        };

        let page = Page::failure("Something Went Wrong", &self.user_message()).with_reference(code);
        (status, page).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
