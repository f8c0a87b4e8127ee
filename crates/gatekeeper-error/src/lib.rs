use axum::{
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::Level;

pub type AppResult<T> = Result<T, AppError>;

/// Gateway error taxonomy
///
/// Every pipeline stage converts its own failure into one of these variants;
/// the variant alone decides the HTTP status, the log level and the body.
#[derive(Error, Debug)]
pub enum AppError {
    // ===== Identity Verification =====
    #[error("Missing credential")]
    AuthMissing,

    #[error("Malformed credential")]
    AuthMalformed,

    #[error("Invalid credential: {0}")]
    AuthInvalid(String),

    // ===== Admission Control =====
    #[error("Rate limit exceeded, retry after {retry_after}s")]
    RateLimited { retry_after: u64 },

    #[error("Rate limiter unavailable: {0}")]
    LimiterUnavailable(String),

    // ===== Downstream =====
    #[error("Downstream service unavailable: {0}")]
    DownstreamUnavailable(String),

    #[error("Downstream service timed out after {0}ms")]
    DownstreamTimeout(u64),

    // ===== Validation Errors =====
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Request body exceeds {0} bytes")]
    PayloadTooLarge(usize),

    // ===== Internal Server Errors =====
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Unknown error: {0}")]
    Unknown(#[from] anyhow::Error),
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::AuthMissing | AppError::AuthMalformed => StatusCode::UNAUTHORIZED,
            AppError::AuthInvalid(_) => StatusCode::FORBIDDEN,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::LimiterUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::DownstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            AppError::DownstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Internal(_) | AppError::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get a user-friendly error message (without sensitive details)
    pub fn user_message(&self) -> String {
        match self {
            AppError::AuthMissing => "No token provided".to_string(),
            AppError::AuthMalformed => "Malformed token".to_string(),
            AppError::AuthInvalid(_) => "Failed to authenticate token".to_string(),
            AppError::RateLimited { .. } => "Too Many Requests".to_string(),
            AppError::LimiterUnavailable(_) => {
                "Internal Server Error during Rate Check".to_string()
            }
            AppError::DownstreamUnavailable(_) => "Downstream service unavailable".to_string(),
            AppError::DownstreamTimeout(_) => "Downstream service timed out".to_string(),
            AppError::Validation(msg) => msg.clone(),
            AppError::PayloadTooLarge(limit) => format!("Request body exceeds {} bytes", limit),
            _ => "Internal server error".to_string(),
        }
    }

    /// Get error code for programmatic error handling
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::AuthMissing => "AUTH_MISSING",
            AppError::AuthMalformed => "AUTH_MALFORMED",
            AppError::AuthInvalid(_) => "AUTH_INVALID",
            AppError::RateLimited { .. } => "RATE_LIMIT_EXCEEDED",
            AppError::LimiterUnavailable(_) => "LIMITER_UNAVAILABLE",
            AppError::DownstreamUnavailable(_) => "BAD_GATEWAY",
            AppError::DownstreamTimeout(_) => "GATEWAY_TIMEOUT",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            AppError::Internal(_) => "INTERNAL_ERROR",
            AppError::Unknown(_) => "UNKNOWN_ERROR",
        }
    }

    /// Level this error is logged at, if any
    ///
    /// Rate limit denials return `None`: the rate limit stage logs them with
    /// the user, path and remaining tokens.
    pub fn log_level(&self) -> Option<Level> {
        let status = self.status_code();
        if matches!(self, AppError::RateLimited { .. }) {
            None
        } else if status.is_server_error() {
            Some(Level::ERROR)
        } else if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            Some(Level::WARN)
        } else {
            Some(Level::DEBUG)
        }
    }

    /// Log this error with appropriate level and context
    pub fn log(&self) {
        let status = self.status_code();
        let code = self.error_code();

        let Some(level) = self.log_level() else {
            return;
        };

        if level == Level::ERROR {
            tracing::error!(
                error = %self,
                error_code = %code,
                status = %status.as_u16(),
                "Server error occurred"
            );
        } else if level == Level::WARN {
            tracing::warn!(
                error = %self,
                error_code = %code,
                "Authentication failed"
            );
        } else {
            tracing::debug!(
                error = %self,
                error_code = %code,
                "Client error occurred"
            );
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.log();

        let status = self.status_code();
        let error_code = self.error_code();

        // user_message() never carries internal details for server errors
        let mut body = json!({
            "error": self.user_message(),
            "error_code": error_code,
            "status": status.as_u16(),
        });

        let retry_after = match self {
            AppError::RateLimited { retry_after } => {
                body["retryAfter"] = json!(retry_after);
                Some(retry_after)
            }
            _ => None,
        };

        let mut response = (status, axum::Json(body)).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

// ============================================================================
// Helper functions for creating common errors
// ============================================================================

impl AppError {
    /// Create an invalid credential error (403)
    pub fn auth_invalid(msg: impl Into<String>) -> Self {
        AppError::AuthInvalid(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    /// Create a limiter infrastructure failure (fail closed, 500)
    pub fn limiter_unavailable(msg: impl Into<String>) -> Self {
        AppError::LimiterUnavailable(msg.into())
    }

    /// Create a bad gateway error
    pub fn downstream_unavailable(msg: impl Into<String>) -> Self {
        AppError::DownstreamUnavailable(msg.into())
    }

    /// Create an internal server error
    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::Internal(msg.into())
    }
}
