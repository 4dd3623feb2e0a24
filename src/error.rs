use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Errors surfaced by impersonation operations.
///
/// Only client-facing failures live here. Tampered tokens and credentials
/// that no longer match the authenticated user are recovered inside the
/// session manager and never become an `ImpersonationError`.
#[derive(Debug, thiserror::Error)]
pub enum ImpersonationError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// JSON body returned for failed requests.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    error: String,
    error_id: String,
}

impl ImpersonationError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether the transport must also drop any impersonation cookie the
    /// client holds when this error is returned.
    #[must_use]
    pub fn clears_session(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) | Self::Anyhow(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message that is safe to hand to the client.
    ///
    /// Client errors carry user-safe text already. Server errors are replaced
    /// with a generic message (CWE-209); the details only reach the log.
    fn safe_message(&self) -> String {
        match self {
            Self::BadRequest(msg) => format!("Bad request: {}", msg),
            Self::Unauthorized(msg) => format!("Unauthorized: {}", msg),
            Self::Forbidden(msg) => format!("Forbidden: {}", msg),
            Self::NotFound(msg) => format!("Not found: {}", msg),
            Self::Conflict(msg) => format!("Conflict: {}", msg),
            Self::Internal(_) | Self::Anyhow(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for ImpersonationError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_id = uuid::Uuid::new_v4().to_string();

        if status.is_server_error() {
            tracing::error!(
                status = status.as_u16(),
                error_id = %error_id,
                error = %self,
                "Request failed"
            );
        } else {
            tracing::debug!(
                status = status.as_u16(),
                error_id = %error_id,
                error = %self,
                "Request rejected"
            );
        }

        let body = Json(ErrorResponse {
            error: self.safe_message(),
            error_id,
        });

        (status, body).into_response()
    }
}

/// Result type alias for impersonation operations
pub type Result<T> = std::result::Result<T, ImpersonationError>;
