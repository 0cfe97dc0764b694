/// Error types for Discussion Service
///
/// Every operation reports failures to the caller instead of retrying
/// internally. `Persistence` is the only variant a caller may retry as-is;
/// `AggregationFailed` means the ledger changed but the denormalized score
/// did not, so the displayed count is stale until the next recompute.
use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use thiserror::Error;
use uuid::Uuid;

use crate::auth::AuthError;
use crate::store::StoreError;

/// Result type for discussion-service operations
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    /// Vote value other than +1 / -1
    #[error("Invalid vote value: {0} (expected 1 or -1)")]
    InvalidVoteValue(i32),

    #[error("Post not found: {0}")]
    PostNotFound(Uuid),

    #[error("User not found: {0}")]
    UserNotFound(String),

    /// Storage collaborator failed or timed out
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Ledger mutation succeeded, score recompute did not
    #[error("Vote recorded but recompute failed for post {post_id}: {reason}")]
    AggregationFailed { post_id: Uuid, reason: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Duplicate resource (username already taken, etc.)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Auth collaborator rejected the request
    #[error("Authentication failed: {0}")]
    Auth(String),
}

impl AppError {
    /// Whether the whole operation may be retried unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Persistence(_))
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidVoteValue(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::PostNotFound(_) | AppError::UserNotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) | AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Persistence(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::AggregationFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();

        HttpResponse::build(status).json(serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
            "retryable": self.is_retryable(),
        }))
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => AppError::Conflict(msg),
            other => AppError::Persistence(other.to_string()),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::EmailTaken(email) => {
                AppError::Conflict(format!("email already registered: {}", email))
            }
            other => AppError::Auth(other.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn store_timeouts_are_retryable_persistence_errors() {
        let err: AppError = StoreError::Timeout(Duration::from_millis(50)).into();
        assert!(matches!(err, AppError::Persistence(_)));
        assert!(err.is_retryable());
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn store_conflicts_map_to_conflict() {
        let err: AppError = StoreError::Conflict("username taken".into()).into();
        assert!(matches!(err, AppError::Conflict(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn aggregation_failure_is_not_retryable() {
        let err = AppError::AggregationFailed {
            post_id: Uuid::nil(),
            reason: "write-back failed".into(),
        };
        assert!(!err.is_retryable());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
