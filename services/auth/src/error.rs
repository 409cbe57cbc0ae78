//! Error type returned by the authentication handlers

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::booking_service::ServiceError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Validation(String),

    #[error("Too many attempts, please try again later")]
    TooManyRequests,

    #[error("{0}")]
    UpstreamUnavailable(String),

    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ApiError::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "not_found",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::Conflict(_) => "conflict",
            ApiError::Validation(_) => "validation",
            ApiError::TooManyRequests => "too_many_requests",
            ApiError::UpstreamUnavailable(_) => "upstream_unavailable",
            ApiError::Internal => "internal",
        }
    }
}

impl From<String> for ApiError {
    fn from(message: String) -> Self {
        ApiError::Validation(message)
    }
}

/// Failures while taking a closing account out of its rides
impl From<ServiceError> for ApiError {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::Conflict => ApiError::Conflict(ServiceError::Conflict.to_string()),
            other => {
                error!("Failed to release rides: {}", other);
                ApiError::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "message": self.to_string(),
            "error": self.code(),
        }));

        (self.status(), body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::NotFound("User not found".into()).into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::TooManyRequests.into_response().status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            ApiError::UpstreamUnavailable("Failed to send email".into())
                .into_response()
                .status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_validation_messages_convert() {
        let error: ApiError = "Invalid email format".to_string().into();
        assert!(matches!(error, ApiError::Validation(ref m) if m == "Invalid email format"));
    }

    #[test]
    fn test_ride_release_failures() {
        assert!(matches!(ApiError::from(ServiceError::Conflict), ApiError::Conflict(_)));
        assert!(matches!(
            ApiError::from(ServiceError::Storage(anyhow::anyhow!("connection refused"))),
            ApiError::Internal
        ));
    }
}
