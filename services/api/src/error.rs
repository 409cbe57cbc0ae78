//! Custom error types for the API service

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::{booking_service::ServiceError, error::BookingError};
use serde_json::json;
use thiserror::Error;

/// Custom error type for the API service
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    /// Ride capacity or state conflicts, duplicates and lost write races
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Validation(String),

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
            ApiError::UpstreamUnavailable(_) => "upstream_unavailable",
            ApiError::Internal => "internal",
        }
    }
}

impl From<BookingError> for ApiError {
    fn from(error: BookingError) -> Self {
        let message = error.to_string();
        match error {
            BookingError::NotFound(_) => ApiError::NotFound(message),
            BookingError::Unauthorized(_) => ApiError::Unauthorized(message),
            BookingError::NoSeatsAvailable
            | BookingError::RideNotActive(_)
            | BookingError::AlreadyBooked
            | BookingError::AlreadyRequested
            | BookingError::AlreadyResolved(_)
            | BookingError::OwnRide => ApiError::Conflict(message),
            BookingError::Validation(_) => ApiError::Validation(message),
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::Booking(error) => error.into(),
            ServiceError::Conflict => ApiError::Conflict(ServiceError::Conflict.to_string()),
            ServiceError::Storage(e) => {
                tracing::error!("Ride storage failed: {:#}", e);
                ApiError::UpstreamUnavailable("Ride storage is unavailable".to_string())
            }
        }
    }
}

impl From<String> for ApiError {
    fn from(message: String) -> Self {
        ApiError::Validation(message)
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

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;
