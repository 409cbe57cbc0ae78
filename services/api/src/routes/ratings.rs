//! Rating handlers

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use common::models::{NewRating, Rating};
use uuid::Uuid;

use super::storage_error;
use crate::{
    error::{ApiError, ApiResult},
    middleware::AuthUser,
    repositories::CreateRating,
    state::AppState,
};

pub async fn create_rating(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(payload): Json<NewRating>,
) -> ApiResult<impl IntoResponse> {
    if payload.rater_id != auth.id {
        return Err(ApiError::Unauthorized(
            "You can only submit ratings as yourself".to_string(),
        ));
    }
    payload.validate()?;

    let ratee_exists = state
        .users
        .exists(payload.ratee_id)
        .await
        .map_err(storage_error("Failed to look up rated user"))?;
    if !ratee_exists {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    let created = state
        .ratings
        .create(&payload)
        .await
        .map_err(storage_error("Failed to create rating"))?;

    match created {
        CreateRating::Created(rating) => Ok((StatusCode::CREATED, Json(rating))),
        CreateRating::Duplicate => Err(ApiError::Conflict(
            "You have already rated this user for this ride".to_string(),
        )),
        CreateRating::RideNotFound => Err(ApiError::NotFound("Ride not found".to_string())),
    }
}

/// Ratings the user received, newest first
pub async fn user_ratings(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Rating>>> {
    let ratings = state
        .ratings
        .for_user(user_id)
        .await
        .map_err(storage_error("Failed to load ratings"))?;

    Ok(Json(ratings))
}
