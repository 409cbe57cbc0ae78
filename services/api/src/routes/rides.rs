//! Ride publishing, search and booking handlers

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use common::{
    booking::Command,
    booking_service::Outcome,
    models::{
        BookRideRequest, CancelRideRequest, NewRide, ResolveRequestBody, Ride,
        RideActionResponse, RideUpdate,
    },
    search::RideFilter,
};
use tracing::info;
use uuid::Uuid;

use super::storage_error;
use crate::{
    error::{ApiError, ApiResult},
    middleware::AuthUser,
    state::AppState,
};

/// Tokens outlive a closed account; its holder may no longer publish or book
async fn ensure_open_account(state: &AppState, user_id: Uuid) -> ApiResult<()> {
    let open = state
        .users
        .exists(user_id)
        .await
        .map_err(storage_error("Failed to look up account"))?;
    if !open {
        return Err(ApiError::Forbidden("This account has been closed".to_string()));
    }
    Ok(())
}

fn action_response(outcome: Outcome) -> Json<RideActionResponse> {
    Json(RideActionResponse {
        message: outcome.transition.summary().to_string(),
        ride: outcome.ride,
    })
}

/// Active rides, earliest departure first
pub async fn list_rides(State(state): State<AppState>) -> ApiResult<Json<Vec<Ride>>> {
    let rides = state
        .rides
        .repository()
        .list_active()
        .await
        .map_err(storage_error("Failed to list rides"))?;

    Ok(Json(rides))
}

/// Route search with the secondary filters applied server-side
pub async fn search_rides(
    State(state): State<AppState>,
    Query(filter): Query<RideFilter>,
) -> ApiResult<Json<Vec<Ride>>> {
    let rides = state
        .rides
        .repository()
        .search(filter.from.as_deref(), filter.to.as_deref())
        .await
        .map_err(storage_error("Failed to search rides"))?;

    let verified = if filter.wants_verified_driver() {
        let drivers: Vec<Uuid> = rides.iter().map(|ride| ride.driver_id).collect();
        state
            .users
            .verified(&drivers)
            .await
            .map_err(storage_error("Failed to look up verified drivers"))?
    } else {
        Default::default()
    };

    Ok(Json(filter.apply(rides, |driver| verified.contains(&driver))))
}

pub async fn get_ride(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Ride>> {
    let ride = state
        .rides
        .get(id)
        .await
        .map_err(storage_error("Failed to load ride"))?
        .ok_or_else(|| ApiError::NotFound("Ride not found".to_string()))?;

    Ok(Json(ride))
}

pub async fn driver_rides(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Ride>>> {
    let rides = state
        .rides
        .repository()
        .by_driver(user_id)
        .await
        .map_err(storage_error("Failed to list driver rides"))?;

    Ok(Json(rides))
}

/// Rides the user is a confirmed passenger on
pub async fn passenger_rides(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Ride>>> {
    auth.ensure_self(user_id)?;

    let rides = state
        .rides
        .repository()
        .by_passenger(user_id)
        .await
        .map_err(storage_error("Failed to list booked rides"))?;

    Ok(Json(rides))
}

/// Publish a ride driven by the caller
pub async fn create_ride(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(payload): Json<NewRide>,
) -> ApiResult<impl IntoResponse> {
    payload.validate()?;
    ensure_open_account(&state, auth.id).await?;

    let ride = state
        .rides
        .insert(&payload.into_ride(auth.id, Utc::now()))
        .await
        .map_err(storage_error("Failed to publish ride"))?;

    info!("Ride {} published by {}", ride.id, auth.id);
    Ok((StatusCode::CREATED, Json(ride)))
}

pub async fn update_ride(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(update): Json<RideUpdate>,
) -> ApiResult<Json<Ride>> {
    let ride = state.bookings.update_details(id, auth.id, update).await?;
    Ok(Json(ride))
}

/// Book a seat, or request one when the ride needs approval
pub async fn book_ride(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<BookRideRequest>,
) -> ApiResult<Json<RideActionResponse>> {
    let user_id = auth.actor(payload.user_id)?;
    ensure_open_account(&state, user_id).await?;
    let message = payload
        .message
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty());

    let outcome = state
        .bookings
        .execute(id, Command::Book { user_id, message })
        .await?;

    Ok(action_response(outcome))
}

/// Driver cancels the ride; a passenger cancels their own booking
pub async fn cancel_ride(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CancelRideRequest>,
) -> ApiResult<Json<RideActionResponse>> {
    let actor = auth.actor(payload.user_id)?;

    let outcome = state
        .bookings
        .execute(
            id,
            Command::Cancel {
                actor,
                reason: payload.reason,
            },
        )
        .await?;

    Ok(action_response(outcome))
}

pub async fn resolve_request(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path((id, request_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<ResolveRequestBody>,
) -> ApiResult<Json<RideActionResponse>> {
    let outcome = state
        .bookings
        .execute(
            id,
            Command::Resolve {
                actor: auth.id,
                request_id,
                decision: payload.decision,
            },
        )
        .await?;

    Ok(action_response(outcome))
}

pub async fn remove_passenger(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path((id, passenger_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<RideActionResponse>> {
    let outcome = state
        .bookings
        .execute(
            id,
            Command::RemovePassenger {
                actor: auth.id,
                passenger_id,
            },
        )
        .await?;

    Ok(action_response(outcome))
}
