//! Authentication service routes

use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use chrono::Utc;
use common::connectivity::Link;
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    AppState,
    error::{ApiError, ApiResult},
    middleware::{AuthUser, auth_middleware},
    models::{
        AuthResponse, ChangePasswordRequest, DeleteAccountRequest, EmailRequest,
        LoginCredentials, NewUser, OtpPurpose, ResetPasswordRequest, UpdateProfile, User,
        VerifyEmailRequest, VerifyOtpRequest,
    },
    repositories::user::{is_unique_violation, verify_password},
    validation::{validate_email, validate_name, validate_otp, validate_password, validate_phone},
};

/// Create the router for the authentication service
pub fn create_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/api/users/profile/:id", put(update_profile))
        .route("/api/users/change-password/:id", put(change_password))
        .route("/api/users/delete-account/:id", delete(delete_account))
        .route("/api/email/send-verification-otp", post(send_verification_otp))
        .route("/api/email/verify-email", post(verify_email))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/users/register", post(register))
        .route("/api/users/login", post(login))
        .route("/api/users/profile/:id", get(get_profile))
        .route(
            "/api/email/send-forgot-password-otp",
            post(send_forgot_password_otp),
        )
        .route(
            "/api/email/verify-forgot-password-otp",
            post(verify_forgot_password_otp),
        )
        .route("/api/email/reset-password", post(reset_password))
        .merge(protected_routes)
        .with_state(state)
}

fn internal(context: &str) -> impl FnOnce(anyhow::Error) -> ApiError + '_ {
    move |e| {
        error!("{}: {}", context, e);
        ApiError::Internal
    }
}

async fn load_user(state: &AppState, id: Uuid) -> ApiResult<User> {
    state
        .user_repository
        .find_by_id(id)
        .await
        .map_err(internal("Failed to load user"))?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
}

fn check_password(user: &User, password: &str) -> ApiResult<bool> {
    verify_password(&user.password_hash, password).map_err(internal("Failed to verify password"))
}

fn issue_token(state: &AppState, user: &User) -> ApiResult<String> {
    state
        .jwt_service
        .generate_token(user.id, user.is_admin)
        .map_err(internal("Failed to generate token"))
}

/// Report database and cache reachability
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = common::database::health_check(&state.db_pool)
        .await
        .unwrap_or(false);
    let cache = state.redis_pool.health_check().await.unwrap_or(false);

    state.connectivity.mark(Link::Database, database);
    state.connectivity.mark(Link::Cache, cache);

    let status = if database {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if database && cache { "ok" } else { "degraded" },
            "database": database,
            "cache": cache,
            "timestamp": Utc::now(),
        })),
    )
}

/// Create an account and sign the new user in
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<NewUser>,
) -> ApiResult<impl IntoResponse> {
    validate_name(&payload.name)?;
    validate_email(&payload.email)?;
    validate_password(&payload.password)?;
    validate_phone(payload.phone.as_deref())?;

    info!("Registering user: {}", payload.email);

    let existing = state
        .user_repository
        .find_by_email(&payload.email)
        .await
        .map_err(internal("Failed to look up user"))?;
    if existing.is_some() {
        return Err(ApiError::Conflict("User already exists".to_string()));
    }

    let user = state
        .user_repository
        .create(&payload)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ApiError::Conflict("User already exists".to_string())
            } else {
                error!("Failed to create user: {}", e);
                ApiError::Internal
            }
        })?;

    let token = issue_token(&state, &user)?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user: user.profile(),
            token,
        }),
    ))
}

/// Exchange credentials for a token
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginCredentials>,
) -> ApiResult<Json<AuthResponse>> {
    let email = payload.email.trim().to_lowercase();
    validate_email(&email)?;

    if !state.login_limiter.is_allowed(&email).await {
        return Err(ApiError::TooManyRequests);
    }

    let invalid = || ApiError::Unauthorized("Invalid email or password".to_string());

    let user = state
        .user_repository
        .find_by_email(&email)
        .await
        .map_err(internal("Failed to look up user"))?
        .ok_or_else(invalid)?;

    if !check_password(&user, &payload.password)? {
        warn!("Failed login for {}", email);
        return Err(invalid());
    }

    state.login_limiter.reset(&email).await;
    let token = issue_token(&state, &user)?;
    info!("User logged in: {}", user.id);

    Ok(Json(AuthResponse {
        user: user.profile(),
        token,
    }))
}

/// Public profile of any user
pub async fn get_profile(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let user = load_user(&state, id).await?;
    Ok(Json(user.profile()))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProfile>,
) -> ApiResult<impl IntoResponse> {
    auth.ensure_owner(id)?;
    if let Some(name) = &payload.name {
        validate_name(name)?;
    }
    validate_phone(payload.phone.as_deref())?;

    let user = state
        .user_repository
        .update_profile(id, &payload)
        .await
        .map_err(internal("Failed to update profile"))?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(user.profile()))
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ChangePasswordRequest>,
) -> ApiResult<impl IntoResponse> {
    auth.ensure_owner(id)?;
    validate_password(&payload.new_password)?;

    let user = load_user(&state, id).await?;
    if !check_password(&user, &payload.current_password)? {
        return Err(ApiError::Unauthorized(
            "Current password is incorrect".to_string(),
        ));
    }

    state
        .user_repository
        .update_password(id, &payload.new_password)
        .await
        .map_err(internal("Failed to update password"))?;

    Ok(Json(json!({ "message": "Password changed successfully" })))
}

/// Close the account once the user is out of every active ride
///
/// Driven rides are cancelled, seats released and pending requests
/// withdrawn, so the other parties are notified before the account goes.
pub async fn delete_account(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<DeleteAccountRequest>,
) -> ApiResult<impl IntoResponse> {
    auth.ensure_owner(id)?;

    let user = load_user(&state, id).await?;
    if !check_password(&user, &payload.password)? {
        return Err(ApiError::Unauthorized("Password is incorrect".to_string()));
    }

    let ride_ids = state
        .rides
        .involving(id)
        .await
        .map_err(internal("Failed to look up rides"))?;
    let released = state.bookings.withdraw_user(&ride_ids, id).await?;
    info!("User {} released from {} rides", id, released);

    state
        .user_repository
        .close_account(id)
        .await
        .map_err(internal("Failed to delete account"))?;

    Ok(Json(json!({ "message": "Account deleted successfully" })))
}

async fn send_otp(state: &AppState, purpose: OtpPurpose, email: &str) -> ApiResult<()> {
    if !state.otp_limiter.is_allowed(email).await {
        return Err(ApiError::TooManyRequests);
    }

    let otp = state
        .otp_store
        .issue(purpose, email)
        .await
        .map_err(internal("Failed to store OTP"))?;

    state
        .email_service
        .send_otp(email, purpose, &otp)
        .await
        .map_err(|e| {
            error!("Failed to send {} email to {}: {}", purpose.as_str(), email, e);
            ApiError::UpstreamUnavailable("Failed to send email".to_string())
        })
}

pub async fn send_forgot_password_otp(
    State(state): State<AppState>,
    Json(payload): Json<EmailRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = payload.email.trim().to_lowercase();
    validate_email(&email)?;

    state
        .user_repository
        .find_by_email(&email)
        .await
        .map_err(internal("Failed to look up user"))?
        .ok_or_else(|| ApiError::NotFound("No account found with this email".to_string()))?;

    send_otp(&state, OtpPurpose::ForgotPassword, &email).await?;

    Ok(Json(json!({ "message": "OTP sent to your email" })))
}

pub async fn verify_forgot_password_otp(
    State(state): State<AppState>,
    Json(payload): Json<VerifyOtpRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = payload.email.trim().to_lowercase();
    validate_email(&email)?;
    validate_otp(&payload.otp)?;

    let valid = state
        .otp_store
        .verify(OtpPurpose::ForgotPassword, &email, &payload.otp)
        .await
        .map_err(internal("Failed to verify OTP"))?;
    if !valid {
        return Err(ApiError::Validation("Invalid or expired OTP".to_string()));
    }

    state
        .otp_store
        .grant_reset(&email)
        .await
        .map_err(internal("Failed to store reset grant"))?;

    Ok(Json(json!({ "message": "OTP verified successfully" })))
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = payload.email.trim().to_lowercase();
    validate_email(&email)?;
    validate_password(&payload.new_password)?;

    let granted = state
        .otp_store
        .take_reset_grant(&email)
        .await
        .map_err(internal("Failed to read reset grant"))?;
    if !granted {
        return Err(ApiError::Unauthorized(
            "Verify the OTP before resetting your password".to_string(),
        ));
    }

    let user = state
        .user_repository
        .find_by_email(&email)
        .await
        .map_err(internal("Failed to look up user"))?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    state
        .user_repository
        .update_password(user.id, &payload.new_password)
        .await
        .map_err(internal("Failed to update password"))?;

    info!("Password reset for user: {}", user.id);
    Ok(Json(json!({ "message": "Password reset successfully" })))
}

pub async fn send_verification_otp(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<impl IntoResponse> {
    let user = load_user(&state, auth.id).await?;
    if user.is_email_verified {
        return Err(ApiError::Conflict("Email is already verified".to_string()));
    }

    send_otp(&state, OtpPurpose::Verification, &user.email).await?;

    Ok(Json(json!({ "message": "Verification OTP sent to your email" })))
}

pub async fn verify_email(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(payload): Json<VerifyEmailRequest>,
) -> ApiResult<impl IntoResponse> {
    validate_otp(&payload.otp)?;
    let user = load_user(&state, auth.id).await?;

    let valid = state
        .otp_store
        .verify(OtpPurpose::Verification, &user.email, &payload.otp)
        .await
        .map_err(internal("Failed to verify OTP"))?;
    if !valid {
        return Err(ApiError::Validation("Invalid or expired OTP".to_string()));
    }

    state
        .user_repository
        .mark_email_verified(user.id)
        .await
        .map_err(internal("Failed to mark email verified"))?;

    let user = load_user(&state, auth.id).await?;
    Ok(Json(user.profile()))
}
