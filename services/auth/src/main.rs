use std::{sync::Arc, time::Duration};

use anyhow::Result;
use axum::http::{HeaderValue, Method, header};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod email;
mod error;
mod middleware;
mod models;
mod otp;
mod rate_limiter;
mod repositories;
mod routes;
mod validation;

use common::{
    booking_service::BookingService,
    cache::{RedisConfig, RedisPool},
    connectivity::{ConnectivityState, spawn_monitor},
    database::{self, DatabaseConfig},
    jwt::{JwtConfig, JwtService},
    notifier::MessageNotifier,
    repositories::{MessageRepository, RideRepository, UserDirectory},
    ride_cache::{CachedRides, RideCache},
    settings::ServerSettings,
};
use sqlx::PgPool;

use crate::{
    email::{EmailConfig, EmailService},
    otp::OtpStore,
    rate_limiter::{RateLimiter, RateLimiterConfig},
    repositories::UserRepository,
};

pub type RideBookings = BookingService<CachedRides, MessageNotifier>;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub redis_pool: RedisPool,
    pub jwt_service: JwtService,
    pub user_repository: UserRepository,
    pub login_limiter: RateLimiter,
    pub otp_limiter: RateLimiter,
    pub otp_store: OtpStore,
    pub email_service: EmailService,
    pub connectivity: ConnectivityState,
    /// Rides a closing account is still part of
    pub rides: RideRepository,
    pub bookings: Arc<RideBookings>,
}

fn cors_layer(settings: &ServerSettings) -> CorsLayer {
    let origins: Vec<HeaderValue> = settings
        .cors_origins()
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting authentication service");

    let settings = ServerSettings::load(3000)?;

    // Database
    let db_config = DatabaseConfig::from_env()?;
    let pool = database::init_pool(&db_config).await?;

    if database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    database::run_migrations(&pool).await?;

    // Redis
    let redis_config = RedisConfig::from_env()?;
    let redis_pool = RedisPool::new(&redis_config).await?;

    let jwt_service = JwtService::new(&JwtConfig::from_env()?);

    let email_config = EmailConfig::from_env()?;
    if !email_config.is_configured() {
        warn!("EMAIL_HOST is not set; one-time passwords will not be emailed");
    }

    let connectivity = ConnectivityState::new();
    spawn_monitor(
        connectivity.clone(),
        pool.clone(),
        redis_pool.clone(),
        Duration::from_secs(settings.connectivity_check_secs),
    );

    let rides = RideRepository::new(pool.clone());
    let bookings = Arc::new(BookingService::new(
        CachedRides::new(
            rides.clone(),
            RideCache::new(redis_pool.clone(), connectivity.clone()),
        ),
        MessageNotifier::new(
            UserDirectory::new(pool.clone()),
            MessageRepository::new(pool.clone()),
        ),
    ));

    let app_state = AppState {
        user_repository: UserRepository::new(pool.clone()),
        rides,
        bookings,
        db_pool: pool,
        otp_store: OtpStore::new(redis_pool.clone()),
        redis_pool,
        jwt_service,
        login_limiter: RateLimiter::new(RateLimiterConfig::login()),
        otp_limiter: RateLimiter::new(RateLimiterConfig::otp()),
        email_service: EmailService::new(email_config),
        connectivity,
    };

    info!("Authentication service initialized successfully");

    let app = routes::create_router(app_state)
        .layer(cors_layer(&settings))
        .layer(TraceLayer::new_for_http());

    let address = settings.bind_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!("Authentication service listening on {}", address);

    axum::serve(listener, app).await?;

    Ok(())
}
