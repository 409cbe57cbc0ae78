use std::time::Duration;

use anyhow::Result;
use axum::http::{HeaderValue, Method, header};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod error;
mod middleware;
mod models;
mod repositories;
mod routes;
mod state;

use common::{
    cache::{RedisConfig, RedisPool},
    connectivity::{ConnectivityState, spawn_monitor},
    database::{self, DatabaseConfig},
    jwt::{JwtConfig, JwtService},
    settings::ServerSettings,
};

use crate::state::AppState;

fn cors_layer(settings: &ServerSettings) -> CorsLayer {
    let origins: Vec<HeaderValue> = settings
        .cors_origins()
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    if origins.is_empty() {
        warn!("No valid CORS origins configured; cross-origin requests will be refused");
    }

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

    info!("Starting API service");

    let settings = ServerSettings::load(3001)?;

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
    let redis_pool = RedisPool::new(&RedisConfig::from_env()?).await?;
    let jwt_service = JwtService::new(&JwtConfig::from_env()?);

    let connectivity = ConnectivityState::new();
    spawn_monitor(
        connectivity.clone(),
        pool.clone(),
        redis_pool.clone(),
        Duration::from_secs(settings.connectivity_check_secs),
    );

    let app_state = AppState::new(pool, redis_pool, jwt_service, connectivity);

    info!("API service initialized successfully");

    let app = routes::create_router(app_state)
        .layer(cors_layer(&settings))
        .layer(TraceLayer::new_for_http());

    let address = settings.bind_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!("API service listening on {}", address);

    axum::serve(listener, app).await?;

    Ok(())
}
