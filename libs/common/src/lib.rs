//! Common library for the rideshare services
//!
//! This crate provides shared functionality used by the `auth` and `api`
//! services and by the typed client: the ride data model, the booking state
//! machine and the service that commits it, ride and message storage,
//! search filtering, notification wording, database and cache connectivity,
//! JWT handling and service settings.
//!
//! ```rust,no_run
//! use common::database::{DatabaseConfig, health_check, init_pool, run_migrations};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DatabaseConfig::from_env()?;
//!     let pool = init_pool(&config).await?;
//!     run_migrations(&pool).await?;
//!     println!("Database health check: {}", health_check(&pool).await?);
//!     Ok(())
//! }
//! ```

pub mod booking;
pub mod booking_service;
pub mod cache;
pub mod connectivity;
pub mod database;
pub mod error;
pub mod jwt;
pub mod models;
pub mod notifications;
pub mod notifier;
pub mod repositories;
pub mod ride_cache;
pub mod search;
pub mod settings;
