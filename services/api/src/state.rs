//! Application state shared across handlers

use std::sync::Arc;

use common::{
    booking_service::BookingService,
    cache::RedisPool,
    connectivity::ConnectivityState,
    jwt::JwtService,
    notifier::MessageNotifier,
    ride_cache::{CachedRides, RideCache},
};
use sqlx::PgPool;

use crate::repositories::{MessageRepository, RatingRepository, RideRepository, UserDirectory};

pub type RideBookings = BookingService<CachedRides, MessageNotifier>;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub redis_pool: RedisPool,
    pub jwt_service: JwtService,
    pub connectivity: ConnectivityState,
    pub rides: CachedRides,
    pub bookings: Arc<RideBookings>,
    pub users: UserDirectory,
    pub messages: MessageRepository,
    pub ratings: RatingRepository,
}

impl AppState {
    pub fn new(
        db_pool: PgPool,
        redis_pool: RedisPool,
        jwt_service: JwtService,
        connectivity: ConnectivityState,
    ) -> Self {
        let users = UserDirectory::new(db_pool.clone());
        let messages = MessageRepository::new(db_pool.clone());
        let rides = CachedRides::new(
            RideRepository::new(db_pool.clone()),
            RideCache::new(redis_pool.clone(), connectivity.clone()),
        );
        let bookings = Arc::new(BookingService::new(
            rides.clone(),
            MessageNotifier::new(users.clone(), messages.clone()),
        ));

        Self {
            ratings: RatingRepository::new(db_pool.clone()),
            db_pool,
            redis_pool,
            jwt_service,
            connectivity,
            rides,
            bookings,
            users,
            messages,
        }
    }
}
