//! Repositories for database operations

pub mod ratings;

pub use common::repositories::{MessageRepository, RideRepository, UserDirectory};
pub use ratings::{CreateRating, RatingRepository};
