//! Custom error types for the common library
//!
//! `DatabaseError` covers connection and migration failures of the shared
//! PostgreSQL pool. `BookingError` is the failure taxonomy of the booking
//! state machine; every variant is returned before the ride is mutated.

use sqlx::Error as SqlxError;
use thiserror::Error;
use uuid::Uuid;

/// Custom error type for database operations
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error occurred during database connection
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    /// Error occurred during database query execution
    #[error("Database query error: {0}")]
    Query(#[source] SqlxError),

    /// Error occurred during database migration
    #[error("Database migration error: {0}")]
    Migration(String),

    /// Configuration error
    #[error("Database configuration error: {0}")]
    Configuration(String),
}

/// Type alias for Result with DatabaseError
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Errors raised by ride transitions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BookingError {
    /// The referenced ride, request or passenger does not exist
    #[error("{0} not found")]
    NotFound(&'static str),

    /// The actor may not perform this action on the ride
    #[error("{0}")]
    Unauthorized(&'static str),

    /// Capacity is exhausted
    #[error("No seats available on this ride")]
    NoSeatsAvailable,

    /// The ride has been cancelled or completed
    #[error("Ride {0} is no longer active")]
    RideNotActive(Uuid),

    /// The user is already a confirmed passenger
    #[error("You have already booked this ride")]
    AlreadyBooked,

    /// The user already has a pending request for this ride
    #[error("You already have a pending request for this ride")]
    AlreadyRequested,

    /// The booking request was already accepted or declined
    #[error("Booking request has already been {0}")]
    AlreadyResolved(&'static str),

    /// Drivers cannot book their own rides
    #[error("You cannot book your own ride")]
    OwnRide,

    /// Malformed ride data
    #[error("{0}")]
    Validation(String),
}
