//! Client error types

use common::error::BookingError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum ClientError {
    /// The backend answered with an error status
    #[error("{message} (HTTP {status})")]
    Api { status: u16, message: String },

    /// The request never got an answer
    #[error("Backend unreachable: {0}")]
    Transport(#[source] reqwest::Error),

    /// The backend answered with a body that could not be decoded
    #[error("Unexpected response from backend: {0}")]
    Decode(#[source] reqwest::Error),

    /// The offline transition was rejected by the booking rules
    #[error(transparent)]
    Booking(#[from] BookingError),

    /// Offline, and no local copy of the ride to work on
    #[error("Ride {0} is not available offline")]
    NotCached(Uuid),
}

impl ClientError {
    /// Whether the failure means the backend could not be reached
    pub fn is_offline(&self) -> bool {
        matches!(self, ClientError::Transport(_) | ClientError::NotCached(_))
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
