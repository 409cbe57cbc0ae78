//! Shared data model
//!
//! These types are the JSON wire format of both services (camelCase field
//! names) and the in-memory form the booking state machine operates on.

pub mod message;
pub mod rating;
pub mod ride;
pub mod user;

// Re-export for convenience
pub use message::{ConversationSummary, Message, NewMessage};
pub use rating::{NewRating, Rating, RatingType};
pub use ride::{
    Amenities, BookRideRequest, BookingRequest, BookingRequestStatus, CancelRideRequest,
    CapacityState, Location, NewRide, PaymentType, ResolveRequestBody, Ride, RideActionResponse,
    RideStatus, RideUpdate, Vehicle,
};
pub use user::{Contact, UserProfile};
