//! Typed HTTP client for the rideshare API
//!
//! [`RideClient`] keeps a read-through cache of rides by id and reports
//! backend reachability through a shared [`ConnectivityState`]. When a booking
//! action cannot reach the backend at all, the booking state machine is
//! applied to the last known copy of the ride and the result is handed back as
//! [`BookingOutcome::LocalOnly`]. That copy is never cached or persisted.
//!
//! ```rust,no_run
//! use client::{BookingOutcome, RideClient};
//! use common::connectivity::ConnectivityState;
//! use uuid::Uuid;
//!
//! # async fn run(ride_id: Uuid, me: Uuid, token: String) -> Result<(), client::ClientError> {
//! let client = RideClient::new("http://localhost:3001", ConnectivityState::new()).with_token(token);
//!
//! let ride = client.get_ride(ride_id).await?;
//! println!("{} seats left to {}", ride.available_seats, ride.to.name);
//!
//! match client.book(ride_id, me, None).await? {
//!     BookingOutcome::Persisted(ride) => println!("booked, {} seats left", ride.available_seats),
//!     BookingOutcome::LocalOnly(_) => println!("offline, booking not saved"),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! [`ConnectivityState`]: common::connectivity::ConnectivityState

mod error;
mod rides;

pub use error::{ClientError, ClientResult};
pub use rides::{BookingOutcome, RideClient};
