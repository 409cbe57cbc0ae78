//! Booking state machine
//!
//! Pure transitions over an in-memory [`Ride`]. Each operation checks every
//! precondition before touching the ride, so an `Err` always leaves the ride
//! exactly as it was. Persisting the result (and guarding it against
//! concurrent writers) is the caller's job.
//!
//! Seat invariant: `available_seats + passengers.len()` is preserved by every
//! transition in this module. Only [`update_ride_details`] may change it, when
//! the driver edits the seat count explicitly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::BookingError,
    models::{BookingRequest, BookingRequestStatus, Ride, RideStatus, RideUpdate},
};

/// Driver's answer to a pending booking request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Accept,
    Decline,
}

/// An action requested on a ride
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Passenger books (instant rides) or requests a seat (approval rides)
    Book {
        user_id: Uuid,
        message: Option<String>,
    },
    /// Driver accepts or declines a pending request
    Resolve {
        actor: Uuid,
        request_id: Uuid,
        decision: Decision,
    },
    /// Driver cancels the ride, or a passenger cancels their own booking
    Cancel { actor: Uuid, reason: String },
    /// Driver evicts a confirmed passenger
    RemovePassenger { actor: Uuid, passenger_id: Uuid },
}

/// What a successful command did to the ride
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Booked {
        passenger_id: Uuid,
    },
    Requested {
        passenger_id: Uuid,
        request_id: Uuid,
        message: Option<String>,
    },
    RequestAccepted {
        passenger_id: Uuid,
        request_id: Uuid,
    },
    RequestDeclined {
        passenger_id: Uuid,
        request_id: Uuid,
    },
    RequestWithdrawn {
        passenger_id: Uuid,
        request_id: Uuid,
        reason: String,
    },
    RideCancelled {
        passengers: Vec<Uuid>,
        reason: String,
    },
    BookingCancelled {
        passenger_id: Uuid,
        reason: String,
    },
    PassengerRemoved {
        passenger_id: Uuid,
    },
}

impl Transition {
    /// Short outcome shown to the caller
    pub fn summary(&self) -> &'static str {
        match self {
            Transition::Booked { .. } => "Ride booked successfully",
            Transition::Requested { .. } => "Booking request sent to the driver",
            Transition::RequestAccepted { .. } => "Booking request accepted",
            Transition::RequestDeclined { .. } => "Booking request declined",
            Transition::RequestWithdrawn { .. } => "Booking request withdrawn",
            Transition::RideCancelled { .. } => "Ride cancelled",
            Transition::BookingCancelled { .. } => "Booking cancelled",
            Transition::PassengerRemoved { .. } => "Passenger removed from the ride",
        }
    }

    /// Users other than the driver that the transition concerns
    pub fn passengers(&self) -> Vec<Uuid> {
        match self {
            Transition::Booked { passenger_id }
            | Transition::Requested { passenger_id, .. }
            | Transition::RequestAccepted { passenger_id, .. }
            | Transition::RequestDeclined { passenger_id, .. }
            | Transition::RequestWithdrawn { passenger_id, .. }
            | Transition::BookingCancelled { passenger_id, .. }
            | Transition::PassengerRemoved { passenger_id } => vec![*passenger_id],
            Transition::RideCancelled { passengers, .. } => passengers.clone(),
        }
    }
}

fn ensure_active(ride: &Ride) -> Result<(), BookingError> {
    if ride.is_active() {
        Ok(())
    } else {
        Err(BookingError::RideNotActive(ride.id))
    }
}

fn ensure_driver(ride: &Ride, actor: Uuid, message: &'static str) -> Result<(), BookingError> {
    if ride.is_driver(actor) {
        Ok(())
    } else {
        Err(BookingError::Unauthorized(message))
    }
}

fn ensure_seat(ride: &Ride) -> Result<(), BookingError> {
    if ride.available_seats < 1 {
        Err(BookingError::NoSeatsAvailable)
    } else {
        Ok(())
    }
}

fn required_reason(reason: &str) -> Result<String, BookingError> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(BookingError::Validation(
            "A cancellation reason is required".to_string(),
        ));
    }
    Ok(reason.to_string())
}

fn seat_passenger(ride: &mut Ride, passenger_id: Uuid) {
    ride.available_seats -= 1;
    ride.passengers.push(passenger_id);
}

fn release_passenger(ride: &mut Ride, passenger_id: Uuid) {
    ride.passengers.retain(|p| *p != passenger_id);
    ride.available_seats += 1;
}

/// Book a seat, or file a request when the ride needs driver approval
pub fn request_booking(
    ride: &mut Ride,
    user_id: Uuid,
    message: Option<String>,
    now: DateTime<Utc>,
) -> Result<Transition, BookingError> {
    ensure_active(ride)?;
    if ride.is_driver(user_id) {
        return Err(BookingError::OwnRide);
    }
    if ride.is_passenger(user_id) {
        return Err(BookingError::AlreadyBooked);
    }

    if ride.instant_booking {
        ensure_seat(ride)?;
        seat_passenger(ride, user_id);
        ride.updated_at = now;
        return Ok(Transition::Booked {
            passenger_id: user_id,
        });
    }

    if ride.pending_requests().any(|r| r.passenger_id == user_id) {
        return Err(BookingError::AlreadyRequested);
    }

    let message = message
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty());
    let request = BookingRequest {
        id: Uuid::new_v4(),
        passenger_id: user_id,
        status: BookingRequestStatus::Pending,
        request_time: now,
        message: message.clone(),
    };
    let request_id = request.id;
    ride.booking_requests.push(request);
    ride.updated_at = now;

    Ok(Transition::Requested {
        passenger_id: user_id,
        request_id,
        message,
    })
}

/// Accept or decline a pending request; each request resolves at most once
pub fn resolve_booking_request(
    ride: &mut Ride,
    actor: Uuid,
    request_id: Uuid,
    decision: Decision,
    now: DateTime<Utc>,
) -> Result<Transition, BookingError> {
    ensure_driver(ride, actor, "Only the driver can respond to booking requests")?;
    ensure_active(ride)?;

    let index = ride
        .booking_requests
        .iter()
        .position(|r| r.id == request_id)
        .ok_or(BookingError::NotFound("Booking request"))?;

    let request = &ride.booking_requests[index];
    if request.status != BookingRequestStatus::Pending {
        return Err(BookingError::AlreadyResolved(request.status.as_str()));
    }
    let passenger_id = request.passenger_id;

    let transition = match decision {
        Decision::Accept => {
            if ride.is_passenger(passenger_id) {
                return Err(BookingError::AlreadyBooked);
            }
            ensure_seat(ride)?;
            seat_passenger(ride, passenger_id);
            ride.booking_requests[index].status = BookingRequestStatus::Accepted;
            Transition::RequestAccepted {
                passenger_id,
                request_id,
            }
        }
        Decision::Decline => {
            ride.booking_requests[index].status = BookingRequestStatus::Declined;
            Transition::RequestDeclined {
                passenger_id,
                request_id,
            }
        }
    };

    ride.updated_at = now;
    Ok(transition)
}

/// Cancel the whole ride; only its driver may do this
pub fn cancel_ride(
    ride: &mut Ride,
    actor: Uuid,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<Transition, BookingError> {
    ensure_driver(ride, actor, "Only the driver can cancel the entire ride")?;
    ensure_active(ride)?;
    let reason = required_reason(reason)?;

    ride.status = RideStatus::Cancelled;
    ride.cancel_reason = Some(reason.clone());
    ride.updated_at = now;

    Ok(Transition::RideCancelled {
        passengers: ride.passengers.clone(),
        reason,
    })
}

/// A passenger gives up their seat, which becomes available again
pub fn cancel_booking(
    ride: &mut Ride,
    actor: Uuid,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<Transition, BookingError> {
    if !ride.is_passenger(actor) {
        return Err(BookingError::NotFound("Booking"));
    }
    ensure_active(ride)?;
    let reason = required_reason(reason)?;

    release_passenger(ride, actor);
    ride.updated_at = now;

    Ok(Transition::BookingCancelled {
        passenger_id: actor,
        reason,
    })
}

/// A passenger takes back a request the driver has not answered yet
pub fn withdraw_request(
    ride: &mut Ride,
    actor: Uuid,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<Transition, BookingError> {
    let index = ride
        .booking_requests
        .iter()
        .position(|r| r.passenger_id == actor && r.status == BookingRequestStatus::Pending)
        .ok_or(BookingError::NotFound("Booking request"))?;
    ensure_active(ride)?;
    let reason = required_reason(reason)?;

    let request = &mut ride.booking_requests[index];
    request.status = BookingRequestStatus::Withdrawn;
    let request_id = request.id;
    ride.updated_at = now;

    Ok(Transition::RequestWithdrawn {
        passenger_id: actor,
        request_id,
        reason,
    })
}

/// Route a cancellation by who asks for it
///
/// The driver cancels the ride, a passenger their seat, and a requester
/// their pending request. Anyone else has nothing to cancel.
pub fn cancel(
    ride: &mut Ride,
    actor: Uuid,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<Transition, BookingError> {
    if ride.is_driver(actor) {
        cancel_ride(ride, actor, reason, now)
    } else if ride.is_passenger(actor) {
        cancel_booking(ride, actor, reason, now)
    } else if ride.pending_requests().any(|r| r.passenger_id == actor) {
        withdraw_request(ride, actor, reason, now)
    } else {
        Err(BookingError::Unauthorized(
            "Only the driver, a passenger or a pending requester can cancel",
        ))
    }
}

/// Driver evicts a confirmed passenger
pub fn remove_passenger(
    ride: &mut Ride,
    actor: Uuid,
    passenger_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Transition, BookingError> {
    ensure_driver(ride, actor, "Only the driver can remove passengers")?;
    ensure_active(ride)?;
    if !ride.is_passenger(passenger_id) {
        return Err(BookingError::NotFound("Passenger"));
    }

    release_passenger(ride, passenger_id);
    ride.updated_at = now;

    Ok(Transition::PassengerRemoved { passenger_id })
}

/// Driver edit of ride details, applied as direct field replacement
pub fn update_ride_details(
    ride: &mut Ride,
    actor: Uuid,
    update: RideUpdate,
    now: DateTime<Utc>,
) -> Result<(), BookingError> {
    ensure_driver(ride, actor, "Only the driver can update this ride")?;
    ensure_active(ride)?;
    update.validate_against(ride)?;

    update.apply_to(ride);
    ride.updated_at = now;
    Ok(())
}

/// Apply a command to a ride
pub fn apply(
    ride: &mut Ride,
    command: &Command,
    now: DateTime<Utc>,
) -> Result<Transition, BookingError> {
    match command {
        Command::Book { user_id, message } => request_booking(ride, *user_id, message.clone(), now),
        Command::Resolve {
            actor,
            request_id,
            decision,
        } => resolve_booking_request(ride, *actor, *request_id, *decision, now),
        Command::Cancel { actor, reason } => cancel(ride, *actor, reason, now),
        Command::RemovePassenger {
            actor,
            passenger_id,
        } => remove_passenger(ride, *actor, *passenger_id, now),
    }
}
