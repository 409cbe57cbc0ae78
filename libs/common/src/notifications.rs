//! Wording of the messages sent when a ride changes state
//!
//! Composition is pure: given the transition, the ride after the transition
//! and whatever contacts could be resolved, it returns the messages to send.
//! A missing contact only drops the contact details from the text.

use std::collections::HashMap;

use uuid::Uuid;

use crate::{
    booking::Transition,
    models::{Contact, NewMessage, Ride},
};

/// Resolved contacts keyed by user id
pub type ContactBook = HashMap<Uuid, Contact>;

fn name_of<'a>(contacts: &'a ContactBook, id: Uuid, fallback: &'a str) -> &'a str {
    contacts.get(&id).map(|c| c.name.as_str()).unwrap_or(fallback)
}

fn reach_of(contacts: &ContactBook, id: Uuid) -> String {
    contacts
        .get(&id)
        .map(|c| format!(" Contact: {}.", c.reach()))
        .unwrap_or_default()
}

fn message(ride: &Ride, sender_id: Uuid, recipient_id: Uuid, content: String) -> NewMessage {
    NewMessage {
        sender_id,
        recipient_id,
        content,
        ride_id: Some(ride.id),
    }
}

/// Build the notifications for a transition that has been committed
pub fn compose(transition: &Transition, ride: &Ride, contacts: &ContactBook) -> Vec<NewMessage> {
    let driver = ride.driver_id;
    let route = ride.route_label();
    let departs = ride.departure_time.format("%d %b %Y %H:%M UTC");
    let driver_name = name_of(contacts, driver, "Your driver");

    match transition {
        Transition::Booked { passenger_id } => {
            let passenger_name = name_of(contacts, *passenger_id, "A passenger");
            vec![
                message(
                    ride,
                    *passenger_id,
                    driver,
                    format!(
                        "New booking: {passenger_name} booked a seat on your ride {route} on {departs}.{}",
                        reach_of(contacts, *passenger_id)
                    ),
                ),
                message(
                    ride,
                    driver,
                    *passenger_id,
                    format!(
                        "Booking confirmed: your seat on the ride {route} on {departs} is reserved. Driver: {driver_name}.{}",
                        reach_of(contacts, driver)
                    ),
                ),
            ]
        }
        Transition::Requested {
            passenger_id,
            message: note,
            ..
        } => {
            let passenger_name = name_of(contacts, *passenger_id, "A passenger");
            let note = note
                .as_deref()
                .map(|n| format!(" Message: \"{n}\""))
                .unwrap_or_default();
            vec![
                message(
                    ride,
                    *passenger_id,
                    driver,
                    format!(
                        "New booking request: {passenger_name} asked to join your ride {route} on {departs}.{note}"
                    ),
                ),
                message(
                    ride,
                    driver,
                    *passenger_id,
                    format!(
                        "Request sent: {driver_name} will review your request for the ride {route} on {departs}."
                    ),
                ),
            ]
        }
        Transition::RequestAccepted { passenger_id, .. } => vec![message(
            ride,
            driver,
            *passenger_id,
            format!(
                "Your booking request for the ride {route} on {departs} was accepted. Driver: {driver_name}.{}",
                reach_of(contacts, driver)
            ),
        )],
        Transition::RequestDeclined { passenger_id, .. } => vec![message(
            ride,
            driver,
            *passenger_id,
            format!("Your booking request for the ride {route} on {departs} was declined."),
        )],
        Transition::RequestWithdrawn {
            passenger_id,
            reason,
            ..
        } => {
            let passenger_name = name_of(contacts, *passenger_id, "A passenger");
            vec![message(
                ride,
                *passenger_id,
                driver,
                format!(
                    "{passenger_name} withdrew their booking request for your ride {route} on {departs}. Reason: {reason}"
                ),
            )]
        }
        Transition::RideCancelled { passengers, reason } => passengers
            .iter()
            .map(|passenger_id| {
                message(
                    ride,
                    driver,
                    *passenger_id,
                    format!(
                        "The ride {route} on {departs} has been cancelled by the driver. Reason: {reason}"
                    ),
                )
            })
            .collect(),
        Transition::BookingCancelled {
            passenger_id,
            reason,
        } => {
            let passenger_name = name_of(contacts, *passenger_id, "A passenger");
            vec![
                message(
                    ride,
                    *passenger_id,
                    driver,
                    format!(
                        "{passenger_name} cancelled their booking on your ride {route} on {departs}. Reason: {reason}"
                    ),
                ),
                message(
                    ride,
                    driver,
                    *passenger_id,
                    format!("You cancelled your booking on the ride {route} on {departs}."),
                ),
            ]
        }
        Transition::PassengerRemoved { passenger_id } => vec![message(
            ride,
            driver,
            *passenger_id,
            format!("You have been removed from the ride {route} on {departs} by the driver."),
        )],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        booking::{self, Decision},
        models::{Amenities, Location, NewRide, PaymentType},
    };
    use chrono::{Duration, Utc};

    fn ride(instant_booking: bool) -> Ride {
        let departure = Utc::now() + Duration::days(1);
        NewRide {
            from: Location {
                name: "Delhi".to_string(),
                address: "Connaught Place".to_string(),
            },
            to: Location {
                name: "Jaipur".to_string(),
                address: "MI Road".to_string(),
            },
            departure_time: departure,
            arrival_time: departure + Duration::hours(5),
            price: 700.0,
            available_seats: 3,
            vehicle: None,
            instant_booking,
            payment_type: PaymentType::Online,
            amenities: Amenities::default(),
            stopovers: Vec::new(),
        }
        .into_ride(Uuid::new_v4(), Utc::now())
    }

    fn contact(id: Uuid, name: &str, phone: Option<&str>) -> Contact {
        Contact {
            id,
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            phone: phone.map(str::to_string),
        }
    }

    #[test]
    fn test_instant_booking_notifies_both_sides_with_contacts() {
        let mut ride = ride(true);
        let passenger = Uuid::new_v4();
        let transition = booking::request_booking(&mut ride, passenger, None, Utc::now()).unwrap();

        let mut contacts = ContactBook::new();
        contacts.insert(ride.driver_id, contact(ride.driver_id, "Ravi", Some("+91 98450 00000")));
        contacts.insert(passenger, contact(passenger, "Asha", None));

        let messages = compose(&transition, &ride, &contacts);
        assert_eq!(messages.len(), 2);

        let to_driver = &messages[0];
        assert_eq!(to_driver.recipient_id, ride.driver_id);
        assert_eq!(to_driver.sender_id, passenger);
        assert!(to_driver.content.starts_with("New booking: Asha"));
        assert!(to_driver.content.contains("asha@example.com"));

        let to_passenger = &messages[1];
        assert_eq!(to_passenger.recipient_id, passenger);
        assert!(to_passenger.content.starts_with("Booking confirmed"));
        assert!(to_passenger.content.contains("ravi@example.com, +91 98450 00000"));
        assert!(messages.iter().all(|m| m.ride_id == Some(ride.id)));
    }

    #[test]
    fn test_request_includes_passenger_note() {
        let mut ride = ride(false);
        let passenger = Uuid::new_v4();
        let transition = booking::request_booking(
            &mut ride,
            passenger,
            Some("Can I bring a bag?".to_string()),
            Utc::now(),
        )
        .unwrap();

        let messages = compose(&transition, &ride, &ContactBook::new());
        assert_eq!(messages.len(), 2);
        assert!(messages[0].content.starts_with("New booking request: A passenger"));
        assert!(messages[0].content.contains("\"Can I bring a bag?\""));
        assert!(messages[1].content.starts_with("Request sent"));
    }

    #[test]
    fn test_decline_notifies_only_the_passenger() {
        let mut ride = ride(false);
        let driver = ride.driver_id;
        let passenger = Uuid::new_v4();
        let request_id = match booking::request_booking(&mut ride, passenger, None, Utc::now()) {
            Ok(Transition::Requested { request_id, .. }) => request_id,
            other => panic!("unexpected {other:?}"),
        };
        let transition = booking::resolve_booking_request(
            &mut ride,
            driver,
            request_id,
            Decision::Decline,
            Utc::now(),
        )
        .unwrap();

        let messages = compose(&transition, &ride, &ContactBook::new());
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].recipient_id, passenger);
        assert!(messages[0].content.contains("was declined"));
    }

    #[test]
    fn test_cancellation_reaches_every_passenger_with_reason() {
        let mut ride = ride(true);
        let driver = ride.driver_id;
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        booking::request_booking(&mut ride, a, None, Utc::now()).unwrap();
        booking::request_booking(&mut ride, b, None, Utc::now()).unwrap();
        let transition = booking::cancel_ride(&mut ride, driver, "car broke down", Utc::now()).unwrap();

        let messages = compose(&transition, &ride, &ContactBook::new());

        let recipients: Vec<Uuid> = messages.iter().map(|m| m.recipient_id).collect();
        assert_eq!(recipients, vec![a, b]);
        assert!(messages.iter().all(|m| m.content.contains("Reason: car broke down")));
        assert!(messages.iter().all(|m| m.sender_id == driver));
    }

    #[test]
    fn test_self_cancel_tells_driver_the_reason() {
        let mut ride = ride(true);
        let passenger = Uuid::new_v4();
        booking::request_booking(&mut ride, passenger, None, Utc::now()).unwrap();
        let transition = booking::cancel(&mut ride, passenger, "flight moved", Utc::now()).unwrap();

        let mut contacts = ContactBook::new();
        contacts.insert(passenger, contact(passenger, "Meera", None));
        let messages = compose(&transition, &ride, &contacts);

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].recipient_id, ride.driver_id);
        assert_eq!(
            messages[0].content,
            format!(
                "Meera cancelled their booking on your ride from Delhi to Jaipur on {}. Reason: flight moved",
                ride.departure_time.format("%d %b %Y %H:%M UTC")
            )
        );
        assert_eq!(messages[1].recipient_id, passenger);
    }

    #[test]
    fn test_withdrawn_request_tells_only_the_driver() {
        let mut ride = ride(false);
        let passenger = Uuid::new_v4();
        booking::request_booking(&mut ride, passenger, None, Utc::now()).unwrap();
        let transition = booking::cancel(&mut ride, passenger, "found a train", Utc::now()).unwrap();

        let mut contacts = ContactBook::new();
        contacts.insert(passenger, contact(passenger, "Kiran", None));
        let messages = compose(&transition, &ride, &contacts);

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].recipient_id, ride.driver_id);
        assert_eq!(messages[0].sender_id, passenger);
        assert!(messages[0].content.starts_with("Kiran withdrew their booking request"));
        assert!(messages[0].content.ends_with("Reason: found a train"));
    }
}
