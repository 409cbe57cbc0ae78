//! Ride model, its nested values and the ride endpoint payloads

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::BookingError;

/// A named place with its street address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vehicle {
    pub make: String,
    pub model: String,
    pub color: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amenities {
    #[serde(default)]
    pub smoking: bool,
    #[serde(default)]
    pub pets: bool,
    #[serde(default)]
    pub music: bool,
    #[serde(default)]
    pub ac: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RideStatus {
    Active,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    #[default]
    Cash,
    Upi,
    Card,
    Online,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingRequestStatus {
    Pending,
    Accepted,
    Declined,
    /// The passenger took the request back before the driver answered
    Withdrawn,
}

/// Capacity state of a ride as seen by the booking state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CapacityState {
    Open,
    Full,
    Closed,
}

impl RideStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RideStatus::Active => "active",
            RideStatus::Completed => "completed",
            RideStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for RideStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(RideStatus::Active),
            "completed" => Ok(RideStatus::Completed),
            "cancelled" => Ok(RideStatus::Cancelled),
            other => Err(format!("unknown ride status: {other}")),
        }
    }
}

impl fmt::Display for RideStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Cash => "cash",
            PaymentType::Upi => "upi",
            PaymentType::Card => "card",
            PaymentType::Online => "online",
        }
    }
}

impl FromStr for PaymentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cash" => Ok(PaymentType::Cash),
            "upi" => Ok(PaymentType::Upi),
            "card" => Ok(PaymentType::Card),
            "online" => Ok(PaymentType::Online),
            other => Err(format!("unknown payment type: {other}")),
        }
    }
}

impl BookingRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingRequestStatus::Pending => "pending",
            BookingRequestStatus::Accepted => "accepted",
            BookingRequestStatus::Declined => "declined",
            BookingRequestStatus::Withdrawn => "withdrawn",
        }
    }
}

/// A passenger's request to join a ride that does not allow instant booking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub id: Uuid,
    pub passenger_id: Uuid,
    pub status: BookingRequestStatus,
    pub request_time: DateTime<Utc>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ride {
    pub id: Uuid,
    pub driver_id: Uuid,
    pub from: Location,
    pub to: Location,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    pub price: f64,
    pub available_seats: i32,
    pub vehicle: Option<Vehicle>,
    /// Confirmed passengers in booking order
    pub passengers: Vec<Uuid>,
    pub instant_booking: bool,
    pub status: RideStatus,
    pub cancel_reason: Option<String>,
    pub payment_type: PaymentType,
    pub amenities: Amenities,
    /// Advisory intermediate stops, in order
    pub stopovers: Vec<String>,
    pub booking_requests: Vec<BookingRequest>,
    /// Incremented on every write; used for compare-and-swap updates
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ride {
    pub fn is_active(&self) -> bool {
        self.status == RideStatus::Active
    }

    pub fn is_driver(&self, user_id: Uuid) -> bool {
        self.driver_id == user_id
    }

    pub fn is_passenger(&self, user_id: Uuid) -> bool {
        self.passengers.contains(&user_id)
    }

    pub fn capacity_state(&self) -> CapacityState {
        if !self.is_active() {
            CapacityState::Closed
        } else if self.available_seats > 0 {
            CapacityState::Open
        } else {
            CapacityState::Full
        }
    }

    /// Remaining seats plus confirmed passengers
    pub fn total_capacity(&self) -> i32 {
        self.available_seats + self.passengers.len() as i32
    }

    pub fn pending_requests(&self) -> impl Iterator<Item = &BookingRequest> {
        self.booking_requests
            .iter()
            .filter(|r| r.status == BookingRequestStatus::Pending)
    }

    pub fn duration(&self) -> chrono::Duration {
        self.arrival_time - self.departure_time
    }

    /// Human readable "from A to B" label used in notifications
    pub fn route_label(&self) -> String {
        format!("from {} to {}", self.from.name, self.to.name)
    }
}

fn validate_schedule(
    departure: DateTime<Utc>,
    arrival: DateTime<Utc>,
    price: f64,
    seats: i32,
) -> Result<(), BookingError> {
    if arrival <= departure {
        return Err(BookingError::Validation(
            "Arrival time must be after departure time".to_string(),
        ));
    }
    if !price.is_finite() || price <= 0.0 {
        return Err(BookingError::Validation(
            "Price must be a positive amount".to_string(),
        ));
    }
    if seats < 0 {
        return Err(BookingError::Validation(
            "Available seats cannot be negative".to_string(),
        ));
    }
    Ok(())
}

fn validate_location(location: &Location, field: &str) -> Result<(), BookingError> {
    if location.name.trim().is_empty() {
        return Err(BookingError::Validation(format!("{field} location name is required")));
    }
    Ok(())
}

/// Payload for publishing a ride
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRide {
    pub from: Location,
    pub to: Location,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    pub price: f64,
    pub available_seats: i32,
    #[serde(default)]
    pub vehicle: Option<Vehicle>,
    #[serde(default)]
    pub instant_booking: bool,
    #[serde(default)]
    pub payment_type: PaymentType,
    #[serde(default)]
    pub amenities: Amenities,
    #[serde(default)]
    pub stopovers: Vec<String>,
}

impl NewRide {
    pub fn validate(&self) -> Result<(), BookingError> {
        validate_location(&self.from, "Origin")?;
        validate_location(&self.to, "Destination")?;
        validate_schedule(
            self.departure_time,
            self.arrival_time,
            self.price,
            self.available_seats,
        )?;
        if self.available_seats == 0 {
            return Err(BookingError::Validation(
                "A ride must offer at least one seat".to_string(),
            ));
        }
        Ok(())
    }

    /// Build the active ride owned by `driver_id`
    pub fn into_ride(self, driver_id: Uuid, now: DateTime<Utc>) -> Ride {
        Ride {
            id: Uuid::new_v4(),
            driver_id,
            from: self.from,
            to: self.to,
            departure_time: self.departure_time,
            arrival_time: self.arrival_time,
            price: self.price,
            available_seats: self.available_seats,
            vehicle: self.vehicle,
            passengers: Vec::new(),
            instant_booking: self.instant_booking,
            status: RideStatus::Active,
            cancel_reason: None,
            payment_type: self.payment_type,
            amenities: self.amenities,
            stopovers: self.stopovers,
            booking_requests: Vec::new(),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Driver edit of ride details; absent fields are left unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RideUpdate {
    pub from: Option<Location>,
    pub to: Option<Location>,
    pub departure_time: Option<DateTime<Utc>>,
    pub arrival_time: Option<DateTime<Utc>>,
    pub price: Option<f64>,
    pub available_seats: Option<i32>,
    pub vehicle: Option<Vehicle>,
    pub instant_booking: Option<bool>,
    pub payment_type: Option<PaymentType>,
    pub amenities: Option<Amenities>,
    pub stopovers: Option<Vec<String>>,
}

impl RideUpdate {
    /// Validate the patch against the ride it will be applied to
    pub fn validate_against(&self, ride: &Ride) -> Result<(), BookingError> {
        if let Some(from) = &self.from {
            validate_location(from, "Origin")?;
        }
        if let Some(to) = &self.to {
            validate_location(to, "Destination")?;
        }
        validate_schedule(
            self.departure_time.unwrap_or(ride.departure_time),
            self.arrival_time.unwrap_or(ride.arrival_time),
            self.price.unwrap_or(ride.price),
            self.available_seats.unwrap_or(ride.available_seats),
        )
    }

    /// Replace the fields present in the patch
    pub fn apply_to(self, ride: &mut Ride) {
        if let Some(from) = self.from {
            ride.from = from;
        }
        if let Some(to) = self.to {
            ride.to = to;
        }
        if let Some(departure_time) = self.departure_time {
            ride.departure_time = departure_time;
        }
        if let Some(arrival_time) = self.arrival_time {
            ride.arrival_time = arrival_time;
        }
        if let Some(price) = self.price {
            ride.price = price;
        }
        if let Some(seats) = self.available_seats {
            ride.available_seats = seats;
        }
        if let Some(vehicle) = self.vehicle {
            ride.vehicle = Some(vehicle);
        }
        if let Some(instant_booking) = self.instant_booking {
            ride.instant_booking = instant_booking;
        }
        if let Some(payment_type) = self.payment_type {
            ride.payment_type = payment_type;
        }
        if let Some(amenities) = self.amenities {
            ride.amenities = amenities;
        }
        if let Some(stopovers) = self.stopovers {
            ride.stopovers = stopovers;
        }
    }
}

/// Body of `POST /api/rides/:id/book`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookRideRequest {
    /// Must match the authenticated user when present
    pub user_id: Option<Uuid>,
    pub message: Option<String>,
}

/// Body of `POST /api/rides/:id/cancel`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRideRequest {
    pub user_id: Option<Uuid>,
    pub reason: String,
}

/// Body of `POST /api/rides/:id/requests/:request_id`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveRequestBody {
    pub decision: crate::booking::Decision,
}

/// Response of every ride state transition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RideActionResponse {
    pub message: String,
    pub ride: Ride,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_ride() -> NewRide {
        let departure = Utc::now() + Duration::days(1);
        NewRide {
            from: Location {
                name: "Pune".to_string(),
                address: "Shivajinagar".to_string(),
            },
            to: Location {
                name: "Mumbai".to_string(),
                address: "Dadar".to_string(),
            },
            departure_time: departure,
            arrival_time: departure + Duration::hours(3),
            price: 450.0,
            available_seats: 3,
            vehicle: None,
            instant_booking: true,
            payment_type: PaymentType::Upi,
            amenities: Amenities::default(),
            stopovers: vec!["Lonavala".to_string()],
        }
    }

    #[test]
    fn test_new_ride_validation() {
        assert!(new_ride().validate().is_ok());

        let mut backwards = new_ride();
        backwards.arrival_time = backwards.departure_time - Duration::minutes(1);
        assert!(matches!(backwards.validate(), Err(BookingError::Validation(_))));

        let mut free = new_ride();
        free.price = 0.0;
        assert!(free.validate().is_err());

        let mut no_seats = new_ride();
        no_seats.available_seats = 0;
        assert!(no_seats.validate().is_err());

        let mut unnamed = new_ride();
        unnamed.to.name = "  ".to_string();
        assert!(unnamed.validate().is_err());
    }

    #[test]
    fn test_into_ride_starts_open_and_empty() {
        let driver = Uuid::new_v4();
        let ride = new_ride().into_ride(driver, Utc::now());

        assert_eq!(ride.driver_id, driver);
        assert_eq!(ride.capacity_state(), CapacityState::Open);
        assert!(ride.passengers.is_empty());
        assert_eq!(ride.total_capacity(), 3);
        assert_eq!(ride.version, 0);
        assert_eq!(ride.route_label(), "from Pune to Mumbai");
    }

    #[test]
    fn test_status_and_payment_type_parse() {
        for status in [RideStatus::Active, RideStatus::Completed, RideStatus::Cancelled] {
            assert_eq!(status.as_str().parse::<RideStatus>().unwrap(), status);
        }
        assert_eq!("upi".parse::<PaymentType>().unwrap(), PaymentType::Upi);
        assert!("cheque".parse::<PaymentType>().is_err());
    }

    #[test]
    fn test_wire_format_is_camel_case() {
        let ride = new_ride().into_ride(Uuid::new_v4(), Utc::now());
        let json = serde_json::to_value(&ride).unwrap();

        assert_eq!(json["availableSeats"], 3);
        assert_eq!(json["instantBooking"], true);
        assert_eq!(json["paymentType"], "upi");
        assert_eq!(json["status"], "active");
        assert_eq!(json["stopovers"][0], "Lonavala");
    }

    #[test]
    fn test_published_ride_is_fetched_unchanged() {
        let submitted = new_ride();
        let body = serde_json::to_string(&submitted).unwrap();

        let received: NewRide = serde_json::from_str(&body).unwrap();
        let stored = received.into_ride(Uuid::new_v4(), Utc::now());
        let fetched: Ride =
            serde_json::from_str(&serde_json::to_string(&stored).unwrap()).unwrap();

        assert_eq!(fetched, stored);
        assert_eq!(fetched.from, submitted.from);
        assert_eq!(fetched.to, submitted.to);
        assert_eq!(fetched.departure_time, submitted.departure_time);
        assert_eq!(fetched.arrival_time, submitted.arrival_time);
        assert_eq!(fetched.price, submitted.price);
        assert_eq!(fetched.available_seats, submitted.available_seats);
        assert_eq!(fetched.payment_type, submitted.payment_type);
        assert_eq!(fetched.amenities, submitted.amenities);
        assert_eq!(fetched.stopovers, submitted.stopovers);
    }

    #[test]
    fn test_update_validates_against_current_values() {
        let ride = new_ride().into_ride(Uuid::new_v4(), Utc::now());

        let update = RideUpdate {
            arrival_time: Some(ride.departure_time - Duration::hours(1)),
            ..RideUpdate::default()
        };
        assert!(update.validate_against(&ride).is_err());

        let update = RideUpdate {
            price: Some(500.0),
            available_seats: Some(2),
            ..RideUpdate::default()
        };
        assert!(update.validate_against(&ride).is_ok());
    }
}
