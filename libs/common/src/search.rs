//! Ride search filters
//!
//! The route match (`from`/`to`) is what the database query narrows on; the
//! remaining fields refine an already fetched result set and can be applied by
//! the server or by a client holding a listing.

use std::cmp::Ordering;

use chrono::{NaiveDate, Timelike};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Ride;

/// Part of the day a ride departs in (UTC hours)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeOfDay {
    /// 05:00 to 11:59
    Morning,
    /// 12:00 to 16:59
    Afternoon,
    /// 17:00 to 20:59
    Evening,
    /// 21:00 to 04:59
    Night,
}

impl TimeOfDay {
    pub fn of_hour(hour: u32) -> Self {
        match hour {
            5..=11 => TimeOfDay::Morning,
            12..=16 => TimeOfDay::Afternoon,
            17..=20 => TimeOfDay::Evening,
            _ => TimeOfDay::Night,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    /// Earliest departure first
    #[default]
    #[serde(alias = "earliest")]
    Departure,
    /// Cheapest first
    Price,
    /// Shortest trip first
    Duration,
}

/// Query string of `GET /api/rides/search/find`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RideFilter {
    pub from: Option<String>,
    pub to: Option<String>,
    /// Departure calendar day (UTC)
    pub date: Option<NaiveDate>,
    pub min_seats: Option<i32>,
    pub time_of_day: Option<TimeOfDay>,
    pub verified_driver: Option<bool>,
    pub instant_booking: Option<bool>,
    pub smoking: Option<bool>,
    pub pets: Option<bool>,
    pub music: Option<bool>,
    pub ac: Option<bool>,
    pub sort_by: Option<SortBy>,
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.trim().to_lowercase())
}

/// Case-insensitive substring match on a location's name or address
fn location_matches(name: &str, address: &str, needle: Option<&str>) -> bool {
    match needle.map(str::trim) {
        None | Some("") => true,
        Some(needle) => contains_ci(name, needle) || contains_ci(address, needle),
    }
}

fn amenity_ok(wanted: Option<bool>, offered: bool) -> bool {
    !wanted.unwrap_or(false) || offered
}

impl RideFilter {
    /// Whether `verified_driver` needs a driver lookup
    pub fn wants_verified_driver(&self) -> bool {
        self.verified_driver.unwrap_or(false)
    }

    pub fn matches_route(&self, ride: &Ride) -> bool {
        location_matches(&ride.from.name, &ride.from.address, self.from.as_deref())
            && location_matches(&ride.to.name, &ride.to.address, self.to.as_deref())
    }

    /// Every criterion except the verified-driver flag
    pub fn matches(&self, ride: &Ride) -> bool {
        if !ride.is_active() || !self.matches_route(ride) {
            return false;
        }
        if let Some(date) = self.date {
            if ride.departure_time.date_naive() != date {
                return false;
            }
        }
        if let Some(min_seats) = self.min_seats {
            if ride.available_seats < min_seats {
                return false;
            }
        }
        if let Some(time_of_day) = self.time_of_day {
            if TimeOfDay::of_hour(ride.departure_time.hour()) != time_of_day {
                return false;
            }
        }
        if self.instant_booking.unwrap_or(false) && !ride.instant_booking {
            return false;
        }

        let amenities = &ride.amenities;
        amenity_ok(self.smoking, amenities.smoking)
            && amenity_ok(self.pets, amenities.pets)
            && amenity_ok(self.music, amenities.music)
            && amenity_ok(self.ac, amenities.ac)
    }

    /// Filter and sort a fetched listing
    ///
    /// `is_verified` is consulted only when the verified-driver flag is set.
    pub fn apply<F>(&self, rides: Vec<Ride>, is_verified: F) -> Vec<Ride>
    where
        F: Fn(Uuid) -> bool,
    {
        let check_driver = self.wants_verified_driver();
        let mut rides: Vec<Ride> = rides
            .into_iter()
            .filter(|ride| self.matches(ride))
            .filter(|ride| !check_driver || is_verified(ride.driver_id))
            .collect();

        sort_rides(&mut rides, self.sort_by.unwrap_or_default());
        rides
    }
}

/// Stable sort; ties keep departure order
pub fn sort_rides(rides: &mut [Ride], sort_by: SortBy) {
    rides.sort_by(|a, b| {
        let primary = match sort_by {
            SortBy::Departure => Ordering::Equal,
            SortBy::Price => a.price.total_cmp(&b.price),
            SortBy::Duration => a.duration().cmp(&b.duration()),
        };
        primary.then_with(|| a.departure_time.cmp(&b.departure_time))
    });
}
