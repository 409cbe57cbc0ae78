//! Ride documents

use anyhow::{Context, Result};
use sqlx::{PgPool, Row, postgres::PgRow, types::Json};
use tracing::info;
use uuid::Uuid;

use crate::models::{Amenities, BookingRequest, Location, PaymentType, Ride, RideStatus, Vehicle};

const RIDE_COLUMNS: &str = "id, driver_id, from_location, to_location, departure_time, \
     arrival_time, price, available_seats, vehicle, passengers, instant_booking, status, \
     cancel_reason, payment_type, amenities, stopovers, booking_requests, version, \
     created_at, updated_at";

fn ride_from_row(row: &PgRow) -> Result<Ride> {
    let status: String = row.try_get("status")?;
    let payment_type: String = row.try_get("payment_type")?;

    Ok(Ride {
        id: row.try_get("id")?,
        driver_id: row.try_get("driver_id")?,
        from: row.try_get::<Json<Location>, _>("from_location")?.0,
        to: row.try_get::<Json<Location>, _>("to_location")?.0,
        departure_time: row.try_get("departure_time")?,
        arrival_time: row.try_get("arrival_time")?,
        price: row.try_get("price")?,
        available_seats: row.try_get("available_seats")?,
        vehicle: row
            .try_get::<Option<Json<Vehicle>>, _>("vehicle")?
            .map(|vehicle| vehicle.0),
        passengers: row.try_get("passengers")?,
        instant_booking: row.try_get("instant_booking")?,
        status: status.parse::<RideStatus>().map_err(anyhow::Error::msg)?,
        cancel_reason: row.try_get("cancel_reason")?,
        payment_type: payment_type
            .parse::<PaymentType>()
            .map_err(anyhow::Error::msg)?,
        amenities: row.try_get::<Json<Amenities>, _>("amenities")?.0,
        stopovers: row.try_get("stopovers")?,
        booking_requests: row
            .try_get::<Json<Vec<BookingRequest>>, _>("booking_requests")?
            .0,
        version: row.try_get("version")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn rides_from_rows(rows: Vec<PgRow>) -> Result<Vec<Ride>> {
    rows.iter().map(ride_from_row).collect()
}

/// `%term%` for ILIKE, with LIKE wildcards in the term escaped
fn like_pattern(term: Option<&str>) -> Option<String> {
    let term = term.map(str::trim).filter(|t| !t.is_empty())?;
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    Some(format!("%{}%", escaped))
}

/// Ride repository
#[derive(Clone)]
pub struct RideRepository {
    pool: PgPool,
}

impl RideRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a freshly published ride
    pub async fn insert(&self, ride: &Ride) -> Result<Ride> {
        info!("Publishing ride {} for driver {}", ride.id, ride.driver_id);

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO rides (
                id, driver_id, from_location, to_location, departure_time, arrival_time,
                price, available_seats, vehicle, passengers, instant_booking, status,
                cancel_reason, payment_type, amenities, stopovers, booking_requests,
                version, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                    $17, $18, $19, $20)
            RETURNING {RIDE_COLUMNS}
            "#
        ))
        .bind(ride.id)
        .bind(ride.driver_id)
        .bind(Json(&ride.from))
        .bind(Json(&ride.to))
        .bind(ride.departure_time)
        .bind(ride.arrival_time)
        .bind(ride.price)
        .bind(ride.available_seats)
        .bind(ride.vehicle.as_ref().map(Json))
        .bind(&ride.passengers)
        .bind(ride.instant_booking)
        .bind(ride.status.as_str())
        .bind(&ride.cancel_reason)
        .bind(ride.payment_type.as_str())
        .bind(Json(&ride.amenities))
        .bind(&ride.stopovers)
        .bind(Json(&ride.booking_requests))
        .bind(ride.version)
        .bind(ride.created_at)
        .bind(ride.updated_at)
        .fetch_one(&self.pool)
        .await?;

        ride_from_row(&row)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Ride>> {
        let row = sqlx::query(&format!("SELECT {RIDE_COLUMNS} FROM rides WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(ride_from_row).transpose()
    }

    /// Active rides, earliest departure first
    pub async fn list_active(&self) -> Result<Vec<Ride>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {RIDE_COLUMNS}
            FROM rides
            WHERE status = 'active'
            ORDER BY departure_time ASC
            "#
        ))
        .fetch_all(&self.pool)
        .await?;

        rides_from_rows(rows)
    }

    /// Active rides whose origin and destination contain the given terms
    ///
    /// Each term is matched case-insensitively against the location name and
    /// address; an absent term matches everything.
    pub async fn search(&self, from: Option<&str>, to: Option<&str>) -> Result<Vec<Ride>> {
        info!("Searching rides from {:?} to {:?}", from, to);

        let rows = sqlx::query(&format!(
            r#"
            SELECT {RIDE_COLUMNS}
            FROM rides
            WHERE status = 'active'
              AND ($1::TEXT IS NULL
                   OR from_location->>'name' ILIKE $1
                   OR from_location->>'address' ILIKE $1)
              AND ($2::TEXT IS NULL
                   OR to_location->>'name' ILIKE $2
                   OR to_location->>'address' ILIKE $2)
            ORDER BY departure_time ASC
            "#
        ))
        .bind(like_pattern(from))
        .bind(like_pattern(to))
        .fetch_all(&self.pool)
        .await?;

        rides_from_rows(rows)
    }

    /// Every ride the user published, including cancelled ones
    pub async fn by_driver(&self, driver_id: Uuid) -> Result<Vec<Ride>> {
        let rows = sqlx::query(&format!(
            "SELECT {RIDE_COLUMNS} FROM rides WHERE driver_id = $1 ORDER BY departure_time ASC"
        ))
        .bind(driver_id)
        .fetch_all(&self.pool)
        .await?;

        rides_from_rows(rows)
    }

    /// Rides the user holds a confirmed seat on
    pub async fn by_passenger(&self, passenger_id: Uuid) -> Result<Vec<Ride>> {
        let rows = sqlx::query(&format!(
            "SELECT {RIDE_COLUMNS} FROM rides WHERE $1 = ANY(passengers) ORDER BY departure_time ASC"
        ))
        .bind(passenger_id)
        .fetch_all(&self.pool)
        .await?;

        rides_from_rows(rows)
    }

    /// Active rides the user drives, sits in or has a pending request on
    pub async fn involving(&self, user_id: Uuid) -> Result<Vec<Uuid>> {
        let rows = sqlx::query(
            r#"
            SELECT id
            FROM rides
            WHERE status = 'active'
              AND (driver_id = $1
                   OR $1 = ANY(passengers)
                   OR booking_requests @> jsonb_build_array(
                        jsonb_build_object('passengerId', $2::TEXT, 'status', 'pending')))
            ORDER BY departure_time ASC
            "#,
        )
        .bind(user_id)
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|row| row.get("id")).collect())
    }

    /// Write `ride` back if nobody else has since `ride.version` was read
    ///
    /// Returns the stored ride with its version bumped, or `None` when the
    /// row has moved on (or disappeared).
    pub async fn replace(&self, ride: &Ride) -> Result<Option<Ride>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE rides
            SET from_location = $3,
                to_location = $4,
                departure_time = $5,
                arrival_time = $6,
                price = $7,
                available_seats = $8,
                vehicle = $9,
                passengers = $10,
                instant_booking = $11,
                status = $12,
                cancel_reason = $13,
                payment_type = $14,
                amenities = $15,
                stopovers = $16,
                booking_requests = $17,
                updated_at = $18,
                version = version + 1
            WHERE id = $1 AND version = $2
            RETURNING {RIDE_COLUMNS}
            "#
        ))
        .bind(ride.id)
        .bind(ride.version)
        .bind(Json(&ride.from))
        .bind(Json(&ride.to))
        .bind(ride.departure_time)
        .bind(ride.arrival_time)
        .bind(ride.price)
        .bind(ride.available_seats)
        .bind(ride.vehicle.as_ref().map(Json))
        .bind(&ride.passengers)
        .bind(ride.instant_booking)
        .bind(ride.status.as_str())
        .bind(&ride.cancel_reason)
        .bind(ride.payment_type.as_str())
        .bind(Json(&ride.amenities))
        .bind(&ride.stopovers)
        .bind(Json(&ride.booking_requests))
        .bind(ride.updated_at)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("Failed to write ride {}", ride.id))?;

        row.as_ref().map(ride_from_row).transpose()
    }
}
