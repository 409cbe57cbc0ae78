//! Booking service
//!
//! Runs the pure transitions of [`crate::booking`] against stored rides. A
//! write only lands if the ride is still at the version it was read at; a
//! lost race reloads the ride and re-applies the command, so two passengers
//! racing for the last seat can never both be seated.

use std::future::Future;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    booking::{self, Command, Transition},
    error::BookingError,
    models::{Ride, RideUpdate},
};

/// Attempts before a contended write gives up
pub const MAX_ATTEMPTS: usize = 3;

const DRIVER_CLOSED_ACCOUNT: &str = "The driver closed their account";
const PASSENGER_CLOSED_ACCOUNT: &str = "The passenger closed their account";

/// Versioned ride storage
pub trait RideStore: Send + Sync {
    fn load(&self, id: Uuid) -> impl Future<Output = anyhow::Result<Option<Ride>>> + Send;

    /// Store `ride` if the stored copy is still at `ride.version`
    ///
    /// Returns the stored ride with its new version, or `None` when another
    /// writer got there first.
    fn replace(&self, ride: &Ride) -> impl Future<Output = anyhow::Result<Option<Ride>>> + Send;
}

/// Fire-and-forget delivery of transition side effects
pub trait Notifier: Send + Sync {
    fn notify(&self, transition: &Transition, ride: &Ride);
}

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Booking(#[from] BookingError),

    #[error("The ride was modified concurrently, please try again")]
    Conflict,

    #[error("Ride storage failed: {0}")]
    Storage(#[source] anyhow::Error),
}

/// The committed ride and what happened to it
#[derive(Debug, Clone)]
pub struct Outcome {
    pub ride: Ride,
    pub transition: Transition,
}

pub struct BookingService<S, N> {
    store: S,
    notifier: N,
}

impl<S: RideStore, N: Notifier> BookingService<S, N> {
    pub fn new(store: S, notifier: N) -> Self {
        Self { store, notifier }
    }

    /// Apply a booking command and notify the parties once it is committed
    pub async fn execute(&self, ride_id: Uuid, command: Command) -> Result<Outcome, ServiceError> {
        let (ride, transition) = self
            .mutate(ride_id, |ride, now| booking::apply(ride, &command, now))
            .await?;

        self.announce(&ride, &transition);
        Ok(Outcome { ride, transition })
    }

    /// Take a user out of the given rides before their account goes away
    ///
    /// Rides they drive are cancelled, their seats released and their pending
    /// requests withdrawn, with the usual notices. Rides that no longer
    /// involve them or are no longer active are left alone. Returns how many
    /// rides changed.
    pub async fn withdraw_user(
        &self,
        ride_ids: &[Uuid],
        user_id: Uuid,
    ) -> Result<usize, ServiceError> {
        let mut changed = 0;

        for &ride_id in ride_ids {
            let result = self
                .mutate(ride_id, |ride, now| {
                    let reason = if ride.is_driver(user_id) {
                        DRIVER_CLOSED_ACCOUNT
                    } else {
                        PASSENGER_CLOSED_ACCOUNT
                    };
                    booking::cancel(ride, user_id, reason, now)
                })
                .await;

            match result {
                Ok((ride, transition)) => {
                    self.announce(&ride, &transition);
                    changed += 1;
                }
                Err(ServiceError::Booking(e)) => {
                    debug!("Ride {} left unchanged for user {}: {}", ride_id, user_id, e)
                }
                Err(e) => return Err(e),
            }
        }

        Ok(changed)
    }

    fn announce(&self, ride: &Ride, transition: &Transition) {
        info!("Ride {}: {}", ride.id, transition.summary());
        self.notifier.notify(transition, ride);
    }

    /// Driver edit of ride details
    pub async fn update_details(
        &self,
        ride_id: Uuid,
        actor: Uuid,
        update: RideUpdate,
    ) -> Result<Ride, ServiceError> {
        let (ride, ()) = self
            .mutate(ride_id, |ride, now| {
                booking::update_ride_details(ride, actor, update.clone(), now)
            })
            .await?;

        info!("Ride {} details updated", ride.id);
        Ok(ride)
    }

    /// Load, transform and conditionally write back, retrying lost races
    async fn mutate<T, F>(&self, ride_id: Uuid, mut change: F) -> Result<(Ride, T), ServiceError>
    where
        T: Send,
        F: FnMut(&mut Ride, DateTime<Utc>) -> Result<T, BookingError> + Send,
    {
        for attempt in 1..=MAX_ATTEMPTS {
            let mut ride = self
                .store
                .load(ride_id)
                .await
                .map_err(ServiceError::Storage)?
                .ok_or(BookingError::NotFound("Ride"))?;

            let result = change(&mut ride, Utc::now())?;

            match self.store.replace(&ride).await.map_err(ServiceError::Storage)? {
                Some(saved) => return Ok((saved, result)),
                None => warn!(
                    "Ride {} changed while writing (attempt {}/{})",
                    ride_id, attempt, MAX_ATTEMPTS
                ),
            }
        }

        Err(ServiceError::Conflict)
    }
}
