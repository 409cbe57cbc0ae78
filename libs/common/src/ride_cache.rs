//! Read-through ride cache
//!
//! Rides are cached in Redis by id for a short TTL. Reads skip Redis while
//! the cache link is marked unreachable. Cached copies are only replaced by
//! copies at the same or a higher version, and every committed write stores
//! the fresh ride so a slower reader cannot put back an older one. Booking
//! transitions always read the database.

use anyhow::Result;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    booking_service::RideStore,
    cache::RedisPool,
    connectivity::{ConnectivityState, Link},
    models::Ride,
    repositories::RideRepository,
};

pub const RIDE_TTL_SECONDS: u64 = 60;

fn ride_key(id: Uuid) -> String {
    format!("ride:{}", id)
}

#[derive(Clone)]
pub struct RideCache {
    redis: RedisPool,
    connectivity: ConnectivityState,
}

impl RideCache {
    pub fn new(redis: RedisPool, connectivity: ConnectivityState) -> Self {
        Self {
            redis,
            connectivity,
        }
    }

    fn available(&self) -> bool {
        self.connectivity.is_reachable(Link::Cache)
    }

    pub async fn get(&self, id: Uuid) -> Option<Ride> {
        if !self.available() {
            return None;
        }

        match self.redis.get_json::<Ride>(&ride_key(id)).await {
            Ok(ride) => ride,
            Err(e) => {
                warn!("Ride cache read failed: {}", e);
                self.connectivity.mark(Link::Cache, false);
                None
            }
        }
    }

    /// Cache `ride` unless a newer version is already there
    ///
    /// Returns false when Redis could not be written at all. A copy skipped
    /// because the cache already holds a newer one counts as cached.
    pub async fn put(&self, ride: &Ride) -> bool {
        if !self.available() {
            return false;
        }

        match self
            .redis
            .set_json_if_newer(&ride_key(ride.id), ride, ride.version, RIDE_TTL_SECONDS)
            .await
        {
            Ok(written) => {
                if !written {
                    debug!("Kept newer cached copy of ride {}", ride.id);
                }
                true
            }
            Err(e) => {
                warn!("Ride cache write failed: {}", e);
                self.connectivity.mark(Link::Cache, false);
                false
            }
        }
    }

    /// Drop the cached copy; attempted even while the link is marked down
    pub async fn invalidate(&self, id: Uuid) {
        if let Err(e) = self.redis.delete(&ride_key(id)).await {
            warn!("Failed to invalidate cached ride {}: {}", id, e);
        }
    }
}

/// Ride repository fronted by the cache
#[derive(Clone)]
pub struct CachedRides {
    repository: RideRepository,
    cache: RideCache,
}

impl CachedRides {
    pub fn new(repository: RideRepository, cache: RideCache) -> Self {
        Self { repository, cache }
    }

    pub fn repository(&self) -> &RideRepository {
        &self.repository
    }

    /// Cached copy when there is one, else the database row
    pub async fn get(&self, id: Uuid) -> Result<Option<Ride>> {
        if let Some(ride) = self.cache.get(id).await {
            debug!("Ride {} served from cache", id);
            return Ok(Some(ride));
        }

        let ride = self.repository.find_by_id(id).await?;
        if let Some(ride) = &ride {
            self.cache.put(ride).await;
        }
        Ok(ride)
    }

    pub async fn insert(&self, ride: &Ride) -> Result<Ride> {
        self.repository.insert(ride).await
    }
}

impl RideStore for CachedRides {
    async fn load(&self, id: Uuid) -> Result<Option<Ride>> {
        self.repository.find_by_id(id).await
    }

    async fn replace(&self, ride: &Ride) -> Result<Option<Ride>> {
        let saved = self.repository.replace(ride).await?;
        if let Some(saved) = &saved {
            if !self.cache.put(saved).await {
                self.cache.invalidate(saved.id).await;
            }
        }
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{booking, booking_service::tests::ride, cache::RedisConfig};
    use chrono::Utc;

    async fn cache(connectivity: ConnectivityState) -> RideCache {
        let redis = RedisPool::new(&RedisConfig {
            url: "redis://127.0.0.1:6379".to_string(),
        })
        .await
        .unwrap();
        RideCache::new(redis, connectivity)
    }

    #[test]
    fn test_ride_key() {
        let id = Uuid::nil();
        assert_eq!(ride_key(id), "ride:00000000-0000-0000-0000-000000000000");
    }

    #[tokio::test]
    async fn test_unreachable_cache_is_bypassed() {
        let connectivity = ConnectivityState::new();
        connectivity.mark(Link::Cache, false);
        let cache = cache(connectivity).await;
        let ride = ride(Uuid::new_v4(), 2, true);

        assert!(cache.get(ride.id).await.is_none());
        assert!(!cache.put(&ride).await);
    }

    #[tokio::test]
    #[ignore = "requires a running Redis server"]
    async fn test_put_get_invalidate() {
        let cache = cache(ConnectivityState::new()).await;
        let ride = ride(Uuid::new_v4(), 2, true);

        assert!(cache.put(&ride).await);
        assert_eq!(cache.get(ride.id).await, Some(ride.clone()));

        cache.invalidate(ride.id).await;
        assert_eq!(cache.get(ride.id).await, None);
    }

    #[tokio::test]
    #[ignore = "requires a running Redis server"]
    async fn test_late_stale_read_keeps_committed_copy() {
        let cache = cache(ConnectivityState::new()).await;
        let stale = ride(Uuid::new_v4(), 2, true);

        // a booking commits while an older read is still on its way to the cache
        let mut committed = stale.clone();
        booking::request_booking(&mut committed, Uuid::new_v4(), None, Utc::now()).unwrap();
        committed.version += 1;
        assert!(cache.put(&committed).await);
        assert!(cache.put(&stale).await);

        assert_eq!(cache.get(stale.id).await, Some(committed.clone()));

        cache.invalidate(stale.id).await;
    }
}
