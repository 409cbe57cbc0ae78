//! Reachability tracking for the collaborators a component depends on
//!
//! A `ConnectivityState` is created once at startup and handed to every
//! component that needs it (application state, ride cache, client library).
//! It is cheap to clone; all clones observe the same flags.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use serde::Serialize;
use sqlx::PgPool;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::{cache::RedisPool, database};

/// A collaborator whose reachability is tracked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    /// PostgreSQL
    Database,
    /// Redis
    Cache,
    /// The HTTP backend, as seen from the client library
    Backend,
}

#[derive(Debug)]
struct Flags {
    database: AtomicBool,
    cache: AtomicBool,
    backend: AtomicBool,
}

/// Shared reachability flags, all initially reachable
#[derive(Debug, Clone)]
pub struct ConnectivityState {
    flags: Arc<Flags>,
}

/// Point-in-time copy of the flags, as reported by health endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnectivitySnapshot {
    pub database: bool,
    pub cache: bool,
    pub backend: bool,
}

impl Default for ConnectivityState {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectivityState {
    pub fn new() -> Self {
        Self {
            flags: Arc::new(Flags {
                database: AtomicBool::new(true),
                cache: AtomicBool::new(true),
                backend: AtomicBool::new(true),
            }),
        }
    }

    fn flag(&self, link: Link) -> &AtomicBool {
        match link {
            Link::Database => &self.flags.database,
            Link::Cache => &self.flags.cache,
            Link::Backend => &self.flags.backend,
        }
    }

    /// Record the reachability of a link; transitions are logged
    pub fn mark(&self, link: Link, reachable: bool) {
        let previous = self.flag(link).swap(reachable, Ordering::SeqCst);
        if previous != reachable {
            if reachable {
                info!("{:?} is reachable again", link);
            } else {
                warn!("{:?} became unreachable", link);
            }
        }
    }

    pub fn is_reachable(&self, link: Link) -> bool {
        self.flag(link).load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> ConnectivitySnapshot {
        ConnectivitySnapshot {
            database: self.is_reachable(Link::Database),
            cache: self.is_reachable(Link::Cache),
            backend: self.is_reachable(Link::Backend),
        }
    }
}

/// Periodically ping PostgreSQL and Redis and record the results
pub fn spawn_monitor(
    state: ConnectivityState,
    pool: PgPool,
    redis: RedisPool,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;

            let database_up = database::health_check(&pool).await.unwrap_or(false);
            state.mark(Link::Database, database_up);

            let cache_up = redis.health_check().await.unwrap_or(false);
            state.mark(Link::Cache, cache_up);
        }
    })
}
