//! Integration tests for the infrastructure components
//!
//! These tests verify that PostgreSQL (with the schema migrations applied) and
//! Redis are reachable and that the connectivity monitor records their state.
//! They need live services and are ignored by default:
//! `cargo test -p common -- --ignored`.

use std::time::Duration;

use common::{
    cache::{RedisConfig, RedisPool},
    connectivity::{ConnectivityState, Link, spawn_monitor},
    database::{DatabaseConfig, health_check, init_pool, run_migrations},
};
use sqlx::Row;

#[tokio::test]
#[ignore = "requires PostgreSQL and Redis"]
async fn test_infrastructure_integration() -> Result<(), Box<dyn std::error::Error>> {
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;
    run_migrations(&pool).await?;

    assert!(health_check(&pool).await?, "Database health check failed");

    let row = sqlx::query("SELECT COUNT(*) AS rides FROM rides")
        .fetch_one(&pool)
        .await?;
    let rides: i64 = row.get("rides");
    assert!(rides >= 0);

    let redis_config = RedisConfig::from_env()?;
    let redis_pool = RedisPool::new(&redis_config).await?;
    assert!(
        redis_pool.health_check().await?,
        "Redis health check failed"
    );

    let state = ConnectivityState::new();
    state.mark(Link::Database, false);
    state.mark(Link::Cache, false);

    let monitor = spawn_monitor(state.clone(), pool, redis_pool, Duration::from_millis(50));
    tokio::time::sleep(Duration::from_millis(200)).await;
    monitor.abort();

    assert!(state.is_reachable(Link::Database));
    assert!(state.is_reachable(Link::Cache));

    Ok(())
}
