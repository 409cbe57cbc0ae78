//! Ratings and the denormalized average on users

use anyhow::Result;
use chrono::Utc;
use common::models::{NewRating, Rating, RatingType};
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::info;
use uuid::Uuid;

const RATING_COLUMNS: &str =
    "id, rater_id, ratee_id, ride_id, rating, comment, rating_type, created_at";

fn rating_from_row(row: &PgRow) -> Result<Rating> {
    let rating_type: String = row.try_get("rating_type")?;

    Ok(Rating {
        id: row.try_get("id")?,
        rater_id: row.try_get("rater_id")?,
        ratee_id: row.try_get("ratee_id")?,
        ride_id: row.try_get("ride_id")?,
        rating: row.try_get("rating")?,
        comment: row.try_get("comment")?,
        rating_type: rating_type
            .parse::<RatingType>()
            .map_err(anyhow::Error::msg)?,
        created_at: row.try_get("created_at")?,
    })
}

/// Outcome of inserting a rating
#[derive(Debug)]
pub enum CreateRating {
    Created(Rating),
    /// The rater already rated this user for this ride
    Duplicate,
    RideNotFound,
}

/// Rating repository
#[derive(Clone)]
pub struct RatingRepository {
    pool: PgPool,
}

impl RatingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a rating and recompute the ratee's average in one transaction
    pub async fn create(&self, new_rating: &NewRating) -> Result<CreateRating> {
        let mut tx = self.pool.begin().await?;

        let ride_exists: bool =
            sqlx::query("SELECT EXISTS (SELECT 1 FROM rides WHERE id = $1) AS found")
                .bind(new_rating.ride_id)
                .fetch_one(&mut *tx)
                .await?
                .get("found");
        if !ride_exists {
            return Ok(CreateRating::RideNotFound);
        }

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO ratings (id, rater_id, ratee_id, ride_id, rating, comment, rating_type, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (rater_id, ratee_id, ride_id) DO NOTHING
            RETURNING {RATING_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(new_rating.rater_id)
        .bind(new_rating.ratee_id)
        .bind(new_rating.ride_id)
        .bind(new_rating.rating)
        .bind(new_rating.comment.as_deref().map(str::trim))
        .bind(new_rating.rating_type.as_str())
        .bind(Utc::now())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(CreateRating::Duplicate);
        };
        let rating = rating_from_row(&row)?;

        sqlx::query(
            r#"
            UPDATE users
            SET rating = (SELECT AVG(rating)::DOUBLE PRECISION FROM ratings WHERE ratee_id = $1),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(new_rating.ratee_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            "User {} rated {} {} stars",
            rating.rater_id, rating.ratee_id, rating.rating
        );
        Ok(CreateRating::Created(rating))
    }

    /// Ratings the user received, newest first
    pub async fn for_user(&self, ratee_id: Uuid) -> Result<Vec<Rating>> {
        let rows = sqlx::query(&format!(
            "SELECT {RATING_COLUMNS} FROM ratings WHERE ratee_id = $1 ORDER BY created_at DESC"
        ))
        .bind(ratee_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(rating_from_row).collect()
    }
}
