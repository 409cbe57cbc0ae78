//! Ratings left between drivers and passengers after a ride

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which role the rated user played on the ride
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RatingType {
    Driver,
    Passenger,
}

impl RatingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RatingType::Driver => "driver",
            RatingType::Passenger => "passenger",
        }
    }
}

impl FromStr for RatingType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "driver" => Ok(RatingType::Driver),
            "passenger" => Ok(RatingType::Passenger),
            other => Err(format!("unknown rating type: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    pub id: Uuid,
    pub rater_id: Uuid,
    pub ratee_id: Uuid,
    pub ride_id: Uuid,
    pub rating: i16,
    pub comment: Option<String>,
    #[serde(rename = "type")]
    pub rating_type: RatingType,
    pub created_at: DateTime<Utc>,
}

/// Payload for `POST /api/ratings`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRating {
    pub rater_id: Uuid,
    pub ratee_id: Uuid,
    pub ride_id: Uuid,
    pub rating: i16,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(rename = "type")]
    pub rating_type: RatingType,
}

impl NewRating {
    pub fn validate(&self) -> Result<(), String> {
        if !(1..=5).contains(&self.rating) {
            return Err("Rating must be between 1 and 5".to_string());
        }
        if self.rater_id == self.ratee_id {
            return Err("You cannot rate yourself".to_string());
        }
        if let Some(comment) = &self.comment {
            if comment.chars().count() > 1000 {
                return Err("Comment must be at most 1000 characters".to_string());
            }
        }
        Ok(())
    }
}
