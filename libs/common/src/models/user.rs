//! Public user projections

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User as exposed over HTTP; never carries the password hash
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub bio: Option<String>,
    /// Average received rating, 0 when unrated
    pub rating: f64,
    pub is_admin: bool,
    pub is_phone_verified: bool,
    #[serde(rename = "isIDVerified")]
    pub is_id_verified: bool,
    pub is_email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The contact details shared between driver and passenger on booking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

impl Contact {
    /// "email, phone" or just "email"
    pub fn reach(&self) -> String {
        match &self.phone {
            Some(phone) if !phone.trim().is_empty() => format!("{}, {}", self.email, phone),
            _ => self.email.clone(),
        }
    }
}

impl From<&UserProfile> for Contact {
    fn from(user: &UserProfile) -> Self {
        Contact {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
        }
    }
}
