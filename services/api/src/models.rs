//! API models for request and response payloads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Response of `GET /api/health`
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: bool,
    pub cache: bool,
    pub timestamp: DateTime<Utc>,
}

/// Response of `PUT /api/messages/read/:user_id/:other_user_id`
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkReadResponse {
    pub message: String,
    pub updated: u64,
}
