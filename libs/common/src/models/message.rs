//! Direct messages and ride notifications

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub content: String,
    pub ride_id: Option<Uuid>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// Payload for sending a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub content: String,
    #[serde(default)]
    pub ride_id: Option<Uuid>,
}

impl NewMessage {
    pub fn validate(&self) -> Result<(), String> {
        if self.content.trim().is_empty() {
            return Err("Message content is required".to_string());
        }
        if self.content.chars().count() > 2000 {
            return Err("Message content must be at most 2000 characters".to_string());
        }
        if self.sender_id == self.recipient_id {
            return Err("You cannot send a message to yourself".to_string());
        }
        Ok(())
    }
}

/// Latest message and unread count of one conversation partner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub other_user_id: Uuid,
    pub last_message: Message,
    pub unread_count: i64,
}
