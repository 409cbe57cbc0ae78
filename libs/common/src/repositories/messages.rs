//! Direct messages and ride notifications

use anyhow::Result;
use chrono::Utc;
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::info;
use uuid::Uuid;

use crate::models::{ConversationSummary, Message, NewMessage};

const MESSAGE_COLUMNS: &str = "id, sender_id, recipient_id, content, ride_id, read, created_at";

fn message_from_row(row: &PgRow) -> Message {
    Message {
        id: row.get("id"),
        sender_id: row.get("sender_id"),
        recipient_id: row.get("recipient_id"),
        content: row.get("content"),
        ride_id: row.get("ride_id"),
        read: row.get("read"),
        created_at: row.get("created_at"),
    }
}

/// Message repository
#[derive(Clone)]
pub struct MessageRepository {
    pool: PgPool,
}

impl MessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, message: &NewMessage) -> Result<Message> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO messages (id, sender_id, recipient_id, content, ride_id, read, created_at)
            VALUES ($1, $2, $3, $4, $5, FALSE, $6)
            RETURNING {MESSAGE_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(message.sender_id)
        .bind(message.recipient_id)
        .bind(message.content.trim())
        .bind(message.ride_id)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(message_from_row(&row))
    }

    /// Every message the user sent or received, oldest first
    pub async fn for_user(&self, user_id: Uuid) -> Result<Vec<Message>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {MESSAGE_COLUMNS}
            FROM messages
            WHERE sender_id = $1 OR recipient_id = $1
            ORDER BY created_at ASC
            "#
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(message_from_row).collect())
    }

    /// Mark everything `other_user_id` sent to `user_id` as read
    pub async fn mark_read(&self, user_id: Uuid, other_user_id: Uuid) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE messages
            SET read = TRUE
            WHERE recipient_id = $1 AND sender_id = $2 AND NOT read
            "#,
        )
        .bind(user_id)
        .bind(other_user_id)
        .execute(&self.pool)
        .await?;

        info!(
            "Marked {} messages from {} to {} as read",
            result.rows_affected(),
            other_user_id,
            user_id
        );
        Ok(result.rows_affected())
    }

    /// Latest message and unread count per conversation partner, most recent first
    pub async fn conversations(&self, user_id: Uuid) -> Result<Vec<ConversationSummary>> {
        let rows = sqlx::query(
            r#"
            WITH partnered AS (
                SELECT m.*,
                       CASE WHEN m.sender_id = $1 THEN m.recipient_id ELSE m.sender_id END
                           AS other_user_id
                FROM messages m
                WHERE m.sender_id = $1 OR m.recipient_id = $1
            ),
            latest AS (
                SELECT DISTINCT ON (other_user_id) *
                FROM partnered
                ORDER BY other_user_id, created_at DESC
            )
            SELECT latest.*,
                   (SELECT COUNT(*)
                    FROM partnered p
                    WHERE p.other_user_id = latest.other_user_id
                      AND p.recipient_id = $1
                      AND NOT p.read) AS unread_count
            FROM latest
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let conversations = rows
            .iter()
            .map(|row| ConversationSummary {
                other_user_id: row.get("other_user_id"),
                last_message: message_from_row(row),
                unread_count: row.get("unread_count"),
            })
            .collect();

        Ok(conversations)
    }
}
