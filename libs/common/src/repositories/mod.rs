//! Repositories shared by the services

use std::collections::HashSet;

use anyhow::Result;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::{models::Contact, notifications::ContactBook};

pub mod messages;
pub mod rides;

pub use messages::MessageRepository;
pub use rides::RideRepository;

/// Read-only view of the users table owned by the auth service
///
/// Closed accounts are not treated as existing.
#[derive(Clone)]
pub struct UserDirectory {
    pool: PgPool,
}

impl UserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn exists(&self, id: Uuid) -> Result<bool> {
        let row = sqlx::query(
            "SELECT EXISTS (SELECT 1 FROM users WHERE id = $1 AND deleted_at IS NULL) AS found",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("found"))
    }

    /// Contact details of the given users; unknown ids are skipped
    pub async fn contacts(&self, ids: &[Uuid]) -> Result<ContactBook> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, email, phone
            FROM users
            WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        let contacts = rows
            .into_iter()
            .map(|row| {
                let contact = Contact {
                    id: row.get("id"),
                    name: row.get("name"),
                    email: row.get("email"),
                    phone: row.get("phone"),
                };
                (contact.id, contact)
            })
            .collect();

        Ok(contacts)
    }

    /// The subset of `ids` whose identity has been verified
    pub async fn verified(&self, ids: &[Uuid]) -> Result<HashSet<Uuid>> {
        let rows = sqlx::query(
            "SELECT id FROM users WHERE id = ANY($1) AND is_id_verified AND deleted_at IS NULL",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|row| row.get("id")).collect())
    }
}
