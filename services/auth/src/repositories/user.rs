//! User repository for database operations

use anyhow::Result;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::models::{NewUser, UpdateProfile, User};

const USER_COLUMNS: &str = "id, name, email, password_hash, phone, address, bio, rating, \
     is_admin, is_phone_verified, is_id_verified, is_email_verified, created_at, updated_at";

const CLOSED_ACCOUNT_NAME: &str = "Deleted user";

/// Unique placeholder keeping the email column's constraint satisfied
fn closed_account_email(id: Uuid) -> String {
    format!("deleted-{}@deleted.invalid", id.simple())
}

/// Hash a password into an argon2 PHC string
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
        .to_string();
    Ok(hash)
}

/// Check a password against a stored argon2 hash
pub fn verify_password(password_hash: &str, password: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|e| anyhow::anyhow!("Failed to parse password hash: {}", e))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Whether an error is a PostgreSQL unique constraint violation
pub fn is_unique_violation(error: &anyhow::Error) -> bool {
    matches!(
        error.downcast_ref::<sqlx::Error>(),
        Some(sqlx::Error::Database(db)) if db.is_unique_violation()
    )
}

/// User repository
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Create a new user repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new user; the email is stored lower-cased
    pub async fn create(&self, new_user: &NewUser) -> Result<User> {
        info!("Creating new user: {}", new_user.email);

        let password_hash = hash_password(&new_user.password)?;

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, name, email, password_hash, phone)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(new_user.name.trim())
        .bind(new_user.email.trim().to_lowercase())
        .bind(&password_hash)
        .bind(&new_user.phone)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    /// Find a user by email, case-insensitively
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        info!("Finding user by email: {}", email);

        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 AND deleted_at IS NULL"
        ))
        .bind(email.trim().to_lowercase())
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Find a user by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        info!("Finding user by ID: {}", id);

        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Replace the profile fields present in the update
    pub async fn update_profile(&self, id: Uuid, update: &UpdateProfile) -> Result<Option<User>> {
        info!("Updating profile of user: {}", id);

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET name = COALESCE($2, name),
                phone = COALESCE($3, phone),
                address = COALESCE($4, address),
                bio = COALESCE($5, bio),
                updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(update.name.as_deref().map(str::trim))
        .bind(&update.phone)
        .bind(&update.address)
        .bind(&update.bio)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Store a new password hash; returns false when the user does not exist
    pub async fn update_password(&self, id: Uuid, new_password: &str) -> Result<bool> {
        info!("Updating password of user: {}", id);

        let password_hash = hash_password(new_password)?;
        let result = sqlx::query(
            "UPDATE users SET password_hash = $2, updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(&password_hash)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn mark_email_verified(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE users SET is_email_verified = TRUE, updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Close an account: strip its personal data and mark it deleted
    ///
    /// The row stays so rides, messages and ratings keep their references.
    /// Returns false when there was no open account with this id.
    pub async fn close_account(&self, id: Uuid) -> Result<bool> {
        info!("Closing account of user: {}", id);

        let result = sqlx::query(
            r#"
            UPDATE users
            SET name = $2,
                email = $3,
                password_hash = '',
                phone = NULL,
                address = NULL,
                bio = NULL,
                deleted_at = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(CLOSED_ACCOUNT_NAME)
        .bind(closed_account_email(id))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify_password() {
        let hash = hash_password("correct horse").unwrap();

        assert!(hash.starts_with("$argon2"));
        assert!(verify_password(&hash, "correct horse").unwrap());
        assert!(!verify_password(&hash, "wrong horse").unwrap());
    }

    #[test]
    fn test_hashes_are_salted() {
        assert_ne!(hash_password("same").unwrap(), hash_password("same").unwrap());
    }

    #[test]
    fn test_malformed_hash_is_an_error() {
        assert!(verify_password("not-a-phc-string", "anything").is_err());
    }

    #[test]
    fn test_closed_account_email_is_unique_and_well_formed() {
        let id = Uuid::new_v4();
        let email = closed_account_email(id);

        assert_eq!(email, format!("deleted-{}@deleted.invalid", id.simple()));
        assert_ne!(email, closed_account_email(Uuid::new_v4()));
        assert!(crate::validation::validate_email(&email).is_ok());
    }

    #[test]
    fn test_plain_errors_are_not_unique_violations() {
        assert!(!is_unique_violation(&anyhow::anyhow!("boom")));
        assert!(!is_unique_violation(&anyhow::Error::from(sqlx::Error::RowNotFound)));
    }
}
