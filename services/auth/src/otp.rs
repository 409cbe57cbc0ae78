//! One-time passwords and password reset grants backed by Redis

use anyhow::Result;
use common::cache::RedisPool;
use rand::Rng;
use tracing::info;

use crate::models::OtpPurpose;

/// How long an issued code or reset grant stays valid
pub const OTP_TTL_SECONDS: u64 = 600;

/// Generate a zero-padded six digit code
pub fn generate_otp() -> String {
    let code: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{:06}", code)
}

fn otp_key(purpose: OtpPurpose, email: &str) -> String {
    format!("otp:{}:{}", purpose.as_str(), email.trim().to_lowercase())
}

fn reset_key(email: &str) -> String {
    format!("password_reset:{}", email.trim().to_lowercase())
}

/// Redis-backed store of outstanding codes
#[derive(Clone)]
pub struct OtpStore {
    redis: RedisPool,
}

impl OtpStore {
    pub fn new(redis: RedisPool) -> Self {
        Self { redis }
    }

    /// Issue a fresh code, replacing any earlier one for the same purpose
    pub async fn issue(&self, purpose: OtpPurpose, email: &str) -> Result<String> {
        let otp = generate_otp();
        self.redis
            .set(&otp_key(purpose, email), &otp, Some(OTP_TTL_SECONDS))
            .await?;
        info!("Issued {} code for {}", purpose.as_str(), email);
        Ok(otp)
    }

    /// Consume the outstanding code; a code can be checked at most once
    pub async fn verify(&self, purpose: OtpPurpose, email: &str, otp: &str) -> Result<bool> {
        let stored = self.redis.take(&otp_key(purpose, email)).await?;
        Ok(stored.as_deref() == Some(otp.trim()))
    }

    /// Allow one password reset for `email`
    pub async fn grant_reset(&self, email: &str) -> Result<()> {
        self.redis
            .set(&reset_key(email), "granted", Some(OTP_TTL_SECONDS))
            .await
    }

    /// Consume the reset grant, reporting whether one existed
    pub async fn take_reset_grant(&self, email: &str) -> Result<bool> {
        Ok(self.redis.take(&reset_key(email)).await?.is_some())
    }
}
