//! HTTP server settings loaded from the environment
//!
//! # Environment Variables
//! - `PORT`: listen port (service-specific default)
//! - `APP_ENV`: `development` or `production` (default: `development`)
//! - `CORS_ORIGINS`: comma separated list of allowed browser origins
//! - `CONNECTIVITY_CHECK_SECS`: interval of the database/cache check (default: 15)

use anyhow::Result;
use config::{Config, Environment};
use serde::Deserialize;

const DEFAULT_CORS_ORIGINS: &str = "http://localhost:3000,http://localhost:5173";

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub port: u16,
    pub app_env: String,
    cors_origins: String,
    pub connectivity_check_secs: u64,
}

impl ServerSettings {
    /// Load settings, falling back to `default_port` when `PORT` is unset
    pub fn load(default_port: u16) -> Result<Self> {
        let settings = Config::builder()
            .set_default("port", i64::from(default_port))?
            .set_default("app_env", "development")?
            .set_default("cors_origins", DEFAULT_CORS_ORIGINS)?
            .set_default("connectivity_check_secs", 15_i64)?
            .add_source(Environment::default())
            .build()?
            .try_deserialize::<ServerSettings>()?;

        if settings.connectivity_check_secs == 0 {
            anyhow::bail!("CONNECTIVITY_CHECK_SECS must be greater than zero");
        }

        Ok(settings)
    }

    pub fn bind_address(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }

    pub fn is_production(&self) -> bool {
        self.app_env.eq_ignore_ascii_case("production")
    }

    /// Allowed CORS origins, trimmed and without empty entries
    pub fn cors_origins(&self) -> Vec<String> {
        self.cors_origins
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        unsafe {
            std::env::remove_var("PORT");
            std::env::remove_var("APP_ENV");
            std::env::remove_var("CORS_ORIGINS");
            std::env::remove_var("CONNECTIVITY_CHECK_SECS");
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();

        let settings = ServerSettings::load(3001).unwrap();
        assert_eq!(settings.port, 3001);
        assert_eq!(settings.bind_address(), "0.0.0.0:3001");
        assert!(!settings.is_production());
        assert_eq!(
            settings.cors_origins(),
            vec!["http://localhost:3000", "http://localhost:5173"]
        );
        assert_eq!(settings.connectivity_check_secs, 15);
    }

    #[test]
    #[serial]
    fn test_environment_overrides() {
        clear_env();
        unsafe {
            std::env::set_var("PORT", "8080");
            std::env::set_var("APP_ENV", "Production");
            std::env::set_var("CORS_ORIGINS", "https://rides.example.com, ,https://admin.example.com");
        }

        let settings = ServerSettings::load(3001).unwrap();
        assert_eq!(settings.port, 8080);
        assert!(settings.is_production());
        assert_eq!(
            settings.cors_origins(),
            vec!["https://rides.example.com", "https://admin.example.com"]
        );

        clear_env();
    }
}
