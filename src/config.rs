//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to automatically deserialize environment variables into a type-safe struct.

use serde::Deserialize;

/// Where uploaded files are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageDriver {
    Local,
    S3,
}

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required): PostgreSQL connection string
/// - `AUDIT_SIGNING_SECRET` (required): HMAC key for audit log signatures
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `REDIS_URL` (optional): shared rate-limit counters; in-process counters when unset
/// - `STORAGE_DRIVER` (optional): `local` (default) or `s3`
///
/// See the field list for the remaining optional keys.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default = "default_max_connections")]
    pub database_max_connections: u32,

    pub audit_signing_secret: String,

    #[serde(default)]
    pub redis_url: Option<String>,

    #[serde(default = "default_rate_limit_requests")]
    pub rate_limit_requests: u64,

    #[serde(default = "default_rate_limit_window_secs")]
    pub rate_limit_window_secs: u64,

    #[serde(default = "default_storage_driver")]
    pub storage_driver: StorageDriver,

    #[serde(default = "default_storage_local_dir")]
    pub storage_local_dir: String,

    #[serde(default = "default_storage_public_base_url")]
    pub storage_public_base_url: String,

    #[serde(default)]
    pub s3_base_url: Option<String>,

    #[serde(default)]
    pub s3_bucket: Option<String>,

    #[serde(default)]
    pub s3_bearer_token: Option<String>,

    #[serde(default = "default_upload_max_bytes")]
    pub upload_max_bytes: u64,

    #[serde(default = "default_webhook_timeout_secs")]
    pub webhook_timeout_secs: u64,

    #[serde(default)]
    pub bootstrap_tenant_name: Option<String>,

    #[serde(default)]
    pub bootstrap_admin_email: Option<String>,

    #[serde(default)]
    pub bootstrap_admin_key: Option<String>,
}

/// Default port if SERVER_PORT environment variable is not set.
fn default_port() -> u16 {
    3000
}

fn default_max_connections() -> u32 {
    5
}

fn default_rate_limit_requests() -> u64 {
    100
}

fn default_rate_limit_window_secs() -> u64 {
    60
}

fn default_storage_driver() -> StorageDriver {
    StorageDriver::Local
}

fn default_storage_local_dir() -> String {
    "./uploads".to_string()
}

fn default_storage_public_base_url() -> String {
    "/files".to_string()
}

/// 10 MiB
fn default_upload_max_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_webhook_timeout_secs() -> u64 {
    5
}

/// Configuration could not be loaded or is inconsistent.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Env(#[from] envy::Error),

    #[error("{0}")]
    Invalid(String),
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config struct.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing (e.g., DATABASE_URL)
    /// - Environment variable values cannot be parsed into expected types
    /// - The loaded values are inconsistent (see [`Config::validate`])
    pub fn from_env() -> Result<Self, ConfigError> {
        // Try to load .env file if it exists (does nothing if not found)
        dotenvy::dotenv().ok();

        // Field names are automatically converted: database_url -> DATABASE_URL
        let config = envy::from_env::<Config>()?;
        config.validate()?;
        Ok(config)
    }

    /// Build configuration from explicit `KEY=value` pairs instead of the process environment.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let config = envy::from_iter::<_, Config>(
            pairs.into_iter().map(|(k, v)| (k.into(), v.into())),
        )?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints envy cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.audit_signing_secret.len() < 16 {
            return Err(ConfigError::Invalid(
                "AUDIT_SIGNING_SECRET must be at least 16 bytes".to_string(),
            ));
        }

        if self.rate_limit_requests == 0 || self.rate_limit_window_secs == 0 {
            return Err(ConfigError::Invalid(
                "RATE_LIMIT_REQUESTS and RATE_LIMIT_WINDOW_SECS must be positive".to_string(),
            ));
        }

        if self.storage_driver == StorageDriver::S3
            && (self.s3_base_url.is_none() || self.s3_bucket.is_none())
        {
            return Err(ConfigError::Invalid(
                "S3_BASE_URL and S3_BUCKET are required when STORAGE_DRIVER=s3".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123";

    #[test]
    fn applies_defaults() {
        let config = Config::from_pairs([
            ("DATABASE_URL", "postgres://localhost/erp"),
            ("AUDIT_SIGNING_SECRET", SECRET),
        ])
        .unwrap();

        assert_eq!(config.server_port, 3000);
        assert_eq!(config.rate_limit_requests, 100);
        assert_eq!(config.storage_driver, StorageDriver::Local);
        assert!(config.redis_url.is_none());
    }

    #[test]
    fn rejects_short_audit_secret() {
        let result = Config::from_pairs([
            ("DATABASE_URL", "postgres://localhost/erp"),
            ("AUDIT_SIGNING_SECRET", "short"),
        ]);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn s3_driver_requires_endpoint() {
        let result = Config::from_pairs([
            ("DATABASE_URL", "postgres://localhost/erp"),
            ("AUDIT_SIGNING_SECRET", SECRET),
            ("STORAGE_DRIVER", "s3"),
        ]);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn missing_database_url_is_an_env_error() {
        let result = Config::from_pairs([("AUDIT_SIGNING_SECRET", SECRET)]);
        assert!(matches!(result, Err(ConfigError::Env(_))));
    }
}
