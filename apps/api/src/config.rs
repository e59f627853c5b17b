use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::FixedOffset;

use crate::errors::AppError;

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub mail_api_url: String,
    pub mail_api_key: String,
    pub mail_from: String,
    pub port: u16,
    pub rust_log: String,
    /// Offset of the patients' local day from UTC. Deadlines and "today" are evaluated in it.
    pub utc_offset_minutes: i32,
    pub store_timeout_ms: u64,
    /// Upper bound for one mail relay request. Kept separate from store calls.
    pub mail_timeout_ms: u64,
    pub sweep_interval_secs: u64,
    pub sweep_window_minutes: u32,
    pub session_refresh_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            mail_api_url: require_env("MAIL_API_URL")?,
            mail_api_key: require_env("MAIL_API_KEY")?,
            mail_from: require_env("MAIL_FROM")?,
            port: optional_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            utc_offset_minutes: optional_env("UTC_OFFSET_MINUTES", 0)?,
            store_timeout_ms: optional_env("STORE_TIMEOUT_MS", 8000)?,
            mail_timeout_ms: optional_env("MAIL_TIMEOUT_MS", 5000)?,
            sweep_interval_secs: optional_env("SWEEP_INTERVAL_SECS", 900)?,
            sweep_window_minutes: optional_env("SWEEP_WINDOW_MINUTES", 15)?,
            session_refresh_secs: optional_env("SESSION_REFRESH_SECS", 30)?,
        })
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn mail_timeout(&self) -> Duration {
        Duration::from_millis(self.mail_timeout_ms)
    }

    pub fn session_refresh(&self) -> Duration {
        Duration::from_secs(self.session_refresh_secs.max(1))
    }

    /// Rejects blank settings for the blob store and mail relay.
    pub fn check_infrastructure(&self) -> Result<(), AppError> {
        let settings = [
            ("S3_BUCKET", &self.s3_bucket),
            ("S3_ENDPOINT", &self.s3_endpoint),
            ("MAIL_API_URL", &self.mail_api_url),
            ("MAIL_FROM", &self.mail_from),
        ];
        match settings.iter().find(|(_, value)| value.trim().is_empty()) {
            Some((key, _)) => Err(AppError::NotConfigured(format!("{key} is empty"))),
            None => Ok(()),
        }
    }

    /// The fixed offset used as the local day boundary.
    pub fn local_offset(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).with_context(|| {
            format!(
                "UTC_OFFSET_MINUTES={} is outside the valid range",
                self.utc_offset_minutes
            )
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Config {
        Config {
            database_url: "postgres://localhost/medtrack".into(),
            s3_bucket: "proofs".into(),
            s3_endpoint: "http://localhost:9000".into(),
            aws_access_key_id: "key".into(),
            aws_secret_access_key: "secret".into(),
            mail_api_url: "http://localhost:8025/send".into(),
            mail_api_key: "mail".into(),
            mail_from: "alerts@example.com".into(),
            port: 8080,
            rust_log: "info".into(),
            utc_offset_minutes: 330,
            store_timeout_ms: 8000,
            mail_timeout_ms: 5000,
            sweep_interval_secs: 900,
            sweep_window_minutes: 15,
            session_refresh_secs: 30,
        }
    }

    #[test]
    fn test_local_offset_in_minutes() {
        let offset = sample().local_offset().unwrap();
        assert_eq!(offset.local_minus_utc(), 330 * 60);
    }

    #[test]
    fn test_local_offset_out_of_range() {
        let mut config = sample();
        config.utc_offset_minutes = 24 * 60;
        assert!(config.local_offset().is_err());
    }

    #[test]
    fn test_infrastructure_complete() {
        assert!(sample().check_infrastructure().is_ok());
    }

    #[test]
    fn test_blank_bucket_not_configured() {
        let mut config = sample();
        config.s3_bucket = "  ".into();
        assert!(matches!(
            config.check_infrastructure(),
            Err(AppError::NotConfigured(msg)) if msg.contains("S3_BUCKET")
        ));
    }

    #[test]
    fn test_optional_env_default_when_unset() {
        let value: u64 = optional_env("MEDTRACK_TEST_UNSET_VARIABLE", 42).unwrap();
        assert_eq!(value, 42);
    }
}
