use std::time::Duration;

use anyhow::{Context, Result};

const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Application configuration loaded from environment variables.
/// Startup fails if a required variable is missing or an optional one is malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub anthropic_api_key: String,
    pub anthropic_model: String,
    pub llm_timeout: Duration,
    pub pipeline_workers: usize,
    /// Unset means notifications are only logged.
    pub notify_webhook_url: Option<String>,
    pub site_url: String,
    pub max_resume_bytes: usize,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: require_env("REDIS_URL")?,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            anthropic_model: optional_env("ANTHROPIC_MODEL")
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            llm_timeout: Duration::from_secs(
                parse_env("LLM_TIMEOUT_SECS", 60)
                    .context("LLM_TIMEOUT_SECS must be a whole number of seconds")?,
            ),
            pipeline_workers: parse_env::<usize>("PIPELINE_WORKERS", 4)
                .context("PIPELINE_WORKERS must be a positive integer")?
                .max(1),
            notify_webhook_url: optional_env("NOTIFY_WEBHOOK_URL"),
            site_url: optional_env("SITE_URL")
                .unwrap_or_else(|| "http://localhost:8080".to_string()),
            max_resume_bytes: parse_env("MAX_RESUME_BYTES", 10 * 1024 * 1024)
                .context("MAX_RESUME_BYTES must be a byte count")?,
            port: parse_env("PORT", 8080).context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Blank values count as unset.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("Invalid value '{raw}' for {key}")),
        None => Ok(default),
    }
}
