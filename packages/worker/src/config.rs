use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use thiserror::Error;
use typed_builder::TypedBuilder;

/// Missing or unusable configuration. Nothing is polled or claimed while
/// configuration is invalid.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub port: u16,
    pub openai_api_key: String,
    pub openai_base_url: Option<String>,
    pub generation_requests_per_minute: u32,
    pub generation_burst: u32,
    pub generation_timeout_secs: Option<u64>,
    pub schedule_cron: String,
    pub scheduler_enabled: bool,
    pub generation: GenerationSettings,
}

/// Knobs of a single generation pass.
#[derive(Debug, Clone, PartialEq, TypedBuilder)]
pub struct GenerationSettings {
    /// Model selector sent to the generation service.
    #[builder(default = "gpt-4o".to_string(), setter(into))]
    pub model: String,
    /// Upper bound of jobs taken from each partition per pass.
    #[builder(default = 3)]
    pub poll_limit: i64,
    /// Questions requested per generation call.
    #[builder(default = 10)]
    pub batch_size: u32,
    /// Jobs processed at the same time within a pass.
    #[builder(default = 1)]
    pub max_concurrent_jobs: usize,
    /// Fail a job whose share of missing questions exceeds this ratio.
    #[builder(default, setter(strip_option))]
    pub max_failure_ratio: Option<f64>,
    /// Bytes of document text embedded in document-backed prompts.
    #[builder(default = 8000)]
    pub max_document_chars: usize,
    #[builder(default = 0.8)]
    pub temperature: f32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl GenerationSettings {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::Missing("GENERATION_MODEL"));
        }
        if self.poll_limit < 1 {
            return Err(ConfigError::Invalid {
                name: "POLL_LIMIT",
                reason: "must be at least 1".into(),
            });
        }
        if self.batch_size < 1 {
            return Err(ConfigError::Invalid {
                name: "BATCH_SIZE",
                reason: "must be at least 1".into(),
            });
        }
        if self.max_concurrent_jobs < 1 {
            return Err(ConfigError::Invalid {
                name: "MAX_CONCURRENT_JOBS",
                reason: "must be at least 1".into(),
            });
        }
        if let Some(ratio) = self.max_failure_ratio {
            if !(0.0..=1.0).contains(&ratio) {
                return Err(ConfigError::Invalid {
                    name: "MAX_FAILURE_RATIO",
                    reason: format!("{} is outside 0.0..=1.0", ratio),
                });
            }
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let generation = GenerationSettings {
            model: env::var("GENERATION_MODEL").unwrap_or_else(|_| "gpt-4o".to_string()),
            poll_limit: parse_var("POLL_LIMIT", 3)?,
            batch_size: parse_var("BATCH_SIZE", 10)?,
            max_concurrent_jobs: parse_var("MAX_CONCURRENT_JOBS", 1)?,
            max_failure_ratio: parse_optional_var("MAX_FAILURE_RATIO")?,
            max_document_chars: parse_var("MAX_DOCUMENT_CHARS", 8000)?,
            temperature: parse_var("GENERATION_TEMPERATURE", 0.8)?,
        };

        let config = Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            database_max_connections: parse_var("DATABASE_MAX_CONNECTIONS", 10)?,
            port: parse_var("PORT", 8080)?,
            openai_api_key: env::var("OPENAI_API_KEY").context("OPENAI_API_KEY must be set")?,
            openai_base_url: env::var("OPENAI_BASE_URL").ok(),
            generation_requests_per_minute: parse_var("GENERATION_REQUESTS_PER_MINUTE", 40)?,
            generation_burst: parse_var("GENERATION_BURST", 1)?,
            generation_timeout_secs: parse_optional_var("GENERATION_TIMEOUT_SECS")?,
            schedule_cron: env::var("SCHEDULE_CRON").unwrap_or_else(|_| "0 * * * * *".to_string()),
            scheduler_enabled: parse_var("SCHEDULER_ENABLED", true)?,
            generation,
        };

        config.validate()?;
        Ok(config)
    }

    /// Fail fast before anything touches the queue.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.database_url.trim().is_empty() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }
        if self.openai_api_key.trim().is_empty() {
            return Err(ConfigError::Missing("OPENAI_API_KEY"));
        }
        if self.generation_requests_per_minute == 0 {
            return Err(ConfigError::Invalid {
                name: "GENERATION_REQUESTS_PER_MINUTE",
                reason: "must be at least 1".into(),
            });
        }
        if self.generation_burst == 0 {
            return Err(ConfigError::Invalid {
                name: "GENERATION_BURST",
                reason: "must be at least 1".into(),
            });
        }
        if self.scheduler_enabled && self.schedule_cron.trim().is_empty() {
            return Err(ConfigError::Missing("SCHEDULE_CRON"));
        }
        self.generation.validate()
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a valid value", name)),
        Err(_) => Ok(default),
    }
}

fn parse_optional_var<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("{} must be a valid value", name)),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            database_url: "postgres://localhost/questions".into(),
            database_max_connections: 10,
            port: 8080,
            openai_api_key: "sk-test".into(),
            openai_base_url: None,
            generation_requests_per_minute: 40,
            generation_burst: 1,
            generation_timeout_secs: None,
            schedule_cron: "0 * * * * *".into(),
            scheduler_enabled: true,
            generation: GenerationSettings::default(),
        }
    }

    #[test]
    fn defaults_are_valid() {
        let settings = GenerationSettings::default();
        assert_eq!(settings.batch_size, 10);
        assert_eq!(settings.poll_limit, 3);
        assert_eq!(settings.max_document_chars, 8000);
        assert_eq!(settings.max_failure_ratio, None);
        assert!(config().validate().is_ok());
    }

    #[test]
    fn blank_api_key_is_rejected() {
        let mut config = config();
        config.openai_api_key = "  ".into();
        assert_eq!(config.validate(), Err(ConfigError::Missing("OPENAI_API_KEY")));
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let settings = GenerationSettings::builder().batch_size(0).build();
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::Invalid { name: "BATCH_SIZE", .. })
        ));
    }

    #[test]
    fn failure_ratio_must_be_a_fraction() {
        let settings = GenerationSettings::builder().max_failure_ratio(1.5).build();
        assert!(settings.validate().is_err());

        let settings = GenerationSettings::builder().max_failure_ratio(0.5).build();
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn zero_rate_is_rejected() {
        let mut config = config();
        config.generation_requests_per_minute = 0;
        assert!(config.validate().is_err());
    }
}
