use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::suggest::SuggestionSettings;

/// Application configuration loaded from environment variables.
/// Fails at startup if a required variable is missing or a number is malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Absent → in-process cache only.
    pub redis_url: Option<String>,
    pub redis_timeout: Duration,
    /// How long Redis is skipped after a failure.
    pub redis_retry_after: Duration,
    /// Absent → curated suggestions only.
    pub anthropic_api_key: Option<String>,
    pub llm_timeout: Duration,
    pub port: u16,
    pub rust_log: String,
    pub suggestions: SuggestionSettings,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let defaults = SuggestionSettings::default();

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: optional_env("REDIS_URL"),
            redis_timeout: Duration::from_millis(parse_env("SUGGEST_REDIS_TIMEOUT_MS", 250)?),
            redis_retry_after: Duration::from_millis(parse_env(
                "SUGGEST_REDIS_RETRY_AFTER_MS",
                5_000,
            )?),
            anthropic_api_key: optional_env("ANTHROPIC_API_KEY"),
            llm_timeout: Duration::from_millis(parse_env("SUGGEST_LLM_TIMEOUT_MS", 10_000)?),
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            suggestions: SuggestionSettings {
                cache_ttl: Duration::from_secs(parse_env(
                    "SUGGEST_CACHE_TTL_SECS",
                    defaults.cache_ttl.as_secs(),
                )?),
                memory_cache_capacity: parse_env(
                    "SUGGEST_MEMORY_CACHE_CAPACITY",
                    defaults.memory_cache_capacity,
                )?,
                short_circuit_min_results: parse_env(
                    "SUGGEST_SHORT_CIRCUIT_MIN_RESULTS",
                    defaults.short_circuit_min_results,
                )?,
                short_circuit_max_query_chars: parse_env(
                    "SUGGEST_SHORT_CIRCUIT_MAX_QUERY_CHARS",
                    defaults.short_circuit_max_query_chars,
                )?,
                enhancement_queue_capacity: parse_env(
                    "SUGGEST_ENHANCEMENT_QUEUE_CAPACITY",
                    defaults.enhancement_queue_capacity,
                )?,
                enhancement_concurrency: parse_env(
                    "SUGGEST_ENHANCEMENT_CONCURRENCY",
                    defaults.enhancement_concurrency,
                )?,
            },
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Unset and blank are both treated as absent.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse::<T>()
        .with_context(|| format!("{key} must be a valid number, got '{raw}'"))
}
