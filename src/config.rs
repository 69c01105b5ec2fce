//! Application configuration loaded from environment variables.
//!
//! Loaded once at startup and passed by value into the provider client,
//! scheduler and store. Nothing reads the environment after that.

use crate::models::city::{parse_city_list, City};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Provider ---
    /// WAQI API base URL
    pub provider_url: String,
    /// WAQI API token
    pub provider_token: String,
    /// Per-request timeout
    pub provider_timeout: Duration,

    // --- Ingestion ---
    /// Cities fetched every cycle (also the only valid query keys)
    pub cities: Vec<City>,
    /// Time between cycle triggers
    pub poll_interval: Duration,
    /// Provider attempts per city per cycle
    pub max_attempts: u32,
    /// First retry delay; doubles on each further retry
    pub retry_base_delay: Duration,
    /// Concurrent provider calls within a cycle
    pub fetch_concurrency: usize,

    // --- Storage ---
    /// SQLite database holding the readings
    pub data_path: PathBuf,
    /// Keep the provider body on stored readings
    pub retain_raw_payload: bool,

    // --- Server ---
    /// Dashboard origin allowed by CORS
    pub frontend_url: String,
    /// Server port
    pub port: u16,
}

impl Config {
    /// Deterministic config for tests only.
    pub fn test_default() -> Self {
        Self {
            provider_url: "http://127.0.0.1:1".to_string(),
            provider_token: "test_token".to_string(),
            provider_timeout: Duration::from_secs(2),
            cities: vec![City::from("Delhi"), City::from("Mumbai")],
            poll_interval: Duration::from_secs(900),
            max_attempts: 3,
            retry_base_delay: Duration::from_millis(1),
            fetch_concurrency: 4,
            data_path: PathBuf::from("data/test-readings.db"),
            retain_raw_payload: true,
            frontend_url: "http://localhost:8050".to_string(),
            port: 8080,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// A `.env` file in the working directory is honored for local runs.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let provider_token = env::var("AQI_PROVIDER_TOKEN")
            .map(|v| v.trim().to_string())
            .map_err(|_| ConfigError::Missing("AQI_PROVIDER_TOKEN"))?;
        if provider_token.is_empty() {
            return Err(ConfigError::Missing("AQI_PROVIDER_TOKEN"));
        }

        let cities = parse_city_list(
            &env::var("AQI_CITIES").map_err(|_| ConfigError::Missing("AQI_CITIES"))?,
        );
        if cities.is_empty() {
            return Err(ConfigError::Invalid {
                name: "AQI_CITIES",
                reason: "at least one city is required".to_string(),
            });
        }

        Ok(Self {
            provider_url: env::var("AQI_PROVIDER_URL")
                .unwrap_or_else(|_| "https://api.waqi.info".to_string())
                .trim_end_matches('/')
                .to_string(),
            provider_token,
            provider_timeout: Duration::from_secs(positive_var("AQI_PROVIDER_TIMEOUT_SECS", 10)?),
            cities,
            poll_interval: Duration::from_secs(positive_var("AQI_POLL_INTERVAL_SECS", 900)?),
            max_attempts: positive_var("AQI_MAX_ATTEMPTS", 3)?,
            retry_base_delay: Duration::from_millis(positive_var("AQI_RETRY_BASE_DELAY_MS", 2000)?),
            fetch_concurrency: positive_var("AQI_FETCH_CONCURRENCY", 4)?,
            data_path: env::var("AQI_DATA_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data/readings.db")),
            retain_raw_payload: parse_var("AQI_RETAIN_RAW_PAYLOAD", true)?,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:8050".to_string()),
            port: parse_var("PORT", 8080)?,
        })
    }
}

/// Read an optional variable, falling back to `default` when unset.
fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

/// Like [`parse_var`] but rejects zero.
fn positive_var<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr + PartialEq + Default,
    T::Err: std::fmt::Display,
{
    let value = parse_var(name, default)?;
    if value == T::default() {
        return Err(ConfigError::Invalid {
            name,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}
