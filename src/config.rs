//! # Configuration Module
//!
//! This module defines the runtime configuration of the bot: required
//! credentials, the settings datastore location, external service endpoints
//! and the recovery settings applied to every external call.

use std::env;
use std::fmt;
use std::str::FromStr;

use crate::localization::normalize_language_code;

// Constants for bot configuration
pub const DEFAULT_LANGUAGE: &str = "ru";
pub const DEFAULT_CATALOG_API_URL: &str = "http://127.0.0.1:8080/api/products/search";
pub const DEFAULT_GEOCODER_URL: &str = "https://nominatim.openstreetmap.org/search";
pub const DEFAULT_USER_AGENT: &str = "ShopHunterBot/0.1";
pub const DEFAULT_RESULT_LIMIT: usize = 10;

/// Errors raised while reading configuration at startup
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A required environment variable is absent or blank
    MissingVar(&'static str),
    /// A variable is present but cannot be parsed
    InvalidValue { name: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingVar(name) => {
                write!(f, "Missing required environment variable: {name}")
            }
            ConfigError::InvalidValue { name, value } => {
                write!(f, "Invalid value for {name}: {value:?}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Recovery configuration for external service calls
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Maximum number of retry attempts after the first call
    pub max_retries: u32,
    /// Base delay between retries in milliseconds
    pub base_retry_delay_ms: u64,
    /// Maximum delay between retries in milliseconds
    pub max_retry_delay_ms: u64,
    /// Timeout for a single attempt in milliseconds
    pub operation_timeout_ms: u64,
    /// Circuit breaker failure threshold
    pub circuit_breaker_threshold: u32,
    /// Circuit breaker reset timeout in seconds
    pub circuit_breaker_reset_secs: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_retry_delay_ms: 500,     // 0.5 seconds
            max_retry_delay_ms: 5000,     // 5 seconds
            operation_timeout_ms: 10_000, // 10 seconds
            circuit_breaker_threshold: 5,
            circuit_breaker_reset_secs: 60, // 1 minute
        }
    }
}

/// Endpoints and client settings for the catalog and geocoder services
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Product catalog search endpoint
    pub catalog_url: String,
    /// Maximum number of products requested per search
    pub result_limit: usize,
    /// Geocoding endpoint (Nominatim-compatible)
    pub geocoder_url: String,
    /// User agent sent with every outgoing HTTP request
    pub user_agent: String,
    /// Recovery and error handling configuration
    pub recovery: RecoveryConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            catalog_url: DEFAULT_CATALOG_API_URL.to_string(),
            result_limit: DEFAULT_RESULT_LIMIT,
            geocoder_url: DEFAULT_GEOCODER_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            recovery: RecoveryConfig::default(),
        }
    }
}

/// Complete bot configuration
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub bot_token: String,
    pub settings_db_path: String,
    /// Language used when a user has no saved preference
    pub default_language: String,
    pub services: ServiceConfig,
}

impl BotConfig {
    /// Read the configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |names: &[&str]| {
            names
                .iter()
                .filter_map(|name| lookup(name))
                .map(|value| value.trim().to_string())
                .find(|value| !value.is_empty())
        };

        let bot_token = read(&["TELEGRAM_BOT_TOKEN", "TOKEN"])
            .ok_or(ConfigError::MissingVar("TELEGRAM_BOT_TOKEN"))?;
        let settings_db_path = read(&["SETTINGS_DB_PATH", "SQLITE_SETTINGS_DB_PATH"])
            .ok_or(ConfigError::MissingVar("SETTINGS_DB_PATH"))?;

        // Legacy `LANGUAGE` may hold a system locale list; unsupported values fall back
        let default_language = match read(&["DEFAULT_LANGUAGE"]) {
            Some(code) => normalize_language_code(&code)
                .ok_or(ConfigError::InvalidValue {
                    name: "DEFAULT_LANGUAGE",
                    value: code.clone(),
                })?
                .to_string(),
            None => read(&["LANGUAGE"])
                .and_then(|code| normalize_language_code(&code))
                .unwrap_or(DEFAULT_LANGUAGE)
                .to_string(),
        };

        let defaults = ServiceConfig::default();
        let recovery = RecoveryConfig {
            operation_timeout_ms: parse_or(&read(&["SERVICE_TIMEOUT_SECS"]), "SERVICE_TIMEOUT_SECS", 10u64)?
                * 1000,
            max_retries: parse_or(&read(&["SERVICE_MAX_RETRIES"]), "SERVICE_MAX_RETRIES", defaults.recovery.max_retries)?,
            circuit_breaker_threshold: parse_or(
                &read(&["SERVICE_BREAKER_THRESHOLD"]),
                "SERVICE_BREAKER_THRESHOLD",
                defaults.recovery.circuit_breaker_threshold,
            )?,
            circuit_breaker_reset_secs: parse_or(
                &read(&["SERVICE_BREAKER_RESET_SECS"]),
                "SERVICE_BREAKER_RESET_SECS",
                defaults.recovery.circuit_breaker_reset_secs,
            )?,
            ..defaults.recovery.clone()
        };

        let services = ServiceConfig {
            catalog_url: read(&["CATALOG_API_URL"]).unwrap_or(defaults.catalog_url),
            result_limit: parse_or(&read(&["CATALOG_RESULT_LIMIT"]), "CATALOG_RESULT_LIMIT", defaults.result_limit)?,
            geocoder_url: read(&["GEOCODER_URL"]).unwrap_or(defaults.geocoder_url),
            user_agent: read(&["HTTP_USER_AGENT"]).unwrap_or(defaults.user_agent),
            recovery,
        };

        Ok(Self {
            bot_token,
            settings_db_path,
            default_language,
            services,
        })
    }
}

fn parse_or<T: FromStr>(raw: &Option<String>, name: &'static str, default: T) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value.parse().map_err(|_| ConfigError::InvalidValue {
            name,
            value: value.clone(),
        }),
        None => Ok(default),
    }
}
