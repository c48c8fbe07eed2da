//! SP logout configuration loaded from environment variables.
//!
//! Only the resume URL is required. Everything else has a default that
//! matches the behavior of the logout store in production.

use std::env;
use thiserror::Error;
use url::Url;

/// Default probability (per mille) that a registration triggers an expiry sweep.
pub const DEFAULT_SWEEP_PER_MILLE: u32 = 10;

/// Default lifetime of persisted orchestration state (seconds).
pub const DEFAULT_STATE_TTL_SECONDS: i64 = 3600;

/// Default prefix for SQL table names.
pub const DEFAULT_TABLE_PREFIX: &str = "xavyo";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },
}

/// SP logout configuration
#[derive(Debug, Clone)]
pub struct LogoutConfig {
    /// Absolute URL of the resume endpoint; the token is appended as `id`.
    pub resume_url: Url,

    /// Chance (out of 1000) that `register_session` sweeps expired records.
    pub sweep_per_mille: u32,

    /// Lifetime of a saved orchestration state.
    pub state_ttl_seconds: i64,

    /// Prefix for the logout store and table-version tables.
    pub table_prefix: String,
}

impl LogoutConfig {
    /// Configuration with defaults for everything but the resume URL.
    #[must_use]
    pub fn new(resume_url: Url) -> Self {
        Self {
            resume_url,
            sweep_per_mille: DEFAULT_SWEEP_PER_MILLE,
            state_ttl_seconds: DEFAULT_STATE_TTL_SECONDS,
            table_prefix: DEFAULT_TABLE_PREFIX.to_string(),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// # Required Variables
    ///
    /// - `SP_LOGOUT_RESUME_URL` - absolute URL of the resume endpoint
    ///
    /// # Optional Variables
    ///
    /// - `SP_LOGOUT_SWEEP_PER_MILLE` - sweep probability, 0..=1000 (default: 10)
    /// - `SP_LOGOUT_STATE_TTL_SECONDS` - orchestration state lifetime (default: 3600)
    /// - `SP_LOGOUT_TABLE_PREFIX` - SQL table prefix (default: "xavyo")
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the resume URL is missing or any value is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_url = lookup("SP_LOGOUT_RESUME_URL")
            .ok_or_else(|| ConfigError::MissingVar("SP_LOGOUT_RESUME_URL".to_string()))?;
        let resume_url = Url::parse(&raw_url).map_err(|e| ConfigError::InvalidValue {
            var: "SP_LOGOUT_RESUME_URL".to_string(),
            message: e.to_string(),
        })?;

        let sweep_per_mille = match lookup("SP_LOGOUT_SWEEP_PER_MILLE") {
            Some(v) => {
                let parsed: u32 = v.parse().map_err(|_| ConfigError::InvalidValue {
                    var: "SP_LOGOUT_SWEEP_PER_MILLE".to_string(),
                    message: format!("'{v}' is not a non-negative integer"),
                })?;
                if parsed > 1000 {
                    return Err(ConfigError::InvalidValue {
                        var: "SP_LOGOUT_SWEEP_PER_MILLE".to_string(),
                        message: "must be between 0 and 1000".to_string(),
                    });
                }
                parsed
            }
            None => DEFAULT_SWEEP_PER_MILLE,
        };

        let state_ttl_seconds = match lookup("SP_LOGOUT_STATE_TTL_SECONDS") {
            Some(v) => match v.parse::<i64>() {
                Ok(ttl) if ttl > 0 => ttl,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        var: "SP_LOGOUT_STATE_TTL_SECONDS".to_string(),
                        message: format!("'{v}' is not a positive number of seconds"),
                    });
                }
            },
            None => DEFAULT_STATE_TTL_SECONDS,
        };

        let table_prefix = match lookup("SP_LOGOUT_TABLE_PREFIX") {
            Some(prefix) if is_valid_table_prefix(&prefix) => prefix,
            Some(_) => {
                return Err(ConfigError::InvalidValue {
                    var: "SP_LOGOUT_TABLE_PREFIX".to_string(),
                    message: "must be non-empty and contain only [A-Za-z0-9_]".to_string(),
                });
            }
            None => DEFAULT_TABLE_PREFIX.to_string(),
        };

        Ok(Self {
            resume_url,
            sweep_per_mille,
            state_ttl_seconds,
            table_prefix,
        })
    }
}

/// Table prefixes are interpolated into SQL, so only `[A-Za-z0-9_]` is allowed.
fn is_valid_table_prefix(prefix: &str) -> bool {
    !prefix.is_empty() && prefix.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
