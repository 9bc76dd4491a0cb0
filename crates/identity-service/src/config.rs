//! Identity subsystem configuration.
//!
//! Configuration is loaded from environment variables. Key file paths are
//! redacted in Debug output.

use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default identity resolver timeout in milliseconds.
pub const DEFAULT_RESOLVER_TIMEOUT_MS: u64 = 3000;

/// Default identity cache TTL in seconds (5 minutes).
pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 300;

/// Default janitor sweep interval in seconds.
pub const DEFAULT_CACHE_SWEEP_SECONDS: u64 = 60;

/// Identity subsystem configuration.
#[derive(Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Path to the PEM private key. Only the issuer sets this.
    pub private_key_path: Option<String>,

    /// Path to the PEM public key used for verification.
    pub public_key_path: String,

    /// Expected `iss` claim. Empty disables the check.
    pub expected_issuer: String,

    /// Expected `aud` entry. Empty disables the check.
    pub expected_audience: String,

    /// Tolerance applied to `exp`, `nbf` and `iat`.
    pub clock_skew: Duration,

    /// Base URL of the identity issuer, without trailing slash.
    pub identity_service_url: String,

    /// Upper bound for a single identity resolution.
    pub resolver_timeout: Duration,

    /// Default time-to-live of cached identity records.
    pub cache_ttl: Duration,

    /// Interval between janitor sweeps.
    pub cache_sweep_interval: Duration,
}

/// Custom Debug implementation that redacts key locations.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field(
                "private_key_path",
                &self.private_key_path.as_ref().map(|_| "[REDACTED]"),
            )
            .field("public_key_path", &"[REDACTED]")
            .field("expected_issuer", &self.expected_issuer)
            .field("expected_audience", &self.expected_audience)
            .field("clock_skew", &self.clock_skew)
            .field("identity_service_url", &self.identity_service_url)
            .field("resolver_timeout", &self.resolver_timeout)
            .field("cache_ttl", &self.cache_ttl)
            .field("cache_sweep_interval", &self.cache_sweep_interval)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),

    #[error("Invalid duration configuration: {0}")]
    InvalidDuration(String),

    #[error("Invalid identity service URL: {0}")]
    InvalidServiceUrl(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let public_key_path = required(vars, "JWT_PUBLIC_KEY_PATH")?;

        let identity_service_url = required(vars, "IDENTITY_SERVICE_URL")?;
        if !(identity_service_url.starts_with("http://")
            || identity_service_url.starts_with("https://"))
        {
            return Err(ConfigError::InvalidServiceUrl(format!(
                "IDENTITY_SERVICE_URL must start with http:// or https://, got '{identity_service_url}'"
            )));
        }
        let identity_service_url = identity_service_url.trim_end_matches('/').to_string();

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let private_key_path = vars
            .get("JWT_PRIVATE_KEY_PATH")
            .filter(|p| !p.is_empty())
            .cloned();

        let expected_issuer = vars.get("JWT_EXPECTED_ISSUER").cloned().unwrap_or_default();
        let expected_audience = vars
            .get("JWT_EXPECTED_AUDIENCE")
            .cloned()
            .unwrap_or_default();

        let clock_skew = if let Some(value_str) = vars.get("JWT_CLOCK_SKEW_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be a non-negative integer, got '{value_str}': {e}"
                ))
            })?;

            if value > MAX_CLOCK_SKEW.as_secs() {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {}",
                    MAX_CLOCK_SKEW.as_secs(),
                    value
                )));
            }

            Duration::from_secs(value)
        } else {
            DEFAULT_CLOCK_SKEW
        };

        let resolver_timeout = Duration::from_millis(positive(
            vars,
            "IDENTITY_RESOLVER_TIMEOUT_MS",
            DEFAULT_RESOLVER_TIMEOUT_MS,
        )?);
        let cache_ttl = Duration::from_secs(positive(
            vars,
            "IDENTITY_CACHE_TTL_SECONDS",
            DEFAULT_CACHE_TTL_SECONDS,
        )?);
        let cache_sweep_interval = Duration::from_secs(positive(
            vars,
            "IDENTITY_CACHE_SWEEP_SECONDS",
            DEFAULT_CACHE_SWEEP_SECONDS,
        )?);

        Ok(Config {
            bind_address,
            private_key_path,
            public_key_path,
            expected_issuer,
            expected_audience,
            clock_skew,
            identity_service_url,
            resolver_timeout,
            cache_ttl,
            cache_sweep_interval,
        })
    }
}

fn required(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    vars.get(name)
        .filter(|v| !v.is_empty())
        .cloned()
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

fn positive(vars: &HashMap<String, String>, name: &str, default: u64) -> Result<u64, ConfigError> {
    let Some(value_str) = vars.get(name) else {
        return Ok(default);
    };

    let value: u64 = value_str.parse().map_err(|e| {
        ConfigError::InvalidDuration(format!(
            "{name} must be a valid positive integer, got '{value_str}': {e}"
        ))
    })?;

    if value == 0 {
        return Err(ConfigError::InvalidDuration(format!(
            "{name} must be greater than 0"
        )));
    }

    Ok(value)
}
