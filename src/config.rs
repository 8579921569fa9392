//! Configuration module for the container-insights collector.
//!
//! This module provides environment-based configuration for the collector,
//! including the instrumentation key, tick interval, and endpoint overrides.

use std::env;
use std::time::Duration;

/// Default instrumentation key (test destination).
const DEFAULT_INSTRUMENTATION_KEY: &str = "553da460-2f49-4fcc-bd75-9d9a122ddfc1";

/// Default collection interval in seconds
const DEFAULT_INTERVAL_SECS: u64 = 10;

/// Maximum allowed collection interval (one day)
const MAX_INTERVAL_SECS: u64 = 86_400;

/// Default Azure Instance Metadata Service tags endpoint
const DEFAULT_METADATA_URL: &str =
    "http://169.254.169.254/metadata/instance/compute/tags/?api-version=2020-10-01&format=text";

/// Default Docker Engine API socket path
const DEFAULT_DOCKER_SOCKET: &str = "/var/run/docker.sock";

/// Default Application Insights track endpoint
const DEFAULT_INGEST_URL: &str = "https://dc.services.visualstudio.com/v2/track";

/// Configuration for the container-insights collector.
///
/// All settings can be configured via environment variables:
/// - `CONTAINER_INSIGHTS_IKEY`: instrumentation key for the telemetry sink
/// - `CONTAINER_INSIGHTS_INTERVAL_SECS`: seconds between collection ticks (default: 10)
/// - `CONTAINER_INSIGHTS_LOCAL_DEBUG`: skip instance metadata resolution (default: false)
/// - `CONTAINER_INSIGHTS_METADATA_URL`: instance metadata endpoint override
/// - `CONTAINER_INSIGHTS_METADATA_TIMEOUT_SECS`: metadata request timeout, 0 = transport default
/// - `CONTAINER_INSIGHTS_DOCKER_SOCKET`: Docker Engine API socket path
/// - `CONTAINER_INSIGHTS_INGEST_URL`: telemetry ingestion endpoint override
#[derive(Debug, Clone)]
pub struct Config {
    /// Instrumentation key identifying the telemetry destination
    pub instrumentation_key: String,

    /// Seconds between collection ticks
    pub interval_secs: u64,

    /// Skip instance metadata resolution entirely (offline/local runs)
    pub local_debug: bool,

    /// Instance metadata endpoint URL
    pub metadata_url: String,

    /// Timeout for the metadata request; zero means the transport default
    pub metadata_timeout: Duration,

    /// Docker Engine API socket path
    pub docker_socket: String,

    /// Telemetry ingestion endpoint URL
    pub ingest_url: String,
}

/// Error type for configuration loading failures
#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
    pub env_var: Option<String>,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.env_var {
            Some(var) => write!(f, "Configuration error for {}: {}", var, self.message),
            None => write!(f, "Configuration error: {}", self.message),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Returns a new `Config` instance with values from environment variables,
    /// falling back to sensible defaults where appropriate.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - `CONTAINER_INSIGHTS_INTERVAL_SECS` is not a positive integer within limits
    /// - `CONTAINER_INSIGHTS_METADATA_TIMEOUT_SECS` is not a valid number
    /// - `CONTAINER_INSIGHTS_LOCAL_DEBUG` is not a recognized boolean
    pub fn from_env() -> Result<Self, ConfigError> {
        let instrumentation_key = env::var("CONTAINER_INSIGHTS_IKEY")
            .unwrap_or_else(|_| DEFAULT_INSTRUMENTATION_KEY.to_string());

        let interval_secs = Self::parse_interval()?;
        let local_debug = Self::parse_local_debug()?;

        let metadata_url = env::var("CONTAINER_INSIGHTS_METADATA_URL")
            .unwrap_or_else(|_| DEFAULT_METADATA_URL.to_string());

        let metadata_timeout = Duration::from_secs(Self::parse_metadata_timeout()?);

        let docker_socket = env::var("CONTAINER_INSIGHTS_DOCKER_SOCKET")
            .unwrap_or_else(|_| DEFAULT_DOCKER_SOCKET.to_string());

        let ingest_url = env::var("CONTAINER_INSIGHTS_INGEST_URL")
            .unwrap_or_else(|_| DEFAULT_INGEST_URL.to_string());

        Ok(Self {
            instrumentation_key,
            interval_secs,
            local_debug,
            metadata_url,
            metadata_timeout,
            docker_socket,
            ingest_url,
        })
    }

    /// Parse the collection interval from the environment with validation.
    fn parse_interval() -> Result<u64, ConfigError> {
        let env_var = "CONTAINER_INSIGHTS_INTERVAL_SECS";

        match env::var(env_var) {
            Ok(value) => {
                let interval: u64 = value.parse().map_err(|_| ConfigError {
                    message: format!("'{}' is not a valid number", value),
                    env_var: Some(env_var.to_string()),
                })?;

                if interval == 0 {
                    return Err(ConfigError {
                        message: "interval must be greater than 0".to_string(),
                        env_var: Some(env_var.to_string()),
                    });
                }

                if interval > MAX_INTERVAL_SECS {
                    return Err(ConfigError {
                        message: format!(
                            "interval {} exceeds maximum allowed ({}s)",
                            interval, MAX_INTERVAL_SECS
                        ),
                        env_var: Some(env_var.to_string()),
                    });
                }

                Ok(interval)
            }
            Err(_) => Ok(DEFAULT_INTERVAL_SECS),
        }
    }

    /// Parse the metadata request timeout from the environment.
    fn parse_metadata_timeout() -> Result<u64, ConfigError> {
        let env_var = "CONTAINER_INSIGHTS_METADATA_TIMEOUT_SECS";

        match env::var(env_var) {
            Ok(value) => value.parse().map_err(|_| ConfigError {
                message: format!("'{}' is not a valid number", value),
                env_var: Some(env_var.to_string()),
            }),
            Err(_) => Ok(0),
        }
    }

    /// Parse the local-debug flag from the environment.
    fn parse_local_debug() -> Result<bool, ConfigError> {
        let env_var = "CONTAINER_INSIGHTS_LOCAL_DEBUG";

        match env::var(env_var) {
            Ok(value) => match value.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => Ok(true),
                "0" | "false" | "no" | "" => Ok(false),
                other => Err(ConfigError {
                    message: format!("'{}' is not a valid boolean", other),
                    env_var: Some(env_var.to_string()),
                }),
            },
            Err(_) => Ok(false),
        }
    }
}

impl Default for Config {
    /// Create a default configuration using default values.
    ///
    /// This is useful for testing or when environment variables are not set.
    fn default() -> Self {
        Self {
            instrumentation_key: DEFAULT_INSTRUMENTATION_KEY.to_string(),
            interval_secs: DEFAULT_INTERVAL_SECS,
            local_debug: false,
            metadata_url: DEFAULT_METADATA_URL.to_string(),
            metadata_timeout: Duration::from_secs(0),
            docker_socket: DEFAULT_DOCKER_SOCKET.to_string(),
            ingest_url: DEFAULT_INGEST_URL.to_string(),
        }
    }
}
