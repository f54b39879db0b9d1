//! Main application configuration
//!
//! This module defines the primary configuration structures for the
//! scriptorium service, including environment variable loading, TOML file
//! loading, and validation.

use crate::config::{CacheTtlConfig, ClaimConfig, RatingConfig};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub amqp: AmqpSettings,
    pub workflow: WorkflowSettings,
    pub rating: RatingConfig,
    pub claim: ClaimConfig,
    pub cache_ttl: CacheTtlConfig,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// AMQP event bus settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AmqpSettings {
    /// Broker host
    pub host: String,
    /// Broker port
    pub port: u16,
    pub username: String,
    pub password: String,
    pub vhost: String,
    /// Topic exchange for outbound rating/claim events
    pub exchange_name: String,
    /// Connection timeout in seconds
    pub connection_timeout_seconds: u64,
    /// Maximum connection retry attempts
    pub max_retry_attempts: u32,
    /// Connection retry delay in milliseconds
    pub retry_delay_ms: u64,
}

/// Workflow-engine notification settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowSettings {
    /// Endpoint receiving elo-updated notifications
    pub endpoint: String,
    /// Per-request timeout in milliseconds
    pub request_timeout_ms: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "scriptorium".to_string(),
            log_level: "info".to_string(),
            shutdown_timeout_seconds: 30,
        }
    }
}

impl Default for AmqpSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5672,
            username: "guest".to_string(),
            password: "guest".to_string(),
            vhost: "/".to_string(),
            exchange_name: "ratings.events".to_string(),
            connection_timeout_seconds: 30,
            max_retry_attempts: 5,
            retry_delay_ms: 1000,
        }
    }
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8090/workflow/notifications".to_string(),
            request_timeout_ms: 5000,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            config.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            config.service.log_level = log_level;
        }
        if let Ok(timeout) = env::var("SHUTDOWN_TIMEOUT_SECONDS") {
            config.service.shutdown_timeout_seconds = timeout
                .parse()
                .map_err(|_| anyhow!("Invalid SHUTDOWN_TIMEOUT_SECONDS value: {}", timeout))?;
        }

        // AMQP settings
        if let Ok(host) = env::var("AMQP_HOST") {
            config.amqp.host = host;
        }
        if let Ok(port) = env::var("AMQP_PORT") {
            config.amqp.port = port
                .parse()
                .map_err(|_| anyhow!("Invalid AMQP_PORT value: {}", port))?;
        }
        if let Ok(username) = env::var("AMQP_USERNAME") {
            config.amqp.username = username;
        }
        if let Ok(password) = env::var("AMQP_PASSWORD") {
            config.amqp.password = password;
        }
        if let Ok(vhost) = env::var("AMQP_VHOST") {
            config.amqp.vhost = vhost;
        }
        if let Ok(exchange) = env::var("AMQP_EXCHANGE_NAME") {
            config.amqp.exchange_name = exchange;
        }
        if let Ok(timeout) = env::var("AMQP_CONNECTION_TIMEOUT_SECONDS") {
            config.amqp.connection_timeout_seconds = timeout.parse().map_err(|_| {
                anyhow!("Invalid AMQP_CONNECTION_TIMEOUT_SECONDS value: {}", timeout)
            })?;
        }
        if let Ok(retries) = env::var("AMQP_MAX_RETRY_ATTEMPTS") {
            config.amqp.max_retry_attempts = retries
                .parse()
                .map_err(|_| anyhow!("Invalid AMQP_MAX_RETRY_ATTEMPTS value: {}", retries))?;
        }
        if let Ok(delay) = env::var("AMQP_RETRY_DELAY_MS") {
            config.amqp.retry_delay_ms = delay
                .parse()
                .map_err(|_| anyhow!("Invalid AMQP_RETRY_DELAY_MS value: {}", delay))?;
        }

        // Workflow notification settings
        if let Ok(endpoint) = env::var("WORKFLOW_ENDPOINT") {
            config.workflow.endpoint = endpoint;
        }
        if let Ok(timeout) = env::var("WORKFLOW_REQUEST_TIMEOUT_MS") {
            config.workflow.request_timeout_ms = timeout
                .parse()
                .map_err(|_| anyhow!("Invalid WORKFLOW_REQUEST_TIMEOUT_MS value: {}", timeout))?;
        }

        // Rating settings
        if let Ok(seed) = env::var("RATING_SEED") {
            config.rating.seed_rating = seed
                .parse()
                .map_err(|_| anyhow!("Invalid RATING_SEED value: {}", seed))?;
        }
        if let Ok(bonus) = env::var("TIEBREAKER_BONUS") {
            config.rating.tiebreaker_bonus = bonus
                .parse()
                .map_err(|_| anyhow!("Invalid TIEBREAKER_BONUS value: {}", bonus))?;
        }

        // Claim settings
        if let Ok(minutes) = env::var("BOOK_OUT_MINUTES") {
            config.claim.book_out_minutes = minutes
                .parse()
                .map_err(|_| anyhow!("Invalid BOOK_OUT_MINUTES value: {}", minutes))?;
        }
        if let Ok(secs) = env::var("LEASE_TTL_SECONDS") {
            config.cache_ttl.lease_secs = secs
                .parse()
                .map_err(|_| anyhow!("Invalid LEASE_TTL_SECONDS value: {}", secs))?;
        }

        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        validate_config(&config)?;
        Ok(config)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Get AMQP connection timeout as Duration
    pub fn amqp_connection_timeout(&self) -> Duration {
        Duration::from_secs(self.amqp.connection_timeout_seconds)
    }

    /// Get workflow request timeout as Duration
    pub fn workflow_request_timeout(&self) -> Duration {
        Duration::from_millis(self.workflow.request_timeout_ms)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }
    if config.amqp.host.is_empty() {
        return Err(anyhow!("AMQP host cannot be empty"));
    }
    if config.amqp.port == 0 {
        return Err(anyhow!("AMQP port cannot be 0"));
    }
    if config.amqp.exchange_name.is_empty() {
        return Err(anyhow!("AMQP exchange name cannot be empty"));
    }
    if config.workflow.endpoint.is_empty() {
        return Err(anyhow!("Workflow endpoint cannot be empty"));
    }
    if config.workflow.request_timeout_ms == 0 {
        return Err(anyhow!("Workflow request timeout must be greater than 0"));
    }

    if config.rating.seed_rating <= 0 {
        return Err(anyhow!("Seed rating must be positive"));
    }
    if config.rating.new_player_games >= config.rating.established_player_games {
        return Err(anyhow!(
            "New-player games threshold must be below the established threshold"
        ));
    }

    if config.claim.book_out_minutes <= 0 {
        return Err(anyhow!("Book-out window must be greater than 0"));
    }
    if config.claim.default_max_concurrent_jobs == 0 {
        return Err(anyhow!("Default max concurrent jobs must be greater than 0"));
    }
    if config.cache_ttl.lease_secs == 0 {
        return Err(anyhow!("Lease TTL must be greater than 0"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(validate_config(&config).is_ok());
        assert_eq!(config.service.name, "scriptorium");
        assert_eq!(config.rating.seed_rating, 1200);
        assert_eq!(config.cache_ttl.lease_secs, 30);
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        let mut config = AppConfig::default();
        config.service.log_level = "verbose".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_k_tier_thresholds_must_be_ordered() {
        let mut config = AppConfig::default();
        config.rating.new_player_games = 100;
        config.rating.established_player_games = 30;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [rating]
            seed_rating = 1500

            [claim]
            book_out_minutes = 15
            "#,
        )
        .unwrap();

        assert_eq!(config.rating.seed_rating, 1500);
        assert_eq!(config.claim.book_out_minutes, 15);
        assert_eq!(config.service.name, "scriptorium");
    }
}
