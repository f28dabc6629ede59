//! Main application configuration
//!
//! This module defines the primary configuration structures for the
//! duet-room pair-chat service, including environment variable loading and
//! validation.

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
    pub chat: ChatSettings,
    pub matchmaking: MatchmakingSettings,
    pub rate: RateSettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Port for health check and Prometheus endpoints
    pub health_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
    /// Secret compared against admin subscription tokens
    pub admin_token: String,
}

/// Limits applied to relayed content and aliases
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    /// Maximum relayed text length in characters
    pub max_message_length: usize,
    /// Maximum relayed image size in bytes
    pub max_image_bytes: usize,
    /// Room idle timeout in seconds
    pub idle_timeout_seconds: u64,
    /// Maximum room duration in seconds
    pub max_session_seconds: u64,
    /// Minimum alias length after normalization
    pub alias_min_length: usize,
    /// Maximum alias length after normalization
    pub alias_max_length: usize,
    /// Alias retention in the coordination store, in seconds
    pub alias_ttl_seconds: u64,
}

/// Which coordination-store backend owns queue/lock state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinationBackend {
    /// One mutex over the store state, in process
    Locking,
    /// A single owning task, commands serialized over a channel
    Actor,
}

/// How match attempts reach the pairing pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Run the pass inline in the triggering handler
    Direct,
    /// Publish attempts to a bounded worker pool
    Pooled,
}

/// Matchmaking-specific settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchmakingSettings {
    /// Coordination store backend
    pub backend: CoordinationBackend,
    /// Match-attempt dispatch mode
    pub dispatch: DispatchMode,
    /// Worker pool size for pooled dispatch
    pub match_concurrency: usize,
    /// Expiry sweep interval in seconds
    pub sweep_interval_seconds: u64,
    /// TTL for per-room termination locks, in seconds
    pub room_lock_ttl_seconds: u64,
    /// TTL for the global pairing-pass lock, in seconds
    pub pairing_lock_ttl_seconds: u64,
    /// Admin metrics push interval in seconds
    pub metrics_push_interval_seconds: u64,
}

/// One fixed-window rate policy
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RatePolicy {
    pub limit: u32,
    pub window_seconds: u64,
}

impl RatePolicy {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }
}

/// Per-action rate policy table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateSettings {
    pub queue_join: RatePolicy,
    pub skip: RatePolicy,
    pub text: RatePolicy,
    pub image: RatePolicy,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "duet-room".to_string(),
            log_level: "info".to_string(),
            health_port: 8080,
            shutdown_timeout_seconds: 30,
            admin_token: "dev-admin-token".to_string(),
        }
    }
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            max_message_length: 500,
            max_image_bytes: 1_000_000,
            idle_timeout_seconds: 60,
            max_session_seconds: 900,
            alias_min_length: 2,
            alias_max_length: 24,
            alias_ttl_seconds: 86_400, // 24 hours
        }
    }
}

impl Default for MatchmakingSettings {
    fn default() -> Self {
        Self {
            backend: CoordinationBackend::Locking,
            dispatch: DispatchMode::Pooled,
            match_concurrency: 20,
            sweep_interval_seconds: 15,
            room_lock_ttl_seconds: 5,
            pairing_lock_ttl_seconds: 5,
            metrics_push_interval_seconds: 2,
        }
    }
}

impl Default for RateSettings {
    fn default() -> Self {
        Self {
            queue_join: RatePolicy {
                limit: 5,
                window_seconds: 10,
            },
            skip: RatePolicy {
                limit: 5,
                window_seconds: 10,
            },
            text: RatePolicy {
                limit: 25,
                window_seconds: 5,
            },
            image: RatePolicy {
                limit: 3,
                window_seconds: 5,
            },
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
        if let Ok(port) = env::var("HEALTH_PORT") {
            config.service.health_port = port
                .parse()
                .map_err(|_| anyhow!("Invalid HEALTH_PORT value: {}", port))?;
        }
        if let Ok(timeout) = env::var("SHUTDOWN_TIMEOUT_SECONDS") {
            config.service.shutdown_timeout_seconds = timeout
                .parse()
                .map_err(|_| anyhow!("Invalid SHUTDOWN_TIMEOUT_SECONDS value: {}", timeout))?;
        }
        if let Ok(token) = env::var("ADMIN_TOKEN") {
            config.service.admin_token = token;
        }

        // Chat limits
        if let Ok(len) = env::var("MAX_MESSAGE_LENGTH") {
            config.chat.max_message_length = len
                .parse()
                .map_err(|_| anyhow!("Invalid MAX_MESSAGE_LENGTH value: {}", len))?;
        }
        if let Ok(bytes) = env::var("MAX_IMAGE_BYTES") {
            config.chat.max_image_bytes = bytes
                .parse()
                .map_err(|_| anyhow!("Invalid MAX_IMAGE_BYTES value: {}", bytes))?;
        }
        if let Ok(idle) = env::var("IDLE_TIMEOUT_SEC") {
            config.chat.idle_timeout_seconds = idle
                .parse()
                .map_err(|_| anyhow!("Invalid IDLE_TIMEOUT_SEC value: {}", idle))?;
        }
        if let Ok(max) = env::var("MAX_SESSION_SEC") {
            config.chat.max_session_seconds = max
                .parse()
                .map_err(|_| anyhow!("Invalid MAX_SESSION_SEC value: {}", max))?;
        }
        if let Ok(ttl) = env::var("ALIAS_TTL_SEC") {
            config.chat.alias_ttl_seconds = ttl
                .parse()
                .map_err(|_| anyhow!("Invalid ALIAS_TTL_SEC value: {}", ttl))?;
        }

        // Matchmaking settings
        if let Ok(backend) = env::var("COORDINATION_BACKEND") {
            config.matchmaking.backend = match backend.to_lowercase().as_str() {
                "locking" => CoordinationBackend::Locking,
                "actor" => CoordinationBackend::Actor,
                _ => return Err(anyhow!("Invalid COORDINATION_BACKEND value: {}", backend)),
            };
        }
        if let Ok(dispatch) = env::var("DISPATCH_MODE") {
            config.matchmaking.dispatch = match dispatch.to_lowercase().as_str() {
                "direct" => DispatchMode::Direct,
                "pooled" => DispatchMode::Pooled,
                _ => return Err(anyhow!("Invalid DISPATCH_MODE value: {}", dispatch)),
            };
        }
        if let Ok(concurrency) = env::var("MATCH_CONCURRENCY") {
            config.matchmaking.match_concurrency = concurrency
                .parse()
                .map_err(|_| anyhow!("Invalid MATCH_CONCURRENCY value: {}", concurrency))?;
        }
        if let Ok(sweep) = env::var("SWEEP_INTERVAL_SECONDS") {
            config.matchmaking.sweep_interval_seconds = sweep
                .parse()
                .map_err(|_| anyhow!("Invalid SWEEP_INTERVAL_SECONDS value: {}", sweep))?;
        }

        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file, then validate
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: AppConfig = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        validate_config(&config)?;
        Ok(config)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Get room idle timeout as Duration
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.chat.idle_timeout_seconds)
    }

    /// Get maximum room duration as Duration
    pub fn max_session_duration(&self) -> Duration {
        Duration::from_secs(self.chat.max_session_seconds)
    }

    /// Get alias retention as Duration
    pub fn alias_ttl(&self) -> Duration {
        Duration::from_secs(self.chat.alias_ttl_seconds)
    }

    /// Get sweep interval as Duration
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.matchmaking.sweep_interval_seconds)
    }

    /// Get room termination lock TTL as Duration
    pub fn room_lock_ttl(&self) -> Duration {
        Duration::from_secs(self.matchmaking.room_lock_ttl_seconds)
    }

    /// Get pairing-pass lock TTL as Duration
    pub fn pairing_lock_ttl(&self) -> Duration {
        Duration::from_secs(self.matchmaking.pairing_lock_ttl_seconds)
    }

    /// Get admin metrics push interval as Duration
    pub fn metrics_push_interval(&self) -> Duration {
        Duration::from_secs(self.matchmaking.metrics_push_interval_seconds)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    if config.service.health_port == 0 {
        return Err(anyhow!("Health port cannot be 0"));
    }
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }
    if config.service.admin_token.is_empty() {
        return Err(anyhow!("Admin token cannot be empty"));
    }

    // Validate chat limits
    if config.chat.max_message_length == 0 {
        return Err(anyhow!("Max message length must be greater than 0"));
    }
    if config.chat.max_image_bytes == 0 {
        return Err(anyhow!("Max image bytes must be greater than 0"));
    }
    if config.chat.idle_timeout_seconds == 0 {
        return Err(anyhow!("Idle timeout must be greater than 0"));
    }
    if config.chat.max_session_seconds < config.chat.idle_timeout_seconds {
        return Err(anyhow!(
            "Max session duration must not be shorter than the idle timeout"
        ));
    }
    if config.chat.alias_min_length < 1 || config.chat.alias_max_length < config.chat.alias_min_length
    {
        return Err(anyhow!(
            "Alias length bounds are inconsistent: {}..{}",
            config.chat.alias_min_length,
            config.chat.alias_max_length
        ));
    }

    // Validate matchmaking settings
    if config.matchmaking.match_concurrency == 0 {
        return Err(anyhow!("Match concurrency must be greater than 0"));
    }
    if config.matchmaking.sweep_interval_seconds == 0 {
        return Err(anyhow!("Sweep interval must be greater than 0"));
    }
    if config.matchmaking.room_lock_ttl_seconds == 0
        || config.matchmaking.pairing_lock_ttl_seconds == 0
    {
        return Err(anyhow!("Lock TTLs must be greater than 0"));
    }
    if config.matchmaking.metrics_push_interval_seconds == 0 {
        return Err(anyhow!("Metrics push interval must be greater than 0"));
    }

    // Validate rate policies
    for (name, policy) in [
        ("queue_join", &config.rate.queue_join),
        ("skip", &config.rate.skip),
        ("text", &config.rate.text),
        ("image", &config.rate.image),
    ] {
        if policy.limit == 0 || policy.window_seconds == 0 {
            return Err(anyhow!("Rate policy {} must have nonzero limit/window", name));
        }
    }

    Ok(())
}
