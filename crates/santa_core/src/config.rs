//! Explicit runtime configuration for the draw core.
//!
//! # Responsibility
//! - Hold gateway endpoint, credentials and dispatch policy as plain values.
//! - Name the environment keys and defaults the binary reads them from.
//!
//! # Invariants
//! - Nothing in the core reads the process environment after construction.
//! - `base_url` and `app_base_url` never end with `/`.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

pub const ENV_GATEWAY_URL: &str = "EVOLUTION_API_URL";
pub const ENV_GATEWAY_INSTANCE: &str = "EVOLUTION_INSTANCE";
pub const ENV_GATEWAY_API_KEY: &str = "EVOLUTION_API_KEY";
pub const ENV_APP_BASE_URL: &str = "APP_BASE_URL";
pub const ENV_SEND_INTERVAL_MS: &str = "SANTA_SEND_INTERVAL_MS";

pub const DEFAULT_GATEWAY_URL: &str = "http://localhost:8080";
pub const DEFAULT_GATEWAY_INSTANCE: &str = "main";
pub const DEFAULT_APP_BASE_URL: &str = "http://localhost:3000";
pub const DEFAULT_COUNTRY_CODE: &str = "55";
pub const DEFAULT_SEND_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration loading errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidUrl { key: &'static str, value: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidUrl { key, value } => {
                write!(f, "`{key}` must be an http(s) URL, got `{value}`")
            }
        }
    }
}

impl Error for ConfigError {}

/// Messaging gateway endpoint and credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub base_url: String,
    pub instance: String,
    /// Empty key means "not configured"; the probe then reports unavailable.
    pub api_key: String,
    /// Prefixed to phone numbers that do not already start with it.
    pub default_country_code: String,
    /// Upper bound for a single gateway request.
    pub request_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GATEWAY_URL.to_string(),
            instance: DEFAULT_GATEWAY_INSTANCE.to_string(),
            api_key: String::new(),
            default_country_code: DEFAULT_COUNTRY_CODE.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl GatewayConfig {
    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

/// Notification dispatch policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Minimum delay between consecutive sends.
    pub send_interval: Duration,
    /// Skip the whole batch when the gateway probe fails.
    pub probe_before_send: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            send_interval: DEFAULT_SEND_INTERVAL,
            probe_before_send: true,
        }
    }
}

/// Complete core configuration, injected into services at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SantaConfig {
    /// Public base URL used to build participant and admin links.
    pub app_base_url: String,
    pub gateway: GatewayConfig,
    pub dispatch: DispatchConfig,
}

impl Default for SantaConfig {
    fn default() -> Self {
        Self {
            app_base_url: DEFAULT_APP_BASE_URL.to_string(),
            gateway: GatewayConfig::default(),
            dispatch: DispatchConfig::default(),
        }
    }
}

/// Validates an http(s) URL and strips trailing slashes.
pub fn normalize_base_url(key: &'static str, value: String) -> Result<String, ConfigError> {
    let trimmed = value.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(ConfigError::InvalidUrl { key, value });
    }
    Ok(trimmed.to_string())
}
