use serde::Deserialize;

use crate::utils::constants::{
    DEFAULT_ENTERPRISE_BASE_URL, DEFAULT_HTTP_TIMEOUT_MS, DEFAULT_OFFICIAL_BASE_URL,
};

/// ================================
/// Global service-wide settings
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct SettingsConfig {
    /// RESP command listener address, e.g. `127.0.0.1:6380`
    pub command_address: String,
    /// HTTP listener address, e.g. `127.0.0.1:8080`
    pub web_address: String,
    /// snapshot file; persistence is disabled when absent
    pub data_file: Option<String>,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    pub logging: Option<LoggingConfig>,
}

/// ================================
/// Upstream issuer
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct UpstreamConfig {
    #[serde(default = "default_official_base_url")]
    pub official_base_url: String,
    #[serde(default = "default_enterprise_base_url")]
    pub enterprise_base_url: String,
    /// transport timeout for a single issuer call
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            official_base_url: default_official_base_url(),
            enterprise_base_url: default_enterprise_base_url(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_path")]
    pub path: String,
    #[serde(default)]
    pub is_enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            path: default_metrics_path(),
            is_enabled: false,
        }
    }
}

/// ================================
/// Logging
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String, // allowed: trace, debug, info, warn, error
    pub format: LogFormat,
}

impl LoggingConfig {
    pub fn new(level: String, format: LogFormat) -> Self {
        Self { level, format }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Compact,
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

fn default_official_base_url() -> String {
    DEFAULT_OFFICIAL_BASE_URL.to_string()
}

fn default_enterprise_base_url() -> String {
    DEFAULT_ENTERPRISE_BASE_URL.to_string()
}

fn default_timeout_ms() -> u64 {
    DEFAULT_HTTP_TIMEOUT_MS
}
