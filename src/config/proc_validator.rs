//! Configuration validation with aggregated errors.
//! - Aggregates all issues into Vec<String>
//! - listener addresses must be present, parseable and distinct
//! - upstream base urls must be http(s), timeout must be positive
//! - tenant names must be non-empty
//!
//! Tenant identity fields are not checked here; an incomplete tenant only
//! fails the requests that name it.

use tracing::{error, info};

use crate::config::service::ServiceConfig;
use crate::config::settings::{SettingsConfig, UpstreamConfig};
use crate::observability::metrics::get_metrics;

/// Public entrypoint: returns Ok(()) or Err(Vec<String>) containing all issues.
pub async fn validate_service_config(cfg: &ServiceConfig) -> Result<(), Vec<String>> {
    let mut errors: Vec<String> = Vec::new();

    validate_settings(&cfg.settings, &mut errors);

    if cfg.tenants.is_empty() {
        info!("config: 'tenants' is empty; every credential request will fail");
    }
    for name in cfg.tenants.keys() {
        if name.trim().is_empty() {
            errors.push("tenants: tenant name must not be empty".to_string());
        }
    }

    if errors.is_empty() {
        info!("config validation passed");
        Ok(())
    } else {
        let metrics = get_metrics().await;
        metrics.config_validation_errors.inc_by(errors.len() as u64);
        for e in &errors {
            error!("config validation: {}", e);
        }
        Err(errors)
    }
}

fn validate_settings(settings: &SettingsConfig, errors: &mut Vec<String>) {
    validate_address("settings.command_address", &settings.command_address, errors);
    validate_address("settings.web_address", &settings.web_address, errors);

    if settings.command_address.trim() == settings.web_address.trim() {
        errors.push(format!(
            "settings.command_address and settings.web_address must differ, both are '{}'",
            settings.web_address
        ));
    }

    validate_upstream(&settings.upstream, errors);

    if settings.metrics.is_enabled && !settings.metrics.path.starts_with('/') {
        errors.push(format!(
            "settings.metrics.path '{}' must start with '/'",
            settings.metrics.path
        ));
    }

    if let Some(logging) = &settings.logging {
        match logging.level.to_ascii_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => errors.push(format!("settings.logging.level '{}' is not supported", other)),
        }
    }
}

fn validate_address(field: &str, value: &str, errors: &mut Vec<String>) {
    if value.trim().is_empty() {
        errors.push(format!("{} must not be empty", field));
        return;
    }
    // hostnames are resolved at bind time; only the port is checked here
    let has_port = value
        .rsplit_once(':')
        .is_some_and(|(_, port)| port.parse::<u16>().is_ok());
    if !has_port {
        errors.push(format!("{} '{}' is not a valid socket address", field, value));
    }
}

fn validate_upstream(upstream: &UpstreamConfig, errors: &mut Vec<String>) {
    for (field, url) in [
        ("settings.upstream.official_base_url", &upstream.official_base_url),
        ("settings.upstream.enterprise_base_url", &upstream.enterprise_base_url),
    ] {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            errors.push(format!("{} '{}' must be an http(s) url", field, url));
        }
    }
    if upstream.timeout_ms == 0 {
        errors.push("settings.upstream.timeout_ms must be > 0".to_string());
    }
}
