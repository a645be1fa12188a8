use std::collections::HashMap;

use serde::Deserialize;
use serde_yaml::Value;

use crate::cache::error::CredentialError;

/// Raw tenant section as written in the config file.
///
/// A section with missing identity fields still loads; only requests
/// naming that tenant fail.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct TenantSection {
    pub app_id: Option<String>,
    pub app_secret: Option<String>,
    pub is_enterprise: Option<Value>,
}

/// Tenant identity resolved for a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantConfig {
    pub name: String,
    pub app_id: String,
    pub app_secret: String,
    pub is_enterprise: bool,
}

impl TenantConfig {
    pub fn variant(&self) -> &'static str {
        if self.is_enterprise {
            "enterprise"
        } else {
            "official"
        }
    }
}

/// Looks up a tenant identity by name. Called on every request; the result
/// is never cached by the credential store.
pub trait TenantResolver: Send + Sync {
    fn resolve(&self, name: &str) -> Result<TenantConfig, CredentialError>;
}

impl TenantResolver for HashMap<String, TenantSection> {
    fn resolve(&self, name: &str) -> Result<TenantConfig, CredentialError> {
        let section = self
            .get(name)
            .ok_or_else(|| CredentialError::config(name, "tenant is not configured"))?;

        let app_id = section.app_id.as_deref().unwrap_or_default().trim();
        let app_secret = section.app_secret.as_deref().unwrap_or_default().trim();
        if app_id.is_empty() || app_secret.is_empty() {
            return Err(CredentialError::config(name, "app_id or app_secret is empty"));
        }

        let is_enterprise = parse_flag(section.is_enterprise.as_ref())
            .map_err(|reason| CredentialError::config(name, reason))?;

        Ok(TenantConfig {
            name: name.to_owned(),
            app_id: app_id.to_owned(),
            app_secret: app_secret.to_owned(),
            is_enterprise,
        })
    }
}

/// Accepts YAML booleans and the usual textual spellings of a boolean.
fn parse_flag(value: Option<&Value>) -> Result<bool, String> {
    match value {
        Some(Value::Bool(flag)) => Ok(*flag),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(1) => Ok(true),
            Some(0) => Ok(false),
            _ => Err(format!("is_enterprise: invalid value '{}'", n)),
        },
        Some(Value::String(raw)) => match raw.trim() {
            "1" | "t" | "T" | "true" | "TRUE" | "True" | "y" | "Y" | "yes" | "YES" | "Yes"
            | "on" | "ON" | "On" => Ok(true),
            "0" | "f" | "F" | "false" | "FALSE" | "False" | "n" | "N" | "no" | "NO" | "No"
            | "off" | "OFF" | "Off" => Ok(false),
            other => Err(format!("is_enterprise: invalid value '{}'", other)),
        },
        Some(_) => Err("is_enterprise: expected a boolean".to_string()),
        None => Err("is_enterprise is missing".to_string()),
    }
}
