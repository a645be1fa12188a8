use serde::Deserialize;
use std::collections::HashMap;

use crate::config::{settings::SettingsConfig, tenants::TenantSection};

/// ================================
/// Full service configuration
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub settings: SettingsConfig,
    #[serde(default)]
    pub tenants: HashMap<String, TenantSection>,
}
