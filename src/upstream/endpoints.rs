use anyhow::Result;
use reqwest::Url;

use crate::config::settings::UpstreamConfig;
use crate::config::tenants::TenantConfig;

/// Base urls of the two upstream endpoint shapes.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub official_base_url: String,
    pub enterprise_base_url: String,
}

impl Endpoints {
    pub fn new(official_base_url: impl Into<String>, enterprise_base_url: impl Into<String>) -> Self {
        Self {
            official_base_url: official_base_url.into(),
            enterprise_base_url: enterprise_base_url.into(),
        }
    }

    pub fn from_config(cfg: &UpstreamConfig) -> Self {
        Self::new(cfg.official_base_url.as_str(), cfg.enterprise_base_url.as_str())
    }

    /// Access token endpoint for the tenant's variant.
    pub fn token_url(&self, tenant: &TenantConfig) -> Result<Url> {
        let url = if tenant.is_enterprise {
            Url::parse_with_params(
                &join(&self.enterprise_base_url, "/cgi-bin/gettoken"),
                &[("corpid", tenant.app_id.as_str()), ("corpsecret", tenant.app_secret.as_str())],
            )
        } else {
            Url::parse_with_params(
                &join(&self.official_base_url, "/cgi-bin/token"),
                &[
                    ("grant_type", "client_credential"),
                    ("appid", tenant.app_id.as_str()),
                    ("secret", tenant.app_secret.as_str()),
                ],
            )
        };
        Ok(url?)
    }

    /// Ticket endpoint for the tenant's variant, authorized by `access_token`.
    pub fn ticket_url(&self, tenant: &TenantConfig, access_token: &str) -> Result<Url> {
        let url = if tenant.is_enterprise {
            Url::parse_with_params(
                &join(&self.enterprise_base_url, "/cgi-bin/get_jsapi_ticket"),
                &[("access_token", access_token)],
            )
        } else {
            Url::parse_with_params(
                &join(&self.official_base_url, "/cgi-bin/ticket/getticket"),
                &[("access_token", access_token), ("type", "jsapi")],
            )
        };
        Ok(url?)
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::from_config(&UpstreamConfig::default())
    }
}

fn join(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

/// Same url with secrets and tokens blanked out, for logs.
pub fn redact(url: &Url) -> String {
    let mut redacted = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = match k.as_ref() {
                "secret" | "corpsecret" | "access_token" => "***".to_owned(),
                _ => v.into_owned(),
            };
            (k.into_owned(), v)
        })
        .collect();
    redacted.query_pairs_mut().clear().extend_pairs(pairs);
    redacted.to_string()
}
