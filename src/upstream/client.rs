use std::time::Duration;

use anyhow::{anyhow, Error, Result};
use reqwest::{Client, Url};

use crate::config::settings::UpstreamConfig;

/// Transport seam between the credential store and the issuing platform.
///
/// Returns the raw response body; a transport error or a non-success status
/// is an `Err`. Interpreting the body is left to the caller.
pub trait IssuerClient: Send + Sync {
    fn get(&self, url: &Url) -> impl std::future::Future<Output = Result<String, Error>> + Send;
}

#[derive(Debug, Clone)]
pub struct HttpIssuer {
    client: Client,
}

impl HttpIssuer {
    pub fn new(cfg: &UpstreamConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl IssuerClient for HttpIssuer {
    async fn get(&self, url: &Url) -> Result<String, Error> {
        let response = self.client.get(url.clone()).send().await?;
        if !response.status().is_success() {
            return Err(anyhow!("HTTP request failed: {}", response.status()));
        }
        Ok(response.text().await?)
    }
}
