//! Shared fixtures for unit and scenario tests.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Error};
use reqwest::{Client, Url};
use serde_json::json;

use crate::cache::credential_store::CredentialStore;
use crate::config::tenants::TenantSection;
use crate::upstream::client::IssuerClient;
use crate::upstream::endpoints::Endpoints;

pub enum Reply {
    Body(String),
    Fail(String),
}

impl Reply {
    pub fn token(value: &str, expires_in: i64) -> Self {
        Reply::Body(json!({ "access_token": value, "expires_in": expires_in }).to_string())
    }

    pub fn ticket(value: &str, expires_in: i64) -> Self {
        Reply::Body(
            json!({ "errcode": 0, "errmsg": "ok", "ticket": value, "expires_in": expires_in }).to_string(),
        )
    }

    pub fn errcode(code: i64) -> Self {
        Reply::Body(json!({ "errcode": code, "errmsg": "rejected" }).to_string())
    }
}

#[derive(Default)]
struct Script {
    tokens: VecDeque<Reply>,
    tickets: VecDeque<Reply>,
    calls: Vec<Url>,
}

/// In-memory issuer answering from a per-endpoint reply queue and recording
/// every url it was asked for.
#[derive(Clone, Default)]
pub struct ScriptedIssuer {
    script: Arc<Mutex<Script>>,
}

impl ScriptedIssuer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_token(&self, reply: Reply) -> &Self {
        self.script.lock().unwrap().tokens.push_back(reply);
        self
    }

    pub fn on_ticket(&self, reply: Reply) -> &Self {
        self.script.lock().unwrap().tickets.push_back(reply);
        self
    }

    pub fn token_calls(&self) -> usize {
        self.calls().iter().filter(|url| is_token_url(url)).count()
    }

    pub fn ticket_calls(&self) -> usize {
        self.calls().iter().filter(|url| !is_token_url(url)).count()
    }

    /// `access_token` query values sent to the ticket endpoint, in order.
    pub fn ticket_tokens_used(&self) -> Vec<String> {
        self.calls()
            .iter()
            .filter(|url| !is_token_url(url))
            .filter_map(|url| {
                url.query_pairs()
                    .find(|(k, _)| k == "access_token")
                    .map(|(_, v)| v.into_owned())
            })
            .collect()
    }

    pub fn calls(&self) -> Vec<Url> {
        self.script.lock().unwrap().calls.clone()
    }
}

fn is_token_url(url: &Url) -> bool {
    url.path().ends_with("/token") || url.path().ends_with("/gettoken")
}

impl IssuerClient for ScriptedIssuer {
    async fn get(&self, url: &Url) -> Result<String, Error> {
        let reply = {
            let mut script = self.script.lock().unwrap();
            script.calls.push(url.clone());
            if is_token_url(url) {
                script.tokens.pop_front()
            } else {
                script.tickets.pop_front()
            }
        };
        match reply {
            Some(Reply::Body(body)) => Ok(body),
            Some(Reply::Fail(reason)) => Err(anyhow!(reason)),
            None => Err(anyhow!("no scripted reply for {}", url)),
        }
    }
}

/// `acme` (official), `corp` (enterprise) and `broken` (no secret).
pub fn tenants() -> HashMap<String, TenantSection> {
    serde_yaml::from_str(
        r#"
acme:
  app_id: wx-acme
  app_secret: acme-secret
  is_enterprise: false
corp:
  app_id: ww-corp
  app_secret: corp-secret
  is_enterprise: true
broken:
  app_id: wx-broken
  is_enterprise: false
"#,
    )
    .unwrap()
}

pub fn scripted_store(issuer: &ScriptedIssuer, data_file: Option<PathBuf>) -> CredentialStore<ScriptedIssuer> {
    CredentialStore::new(
        issuer.clone(),
        Arc::new(tenants()),
        Endpoints::new("http://official.test", "http://corp.test"),
        data_file,
    )
}

pub fn build_reqwest_client() -> Client {
    Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()
        .expect("reqwest client")
}
