//! Durable snapshot of the live credential records.
//!
//! ```json
//! { "time": 1700000000,
//!   "tokens":  { "acme": { "expireAt": 1700007190, "token": "..." } },
//!   "tickets": { "acme": { "expireAt": 1700007190, "ticket": "..." } } }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;

use crate::cache::credential::{CredentialClass, CredentialRecord};

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot format error: {0}")]
    Codec(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenEntry {
    #[serde(rename = "expireAt")]
    pub expire_at: i64,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TicketEntry {
    #[serde(rename = "expireAt")]
    pub expire_at: i64,
    pub ticket: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Snapshot {
    #[serde(default)]
    pub time: i64,
    #[serde(default)]
    pub tokens: BTreeMap<String, TokenEntry>,
    #[serde(default)]
    pub tickets: BTreeMap<String, TicketEntry>,
}

impl Snapshot {
    /// Builds a snapshot holding only records still live at `now`.
    pub fn capture(
        tokens: &HashMap<String, CredentialRecord>,
        tickets: &HashMap<String, CredentialRecord>,
        now: i64,
    ) -> Self {
        Self {
            time: now,
            tokens: tokens
                .iter()
                .filter(|(_, r)| r.is_live(now))
                .map(|(tenant, r)| {
                    (tenant.clone(), TokenEntry { expire_at: r.expires_at, token: r.value.clone() })
                })
                .collect(),
            tickets: tickets
                .iter()
                .filter(|(_, r)| r.is_live(now))
                .map(|(tenant, r)| {
                    (tenant.clone(), TicketEntry { expire_at: r.expires_at, ticket: r.value.clone() })
                })
                .collect(),
        }
    }

    /// Records still live at `now`; expired and empty entries are dropped.
    pub fn live_records(self, now: i64) -> Vec<(CredentialClass, String, CredentialRecord)> {
        let tokens = self.tokens.into_iter().map(|(tenant, e)| {
            (CredentialClass::Token, tenant, CredentialRecord::new(e.token, e.expire_at))
        });
        let tickets = self.tickets.into_iter().map(|(tenant, e)| {
            (CredentialClass::Ticket, tenant, CredentialRecord::new(e.ticket, e.expire_at))
        });
        tokens
            .chain(tickets)
            .filter(|(_, _, r)| r.is_live(now) && !r.value.is_empty())
            .collect()
    }

    pub fn encode(&self) -> Result<Vec<u8>, PersistenceError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, PersistenceError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Writes the snapshot next to `path` and renames it into place.
pub async fn write_snapshot(path: &Path, snapshot: &Snapshot) -> Result<(), PersistenceError> {
    let content = snapshot.encode()?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    let tmp = tmp_path(path);
    fs::write(&tmp, content).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

pub async fn read_snapshot(path: &Path) -> Result<Snapshot, PersistenceError> {
    let content = fs::read(path).await?;
    Snapshot::decode(&content)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}
