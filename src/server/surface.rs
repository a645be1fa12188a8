use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use crate::cache::credential::{CredentialClass, CredentialRecord};
use crate::cache::credential_store::CredentialStore;
use crate::cache::error::CredentialError;
use crate::upstream::client::IssuerClient;
use crate::utils::constants::{FORCE_REFRESH_FLAG, VERSION};

/// Credential value paired with its expiry, as answered by the `z*` commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpiringValue {
    pub value: String,
    #[serde(rename = "expireAt")]
    pub expire_at: i64,
}

impl ExpiringValue {
    /// Answer used for every failure: `("", 0)`.
    pub fn empty() -> Self {
        Self { value: String::new(), expire_at: 0 }
    }
}

impl From<CredentialRecord> for ExpiringValue {
    fn from(record: CredentialRecord) -> Self {
        Self { value: record.value, expire_at: record.expires_at }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllValues {
    pub token: ExpiringValue,
    pub ticket: ExpiringValue,
}

/// Command table shared by both protocols.
///
/// Credential failures never reach the caller: they are logged and answered
/// with an empty value.
pub struct CommandSurface<C> {
    store: Arc<CredentialStore<C>>,
}

impl<C> Clone for CommandSurface<C> {
    fn clone(&self) -> Self {
        Self { store: self.store.clone() }
    }
}

impl<C: IssuerClient + 'static> CommandSurface<C> {
    pub fn new(store: Arc<CredentialStore<C>>) -> Self {
        Self { store }
    }

    pub fn version(&self) -> &'static str {
        VERSION
    }

    pub async fn token(&self, tenant: &str, flag: Option<&str>) -> String {
        self.ztoken(tenant, flag).await.value
    }

    pub async fn ticket(&self, tenant: &str, flag: Option<&str>) -> String {
        self.zticket(tenant, flag).await.value
    }

    pub async fn ztoken(&self, tenant: &str, flag: Option<&str>) -> ExpiringValue {
        answer(CredentialClass::Token, self.store.get_token(tenant, cache_first(flag)).await)
    }

    pub async fn zticket(&self, tenant: &str, flag: Option<&str>) -> ExpiringValue {
        answer(CredentialClass::Ticket, self.store.get_ticket(tenant, cache_first(flag)).await)
    }

    /// Cached token and ticket; never calls the issuer.
    pub async fn zall(&self, tenant: &str) -> AllValues {
        let token = self.store.peek(CredentialClass::Token, tenant).await;
        let ticket = self.store.peek(CredentialClass::Ticket, tenant).await;
        AllValues {
            token: token.map(ExpiringValue::from).unwrap_or_else(ExpiringValue::empty),
            ticket: ticket.map(ExpiringValue::from).unwrap_or_else(ExpiringValue::empty),
        }
    }

    /// Schedules a snapshot write and returns immediately.
    pub fn save(&self) {
        let store = self.store.clone();
        tokio::spawn(async move { store.save_all().await });
    }
}

pub fn cache_first(flag: Option<&str>) -> bool {
    flag.map(str::trim) != Some(FORCE_REFRESH_FLAG)
}

fn answer(class: CredentialClass, result: Result<CredentialRecord, CredentialError>) -> ExpiringValue {
    match result {
        Ok(record) => record.into(),
        Err(err) => {
            warn!(class = %class, reason = err.kind(), "{}", err);
            ExpiringValue::empty()
        }
    }
}
