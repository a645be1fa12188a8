//! Refresh-ahead cache of access tokens and tickets, one record per tenant
//! and class.
//!
//! Every public operation holds the tenant's refresh guard for the whole
//! "check cache -> call issuer -> commit" unit, so at most one refresh per
//! tenant is in flight while other tenants proceed. The record maps sit
//! behind their own lock, held only for lookups and swaps, never across an
//! issuer call.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Error, Result};
use reqwest::Url;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::cache::credential::{mask, CredentialClass, CredentialRecord};
use crate::cache::error::CredentialError;
use crate::cache::tenant_lease::{TenantLease, TenantLocks};
use crate::config::service::ServiceConfig;
use crate::config::tenants::{TenantConfig, TenantResolver};
use crate::helpers::time::{expires_at_from_ttl, format_unix, get_instant, now_i64};
use crate::observability::metrics::get_metrics;
use crate::persistence::snapshot::{read_snapshot, write_snapshot, PersistenceError, Snapshot};
use crate::upstream::client::IssuerClient;
use crate::upstream::endpoints::{redact, Endpoints};
use crate::upstream::response::IssuerResponse;

#[derive(Debug, Default)]
struct Records {
    tokens: HashMap<String, CredentialRecord>,
    tickets: HashMap<String, CredentialRecord>,
}

impl Records {
    fn map(&self, class: CredentialClass) -> &HashMap<String, CredentialRecord> {
        match class {
            CredentialClass::Token => &self.tokens,
            CredentialClass::Ticket => &self.tickets,
        }
    }

    fn map_mut(&mut self, class: CredentialClass) -> &mut HashMap<String, CredentialRecord> {
        match class {
            CredentialClass::Token => &mut self.tokens,
            CredentialClass::Ticket => &mut self.tickets,
        }
    }
}

pub struct CredentialStore<C> {
    records: RwLock<Records>,
    locks: TenantLocks,
    save_lock: Mutex<()>,
    tenants: Arc<dyn TenantResolver>,
    issuer: C,
    endpoints: Endpoints,
    data_file: Option<PathBuf>,
}

impl<C: IssuerClient> CredentialStore<C> {
    pub fn new(
        issuer: C,
        tenants: Arc<dyn TenantResolver>,
        endpoints: Endpoints,
        data_file: Option<PathBuf>,
    ) -> Self {
        Self {
            records: RwLock::new(Records::default()),
            locks: TenantLocks::new(),
            save_lock: Mutex::new(()),
            tenants,
            issuer,
            endpoints,
            data_file,
        }
    }

    pub fn from_config(cfg: &ServiceConfig, issuer: C) -> Self {
        Self::new(
            issuer,
            Arc::new(cfg.tenants.clone()),
            Endpoints::from_config(&cfg.settings.upstream),
            cfg.settings.data_file.as_ref().map(PathBuf::from),
        )
    }

    /// Access token for `tenant`, served from cache when `cache_first` and
    /// the cached record is still live.
    pub async fn get_token(&self, tenant: &str, cache_first: bool) -> Result<CredentialRecord, CredentialError> {
        let config = self.tenants.resolve(tenant)?;
        let (fetched, changed) = {
            let lease = self.locks.acquire(tenant).await;
            let fetched = self.token_leased(&lease, &config, cache_first).await;
            (fetched, lease.changed())
        };
        // refreshes and evictions both reach the snapshot
        if changed {
            self.save_all().await;
        }
        fetched
    }

    /// Ticket for `tenant`. A cache miss may refresh the tenant's token too.
    pub async fn get_ticket(&self, tenant: &str, cache_first: bool) -> Result<CredentialRecord, CredentialError> {
        let config = self.tenants.resolve(tenant)?;
        let (ticket, changed) = {
            let lease = self.locks.acquire(tenant).await;
            let ticket = self.ticket_leased(&lease, &config, cache_first).await;
            (ticket, lease.changed())
        };
        if changed {
            self.save_all().await;
        }
        ticket
    }

    /// Live cached record, without touching the issuer.
    pub async fn peek(&self, class: CredentialClass, tenant: &str) -> Option<CredentialRecord> {
        self.live(class, tenant, now_i64()).await
    }

    pub async fn len(&self, class: CredentialClass) -> usize {
        self.records.read().await.map(class).len()
    }

    /// Writes the snapshot; failures are logged and counted, never returned.
    pub async fn save_all(&self) {
        let metrics = get_metrics().await;
        match self.try_save().await {
            Ok(true) => {
                metrics.snapshot_saves.inc();
                debug!("save data success");
            }
            Ok(false) => {}
            Err(err) => {
                metrics.snapshot_failures.inc();
                error!("save data failed: {}", err);
            }
        }
    }

    /// Returns `Ok(false)` when no snapshot file is configured.
    pub async fn try_save(&self) -> Result<bool, PersistenceError> {
        let Some(path) = &self.data_file else {
            debug!("no data file configured, skip save");
            return Ok(false);
        };
        // one writer at a time, each with a snapshot taken after the previous write
        let _serial = self.save_lock.lock().await;
        let snapshot = {
            let records = self.records.read().await;
            Snapshot::capture(&records.tokens, &records.tickets, now_i64())
        };
        write_snapshot(path, &snapshot).await?;
        Ok(true)
    }

    /// Hydrates the store from the snapshot file. Expired entries are
    /// dropped; no issuer call is made. Returns the number of restored records.
    pub async fn load_data(&self) -> usize {
        let Some(path) = &self.data_file else {
            info!("not found data file");
            return 0;
        };

        let snapshot = match read_snapshot(path).await {
            Ok(snapshot) => snapshot,
            Err(PersistenceError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
                info!("data file {} does not exist yet", path.display());
                return 0;
            }
            Err(err) => {
                warn!("read data file {} failed: {}", path.display(), err);
                return 0;
            }
        };

        let live = snapshot.live_records(now_i64());
        let restored = live.len();
        {
            let mut records = self.records.write().await;
            for (class, tenant, record) in live {
                info!(
                    tenant = %tenant,
                    class = %class,
                    value = %mask(&record.value),
                    "restored credential, expire at {}",
                    format_unix(record.expires_at)
                );
                records.map_mut(class).insert(tenant, record);
            }
        }
        self.update_gauges().await;
        restored
    }

    // -------------------------------
    // lease holders only
    // -------------------------------

    async fn token_leased(
        &self,
        lease: &TenantLease,
        config: &TenantConfig,
        cache_first: bool,
    ) -> Result<CredentialRecord, CredentialError> {
        debug_assert_eq!(lease.tenant(), config.name);
        let tenant = config.name.as_str();
        let class = CredentialClass::Token;

        if cache_first {
            if let Some(record) = self.live(class, tenant, now_i64()).await {
                get_metrics().await.cache_hits.with_label_values(&[class.as_str()]).inc();
                return Ok(record);
            }
        }

        let url = self
            .endpoints
            .token_url(config)
            .map_err(|err| CredentialError::config(tenant, err.to_string()))?;

        // a ticket is only as good as the token behind it
        let body = match self.call_issuer(class, config, &url).await {
            Ok(body) => body,
            Err(err) => {
                self.evict(lease, CredentialClass::Ticket).await;
                return Err(self.fail(class, CredentialError::upstream(tenant, err.to_string())).await);
            }
        };

        let response = match IssuerResponse::parse(&body) {
            Ok(response) if !response.access_token.is_empty() => response,
            parsed => {
                self.evict(lease, CredentialClass::Ticket).await;
                error!(tenant = %tenant, api = %redact(&url), response = %body, "parse token response failed");
                return Err(self.fail(class, parse_error(tenant, "access_token", parsed)).await);
            }
        };

        let record = CredentialRecord::new(
            response.access_token,
            expires_at_from_ttl(now_i64(), response.expires_in),
        );
        self.commit(lease, class, record.clone()).await;
        info!(
            tenant = %tenant,
            app_id = %config.app_id,
            token = %mask(&record.value),
            "refresh token success, expire at {}",
            format_unix(record.expires_at)
        );
        Ok(record)
    }

    async fn ticket_leased(
        &self,
        lease: &TenantLease,
        config: &TenantConfig,
        cache_first: bool,
    ) -> Result<CredentialRecord, CredentialError> {
        debug_assert_eq!(lease.tenant(), config.name);
        let tenant = config.name.as_str();
        let class = CredentialClass::Ticket;

        if cache_first {
            if let Some(record) = self.live(class, tenant, now_i64()).await {
                get_metrics().await.cache_hits.with_label_values(&[class.as_str()]).inc();
                return Ok(record);
            }
        }

        let mut token_cache_first = cache_first;
        loop {
            let token = self.token_leased(lease, config, token_cache_first).await?;

            let url = self
                .endpoints
                .ticket_url(config, &token.value)
                .map_err(|err| CredentialError::config(tenant, err.to_string()))?;

            let body = self
                .call_issuer(class, config, &url)
                .await
                .map_err(|err| CredentialError::upstream(tenant, err.to_string()));
            let body = match body {
                Ok(body) => body,
                Err(err) => return Err(self.fail(class, err).await),
            };

            let parsed = IssuerResponse::parse(&body);
            match parsed {
                Ok(response) if !response.ticket.is_empty() => {
                    let record = CredentialRecord::new(
                        response.ticket,
                        expires_at_from_ttl(now_i64(), response.expires_in),
                    );
                    self.commit(lease, class, record.clone()).await;
                    info!(
                        tenant = %tenant,
                        app_id = %config.app_id,
                        ticket = %mask(&record.value),
                        "refresh ticket success, expire at {}",
                        format_unix(record.expires_at)
                    );
                    return Ok(record);
                }
                Ok(response) if response.is_invalid_credential() => {
                    error!(tenant = %tenant, api = %redact(&url), response = %body, "issuer rejected access token");
                    if token_cache_first {
                        warn!(tenant = %tenant, "retry ticket with a forced token refresh");
                        get_metrics().await.invalidation_retries.inc();
                        token_cache_first = false;
                        continue;
                    }
                    self.evict(lease, CredentialClass::Token).await;
                    let err = CredentialError::InvalidCredential {
                        tenant: tenant.to_owned(),
                        errcode: response.errcode,
                    };
                    return Err(self.fail(class, err).await);
                }
                parsed => {
                    error!(tenant = %tenant, api = %redact(&url), response = %body, "parse ticket response failed");
                    return Err(self.fail(class, parse_error(tenant, "ticket", parsed)).await);
                }
            }
        }
    }

    // -------------------------------
    // helpers
    // -------------------------------

    async fn call_issuer(&self, class: CredentialClass, config: &TenantConfig, url: &Url) -> Result<String, Error> {
        let metrics = get_metrics().await;
        let start = get_instant();
        metrics
            .upstream_requests
            .with_label_values(&[class.as_str(), config.variant()])
            .inc();
        debug!(tenant = %config.name, class = %class, api = %redact(url), "request issuer");

        let result = self.issuer.get(url).await;
        metrics
            .upstream_duration
            .with_label_values(&[class.as_str()])
            .observe(start.elapsed().as_secs_f64());

        result.inspect_err(|err| {
            error!(tenant = %config.name, class = %class, api = %redact(url), "request issuer failed: {}", err);
        })
    }

    async fn fail(&self, class: CredentialClass, err: CredentialError) -> CredentialError {
        get_metrics()
            .await
            .upstream_failures
            .with_label_values(&[class.as_str(), err.kind()])
            .inc();
        err
    }

    async fn live(&self, class: CredentialClass, tenant: &str, now: i64) -> Option<CredentialRecord> {
        self.records
            .read()
            .await
            .map(class)
            .get(tenant)
            .filter(|record| record.is_live(now))
            .cloned()
    }

    async fn commit(&self, lease: &TenantLease, class: CredentialClass, record: CredentialRecord) {
        self.records.write().await.map_mut(class).insert(lease.tenant().to_owned(), record);
        lease.mark_changed();
        self.update_gauges().await;
    }

    async fn evict(&self, lease: &TenantLease, class: CredentialClass) {
        let tenant = lease.tenant();
        let removed = self.records.write().await.map_mut(class).remove(tenant);
        if removed.is_some() {
            info!(tenant = %tenant, class = %class, "evicted cached credential");
            lease.mark_changed();
            self.update_gauges().await;
        }
    }

    async fn update_gauges(&self) {
        let metrics = get_metrics().await;
        let records = self.records.read().await;
        for class in [CredentialClass::Token, CredentialClass::Ticket] {
            metrics
                .cached_credentials
                .with_label_values(&[class.as_str()])
                .set(records.map(class).len() as i64);
        }
    }

    #[cfg(test)]
    pub(crate) async fn seed(&self, class: CredentialClass, tenant: &str, record: CredentialRecord) {
        self.records.write().await.map_mut(class).insert(tenant.to_owned(), record);
    }
}

fn parse_error(
    tenant: &str,
    field: &str,
    parsed: Result<IssuerResponse, serde_json::Error>,
) -> CredentialError {
    match parsed {
        Ok(response) => CredentialError::parse(
            tenant,
            format!("no {} in response, errcode={} errmsg={}", field, response.errcode, response.errmsg),
            response.errcode,
        ),
        Err(err) => CredentialError::parse(tenant, format!("malformed response: {}", err), 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::common::{scripted_store, Reply, ScriptedIssuer};
    use std::sync::Arc;

    fn live(value: &str) -> CredentialRecord {
        CredentialRecord::new(value.to_owned(), now_i64() + 3600)
    }

    fn expired(value: &str) -> CredentialRecord {
        CredentialRecord::new(value.to_owned(), now_i64() - 1)
    }

    #[tokio::test]
    async fn cached_token_is_served_without_upstream_calls() {
        let issuer = ScriptedIssuer::new();
        let store = scripted_store(&issuer, None);
        store.seed(CredentialClass::Token, "acme", live("T-CACHED")).await;

        for _ in 0..3 {
            let record = store.get_token("acme", true).await.unwrap();
            assert_eq!(record.value, "T-CACHED");
        }
        assert_eq!(issuer.token_calls(), 0);
    }

    #[tokio::test]
    async fn force_refresh_bypasses_live_cache() {
        let issuer = ScriptedIssuer::new();
        issuer.on_token(Reply::token("T-NEW", 7200));
        let store = scripted_store(&issuer, None);
        store.seed(CredentialClass::Token, "acme", live("T-CACHED")).await;

        let record = store.get_token("acme", false).await.unwrap();
        assert_eq!(record.value, "T-NEW");
        assert_eq!(issuer.token_calls(), 1);
        assert_eq!(store.peek(CredentialClass::Token, "acme").await, Some(record));
    }

    #[tokio::test]
    async fn expired_token_triggers_exactly_one_refresh() {
        let issuer = ScriptedIssuer::new();
        issuer.on_token(Reply::token("T-FRESH", 7200));
        let store = scripted_store(&issuer, None);
        store.seed(CredentialClass::Token, "acme", expired("T-OLD")).await;

        let before = now_i64();
        let record = store.get_token("acme", true).await.unwrap();
        let after = now_i64();

        assert_eq!(record.value, "T-FRESH");
        assert!(record.expires_at >= before + 7190 && record.expires_at <= after + 7190);
        assert_eq!(issuer.token_calls(), 1);

        // second call is a cache hit
        store.get_token("acme", true).await.unwrap();
        assert_eq!(issuer.token_calls(), 1);
    }

    #[tokio::test]
    async fn enterprise_tenant_uses_enterprise_endpoint() {
        let issuer = ScriptedIssuer::new();
        issuer.on_token(Reply::token("W-TOKEN", 7200));
        let store = scripted_store(&issuer, None);

        store.get_token("corp", true).await.unwrap();

        let calls = issuer.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].host_str(), Some("corp.test"));
        assert_eq!(calls[0].path(), "/cgi-bin/gettoken");
    }

    #[tokio::test]
    async fn token_transport_failure_evicts_ticket() {
        let issuer = ScriptedIssuer::new();
        issuer.on_token(Reply::Fail("connection reset".into()));
        let store = scripted_store(&issuer, None);
        store.seed(CredentialClass::Ticket, "acme", live("K-CACHED")).await;

        let err = store.get_token("acme", false).await.unwrap_err();
        assert_eq!(err.kind(), "upstream");
        assert_eq!(store.peek(CredentialClass::Ticket, "acme").await, None);
    }

    #[tokio::test]
    async fn token_without_value_is_parse_error_and_evicts_ticket() {
        let issuer = ScriptedIssuer::new();
        issuer.on_token(Reply::errcode(40013));
        let store = scripted_store(&issuer, None);
        store.seed(CredentialClass::Ticket, "acme", live("K-CACHED")).await;

        let err = store.get_token("acme", true).await.unwrap_err();
        assert!(matches!(err, CredentialError::Parse { errcode: 40013, .. }));
        assert_eq!(store.peek(CredentialClass::Ticket, "acme").await, None);
    }

    #[tokio::test]
    async fn unknown_or_incomplete_tenant_is_config_error() {
        let issuer = ScriptedIssuer::new();
        let store = scripted_store(&issuer, None);

        assert_eq!(store.get_token("nobody", true).await.unwrap_err().kind(), "config");
        assert_eq!(store.get_ticket("broken", true).await.unwrap_err().kind(), "config");
        assert!(issuer.calls().is_empty());
    }

    #[tokio::test]
    async fn ticket_is_issued_with_cached_token() {
        let issuer = ScriptedIssuer::new();
        issuer.on_ticket(Reply::ticket("K-NEW", 7200));
        let store = scripted_store(&issuer, None);
        store.seed(CredentialClass::Token, "acme", live("T-CACHED")).await;

        let ticket = store.get_ticket("acme", true).await.unwrap();
        assert_eq!(ticket.value, "K-NEW");
        assert_eq!(issuer.token_calls(), 0);
        assert_eq!(issuer.ticket_tokens_used(), vec!["T-CACHED".to_string()]);

        // served from cache afterwards
        assert_eq!(store.get_ticket("acme", true).await.unwrap().value, "K-NEW");
        assert_eq!(issuer.ticket_calls(), 1);
    }

    #[tokio::test]
    async fn ticket_fails_like_token_and_skips_ticket_endpoint() {
        let issuer = ScriptedIssuer::new();
        issuer.on_token(Reply::Fail("timeout".into()));
        let store = scripted_store(&issuer, None);

        let err = store.get_ticket("acme", true).await.unwrap_err();
        assert_eq!(err.kind(), "upstream");
        assert_eq!(issuer.ticket_calls(), 0);
    }

    #[tokio::test]
    async fn ticket_fails_on_rejected_token_request_and_skips_ticket_endpoint() {
        let issuer = ScriptedIssuer::new();
        issuer.on_token(Reply::errcode(40013));
        let store = scripted_store(&issuer, None);

        let err = store.get_ticket("acme", true).await.unwrap_err();
        assert!(matches!(err, CredentialError::Parse { errcode: 40013, .. }));
        assert_eq!(issuer.token_calls(), 1);
        assert_eq!(issuer.ticket_calls(), 0);
    }

    #[tokio::test]
    async fn ticket_transport_failure_is_not_retried() {
        let issuer = ScriptedIssuer::new();
        issuer.on_ticket(Reply::Fail("connection refused".into()));
        let store = scripted_store(&issuer, None);
        store.seed(CredentialClass::Token, "acme", live("T-CACHED")).await;

        let err = store.get_ticket("acme", true).await.unwrap_err();
        assert_eq!(err.kind(), "upstream");
        assert_eq!(issuer.ticket_calls(), 1);
        assert!(store.peek(CredentialClass::Token, "acme").await.is_some());
    }

    #[tokio::test]
    async fn rejected_cached_token_is_refreshed_once_and_ticket_retried() {
        let issuer = ScriptedIssuer::new();
        issuer
            .on_ticket(Reply::errcode(40001))
            .on_ticket(Reply::ticket("K-AFTER-RETRY", 7200))
            .on_token(Reply::token("T-FORCED", 7200));
        let store = scripted_store(&issuer, None);
        store.seed(CredentialClass::Token, "acme", live("T-STALE")).await;

        let ticket = store.get_ticket("acme", true).await.unwrap();
        assert_eq!(ticket.value, "K-AFTER-RETRY");
        assert_eq!(issuer.token_calls(), 1);
        assert_eq!(
            issuer.ticket_tokens_used(),
            vec!["T-STALE".to_string(), "T-FORCED".to_string()]
        );
        assert_eq!(store.peek(CredentialClass::Token, "acme").await.unwrap().value, "T-FORCED");
    }

    #[tokio::test]
    async fn second_rejection_evicts_token() {
        let issuer = ScriptedIssuer::new();
        issuer
            .on_ticket(Reply::errcode(40001))
            .on_ticket(Reply::errcode(40001))
            .on_token(Reply::token("T-FORCED", 7200));
        let store = scripted_store(&issuer, None);
        store.seed(CredentialClass::Token, "acme", live("T-STALE")).await;

        let err = store.get_ticket("acme", true).await.unwrap_err();
        assert!(matches!(err, CredentialError::InvalidCredential { errcode: 40001, .. }));
        assert_eq!(issuer.token_calls(), 1);
        assert_eq!(issuer.ticket_calls(), 2);
        assert_eq!(store.peek(CredentialClass::Token, "acme").await, None);
    }

    #[tokio::test]
    async fn forced_ticket_rejection_is_not_retried() {
        let issuer = ScriptedIssuer::new();
        issuer
            .on_token(Reply::token("T-FORCED", 7200))
            .on_ticket(Reply::errcode(40001));
        let store = scripted_store(&issuer, None);

        let err = store.get_ticket("acme", false).await.unwrap_err();
        assert_eq!(err.kind(), "invalid_credential");
        assert_eq!(issuer.ticket_calls(), 1);
        assert_eq!(store.peek(CredentialClass::Token, "acme").await, None);
    }

    #[tokio::test]
    async fn other_ticket_errors_are_parse_errors() {
        let issuer = ScriptedIssuer::new();
        issuer.on_ticket(Reply::errcode(45009));
        let store = scripted_store(&issuer, None);
        store.seed(CredentialClass::Token, "acme", live("T-CACHED")).await;

        let err = store.get_ticket("acme", true).await.unwrap_err();
        assert!(matches!(err, CredentialError::Parse { errcode: 45009, .. }));
        assert_eq!(issuer.ticket_calls(), 1);
        assert!(store.peek(CredentialClass::Token, "acme").await.is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_requests_share_one_refresh() {
        let issuer = ScriptedIssuer::new();
        issuer.on_token(Reply::token("T-ONCE", 7200));
        let store = Arc::new(scripted_store(&issuer, None));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.get_token("acme", true).await })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap().value, "T-ONCE");
        }
        assert_eq!(issuer.token_calls(), 1);
    }

    #[tokio::test]
    async fn refresh_persists_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        let issuer = ScriptedIssuer::new();
        issuer.on_token(Reply::token("T-SAVED", 7200));
        let store = scripted_store(&issuer, Some(path.clone()));

        store.get_token("acme", true).await.unwrap();

        let snapshot = read_snapshot(&path).await.unwrap();
        assert_eq!(snapshot.tokens["acme"].token, "T-SAVED");
        assert!(snapshot.tickets.is_empty());
    }

    #[tokio::test]
    async fn rejected_token_is_dropped_from_snapshot_too() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        let issuer = ScriptedIssuer::new();
        issuer
            .on_token(Reply::token("T-GOOD", 7200))
            .on_token(Reply::token("T-AGAIN", 7200))
            .on_ticket(Reply::errcode(40001))
            .on_ticket(Reply::errcode(40001));
        let store = scripted_store(&issuer, Some(path.clone()));

        store.get_token("acme", true).await.unwrap();
        assert_eq!(read_snapshot(&path).await.unwrap().tokens["acme"].token, "T-GOOD");

        let err = store.get_ticket("acme", true).await.unwrap_err();
        assert_eq!(err.kind(), "invalid_credential");
        assert!(store.peek(CredentialClass::Token, "acme").await.is_none());

        let snapshot = read_snapshot(&path).await.unwrap();
        assert!(snapshot.tokens.is_empty());

        let restarted = scripted_store(&ScriptedIssuer::new(), Some(path));
        assert_eq!(restarted.load_data().await, 0);
    }

    #[tokio::test]
    async fn failed_refresh_without_eviction_leaves_snapshot_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        let issuer = ScriptedIssuer::new();
        issuer.on_token(Reply::Fail("timeout".into()));
        let store = scripted_store(&issuer, Some(path.clone()));

        assert!(store.get_token("acme", true).await.is_err());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn failed_save_does_not_fail_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();
        let path = blocker.join("data.json");
        let issuer = ScriptedIssuer::new();
        issuer.on_token(Reply::token("T-KEPT", 7200));
        let store = scripted_store(&issuer, Some(path));

        let record = store.get_token("acme", true).await.unwrap();
        assert_eq!(record.value, "T-KEPT");
        assert!(store.try_save().await.is_err());
    }

    #[tokio::test]
    async fn load_without_file_or_with_garbage_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let issuer = ScriptedIssuer::new();

        let missing = scripted_store(&issuer, Some(dir.path().join("absent.json")));
        assert_eq!(missing.load_data().await, 0);

        let garbage = dir.path().join("garbage.json");
        std::fs::write(&garbage, "not json at all").unwrap();
        let store = scripted_store(&issuer, Some(garbage));
        assert_eq!(store.load_data().await, 0);
        assert_eq!(store.len(CredentialClass::Token).await, 0);

        assert_eq!(scripted_store(&issuer, None).load_data().await, 0);
    }
}
