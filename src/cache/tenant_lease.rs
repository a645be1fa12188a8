use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// One refresh guard per tenant.
///
/// Refreshes of different tenants run concurrently; refreshes of the same
/// tenant queue behind each other.
#[derive(Debug, Default)]
pub struct TenantLocks {
    slots: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

/// Proof that the holder owns the tenant's refresh guard.
///
/// Only [`TenantLocks::acquire`] can build one, so any function taking a
/// `&TenantLease` runs with the guard held and must not acquire it again.
#[derive(Debug)]
pub struct TenantLease {
    tenant: String,
    changed: AtomicBool,
    _guard: OwnedMutexGuard<()>,
}

impl TenantLease {
    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    /// Notes that the tenant's cached records were written or removed.
    pub fn mark_changed(&self) {
        self.changed.store(true, Ordering::Relaxed);
    }

    pub fn changed(&self) -> bool {
        self.changed.load(Ordering::Relaxed)
    }
}

impl TenantLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, tenant: &str) -> TenantLease {
        let slot = {
            let mut slots = self.slots.lock().await;
            slots.entry(tenant.to_owned()).or_default().clone()
        };
        TenantLease {
            tenant: tenant.to_owned(),
            changed: AtomicBool::new(false),
            _guard: slot.lock_owned().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn same_tenant_waits_other_tenant_proceeds() {
        let locks = TenantLocks::new();
        let held = locks.acquire("acme").await;
        assert_eq!(held.tenant(), "acme");

        let other = timeout(Duration::from_millis(100), locks.acquire("globex")).await;
        assert!(other.is_ok(), "different tenant must not wait");

        let same = timeout(Duration::from_millis(100), locks.acquire("acme")).await;
        assert!(same.is_err(), "same tenant must wait for the holder");

        assert!(!held.changed());
        held.mark_changed();
        assert!(held.changed());

        drop(held);
        let same = timeout(Duration::from_millis(100), locks.acquire("acme")).await;
        assert!(same.is_ok());
    }
}
