//! Credential cache: records, per-tenant refresh guards and the store.

pub mod credential;
pub mod credential_store;
pub mod error;
pub mod tenant_lease;
