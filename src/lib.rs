//! # Credential Proxy Library
//!
//! Caches short-lived platform credentials (access tokens and the JS-API
//! tickets derived from them) per tenant, refreshes them from the upstream
//! issuer on demand and serves them over a RESP command port and a web port.
//!
//! Modules:
//! - `config`: YAML settings and tenant registry
//! - `cache`: credential records, per-tenant refresh guards and the store
//! - `upstream`: issuer endpoints, transport and response parsing
//! - `persistence`: snapshot file format and atomic writes
//! - `server`: command table, RESP and web listeners
//! - `lifecycle`: shutdown broadcast and worker join-group

pub mod cache;
pub mod config;
pub mod helpers;
pub mod lifecycle;
pub mod observability;
pub mod persistence;
pub mod server;
pub mod upstream;
pub mod utils;

#[cfg(test)]
mod tests;

pub use crate::cache::credential_store::CredentialStore;
pub use crate::config::service::ServiceConfig;
