//! Shared constants and invariants

/// Seconds cut from every upstream-reported TTL before a credential is cached.
pub const SAFETY_MARGIN_SECONDS: i64 = 10;

/// Upstream error code meaning "the access token used is not valid".
pub const INVALID_CREDENTIAL_CODE: i64 = 40001;

pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 5000;

pub const DEFAULT_OFFICIAL_BASE_URL: &str = "https://api.weixin.qq.com";
pub const DEFAULT_ENTERPRISE_BASE_URL: &str = "https://qyapi.weixin.qq.com";

/// `force` argument value that bypasses the cache.
pub const FORCE_REFRESH_FLAG: &str = "1";

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
