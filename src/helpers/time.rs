use chrono::{DateTime, Utc};
use tokio::time::Instant;

use crate::utils::constants::SAFETY_MARGIN_SECONDS;

/// Expiry of a credential issued `now` with the upstream-reported `ttl_seconds`.
///
/// The safety margin is clamped to the TTL so a short-lived credential never
/// ends up with an expiry before its issue time.
pub fn expires_at_from_ttl(now: i64, ttl_seconds: i64) -> i64 {
    let ttl = ttl_seconds.max(0);
    now + ttl - SAFETY_MARGIN_SECONDS.min(ttl)
}

pub fn now_i64() -> i64 {
    Utc::now().timestamp()
}

pub fn get_instant() -> Instant {
    Instant::now()
}

pub fn format_unix(ts: i64) -> String {
    DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ts.to_string())
}
