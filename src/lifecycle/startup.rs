use crate::helpers::time::now_i64;
use crate::utils::constants::VERSION;

/// Facts recorded once at startup and read by workers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupInfo {
    pub started_at: i64, // UNIX timestamp
    pub pid: u32,
    pub version: String,
}

impl StartupInfo {
    pub fn capture() -> Self {
        Self {
            started_at: now_i64(),
            pid: std::process::id(),
            version: VERSION.to_owned(),
        }
    }

    pub fn uptime_seconds(&self, now: i64) -> i64 {
        (now - self.started_at).max(0)
    }
}
