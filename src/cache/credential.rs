use std::fmt;

/// A cached credential value with its effective (margin-adjusted) expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub value: String,
    pub expires_at: i64, // UNIX timestamp
}

impl CredentialRecord {
    pub fn new(value: String, expires_at: i64) -> Self {
        Self { value, expires_at }
    }

    /// Live records may be served from cache.
    pub fn is_live(&self, now: i64) -> bool {
        self.expires_at > now
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialClass {
    Token,
    /// derived from a live token of the same tenant
    Ticket,
}

impl CredentialClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialClass::Token => "token",
            CredentialClass::Ticket => "ticket",
        }
    }
}

impl fmt::Display for CredentialClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// First characters of a credential, enough to correlate log lines.
pub fn mask(value: &str) -> String {
    let prefix: String = value.chars().take(6).collect();
    format!("{}...", prefix)
}
