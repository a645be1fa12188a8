use thiserror::Error;

/// Failure of a token or ticket request.
///
/// Listeners turn every variant into an empty answer; none of them is fatal
/// to the process.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CredentialError {
    /// tenant identity missing or malformed
    #[error("tenant '{tenant}' config error: {reason}")]
    Config { tenant: String, reason: String },

    /// transport failure or non-success status from the issuer
    #[error("tenant '{tenant}' upstream request failed: {reason}")]
    Upstream { tenant: String, reason: String },

    /// issuer answered, but the answer is malformed or incomplete
    #[error("tenant '{tenant}' upstream response rejected: {reason}")]
    Parse {
        tenant: String,
        reason: String,
        errcode: i64,
    },

    /// issuer rejected the access token even after a forced refresh
    #[error("tenant '{tenant}' credential rejected by issuer (errcode {errcode})")]
    InvalidCredential { tenant: String, errcode: i64 },
}

impl CredentialError {
    pub fn config(tenant: &str, reason: impl Into<String>) -> Self {
        Self::Config {
            tenant: tenant.to_owned(),
            reason: reason.into(),
        }
    }

    pub fn upstream(tenant: &str, reason: impl Into<String>) -> Self {
        Self::Upstream {
            tenant: tenant.to_owned(),
            reason: reason.into(),
        }
    }

    pub fn parse(tenant: &str, reason: impl Into<String>, errcode: i64) -> Self {
        Self::Parse {
            tenant: tenant.to_owned(),
            reason: reason.into(),
            errcode,
        }
    }

    /// Stable label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            CredentialError::Config { .. } => "config",
            CredentialError::Upstream { .. } => "upstream",
            CredentialError::Parse { .. } => "parse",
            CredentialError::InvalidCredential { .. } => "invalid_credential",
        }
    }
}
