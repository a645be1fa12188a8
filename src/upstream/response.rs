use serde::Deserialize;

use crate::utils::constants::INVALID_CREDENTIAL_CODE;

/// Body shared by the token and ticket issuing endpoints.
///
/// Every field is optional on the wire; success is judged by the presence
/// of the credential field, not by `errcode`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct IssuerResponse {
    #[serde(default)]
    pub errcode: i64,
    #[serde(default)]
    pub errmsg: String,
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub ticket: String,
    #[serde(default)]
    pub expires_in: i64,
}

impl IssuerResponse {
    pub fn parse(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }

    pub fn is_invalid_credential(&self) -> bool {
        self.errcode == INVALID_CREDENTIAL_CODE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_token_answer() {
        let res = IssuerResponse::parse(r#"{"access_token":"ACCESS","expires_in":7200}"#).unwrap();
        assert_eq!(res.access_token, "ACCESS");
        assert_eq!(res.expires_in, 7200);
        assert_eq!(res.errcode, 0);
        assert!(res.ticket.is_empty());
    }

    #[test]
    fn parses_invalid_credential_answer() {
        let res = IssuerResponse::parse(
            r#"{"errcode":40001,"errmsg":"invalid credential, access_token is invalid"}"#,
        )
        .unwrap();
        assert!(res.is_invalid_credential());
        assert!(res.ticket.is_empty());
    }

    #[test]
    fn rejects_non_json() {
        assert!(IssuerResponse::parse("<html>bad gateway</html>").is_err());
    }
}
