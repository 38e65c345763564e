use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::error::AuthError;

/// Tokens this close to expiry are treated as already expired.
const EXPIRY_SKEW_SECS: i64 = 10;

/// OAuth2 token as issued by the identity provider.
///
/// The serialized form uses the field names `access_token`, `token_type`,
/// `refresh_token` and `expiry`, so blobs written by other OAuth2 clients
/// with the same layout decode unchanged.
///
/// # Example
/// ```
/// use graphkeys::auth::Token;
///
/// let token = Token::bearer("access");
/// let blob = graphkeys::auth::token::encode(&token)?;
/// assert_eq!(graphkeys::auth::token::decode(&blob)?, token);
/// # Ok::<(), graphkeys::auth::AuthError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

impl Token {
    /// Bearer token without refresh token or expiry.
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: "Bearer".to_string(),
            refresh_token: None,
            expiry: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        if self.access_token.is_empty() {
            return false;
        }
        match self.expiry {
            Some(expiry) => expiry - Duration::seconds(EXPIRY_SKEW_SECS) > now,
            None => true,
        }
    }

    /// Value for the `Authorization` header.
    pub fn authorization(&self) -> String {
        let kind = if self.token_type.is_empty() || self.token_type.eq_ignore_ascii_case("bearer")
        {
            "Bearer"
        } else {
            self.token_type.as_str()
        };
        format!("{kind} {}", self.access_token)
    }
}

/// Serializes a token into the opaque blob kept in a session.
pub fn encode(token: &Token) -> Result<Vec<u8>, AuthError> {
    Ok(serde_json::to_vec(token)?)
}

/// Inverse of [`encode`].
pub fn decode(blob: &[u8]) -> Result<Token, AuthError> {
    Ok(serde_json::from_slice(blob)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_accepts_go_style_layout() {
        let blob = br#"{"access_token":"a","token_type":"Bearer","refresh_token":"r","expiry":"2030-01-02T03:04:05Z"}"#;
        let token = decode(blob).unwrap();
        assert_eq!(token.access_token, "a");
        assert_eq!(token.refresh_token.as_deref(), Some("r"));
        assert_eq!(
            token.expiry.unwrap().to_rfc3339(),
            "2030-01-02T03:04:05+00:00"
        );
    }

    #[test]
    fn encode_omits_absent_fields() {
        let blob = encode(&Token::bearer("a")).unwrap();
        let text = String::from_utf8(blob).unwrap();
        assert_eq!(text, r#"{"access_token":"a","token_type":"Bearer"}"#);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(
            decode(b"not json"),
            Err(AuthError::Serialization(_))
        ));
    }

    #[test]
    fn validity_honours_expiry_skew() {
        let now = Utc::now();
        let mut token = Token::bearer("a");
        assert!(token.is_valid_at(now));

        token.expiry = Some(now + Duration::seconds(5));
        assert!(!token.is_valid_at(now));

        token.expiry = Some(now + Duration::minutes(5));
        assert!(token.is_valid_at(now));

        token.access_token.clear();
        assert!(!token.is_valid_at(now));
    }

    #[test]
    fn authorization_header_defaults_to_bearer() {
        let mut token = Token::bearer("abc");
        token.token_type = String::new();
        assert_eq!(token.authorization(), "Bearer abc");
        token.token_type = "bearer".to_string();
        assert_eq!(token.authorization(), "Bearer abc");
    }
}
