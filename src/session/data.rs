use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::SessionError;

/// Values the sign-in flow keeps between requests.
///
/// Persisted as a plain JSON object; absent values are omitted so the
/// stored record stays schema-less.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    /// CSRF challenge, present only between sign-in and callback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    /// Where to send the browser after the callback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
    /// Encoded OAuth2 token.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "blob_to_base64",
        deserialize_with = "blob_from_base64"
    )]
    pub token: Option<Vec<u8>>,
}

impl SessionData {
    /// Remove and return the nonce. A nonce is single-use.
    pub fn take_nonce(&mut self) -> Option<String> {
        self.nonce.take()
    }

    pub fn encode(&self) -> Result<Vec<u8>, SessionError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Encode, failing when the result exceeds `max_length` bytes.
    pub fn encode_bounded(&self, max_length: usize) -> Result<Vec<u8>, SessionError> {
        let encoded = self.encode()?;
        if max_length > 0 && encoded.len() > max_length {
            return Err(SessionError::TooLarge {
                size: encoded.len(),
                limit: max_length,
            });
        }
        Ok(encoded)
    }

    pub fn decode(raw: &[u8]) -> Result<Self, SessionError> {
        Ok(serde_json::from_slice(raw)?)
    }
}

fn blob_to_base64<S: Serializer>(blob: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
    match blob {
        Some(bytes) => serializer.serialize_str(&STANDARD.encode(bytes)),
        None => serializer.serialize_none(),
    }
}

fn blob_from_base64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error> {
    let encoded: Option<String> = Option::deserialize(deserializer)?;
    encoded
        .map(|text| STANDARD.decode(text).map_err(serde::de::Error::custom))
        .transpose()
}
