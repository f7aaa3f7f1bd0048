//! URL-safe base64 byte fields
//!
//! Binary values embedded in JSON (challenges, credential IDs, authenticator
//! data) are carried as unpadded URL-safe base64. Some clients still send
//! trailing `=` padding, so it is trimmed before decoding.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::Deref;

/// Encode bytes as unpadded URL-safe base64
#[must_use]
pub fn encode(bytes: impl AsRef<[u8]>) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Decode URL-safe base64, tolerating trailing padding
///
/// # Errors
/// Returns the underlying decode error if the input is not valid base64
pub fn decode(encoded: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_NO_PAD.decode(encoded.trim_end_matches('='))
}

/// Byte string that travels as URL-safe base64 in JSON
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Base64UrlBytes(Vec<u8>);

impl Base64UrlBytes {
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }
}

impl Deref for Base64UrlBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for Base64UrlBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Base64UrlBytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for Base64UrlBytes {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl<const N: usize> From<[u8; N]> for Base64UrlBytes {
    fn from(bytes: [u8; N]) -> Self {
        Self(bytes.to_vec())
    }
}

impl fmt::Display for Base64UrlBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode(&self.0))
    }
}

impl fmt::Debug for Base64UrlBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Base64UrlBytes({})", encode(&self.0))
    }
}

impl Serialize for Base64UrlBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for Base64UrlBytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        decode(&encoded).map(Self).map_err(|e| {
            serde::de::Error::custom(format!(
                "{encoded:?} cannot be unmarshaled as base64-encoded data: {e}"
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Payload {
        string_data: String,
        encoded_data: Option<Base64UrlBytes>,
    }

    #[test]
    fn test_deserialize_unpadded() {
        let raw = format!(
            r#"{{"string_data": "test string", "encoded_data": "{}"}}"#,
            encode(b"test base64 data")
        );
        let payload: Payload = serde_json::from_str(&raw).unwrap();

        assert_eq!(payload.string_data, "test string");
        assert_eq!(
            payload.encoded_data.as_deref(),
            Some(&b"test base64 data"[..])
        );
    }

    #[test]
    fn test_deserialize_null() {
        let raw = r#"{"string_data": "test string", "encoded_data": null}"#;
        let payload: Payload = serde_json::from_str(raw).unwrap();
        assert!(payload.encoded_data.is_none());
    }

    #[test]
    fn test_padding_is_trimmed() {
        // "ab" encodes to "YWI" unpadded, "YWI=" padded
        assert_eq!(decode("YWI=").unwrap(), b"ab");
        assert_eq!(decode("YWI").unwrap(), b"ab");

        let value: Base64UrlBytes = serde_json::from_str(r#""YWI=""#).unwrap();
        assert_eq!(value.as_slice(), b"ab");
    }

    #[test]
    fn test_standard_alphabet_rejected() {
        assert!(decode("+/+/").is_err());
        assert!(serde_json::from_str::<Base64UrlBytes>(r#""a+b/""#).is_err());
    }

    #[test]
    fn test_serialize_unpadded() {
        let value = Base64UrlBytes::from(b"abc".to_vec());
        assert_eq!(serde_json::to_string(&value).unwrap(), r#""YWJj""#);
        assert_eq!(value.to_string(), "YWJj");
    }
}
