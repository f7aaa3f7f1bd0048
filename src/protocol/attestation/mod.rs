//! Attestation objects and statement verification
//!
//! The attestation object returned at registration is a CBOR map with the
//! format tag (`fmt`), the raw authenticator data (`authData`) and a format
//! specific statement (`attStmt`). Supported formats form a closed set in
//! [`AttestationFormat`]; adding a format means adding a variant, a tag and a
//! verifier module.

pub mod certificate;
mod fido_u2f;
mod none;
mod packed;

use ciborium::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::authenticator_data::AuthenticatorData;
use super::cose::ResolvedKey;
use crate::errors::{ErrorKind, Result, WebAuthnError};

/// How the credential was attested
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AttestationType {
    /// No attestation statement was provided
    None,
    /// Signed with the credential private key itself
    #[serde(rename = "self")]
    SelfAttestation,
    /// Signed with an attestation key certified by `x5c`
    Basic,
}

/// Supported attestation statement formats
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttestationFormat {
    None,
    Packed,
    FidoU2F,
}

impl AttestationFormat {
    /// Look up a format by its registered tag
    ///
    /// # Errors
    /// Returns `AttestationFormat` for unknown tags
    pub fn from_tag(tag: &str) -> Result<Self> {
        match tag {
            "none" => Ok(Self::None),
            "packed" => Ok(Self::Packed),
            "fido-u2f" => Ok(Self::FidoU2F),
            other => Err(WebAuthnError::new(ErrorKind::AttestationFormat)
                .with_info(format!("Type not found: {other}"))),
        }
    }

    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Packed => "packed",
            Self::FidoU2F => "fido-u2f",
        }
    }

    /// Verify a statement of this format
    ///
    /// Certificate chains returned by the format verifier are handed to
    /// `trust_anchors` before the result is accepted.
    ///
    /// # Errors
    /// Returns the format verifier's error, or the trust anchor provider's
    pub fn verify(
        self,
        input: &AttestationInput<'_>,
        trust_anchors: &dyn TrustAnchorProvider,
    ) -> Result<AttestationResult> {
        let result = match self {
            Self::None => none::verify(input)?,
            Self::Packed => packed::verify(input)?,
            Self::FidoU2F => fido_u2f::verify(input)?,
        };

        if !result.trust_path.is_empty() {
            let aaguid = input
                .auth_data
                .attested_credential_data
                .as_ref()
                .map(|c| c.aaguid)
                .unwrap_or_default();
            trust_anchors.verify_trust_path(self, &aaguid, &result.trust_path)?;
        }

        Ok(result)
    }
}

impl fmt::Display for AttestationFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Decides whether an attestation certificate chain is trusted
///
/// Implementations typically consult FIDO metadata for the AAGUID.
pub trait TrustAnchorProvider: Send + Sync {
    /// # Errors
    /// Returns an error (usually `InvalidAttestation` or `InvalidMetadata`)
    /// when the chain is not trusted
    fn verify_trust_path(
        &self,
        format: AttestationFormat,
        aaguid: &[u8; 16],
        trust_path: &[Vec<u8>],
    ) -> Result<()>;
}

/// Trusts every structurally valid chain
#[derive(Clone, Copy, Debug, Default)]
pub struct AcceptAll;

impl TrustAnchorProvider for AcceptAll {
    fn verify_trust_path(&self, _: AttestationFormat, _: &[u8; 16], _: &[Vec<u8>]) -> Result<()> {
        Ok(())
    }
}

/// Format specific attestation statement (`attStmt`)
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AttestationStatement(Vec<(Value, Value)>);

impl AttestationStatement {
    #[must_use]
    pub fn new(entries: Vec<(Value, Value)>) -> Self {
        Self(entries)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0
            .iter()
            .find(|(k, _)| k.as_text() == Some(key))
            .map(|(_, v)| v)
    }

    fn format_error(info: String) -> WebAuthnError {
        WebAuthnError::new(ErrorKind::AttestationFormat).with_info(info)
    }

    /// `alg` member, if present
    pub(crate) fn algorithm(&self) -> Result<Option<i64>> {
        match self.get("alg") {
            None => Ok(None),
            Some(value) => value
                .as_integer()
                .and_then(|i| i64::try_from(i128::from(i)).ok())
                .map(Some)
                .ok_or_else(|| Self::format_error("'alg' is not an integer".to_string())),
        }
    }

    /// Required `sig` member
    pub(crate) fn signature(&self) -> Result<&[u8]> {
        self.get("sig")
            .and_then(Value::as_bytes)
            .map(Vec::as_slice)
            .ok_or_else(|| Self::format_error("missing or invalid 'sig'".to_string()))
    }

    /// `x5c` member, if present
    pub(crate) fn certificate_chain(&self) -> Result<Option<Vec<Vec<u8>>>> {
        let Some(value) = self.get("x5c") else {
            return Ok(None);
        };
        let entries = value
            .as_array()
            .ok_or_else(|| Self::format_error("'x5c' is not an array".to_string()))?;
        entries
            .iter()
            .map(|entry| {
                entry
                    .as_bytes()
                    .cloned()
                    .ok_or_else(|| {
                        Self::format_error("'x5c' entry is not a byte string".to_string())
                    })
            })
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }
}

/// Everything a format verifier looks at
pub struct AttestationInput<'a> {
    pub statement: &'a AttestationStatement,
    pub raw_auth_data: &'a [u8],
    pub auth_data: &'a AuthenticatorData,
    pub client_data_hash: &'a [u8; 32],
    pub credential_key: &'a ResolvedKey,
}

impl AttestationInput<'_> {
    /// `authenticatorData || clientDataHash`
    #[must_use]
    pub fn signed_data(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(self.raw_auth_data.len() + self.client_data_hash.len());
        data.extend_from_slice(self.raw_auth_data);
        data.extend_from_slice(self.client_data_hash);
        data
    }
}

/// Outcome of a successful statement verification
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttestationResult {
    pub attestation_type: AttestationType,
    /// DER certificates, leaf first; empty for none and self attestation
    pub trust_path: Vec<Vec<u8>>,
}

/// Decoded attestation object
#[derive(Clone, Debug, PartialEq)]
pub struct AttestationObject {
    pub format: String,
    pub raw_auth_data: Vec<u8>,
    pub auth_data: AuthenticatorData,
    pub statement: AttestationStatement,
}

fn object_error(info: &str) -> WebAuthnError {
    WebAuthnError::new(ErrorKind::ParseError)
        .with_details("error parsing the attestation object")
        .with_info(info.to_string())
}

impl AttestationObject {
    /// Decode the CBOR attestation object and its authenticator data
    ///
    /// # Errors
    /// Returns `ParseError` for malformed CBOR, missing members or invalid
    /// authenticator data
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let value: Value = ciborium::de::from_reader(raw).map_err(|e| {
            WebAuthnError::new(ErrorKind::ParseError)
                .with_details("error parsing the attestation object")
                .with_source(e)
        })?;
        let Value::Map(entries) = value else {
            return Err(object_error("attestation object is not a map"));
        };

        let mut format = None;
        let mut raw_auth_data = None;
        let mut statement = None;
        for (key, value) in entries {
            match (key.as_text(), value) {
                (Some("fmt"), Value::Text(text)) => format = Some(text),
                (Some("authData"), Value::Bytes(bytes)) => raw_auth_data = Some(bytes),
                (Some("attStmt"), Value::Map(map)) => statement = Some(AttestationStatement(map)),
                (Some("fmt" | "authData" | "attStmt"), _) => {
                    return Err(object_error("attestation object member has the wrong type"));
                }
                _ => {}
            }
        }

        let format = format.ok_or_else(|| object_error("missing 'fmt'"))?;
        let raw_auth_data = raw_auth_data.ok_or_else(|| object_error("missing 'authData'"))?;
        let statement = statement.ok_or_else(|| object_error("missing 'attStmt'"))?;
        let auth_data = AuthenticatorData::parse(&raw_auth_data)?;

        Ok(Self {
            format,
            raw_auth_data,
            auth_data,
            statement,
        })
    }

    /// Dispatch statement verification on the format tag
    ///
    /// # Errors
    /// Returns `AttestationFormat` for unknown tags, otherwise the error of
    /// the format verifier
    pub fn verify(
        &self,
        client_data_hash: &[u8; 32],
        credential_key: &ResolvedKey,
        trust_anchors: &dyn TrustAnchorProvider,
    ) -> Result<AttestationResult> {
        let format = AttestationFormat::from_tag(&self.format)?;
        let input = AttestationInput {
            statement: &self.statement,
            raw_auth_data: &self.raw_auth_data,
            auth_data: &self.auth_data,
            client_data_hash,
            credential_key,
        };
        format.verify(&input, trust_anchors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(value: &Value) -> Vec<u8> {
        let mut buf = Vec::new();
        ciborium::ser::into_writer(value, &mut buf).unwrap();
        buf
    }

    fn auth_data() -> Vec<u8> {
        let mut raw = crate::protocol::authenticator_data::rp_id_hash("example.com").to_vec();
        raw.push(0x01);
        raw.extend_from_slice(&[0, 0, 0, 0]);
        raw
    }

    #[test]
    fn test_from_tag() {
        assert_eq!(AttestationFormat::from_tag("packed").unwrap(), AttestationFormat::Packed);
        assert_eq!(AttestationFormat::from_tag("fido-u2f").unwrap().tag(), "fido-u2f");

        let err = AttestationFormat::from_tag("tpm").unwrap_err();
        assert!(err.is(ErrorKind::AttestationFormat));
    }

    #[test]
    fn test_parse_object() {
        let raw = encode(&Value::Map(vec![
            (Value::Text("fmt".into()), Value::Text("none".into())),
            (Value::Text("attStmt".into()), Value::Map(vec![])),
            (Value::Text("authData".into()), Value::Bytes(auth_data())),
        ]));
        let object = AttestationObject::parse(&raw).unwrap();
        assert_eq!(object.format, "none");
        assert!(object.statement.is_empty());
        assert_eq!(object.raw_auth_data, auth_data());
    }

    #[test]
    fn test_parse_object_missing_members() {
        let raw = encode(&Value::Map(vec![(
            Value::Text("fmt".into()),
            Value::Text("none".into()),
        )]));
        let err = AttestationObject::parse(&raw).unwrap_err();
        assert!(err.is(ErrorKind::ParseError));

        let raw = encode(&Value::Map(vec![
            (Value::Text("fmt".into()), Value::Integer(1.into())),
            (Value::Text("attStmt".into()), Value::Map(vec![])),
            (Value::Text("authData".into()), Value::Bytes(auth_data())),
        ]));
        assert!(AttestationObject::parse(&raw).is_err());

        assert!(AttestationObject::parse(&[0xa1]).is_err());
    }

    #[test]
    fn test_statement_accessors() {
        let statement = AttestationStatement::new(vec![
            (Value::Text("alg".into()), Value::Integer((-7).into())),
            (Value::Text("sig".into()), Value::Bytes(vec![1, 2])),
            (
                Value::Text("x5c".into()),
                Value::Array(vec![Value::Bytes(vec![3])]),
            ),
        ]);
        assert_eq!(statement.algorithm().unwrap(), Some(-7));
        assert_eq!(statement.signature().unwrap(), &[1, 2]);
        assert_eq!(statement.certificate_chain().unwrap(), Some(vec![vec![3]]));

        let bad = AttestationStatement::new(vec![(
            Value::Text("x5c".into()),
            Value::Array(vec![Value::Text("cert".into())]),
        )]);
        assert!(bad.certificate_chain().unwrap_err().is(ErrorKind::AttestationFormat));
        assert!(bad.signature().is_err());
    }

    #[test]
    fn test_attestation_type_wire_names() {
        assert_eq!(
            serde_json::to_string(&AttestationType::SelfAttestation).unwrap(),
            "\"self\""
        );
        assert_eq!(serde_json::to_string(&AttestationType::Basic).unwrap(), "\"basic\"");
    }
}
