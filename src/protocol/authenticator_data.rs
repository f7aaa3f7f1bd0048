//! Authenticator data
//!
//! Fixed layout structure signed by the authenticator:
//!
//! | bytes | field |
//! |---|---|
//! | 32 | SHA-256 of the RP ID |
//! | 1 | flags |
//! | 4 | signature counter (big endian) |
//! | var | attested credential data (if `AT`) |
//! | var | CBOR extension map (if `ED`) |

use ciborium::value::Value;
use sha2::{Digest, Sha256};

use crate::errors::{ErrorKind, Result, WebAuthnError};

const RP_ID_HASH_LENGTH: usize = 32;
const MIN_AUTH_DATA_LENGTH: usize = RP_ID_HASH_LENGTH + 1 + 4;
const AAGUID_LENGTH: usize = 16;
const MAX_CREDENTIAL_ID_LENGTH: usize = 1023;

/// Authenticator data flag bits
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AuthenticatorFlags(u8);

impl AuthenticatorFlags {
    pub const USER_PRESENT: u8 = 0x01;
    pub const USER_VERIFIED: u8 = 0x04;
    pub const BACKUP_ELIGIBLE: u8 = 0x08;
    pub const BACKUP_STATE: u8 = 0x10;
    pub const ATTESTED_CREDENTIAL_DATA: u8 = 0x40;
    pub const EXTENSION_DATA: u8 = 0x80;

    #[must_use]
    pub const fn new(bits: u8) -> Self {
        Self(bits)
    }

    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    const fn has(self, flag: u8) -> bool {
        self.0 & flag == flag
    }

    #[must_use]
    pub const fn user_present(self) -> bool {
        self.has(Self::USER_PRESENT)
    }

    #[must_use]
    pub const fn user_verified(self) -> bool {
        self.has(Self::USER_VERIFIED)
    }

    #[must_use]
    pub const fn backup_eligible(self) -> bool {
        self.has(Self::BACKUP_ELIGIBLE)
    }

    #[must_use]
    pub const fn backup_state(self) -> bool {
        self.has(Self::BACKUP_STATE)
    }

    #[must_use]
    pub const fn has_attested_credential_data(self) -> bool {
        self.has(Self::ATTESTED_CREDENTIAL_DATA)
    }

    #[must_use]
    pub const fn has_extensions(self) -> bool {
        self.has(Self::EXTENSION_DATA)
    }
}

/// Credential block present in registration authenticator data
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttestedCredentialData {
    pub aaguid: [u8; AAGUID_LENGTH],
    pub credential_id: Vec<u8>,
    /// Raw COSE_Key bytes
    pub credential_public_key: Vec<u8>,
}

/// Parsed authenticator data
#[derive(Clone, Debug, PartialEq)]
pub struct AuthenticatorData {
    pub rp_id_hash: [u8; RP_ID_HASH_LENGTH],
    pub flags: AuthenticatorFlags,
    pub counter: u32,
    pub attested_credential_data: Option<AttestedCredentialData>,
    pub extensions: Option<Value>,
}

/// SHA-256 of a relying party ID
#[must_use]
pub fn rp_id_hash(rp_id: &str) -> [u8; RP_ID_HASH_LENGTH] {
    Sha256::digest(rp_id.as_bytes()).into()
}

fn parse_error(info: impl Into<String>) -> WebAuthnError {
    WebAuthnError::new(ErrorKind::ParseError)
        .with_details("error parsing the authenticator data")
        .with_info(info)
}

/// Decode one CBOR item from the front of `input`, returning it with the
/// number of bytes it occupied
fn decode_cbor_prefix(input: &[u8]) -> Result<(Value, usize)> {
    let mut rest = input;
    let value: Value = ciborium::de::from_reader(&mut rest).map_err(|e| {
        WebAuthnError::new(ErrorKind::ParseError)
            .with_details("error parsing the authenticator data")
            .with_source(e)
    })?;
    Ok((value, input.len() - rest.len()))
}

impl AuthenticatorData {
    /// Parse raw authenticator data bytes
    ///
    /// # Errors
    /// Returns `ParseError` when the buffer is shorter than the fixed header,
    /// a declared length runs past the end, or trailing bytes are left over
    pub fn parse(raw: &[u8]) -> Result<Self> {
        if raw.len() < MIN_AUTH_DATA_LENGTH {
            return Err(parse_error(format!(
                "expected at least {MIN_AUTH_DATA_LENGTH} bytes, received {}",
                raw.len()
            )));
        }

        let mut rp_id_hash = [0u8; RP_ID_HASH_LENGTH];
        rp_id_hash.copy_from_slice(&raw[..RP_ID_HASH_LENGTH]);
        let flags = AuthenticatorFlags::new(raw[RP_ID_HASH_LENGTH]);
        let counter = u32::from_be_bytes([raw[33], raw[34], raw[35], raw[36]]);

        let mut rest = &raw[MIN_AUTH_DATA_LENGTH..];

        let attested_credential_data = if flags.has_attested_credential_data() {
            let (data, consumed) = Self::parse_attested_credential_data(rest)?;
            rest = &rest[consumed..];
            Some(data)
        } else {
            None
        };

        let extensions = if flags.has_extensions() {
            if rest.is_empty() {
                return Err(parse_error("extension flag set but no extension data"));
            }
            let (value, consumed) = decode_cbor_prefix(rest)?;
            if !matches!(value, Value::Map(_)) {
                return Err(parse_error("extension data is not a map"));
            }
            rest = &rest[consumed..];
            Some(value)
        } else {
            None
        };

        if !rest.is_empty() {
            return Err(parse_error(format!(
                "{} leftover bytes after authenticator data",
                rest.len()
            )));
        }

        Ok(Self {
            rp_id_hash,
            flags,
            counter,
            attested_credential_data,
            extensions,
        })
    }

    fn parse_attested_credential_data(input: &[u8]) -> Result<(AttestedCredentialData, usize)> {
        let header = AAGUID_LENGTH + 2;
        if input.len() < header {
            return Err(parse_error("attested credential data is truncated"));
        }

        let mut aaguid = [0u8; AAGUID_LENGTH];
        aaguid.copy_from_slice(&input[..AAGUID_LENGTH]);
        let id_length = usize::from(u16::from_be_bytes([
            input[AAGUID_LENGTH],
            input[AAGUID_LENGTH + 1],
        ]));

        if id_length > MAX_CREDENTIAL_ID_LENGTH {
            return Err(parse_error(format!(
                "credential id length {id_length} exceeds {MAX_CREDENTIAL_ID_LENGTH}"
            )));
        }
        let key_start = header + id_length;
        if input.len() <= key_start {
            return Err(parse_error("credential id runs past the end of the data"));
        }

        let credential_id = input[header..key_start].to_vec();
        let (_, key_length) = decode_cbor_prefix(&input[key_start..])?;
        let credential_public_key = input[key_start..key_start + key_length].to_vec();

        Ok((
            AttestedCredentialData {
                aaguid,
                credential_id,
                credential_public_key,
            },
            key_start + key_length,
        ))
    }

    /// Check the RP ID hash and presence/verification flags
    ///
    /// # Errors
    /// Returns `AuthData` when the RP ID hash differs, user presence is
    /// missing, required user verification is missing, or backup state is
    /// set without backup eligibility
    pub fn verify(
        &self,
        expected_rp_id_hash: &[u8; RP_ID_HASH_LENGTH],
        user_verification_required: bool,
    ) -> Result<()> {
        if &self.rp_id_hash != expected_rp_id_hash {
            return Err(WebAuthnError::new(ErrorKind::AuthData)
                .with_details("error validating the relying party id hash")
                .with_info("rp id hash does not match the configured rp id"));
        }

        if !self.flags.user_present() {
            return Err(WebAuthnError::new(ErrorKind::AuthData)
                .with_details("user presence flag not set by authenticator"));
        }

        if user_verification_required && !self.flags.user_verified() {
            return Err(WebAuthnError::new(ErrorKind::AuthData)
                .with_details("user verification required but flag not set by authenticator"));
        }

        if self.flags.backup_state() && !self.flags.backup_eligible() {
            return Err(WebAuthnError::new(ErrorKind::AuthData)
                .with_details("backup state set without backup eligibility"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cose_key() -> Vec<u8> {
        let key = Value::Map(vec![
            (Value::Integer(1.into()), Value::Integer(2.into())),
            (Value::Integer(3.into()), Value::Integer((-7).into())),
        ]);
        let mut buf = Vec::new();
        ciborium::ser::into_writer(&key, &mut buf).unwrap();
        buf
    }

    fn header(flags: u8, counter: u32) -> Vec<u8> {
        let mut raw = rp_id_hash("example.com").to_vec();
        raw.push(flags);
        raw.extend_from_slice(&counter.to_be_bytes());
        raw
    }

    fn with_credential(flags: u8) -> Vec<u8> {
        let mut raw = header(flags | AuthenticatorFlags::ATTESTED_CREDENTIAL_DATA, 0);
        raw.extend_from_slice(&[0xAA; 16]);
        raw.extend_from_slice(&4u16.to_be_bytes());
        raw.extend_from_slice(&[1, 2, 3, 4]);
        raw.extend_from_slice(&cose_key());
        raw
    }

    #[test]
    fn test_parse_minimal() {
        let data = AuthenticatorData::parse(&header(0x05, 42)).unwrap();
        assert!(data.flags.user_present());
        assert!(data.flags.user_verified());
        assert_eq!(data.counter, 42);
        assert!(data.attested_credential_data.is_none());
        assert!(data.extensions.is_none());
    }

    #[test]
    fn test_too_short() {
        let err = AuthenticatorData::parse(&[0u8; 36]).unwrap_err();
        assert!(err.is(ErrorKind::ParseError));
    }

    #[test]
    fn test_parse_attested_credential() {
        let data = AuthenticatorData::parse(&with_credential(0x01)).unwrap();
        let credential = data.attested_credential_data.unwrap();
        assert_eq!(credential.aaguid, [0xAA; 16]);
        assert_eq!(credential.credential_id, vec![1, 2, 3, 4]);
        assert_eq!(credential.credential_public_key, cose_key());
    }

    #[test]
    fn test_credential_id_past_end() {
        let mut raw = header(0x41, 0);
        raw.extend_from_slice(&[0xAA; 16]);
        raw.extend_from_slice(&200u16.to_be_bytes());
        raw.extend_from_slice(&[1, 2, 3]);
        let err = AuthenticatorData::parse(&raw).unwrap_err();
        assert!(err.is(ErrorKind::ParseError));
    }

    #[test]
    fn test_truncated_public_key() {
        let mut raw = with_credential(0x01);
        raw.truncate(raw.len() - 2);
        let err = AuthenticatorData::parse(&raw).unwrap_err();
        assert!(err.is(ErrorKind::ParseError));
    }

    #[test]
    fn test_leftover_bytes() {
        let mut raw = header(0x01, 0);
        raw.push(0x00);
        let err = AuthenticatorData::parse(&raw).unwrap_err();
        assert!(err.is(ErrorKind::ParseError));
    }

    #[test]
    fn test_extensions() {
        let mut raw = header(0x01 | AuthenticatorFlags::EXTENSION_DATA, 0);
        let mut ext = Vec::new();
        ciborium::ser::into_writer(
            &Value::Map(vec![(Value::Text("credProtect".into()), Value::Integer(1.into()))]),
            &mut ext,
        )
        .unwrap();
        raw.extend_from_slice(&ext);

        let data = AuthenticatorData::parse(&raw).unwrap();
        assert!(data.extensions.is_some());
    }

    #[test]
    fn test_verify_flags() {
        let expected = rp_id_hash("example.com");

        let data = AuthenticatorData::parse(&header(0x01, 0)).unwrap();
        data.verify(&expected, false).unwrap();
        let err = data.verify(&expected, true).unwrap_err();
        assert!(err.is(ErrorKind::AuthData));

        let absent = AuthenticatorData::parse(&header(0x00, 0)).unwrap();
        assert!(absent.verify(&expected, false).unwrap_err().is(ErrorKind::AuthData));

        let backup = AuthenticatorData::parse(&header(0x11, 0)).unwrap();
        assert!(backup.verify(&expected, false).unwrap_err().is(ErrorKind::AuthData));
    }

    #[test]
    fn test_verify_rp_id_hash() {
        let data = AuthenticatorData::parse(&header(0x01, 0)).unwrap();
        let err = data.verify(&rp_id_hash("evil.com"), false).unwrap_err();
        assert!(err.is(ErrorKind::AuthData));
    }
}
