//! COSE public key resolution
//!
//! Decodes the COSE_Key carried in attested credential data into an algorithm
//! tag plus a public key ready for signature verification. Only the key types
//! and algorithms listed in [`COSEAlgorithm`] are accepted; everything else is
//! rejected before any key material is kept.

use ciborium::value::Value;
use p256::ecdsa::VerifyingKey as P256VerifyingKey;
use p256::EncodedPoint;
use rsa::{BigUint, RsaPublicKey};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{ErrorKind, Result, WebAuthnError};

// COSE_Key common parameters (RFC 9052 section 7.1)
const LABEL_KTY: i64 = 1;
const LABEL_ALG: i64 = 3;
// EC2 parameters (RFC 9053 section 7.1.1)
const LABEL_EC2_CRV: i64 = -1;
const LABEL_EC2_X: i64 = -2;
const LABEL_EC2_Y: i64 = -3;
// RSA parameters (RFC 8230 section 4)
const LABEL_RSA_N: i64 = -1;
const LABEL_RSA_E: i64 = -2;

const CURVE_P256: i64 = 1;
const P256_COORDINATE_LENGTH: usize = 32;

/// COSE key types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum COSEKeyType {
    OctetKey,
    EllipticCurve,
    Rsa,
}

impl COSEKeyType {
    fn from_label(value: i64) -> Option<Self> {
        match value {
            1 => Some(Self::OctetKey),
            2 => Some(Self::EllipticCurve),
            3 => Some(Self::Rsa),
            _ => None,
        }
    }
}

/// Signature algorithms the engine can verify
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum COSEAlgorithm {
    /// ECDSA over P-256 with SHA-256
    ES256,
    /// RSASSA-PKCS1-v1_5 with SHA-256
    RS256,
}

impl COSEAlgorithm {
    /// Registered COSE algorithm identifier
    #[must_use]
    pub const fn id(self) -> i64 {
        match self {
            Self::ES256 => -7,
            Self::RS256 => -257,
        }
    }

    /// Key type an algorithm requires
    #[must_use]
    pub const fn key_type(self) -> COSEKeyType {
        match self {
            Self::ES256 => COSEKeyType::EllipticCurve,
            Self::RS256 => COSEKeyType::Rsa,
        }
    }
}

impl TryFrom<i64> for COSEAlgorithm {
    type Error = WebAuthnError;

    fn try_from(id: i64) -> Result<Self> {
        match id {
            -7 => Ok(Self::ES256),
            -257 => Ok(Self::RS256),
            other => Err(WebAuthnError::new(ErrorKind::UnsupportedAlgorithm)
                .with_info(format!("COSE algorithm {other} is not supported"))),
        }
    }
}

impl From<COSEAlgorithm> for i64 {
    fn from(alg: COSEAlgorithm) -> Self {
        alg.id()
    }
}

impl fmt::Display for COSEAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ES256 => f.write_str("ES256"),
            Self::RS256 => f.write_str("RS256"),
        }
    }
}

/// Public key material ready for verification
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PublicKey {
    P256(P256VerifyingKey),
    Rsa(RsaPublicKey),
}

impl PublicKey {
    /// Uncompressed SEC1 point (`0x04 || x || y`) for P-256 keys
    #[must_use]
    pub fn p256_uncompressed_point(&self) -> Option<Vec<u8>> {
        match self {
            Self::P256(key) => Some(key.to_encoded_point(false).as_bytes().to_vec()),
            Self::Rsa(_) => None,
        }
    }

    pub(crate) fn from_p256_sec1(point: &[u8]) -> Result<Self> {
        P256VerifyingKey::from_sec1_bytes(point)
            .map(Self::P256)
            .map_err(|_| {
                WebAuthnError::new(ErrorKind::UnsupportedKey)
                    .with_details("invalid P-256 public key")
            })
    }

    pub(crate) fn from_rsa_components(n: &[u8], e: &[u8]) -> Result<Self> {
        RsaPublicKey::new(BigUint::from_bytes_be(n), BigUint::from_bytes_be(e))
            .map(Self::Rsa)
            .map_err(|err| {
                WebAuthnError::new(ErrorKind::UnsupportedKey)
                    .with_details("invalid RSA public key")
                    .with_source(err)
            })
    }
}

/// Algorithm tag plus the decoded public key
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedKey {
    pub algorithm: COSEAlgorithm,
    pub public_key: PublicKey,
}

fn map_get(map: &[(Value, Value)], label: i64) -> Option<&Value> {
    map.iter()
        .find(|(k, _)| k.as_integer().map(i128::from) == Some(i128::from(label)))
        .map(|(_, v)| v)
}

fn integer_param(map: &[(Value, Value)], label: i64, name: &str) -> Result<i64> {
    map_get(map, label)
        .and_then(Value::as_integer)
        .and_then(|i| i64::try_from(i128::from(i)).ok())
        .ok_or_else(|| {
            WebAuthnError::new(ErrorKind::ParseError)
                .with_details("invalid COSE key")
                .with_info(format!("missing or invalid '{name}' parameter"))
        })
}

fn bytes_param<'a>(map: &'a [(Value, Value)], label: i64, name: &str) -> Result<&'a [u8]> {
    map_get(map, label)
        .and_then(Value::as_bytes)
        .map(Vec::as_slice)
        .ok_or_else(|| {
            WebAuthnError::new(ErrorKind::ParseError)
                .with_details("invalid COSE key")
                .with_info(format!("missing or invalid '{name}' parameter"))
        })
}

/// Decode raw COSE key bytes
///
/// # Errors
/// - `ParseError` if the bytes are not a CBOR map with the required parameters
/// - `UnsupportedKey` for key types or curves outside the supported set
/// - `UnsupportedAlgorithm` for unknown algorithms or an algorithm that does
///   not match the key type
pub fn resolve_public_key(cose_key: &[u8]) -> Result<ResolvedKey> {
    let value: Value = ciborium::de::from_reader(cose_key).map_err(|e| {
        WebAuthnError::new(ErrorKind::ParseError)
            .with_details("invalid COSE key")
            .with_source(e)
    })?;
    resolve_public_key_value(&value)
}

pub(crate) fn resolve_public_key_value(value: &Value) -> Result<ResolvedKey> {
    let Some(map) = value.as_map() else {
        return Err(WebAuthnError::new(ErrorKind::ParseError)
            .with_details("invalid COSE key")
            .with_info("COSE key is not a map"));
    };

    let kty = integer_param(map, LABEL_KTY, "kty")?;
    let key_type = COSEKeyType::from_label(kty).ok_or_else(|| {
        WebAuthnError::new(ErrorKind::UnsupportedKey).with_info(format!("key type {kty}"))
    })?;
    let algorithm = COSEAlgorithm::try_from(integer_param(map, LABEL_ALG, "alg")?)?;

    if algorithm.key_type() != key_type {
        return Err(WebAuthnError::new(ErrorKind::UnsupportedAlgorithm)
            .with_info(format!("{algorithm} cannot be used with key type {kty}")));
    }

    let public_key = match key_type {
        COSEKeyType::EllipticCurve => {
            let crv = integer_param(map, LABEL_EC2_CRV, "crv")?;
            if crv != CURVE_P256 {
                return Err(WebAuthnError::new(ErrorKind::UnsupportedKey)
                    .with_info(format!("elliptic curve {crv}")));
            }
            let x = bytes_param(map, LABEL_EC2_X, "x")?;
            let y = bytes_param(map, LABEL_EC2_Y, "y")?;
            if x.len() != P256_COORDINATE_LENGTH || y.len() != P256_COORDINATE_LENGTH {
                return Err(WebAuthnError::new(ErrorKind::UnsupportedKey)
                    .with_details("invalid P-256 public key")
                    .with_info("coordinates must be 32 bytes"));
            }
            let point = EncodedPoint::from_affine_coordinates(x.into(), y.into(), false);
            PublicKey::from_p256_sec1(point.as_bytes())?
        }
        COSEKeyType::Rsa => {
            let n = bytes_param(map, LABEL_RSA_N, "n")?;
            let e = bytes_param(map, LABEL_RSA_E, "e")?;
            PublicKey::from_rsa_components(n, e)?
        }
        COSEKeyType::OctetKey => {
            return Err(WebAuthnError::new(ErrorKind::UnsupportedKey)
                .with_info("octet key pairs are not supported"));
        }
    };

    Ok(ResolvedKey {
        algorithm,
        public_key,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(value: &Value) -> Vec<u8> {
        let mut buf = Vec::new();
        ciborium::ser::into_writer(value, &mut buf).unwrap();
        buf
    }

    fn int(i: i64) -> Value {
        Value::Integer(i.into())
    }

    fn p256_point() -> (Vec<u8>, Vec<u8>) {
        let signing_key = p256::ecdsa::SigningKey::from_slice(&[0x11; 32]).unwrap();
        let point = signing_key.verifying_key().to_encoded_point(false);
        (point.x().unwrap().to_vec(), point.y().unwrap().to_vec())
    }

    fn ec2_key(alg: i64, crv: i64) -> Value {
        let (x, y) = p256_point();
        Value::Map(vec![
            (int(1), int(2)),
            (int(3), int(alg)),
            (int(-1), int(crv)),
            (int(-2), Value::Bytes(x)),
            (int(-3), Value::Bytes(y)),
        ])
    }

    #[test]
    fn test_resolve_es256() {
        let resolved = resolve_public_key(&encode(&ec2_key(-7, 1))).unwrap();
        assert_eq!(resolved.algorithm, COSEAlgorithm::ES256);
        assert!(matches!(resolved.public_key, PublicKey::P256(_)));
        assert_eq!(
            resolved.public_key.p256_uncompressed_point().unwrap().len(),
            65
        );
    }

    #[test]
    fn test_algorithm_key_type_mismatch() {
        let err = resolve_public_key(&encode(&ec2_key(-257, 1))).unwrap_err();
        assert!(err.is(ErrorKind::UnsupportedAlgorithm));
    }

    #[test]
    fn test_unknown_algorithm() {
        let err = resolve_public_key(&encode(&ec2_key(-8, 1))).unwrap_err();
        assert!(err.is(ErrorKind::UnsupportedAlgorithm));
    }

    #[test]
    fn test_unsupported_curve() {
        let err = resolve_public_key(&encode(&ec2_key(-7, 2))).unwrap_err();
        assert!(err.is(ErrorKind::UnsupportedKey));
    }

    #[test]
    fn test_unsupported_key_type() {
        let okp = Value::Map(vec![
            (int(1), int(1)),
            (int(3), int(-7)),
            (int(-1), int(6)),
            (int(-2), Value::Bytes(vec![0; 32])),
        ]);
        let err = resolve_public_key(&encode(&okp)).unwrap_err();
        assert!(err.is(ErrorKind::UnsupportedKey));
    }

    #[test]
    fn test_point_not_on_curve() {
        let key = Value::Map(vec![
            (int(1), int(2)),
            (int(3), int(-7)),
            (int(-1), int(1)),
            (int(-2), Value::Bytes(vec![0x01; 32])),
            (int(-3), Value::Bytes(vec![0x02; 32])),
        ]);
        let err = resolve_public_key(&encode(&key)).unwrap_err();
        assert!(err.is(ErrorKind::UnsupportedKey));
    }

    #[test]
    fn test_missing_parameters() {
        let key = Value::Map(vec![(int(1), int(2)), (int(3), int(-7))]);
        let err = resolve_public_key(&encode(&key)).unwrap_err();
        assert!(err.is(ErrorKind::ParseError));
    }

    #[test]
    fn test_not_a_map() {
        let err = resolve_public_key(&encode(&Value::Text("key".into()))).unwrap_err();
        assert!(err.is(ErrorKind::ParseError));

        let err = resolve_public_key(&[0xff, 0x00]).unwrap_err();
        assert!(err.is(ErrorKind::ParseError));
    }

    #[test]
    fn test_algorithm_serde_as_integer() {
        assert_eq!(serde_json::to_string(&COSEAlgorithm::RS256).unwrap(), "-257");
        let alg: COSEAlgorithm = serde_json::from_str("-7").unwrap();
        assert_eq!(alg, COSEAlgorithm::ES256);
        assert!(serde_json::from_str::<COSEAlgorithm>("-8").is_err());
    }
}
