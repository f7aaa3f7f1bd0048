//! Signature verification for resolved public keys

use p256::ecdsa::Signature as P256Signature;
use rsa::pkcs1v15::{Signature as RsaSignature, VerifyingKey as RsaVerifyingKey};
use rsa::signature::Verifier;
use sha2::Sha256;

use super::cose::{COSEAlgorithm, PublicKey, ResolvedKey};
use crate::errors::{ErrorKind, Result, WebAuthnError};

/// Verify `signature` over `message` with an explicit algorithm
///
/// ES256 signatures are expected in ASN.1 DER form as produced by
/// authenticators; RS256 signatures are the raw PKCS#1 v1.5 block.
///
/// # Errors
/// - `ParseError` when the signature bytes are structurally malformed
/// - `UnsupportedAlgorithm` when the key cannot be used with `algorithm`
/// - `AssertionSignature` when the signature does not verify
pub fn verify_with(
    algorithm: COSEAlgorithm,
    key: &PublicKey,
    message: &[u8],
    signature: &[u8],
) -> Result<()> {
    match (algorithm, key) {
        (COSEAlgorithm::ES256, PublicKey::P256(verifying_key)) => {
            let sig = P256Signature::from_der(signature).map_err(|e| {
                WebAuthnError::new(ErrorKind::ParseError)
                    .with_details("malformed ES256 signature")
                    .with_source(e)
            })?;
            verifying_key
                .verify(message, &sig)
                .map_err(|_| WebAuthnError::new(ErrorKind::AssertionSignature))
        }
        (COSEAlgorithm::RS256, PublicKey::Rsa(public_key)) => {
            let sig = RsaSignature::try_from(signature).map_err(|e| {
                WebAuthnError::new(ErrorKind::ParseError)
                    .with_details("malformed RS256 signature")
                    .with_source(e)
            })?;
            RsaVerifyingKey::<Sha256>::new(public_key.clone())
                .verify(message, &sig)
                .map_err(|_| WebAuthnError::new(ErrorKind::AssertionSignature))
        }
        (alg, _) => Err(WebAuthnError::new(ErrorKind::UnsupportedAlgorithm)
            .with_info(format!("{alg} does not match the public key type"))),
    }
}

/// Verify `signature` over `message` with a resolved credential key
///
/// # Errors
/// See [`verify_with`]
pub fn verify(key: &ResolvedKey, message: &[u8], signature: &[u8]) -> Result<()> {
    verify_with(key.algorithm, &key.public_key, message, signature)
}
