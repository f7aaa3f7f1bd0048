//! `packed` attestation
//!
//! Either a full attestation (`x5c` present, signature by the attestation
//! certificate key) or a self attestation (signature by the credential key).

use super::certificate;
use super::{AttestationInput, AttestationResult, AttestationType};
use crate::errors::{ErrorKind, Result, WebAuthnError};
use crate::protocol::cose::COSEAlgorithm;
use crate::protocol::signature;

fn signature_error(source: WebAuthnError) -> WebAuthnError {
    WebAuthnError::new(ErrorKind::Attestation)
        .with_details("signature validation error")
        .with_source(source)
}

pub(super) fn verify(input: &AttestationInput<'_>) -> Result<AttestationResult> {
    let alg = input.statement.algorithm()?.ok_or_else(|| {
        WebAuthnError::new(ErrorKind::AttestationFormat)
            .with_info("error retrieving 'alg' value from packed statement")
    })?;
    let algorithm = COSEAlgorithm::try_from(alg)?;
    let sig = input.statement.signature()?;

    if input.statement.get("ecdaaKeyId").is_some() {
        return Err(WebAuthnError::new(ErrorKind::NotImplemented)
            .with_info("ECDAA attestation is not supported"));
    }

    match input.statement.certificate_chain()? {
        Some(chain) => verify_full(input, algorithm, sig, chain),
        None => verify_self(input, algorithm, sig),
    }
}

fn verify_full(
    input: &AttestationInput<'_>,
    algorithm: COSEAlgorithm,
    sig: &[u8],
    chain: Vec<Vec<u8>>,
) -> Result<AttestationResult> {
    let aaguid = input
        .auth_data
        .attested_credential_data
        .as_ref()
        .map(|c| c.aaguid)
        .ok_or_else(|| {
            WebAuthnError::new(ErrorKind::AuthData)
                .with_info("attested credential data missing for packed attestation")
        })?;

    let certs = certificate::parse_chain(&chain)?;
    let Some(leaf) = certs.first() else {
        return Err(WebAuthnError::new(ErrorKind::AttestationCertificate)
            .with_info("x5c must contain at least one certificate"));
    };

    certificate::check_packed_leaf(leaf, &aaguid)?;
    certificate::verify_chain_links(&certs)?;

    let attestation_key = certificate::certificate_public_key(leaf)?;
    signature::verify_with(algorithm, &attestation_key, &input.signed_data(), sig)
        .map_err(signature_error)?;

    drop(certs);
    Ok(AttestationResult {
        attestation_type: AttestationType::Basic,
        trust_path: chain,
    })
}

fn verify_self(
    input: &AttestationInput<'_>,
    algorithm: COSEAlgorithm,
    sig: &[u8],
) -> Result<AttestationResult> {
    if algorithm != input.credential_key.algorithm {
        return Err(WebAuthnError::new(ErrorKind::Attestation)
            .with_details("public key algorithm does not equal att statement algorithm")
            .with_info(format!(
                "statement uses {algorithm}, credential uses {}",
                input.credential_key.algorithm
            )));
    }

    signature::verify(input.credential_key, &input.signed_data(), sig).map_err(signature_error)?;

    Ok(AttestationResult {
        attestation_type: AttestationType::SelfAttestation,
        trust_path: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ciborium::value::Value;
    use sha2::{Digest, Sha256};

    use crate::protocol::attestation::{AttestationObject, AttestationStatement};
    use crate::protocol::cose::resolve_public_key;
    use crate::testing::{AttestationMode, SoftAuthenticator, TestFixtures};

    fn attest(authenticator: &SoftAuthenticator) -> (AttestationObject, [u8; 32]) {
        let response = authenticator.make_credential(&TestFixtures::creation_options());
        let hash: [u8; 32] = Sha256::digest(&response.response.client_data_json).into();
        let object = AttestationObject::parse(&response.response.attestation_object).unwrap();
        (object, hash)
    }

    fn run(
        object: &AttestationObject,
        statement: &AttestationStatement,
        hash: &[u8; 32],
    ) -> Result<AttestationResult> {
        let credential = object.auth_data.attested_credential_data.as_ref().unwrap();
        let key = resolve_public_key(&credential.credential_public_key).unwrap();
        verify(&AttestationInput {
            statement,
            raw_auth_data: &object.raw_auth_data,
            auth_data: &object.auth_data,
            client_data_hash: hash,
            credential_key: &key,
        })
    }

    fn replace(
        statement: &AttestationStatement,
        key: &str,
        value: Option<Value>,
    ) -> AttestationStatement {
        let mut entries: Vec<(Value, Value)> = statement
            .0
            .iter()
            .filter(|(k, _)| k.as_text() != Some(key))
            .cloned()
            .collect();
        if let Some(value) = value {
            entries.push((Value::Text(key.to_string()), value));
        }
        AttestationStatement::new(entries)
    }

    #[test]
    fn test_self_attestation() {
        let (object, hash) =
            attest(&SoftAuthenticator::es256().with_attestation(AttestationMode::PackedSelf));
        let result = run(&object, &object.statement, &hash).unwrap();
        assert_eq!(result.attestation_type, AttestationType::SelfAttestation);
        assert!(result.trust_path.is_empty());
    }

    #[test]
    fn test_full_attestation() {
        let (object, hash) =
            attest(&SoftAuthenticator::es256().with_attestation(AttestationMode::PackedFull));
        let result = run(&object, &object.statement, &hash).unwrap();
        assert_eq!(result.attestation_type, AttestationType::Basic);
        assert_eq!(result.trust_path.len(), 2);
    }

    #[test]
    fn test_missing_alg() {
        let (object, hash) =
            attest(&SoftAuthenticator::es256().with_attestation(AttestationMode::PackedSelf));
        let statement = replace(&object.statement, "alg", None);
        let err = run(&object, &statement, &hash).unwrap_err();
        assert!(err.is(ErrorKind::AttestationFormat));
    }

    #[test]
    fn test_unsupported_alg() {
        let (object, hash) =
            attest(&SoftAuthenticator::es256().with_attestation(AttestationMode::PackedSelf));
        let statement = replace(&object.statement, "alg", Some(Value::Integer((-8).into())));
        let err = run(&object, &statement, &hash).unwrap_err();
        assert!(err.is(ErrorKind::UnsupportedAlgorithm));
    }

    #[test]
    fn test_self_alg_must_match_credential() {
        let (object, hash) =
            attest(&SoftAuthenticator::es256().with_attestation(AttestationMode::PackedSelf));
        let statement = replace(&object.statement, "alg", Some(Value::Integer((-257).into())));
        let err = run(&object, &statement, &hash).unwrap_err();
        assert!(err.is(ErrorKind::Attestation));
    }

    #[test]
    fn test_ecdaa_not_implemented() {
        let (object, hash) =
            attest(&SoftAuthenticator::es256().with_attestation(AttestationMode::PackedSelf));
        let statement = replace(&object.statement, "ecdaaKeyId", Some(Value::Bytes(vec![1; 32])));
        let err = run(&object, &statement, &hash).unwrap_err();
        assert!(err.is(ErrorKind::NotImplemented));
    }

    #[test]
    fn test_full_signature_mismatch() {
        let (object, _) =
            attest(&SoftAuthenticator::es256().with_attestation(AttestationMode::PackedFull));
        let err = run(&object, &object.statement, &[0u8; 32]).unwrap_err();
        assert!(err.is(ErrorKind::Attestation));
    }

    #[test]
    fn test_full_chain_leaf_must_not_be_ca() {
        let (object, hash) =
            attest(&SoftAuthenticator::es256().with_attestation(AttestationMode::PackedFull));
        let chain = object.statement.certificate_chain().unwrap().unwrap();
        let reversed = Value::Array(chain.into_iter().rev().map(Value::Bytes).collect());
        let statement = replace(&object.statement, "x5c", Some(reversed));
        let err = run(&object, &statement, &hash).unwrap_err();
        assert!(err.is(ErrorKind::AttestationCertificate));
    }
}
