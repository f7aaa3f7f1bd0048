//! `fido-u2f` attestation
//!
//! Legacy U2F authenticators sign a fixed verification layout with a single
//! P-256 attestation certificate:
//! `0x00 || rpIdHash || clientDataHash || credentialId || publicKeyU2F`.

use super::certificate;
use super::{AttestationInput, AttestationResult, AttestationType};
use crate::errors::{ErrorKind, Result, WebAuthnError};
use crate::protocol::cose::{COSEAlgorithm, PublicKey};
use crate::protocol::signature;

pub(super) fn verify(input: &AttestationInput<'_>) -> Result<AttestationResult> {
    let sig = input.statement.signature()?;
    let chain = input.statement.certificate_chain()?.ok_or_else(|| {
        WebAuthnError::new(ErrorKind::AttestationFormat)
            .with_info("missing 'x5c' in fido-u2f statement")
    })?;
    if chain.len() != 1 {
        return Err(WebAuthnError::new(ErrorKind::AttestationFormat)
            .with_info("fido-u2f 'x5c' must contain exactly one certificate"));
    }

    let attestation_key = {
        let cert = certificate::parse_certificate(&chain[0])?;
        certificate::check_validity(&cert)?;
        certificate::certificate_public_key(&cert)?
    };
    if !matches!(attestation_key, PublicKey::P256(_)) {
        return Err(WebAuthnError::new(ErrorKind::AttestationCertificate)
            .with_info("fido-u2f attestation certificate must carry a P-256 key"));
    }

    let credential = input
        .auth_data
        .attested_credential_data
        .as_ref()
        .ok_or_else(|| {
            WebAuthnError::new(ErrorKind::AuthData)
                .with_info("attested credential data missing for fido-u2f attestation")
        })?;

    let public_key_u2f = input
        .credential_key
        .public_key
        .p256_uncompressed_point()
        .ok_or_else(|| {
            WebAuthnError::new(ErrorKind::Attestation)
                .with_details("fido-u2f credential key must be a P-256 key")
        })?;

    let mut verification_data = Vec::with_capacity(
        1 + 32 + 32 + credential.credential_id.len() + public_key_u2f.len(),
    );
    verification_data.push(0x00);
    verification_data.extend_from_slice(&input.auth_data.rp_id_hash);
    verification_data.extend_from_slice(input.client_data_hash);
    verification_data.extend_from_slice(&credential.credential_id);
    verification_data.extend_from_slice(&public_key_u2f);

    signature::verify_with(COSEAlgorithm::ES256, &attestation_key, &verification_data, sig)
        .map_err(|e| {
            WebAuthnError::new(ErrorKind::Attestation)
                .with_details("signature validation error")
                .with_source(e)
        })?;

    Ok(AttestationResult {
        attestation_type: AttestationType::Basic,
        trust_path: chain,
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

    const CA_CERT: &[u8] = include_bytes!("../../testing/data/attestation_ca.der");

    fn attest() -> (AttestationObject, [u8; 32]) {
        let response = SoftAuthenticator::es256()
            .with_attestation(AttestationMode::FidoU2F)
            .make_credential(&TestFixtures::creation_options());
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

    fn with_x5c(object: &AttestationObject, x5c: Option<Vec<Vec<u8>>>) -> AttestationStatement {
        let sig = object.statement.get("sig").cloned().unwrap();
        let mut entries = vec![(Value::Text("sig".to_string()), sig)];
        if let Some(chain) = x5c {
            entries.push((
                Value::Text("x5c".to_string()),
                Value::Array(chain.into_iter().map(Value::Bytes).collect()),
            ));
        }
        AttestationStatement::new(entries)
    }

    #[test]
    fn test_valid_statement() {
        let (object, hash) = attest();
        let result = run(&object, &object.statement, &hash).unwrap();
        assert_eq!(result.attestation_type, AttestationType::Basic);
        assert_eq!(result.trust_path.len(), 1);
    }

    #[test]
    fn test_missing_x5c() {
        let (object, hash) = attest();
        let err = run(&object, &with_x5c(&object, None), &hash).unwrap_err();
        assert!(err.is(ErrorKind::AttestationFormat));
    }

    #[test]
    fn test_chain_must_have_one_certificate() {
        let (object, hash) = attest();
        let mut chain = object.statement.certificate_chain().unwrap().unwrap();
        chain.push(CA_CERT.to_vec());
        let err = run(&object, &with_x5c(&object, Some(chain)), &hash).unwrap_err();
        assert!(err.is(ErrorKind::AttestationFormat));
    }

    #[test]
    fn test_signature_over_other_client_data() {
        let (object, _) = attest();
        let err = run(&object, &object.statement, &[7u8; 32]).unwrap_err();
        assert!(err.is(ErrorKind::Attestation));
    }
}
