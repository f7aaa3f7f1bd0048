//! Attestation certificate checks
//!
//! Parses the DER certificates carried in `x5c` and applies the requirements
//! attestation certificates must meet before their key is trusted to verify
//! an attestation signature.

use x509_parser::certificate::X509Certificate;
use x509_parser::public_key::PublicKey as X509PublicKey;
use x509_parser::x509::{AttributeTypeAndValue, X509Version};

use crate::errors::{ErrorKind, Result, WebAuthnError};
use crate::protocol::cose::PublicKey;

/// id-fido-gen-ce-aaguid
const AAGUID_EXTENSION_OID: &str = "1.3.6.1.4.1.45724.1.1.4";
const ATTESTATION_OU: &str = "Authenticator Attestation";

fn certificate_error(info: impl Into<String>) -> WebAuthnError {
    WebAuthnError::new(ErrorKind::AttestationCertificate).with_info(info)
}

fn has_attribute<'a, 'b: 'a>(
    mut values: impl Iterator<Item = &'a AttributeTypeAndValue<'b>>,
) -> bool {
    values.any(|v| v.as_str().is_ok_and(|s| !s.is_empty()))
}

/// Parse one DER certificate
///
/// # Errors
/// Returns `AttestationCertificate` if the bytes are not a single DER certificate
pub fn parse_certificate(der: &[u8]) -> Result<X509Certificate<'_>> {
    match x509_parser::parse_x509_certificate(der) {
        Ok((rest, cert)) if rest.is_empty() => Ok(cert),
        Ok(_) => Err(certificate_error("trailing data after certificate")),
        Err(e) => Err(certificate_error(format!("error parsing certificate: {e}"))),
    }
}

/// Parse every certificate of an `x5c` chain, leaf first
///
/// # Errors
/// Returns `AttestationCertificate` if the chain is empty or any entry fails to parse
pub fn parse_chain(chain: &[Vec<u8>]) -> Result<Vec<X509Certificate<'_>>> {
    if chain.is_empty() {
        return Err(certificate_error("x5c must contain at least one certificate"));
    }
    chain.iter().map(|der| parse_certificate(der)).collect()
}

/// Extract the subject public key of a certificate
///
/// # Errors
/// Returns `AttestationCertificate` for keys other than P-256 and RSA
pub fn certificate_public_key(cert: &X509Certificate<'_>) -> Result<PublicKey> {
    let parsed = cert
        .public_key()
        .parsed()
        .map_err(|e| certificate_error(format!("error parsing subject public key: {e}")))?;

    match parsed {
        X509PublicKey::EC(point) => PublicKey::from_p256_sec1(point.data())
            .map_err(|_| certificate_error("certificate key is not a P-256 key")),
        X509PublicKey::RSA(rsa) => PublicKey::from_rsa_components(rsa.modulus, rsa.exponent)
            .map_err(|_| certificate_error("invalid RSA certificate key")),
        _ => Err(certificate_error("unsupported certificate key type")),
    }
}

/// Check that a certificate is within its validity window
///
/// # Errors
/// Returns `AttestationCertificate` when the current time falls outside the window
pub fn check_validity(cert: &X509Certificate<'_>) -> Result<()> {
    if cert.validity().is_valid() {
        Ok(())
    } else {
        Err(certificate_error("certificate is expired or not yet valid"))
    }
}

/// Requirements for a packed attestation leaf certificate
///
/// Version 3, subject C, O and CN present, subject OU "Authenticator
/// Attestation", not a CA, and when the AAGUID extension is present it must
/// match the authenticator data.
///
/// # Errors
/// Returns `AttestationCertificate` naming the first unmet requirement
pub fn check_packed_leaf(cert: &X509Certificate<'_>, aaguid: &[u8; 16]) -> Result<()> {
    if cert.version() != X509Version::V3 {
        return Err(certificate_error("attestation certificate must be version 3"));
    }

    let subject = cert.subject();
    for (field, present) in [
        ("C", has_attribute(subject.iter_country())),
        ("O", has_attribute(subject.iter_organization())),
        ("CN", has_attribute(subject.iter_common_name())),
    ] {
        if !present {
            return Err(certificate_error(format!(
                "attestation certificate subject is missing '{field}'"
            )));
        }
    }

    let has_attestation_ou = subject
        .iter_organizational_unit()
        .any(|ou| ou.as_str().is_ok_and(|v| v == ATTESTATION_OU));
    if !has_attestation_ou {
        return Err(certificate_error(format!(
            "attestation certificate OU must be '{ATTESTATION_OU}'"
        )));
    }

    let is_ca = cert
        .basic_constraints()
        .map_err(|e| certificate_error(format!("invalid basic constraints: {e}")))?
        .is_some_and(|bc| bc.value.ca);
    if is_ca {
        return Err(certificate_error("attestation certificate must not be a CA"));
    }

    if let Some(ext) = cert
        .extensions()
        .iter()
        .find(|ext| ext.oid.to_id_string() == AAGUID_EXTENSION_OID)
    {
        if ext.critical {
            return Err(certificate_error("AAGUID extension must not be critical"));
        }
        // OCTET STRING (0x04) of length 16
        let value = ext.value;
        if value.len() != 18 || value[0] != 0x04 || value[1] != 0x10 {
            return Err(certificate_error("malformed AAGUID extension"));
        }
        if &value[2..] != aaguid {
            return Err(certificate_error(
                "certificate AAGUID does not match authenticator data",
            ));
        }
    }

    check_validity(cert)
}

/// Verify each certificate is signed by the next one in the chain
///
/// # Errors
/// Returns `AttestationCertificate` when a link does not verify or a
/// certificate is outside its validity window
pub fn verify_chain_links(chain: &[X509Certificate<'_>]) -> Result<()> {
    for link in chain.windows(2) {
        let (child, issuer) = (&link[0], &link[1]);
        child
            .verify_signature(Some(issuer.public_key()))
            .map_err(|e| {
                certificate_error(format!("certificate chain link does not verify: {e}"))
            })?;
        check_validity(issuer)?;
    }
    Ok(())
}
