//! `none` attestation: the authenticator supplies no statement

use super::{AttestationInput, AttestationResult, AttestationType};
use crate::errors::{ErrorKind, Result, WebAuthnError};

pub(super) fn verify(input: &AttestationInput<'_>) -> Result<AttestationResult> {
    if !input.statement.is_empty() {
        return Err(WebAuthnError::new(ErrorKind::AttestationFormat)
            .with_info("attestation format none with attestation present"));
    }

    Ok(AttestationResult {
        attestation_type: AttestationType::None,
        trust_path: Vec::new(),
    })
}
