//! Collected client data
//!
//! The browser serializes a small JSON object describing the ceremony and
//! hands it to the authenticator, which signs over its SHA-256 hash. The
//! relying party must check that the object echoes the issued challenge and
//! an accepted origin before trusting anything the authenticator signed.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

use super::base64url;
use crate::errors::{ErrorKind, Result, WebAuthnError};
use crate::settings::{RelyingPartySettings, TopOriginVerificationMode};

/// Ceremony type tag carried in client data
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CeremonyType {
    #[serde(rename = "webauthn.create")]
    Create,
    #[serde(rename = "webauthn.get")]
    Get,
}

impl CeremonyType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "webauthn.create",
            Self::Get => "webauthn.get",
        }
    }
}

/// Parsed `clientDataJSON`
///
/// `ceremony_type` is kept as a string so an unknown tag is reported as a
/// type mismatch rather than a parse error.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CollectedClientData {
    #[serde(rename = "type")]
    pub ceremony_type: String,
    pub challenge: String,
    pub origin: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_origin: Option<String>,
    #[serde(default)]
    pub cross_origin: bool,
}

/// Client data that passed validation, with the hash the authenticator signed
#[derive(Clone, Debug)]
pub struct ValidatedClientData {
    pub data: CollectedClientData,
    pub hash: [u8; 32],
}

impl CollectedClientData {
    /// Parse raw `clientDataJSON` bytes
    ///
    /// # Errors
    /// Returns `ParseError` on malformed JSON or missing members
    pub fn parse(raw: &[u8]) -> Result<Self> {
        serde_json::from_slice(raw).map_err(|e| {
            WebAuthnError::new(ErrorKind::ParseError)
                .with_details("error parsing the client data JSON")
                .with_source(e)
        })
    }

    /// Check the client data against the ceremony it should belong to
    ///
    /// Checks run in order: ceremony type, challenge, origin, top origin.
    ///
    /// # Errors
    /// - `Verification` when the ceremony type differs
    /// - `ChallengeMismatch` when the echoed challenge differs or cannot be decoded
    /// - `Origin` when the origin or top origin is not accepted
    pub fn verify(
        &self,
        expected: CeremonyType,
        stored_challenge: &[u8],
        settings: &RelyingPartySettings,
    ) -> Result<()> {
        if self.ceremony_type != expected.as_str() {
            return Err(WebAuthnError::new(ErrorKind::Verification)
                .with_details("error validating ceremony type")
                .with_info(format!(
                    "expected value: {}, received: {}",
                    expected.as_str(),
                    self.ceremony_type
                )));
        }

        let challenge = base64url::decode(&self.challenge).map_err(|e| {
            WebAuthnError::new(ErrorKind::ChallengeMismatch)
                .with_details("error decoding the client data challenge")
                .with_source(e)
        })?;
        if challenge != stored_challenge {
            return Err(WebAuthnError::new(ErrorKind::ChallengeMismatch)
                .with_details("error validating challenge"));
        }

        if !settings.rp_origins.iter().any(|o| o == &self.origin) {
            return Err(WebAuthnError::new(ErrorKind::Origin)
                .with_details("error validating origin")
                .with_info(format!("origin '{}' is not configured", self.origin)));
        }

        if let Some(top_origin) = &self.top_origin {
            self.verify_top_origin(top_origin, settings)?;
        }

        Ok(())
    }

    fn verify_top_origin(&self, top_origin: &str, settings: &RelyingPartySettings) -> Result<()> {
        match settings.top_origin_verification_mode {
            TopOriginVerificationMode::Disabled => Ok(()),
            _ if !self.cross_origin => Err(WebAuthnError::new(ErrorKind::Verification)
                .with_details("error validating top origin")
                .with_info("top origin present on a same origin request")),
            TopOriginVerificationMode::AcceptAny => Url::parse(top_origin)
                .map(|_| ())
                .map_err(|e| {
                    WebAuthnError::new(ErrorKind::Origin)
                        .with_details("error validating top origin")
                        .with_source(e)
                }),
            TopOriginVerificationMode::Explicit => {
                if settings.rp_top_origins.iter().any(|o| o == top_origin) {
                    Ok(())
                } else {
                    Err(WebAuthnError::new(ErrorKind::Origin)
                        .with_details("error validating top origin")
                        .with_info(format!("top origin '{top_origin}' is not configured")))
                }
            }
        }
    }
}

/// Parse and validate raw client data, returning it with its SHA-256 hash
///
/// # Errors
/// See [`CollectedClientData::parse`] and [`CollectedClientData::verify`]
pub fn validate_client_data(
    raw: &[u8],
    expected: CeremonyType,
    stored_challenge: &[u8],
    settings: &RelyingPartySettings,
) -> Result<ValidatedClientData> {
    let data = CollectedClientData::parse(raw)?;
    data.verify(expected, stored_challenge, settings)?;
    Ok(ValidatedClientData {
        data,
        hash: Sha256::digest(raw).into(),
    })
}
