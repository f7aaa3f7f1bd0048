//! Registration ceremony

use chrono::Utc;
use std::time::Duration;
use uuid::Uuid;

use super::types::{Authenticator, Credential, CredentialFlags, SessionData, User};
use super::WebAuthn;
use crate::errors::{ErrorKind, Result, WebAuthnError};
use crate::protocol::authenticator_data::rp_id_hash;
use crate::protocol::base64url::Base64UrlBytes;
use crate::protocol::challenge::create_challenge;
use crate::protocol::client_data::{validate_client_data, CeremonyType};
use crate::protocol::cose::{resolve_public_key, COSEAlgorithm};
use crate::protocol::options::{
    AttestationConveyancePreference, AuthenticatorSelectionCriteria, CredentialCreation,
    PublicKeyCredentialCreationOptions, PublicKeyCredentialDescriptor,
    PublicKeyCredentialParameters, RelyingPartyEntity, ResidentKeyRequirement, UserEntity,
    UserVerificationRequirement,
};
use crate::protocol::responses::{parse_credential_creation_response, ParsedCredentialCreationData};

/// Per-call overrides for `begin_registration`; unset fields use the settings
#[derive(Clone, Debug, Default)]
pub struct RegistrationOptions {
    pub rp_id: Option<String>,
    pub rp_display_name: Option<String>,
    pub user_verification: Option<UserVerificationRequirement>,
    pub authenticator_selection: Option<AuthenticatorSelectionCriteria>,
    pub attestation: Option<AttestationConveyancePreference>,
    /// Replaces the exclude list built from the user's credentials
    pub exclude_credentials: Option<Vec<PublicKeyCredentialDescriptor>>,
    pub algorithms: Option<Vec<COSEAlgorithm>>,
    pub timeout: Option<Duration>,
    pub extensions: Option<serde_json::Value>,
}

impl WebAuthn {
    /// Start registering a new credential for `user`
    ///
    /// # Arguments
    /// * `user` - The account the credential will belong to
    /// * `options` - Overrides layered over the relying party settings
    ///
    /// # Returns
    /// * The options for `navigator.credentials.create()` and the session
    ///   data the caller must persist until `finish_registration`
    ///
    /// # Errors
    /// Returns a `Configuration` error if the RP ID or display name cannot be
    /// resolved from the options or the settings, or if the timeout puts the
    /// session deadline out of range
    pub fn begin_registration(
        &self,
        user: &impl User,
        options: RegistrationOptions,
    ) -> Result<(CredentialCreation, SessionData)> {
        let rp_id = self.resolve_rp_id(options.rp_id.as_deref())?;
        let rp_name = options
            .rp_display_name
            .unwrap_or_else(|| self.settings.rp_display_name.clone());
        if rp_name.is_empty() {
            return Err(WebAuthnError::new(ErrorKind::Configuration).with_details(
                "error occurred validating the configuration: the field 'rp_display_name' must be configured",
            ));
        }

        let mut selection = options
            .authenticator_selection
            .unwrap_or(self.settings.authenticator_selection);
        if let Some(user_verification) = options.user_verification {
            selection.user_verification = user_verification;
        }
        if selection.resident_key == Some(ResidentKeyRequirement::Required) {
            selection.require_resident_key = Some(true);
        }

        let exclude_credentials = options.exclude_credentials.unwrap_or_else(|| {
            user.webauthn_credentials()
                .iter()
                .map(Credential::descriptor)
                .collect()
        });

        let algorithms = options
            .algorithms
            .filter(|algs| !algs.is_empty())
            .unwrap_or_else(|| self.settings.preferred_algorithms.clone());
        let pub_key_cred_params: Vec<PublicKeyCredentialParameters> = if algorithms.is_empty() {
            vec![COSEAlgorithm::ES256.into(), COSEAlgorithm::RS256.into()]
        } else {
            algorithms.into_iter().map(PublicKeyCredentialParameters::from).collect()
        };

        let timeouts = &self.settings.timeouts.registration;
        let timeout = options
            .timeout
            .unwrap_or_else(|| timeouts.for_verification(selection.user_verification));
        let expires = Self::session_expiry(timeouts.enforce, timeout)?;

        let challenge = create_challenge()?;

        let creation = CredentialCreation {
            public_key: PublicKeyCredentialCreationOptions {
                rp: RelyingPartyEntity {
                    id: rp_id.clone(),
                    name: rp_name,
                },
                user: UserEntity {
                    id: Base64UrlBytes::from(user.webauthn_id()),
                    name: user.webauthn_name().to_string(),
                    display_name: user.webauthn_display_name().to_string(),
                },
                challenge: challenge.clone(),
                pub_key_cred_params,
                timeout: u64::try_from(timeout.as_millis()).ok(),
                exclude_credentials: exclude_credentials.clone(),
                authenticator_selection: Some(selection),
                attestation: Some(
                    options
                        .attestation
                        .unwrap_or(self.settings.attestation_preference),
                ),
                extensions: options.extensions.clone(),
            },
        };

        let session = SessionData {
            challenge,
            user_id: Some(Base64UrlBytes::from(user.webauthn_id())),
            relying_party_id: rp_id,
            ceremony: CeremonyType::Create,
            allowed_credential_ids: exclude_credentials.into_iter().map(|d| d.id).collect(),
            user_verification: selection.user_verification,
            expires,
            extensions: options.extensions,
        };

        log::debug!(
            "Issued registration challenge for relying party '{}'",
            session.relying_party_id
        );
        Ok((creation, session))
    }

    /// Complete registration from the raw response body
    ///
    /// # Errors
    /// Returns `BadRequest` when the engine is unconfigured or the body is
    /// empty or malformed, otherwise the first failing validation step
    pub fn finish_registration(
        &self,
        user: &impl User,
        session: &SessionData,
        body: &[u8],
    ) -> Result<Credential> {
        self.ensure_configured()?;
        let parsed = parse_credential_creation_response(body)
            .inspect_err(|e| log::debug!("Registration response rejected: {}", e.kind()))?;
        self.create_credential(user, session, &parsed)
    }

    /// Validate a parsed registration response and build the new credential
    ///
    /// The credential is returned to the caller for persistence; nothing is
    /// returned when any step fails.
    ///
    /// # Errors
    /// - `BadRequest` for an unconfigured engine, a session of another
    ///   ceremony or user, or an expired session
    /// - client data, authenticator data, key and attestation errors
    pub fn create_credential(
        &self,
        user: &impl User,
        session: &SessionData,
        parsed: &ParsedCredentialCreationData,
    ) -> Result<Credential> {
        self.verify_registration(user, session, parsed)
            .inspect_err(|e| log::debug!("Registration failed: {} ({})", e.kind(), e.details()))
    }

    fn verify_registration(
        &self,
        user: &impl User,
        session: &SessionData,
        parsed: &ParsedCredentialCreationData,
    ) -> Result<Credential> {
        self.ensure_configured()?;
        Self::check_session(session, CeremonyType::Create)?;
        if session.user_id.as_deref() != Some(user.webauthn_id()) {
            return Err(WebAuthnError::new(ErrorKind::BadRequest)
                .with_details("ID mismatch for User and Session"));
        }

        let client_data = validate_client_data(
            &parsed.raw_client_data,
            CeremonyType::Create,
            &session.challenge,
            &self.settings,
        )?;

        let object = &parsed.attestation_object;
        let auth_data = &object.auth_data;
        auth_data.verify(
            &rp_id_hash(&session.relying_party_id),
            session.user_verification == UserVerificationRequirement::Required,
        )?;

        let attested = auth_data.attested_credential_data.as_ref().ok_or_else(|| {
            WebAuthnError::new(ErrorKind::AuthData)
                .with_details("attested credential flag not set")
        })?;
        if attested.credential_id != parsed.raw_id {
            return Err(WebAuthnError::new(ErrorKind::Verification)
                .with_details("credential ID does not match the attested credential"));
        }
        if session
            .allowed_credential_ids
            .iter()
            .any(|id| id.as_slice() == attested.credential_id.as_slice())
        {
            return Err(WebAuthnError::new(ErrorKind::Verification)
                .with_details("credential is already registered"));
        }

        let key = resolve_public_key(&attested.credential_public_key)?;
        let attestation = object.verify(&client_data.hash, &key, self.trust_anchors.as_ref())?;
        self.policy.check(attestation.attestation_type)?;

        log::debug!(
            "Registered {} credential with {:?} attestation",
            key.algorithm,
            attestation.attestation_type
        );

        Ok(Credential {
            id: Base64UrlBytes::from(attested.credential_id.clone()),
            public_key: Base64UrlBytes::from(attested.credential_public_key.clone()),
            algorithm: key.algorithm,
            attestation_type: attestation.attestation_type,
            transports: parsed.transports.clone(),
            flags: CredentialFlags::from(auth_data.flags),
            authenticator: Authenticator {
                aaguid: Uuid::from_bytes(attested.aaguid),
                sign_count: auth_data.counter,
                clone_warning: false,
                attachment: parsed.authenticator_attachment,
            },
            created_at: Utc::now(),
            last_used: None,
        })
    }
}
