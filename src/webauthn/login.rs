//! Login (assertion) ceremony

use chrono::Utc;
use std::time::Duration;

use super::types::{Credential, SessionData, User};
use super::WebAuthn;
use crate::errors::{ErrorKind, Result, WebAuthnError};
use crate::protocol::authenticator_data::rp_id_hash;
use crate::protocol::base64url::Base64UrlBytes;
use crate::protocol::challenge::create_challenge;
use crate::protocol::client_data::{validate_client_data, CeremonyType};
use crate::protocol::options::{
    CredentialAssertion, PublicKeyCredentialDescriptor, PublicKeyCredentialRequestOptions,
    UserVerificationRequirement,
};
use crate::protocol::responses::{parse_credential_request_response, ParsedCredentialAssertionData};
use crate::protocol::signature;

/// Per-call overrides for `begin_login`
#[derive(Clone, Debug, Default)]
pub struct LoginOptions {
    pub rp_id: Option<String>,
    pub user_verification: Option<UserVerificationRequirement>,
    /// Replaces the allow list built from the user's credentials
    pub allowed_credentials: Option<Vec<PublicKeyCredentialDescriptor>>,
    pub timeout: Option<Duration>,
    pub extensions: Option<serde_json::Value>,
}

/// Result of a verified assertion
///
/// Both variants carry the updated credential for the caller to persist.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Signature and counter checks passed
    Verified(Credential),
    /// Signature verified but the counter did not increase; the clone
    /// warning is set on the credential and the caller decides whether to
    /// accept the login
    PossibleClone(Credential),
}

impl LoginOutcome {
    #[must_use]
    pub fn credential(&self) -> &Credential {
        match self {
            Self::Verified(credential) | Self::PossibleClone(credential) => credential,
        }
    }

    #[must_use]
    pub fn into_credential(self) -> Credential {
        match self {
            Self::Verified(credential) | Self::PossibleClone(credential) => credential,
        }
    }

    #[must_use]
    pub fn is_possible_clone(&self) -> bool {
        matches!(self, Self::PossibleClone(_))
    }
}

impl WebAuthn {
    /// Start a login for `user`, allowing any of their credentials
    ///
    /// # Errors
    /// - `BadRequest` if the user has no credentials and no allow list was given
    /// - `Configuration` if the RP ID cannot be resolved or the timeout is out
    ///   of range
    pub fn begin_login(
        &self,
        user: &impl User,
        options: LoginOptions,
    ) -> Result<(CredentialAssertion, SessionData)> {
        let allowed = options.allowed_credentials.clone().unwrap_or_else(|| {
            user.webauthn_credentials()
                .iter()
                .map(Credential::descriptor)
                .collect()
        });
        if allowed.is_empty() {
            return Err(WebAuthnError::new(ErrorKind::BadRequest)
                .with_details("found no credentials for user"));
        }

        let user_id = Base64UrlBytes::from(user.webauthn_id());
        self.begin_assertion(Some(user_id), allowed, options)
    }

    /// Start a login without a known user (discoverable credentials)
    ///
    /// # Errors
    /// Returns `Configuration` if the RP ID cannot be resolved or the timeout
    /// is out of range
    pub fn begin_discoverable_login(
        &self,
        options: LoginOptions,
    ) -> Result<(CredentialAssertion, SessionData)> {
        self.begin_assertion(None, Vec::new(), options)
    }

    fn begin_assertion(
        &self,
        user_id: Option<Base64UrlBytes>,
        allowed: Vec<PublicKeyCredentialDescriptor>,
        options: LoginOptions,
    ) -> Result<(CredentialAssertion, SessionData)> {
        let rp_id = self.resolve_rp_id(options.rp_id.as_deref())?;
        let user_verification = options
            .user_verification
            .unwrap_or(self.settings.authenticator_selection.user_verification);

        let timeouts = &self.settings.timeouts.login;
        let timeout = options
            .timeout
            .unwrap_or_else(|| timeouts.for_verification(user_verification));
        let expires = Self::session_expiry(timeouts.enforce, timeout)?;

        let challenge = create_challenge()?;

        let assertion = CredentialAssertion {
            public_key: PublicKeyCredentialRequestOptions {
                challenge: challenge.clone(),
                timeout: u64::try_from(timeout.as_millis()).ok(),
                rp_id: rp_id.clone(),
                allow_credentials: allowed.clone(),
                user_verification,
                extensions: options.extensions.clone(),
            },
        };

        let session = SessionData {
            challenge,
            user_id,
            relying_party_id: rp_id,
            ceremony: CeremonyType::Get,
            allowed_credential_ids: allowed.into_iter().map(|d| d.id).collect(),
            user_verification,
            expires,
            extensions: options.extensions,
        };

        log::debug!(
            "Issued login challenge for relying party '{}' ({} allowed credential(s))",
            session.relying_party_id,
            session.allowed_credential_ids.len()
        );
        Ok((assertion, session))
    }

    /// Complete a login from the raw response body
    ///
    /// # Errors
    /// Returns `BadRequest` when the engine is unconfigured or the body is
    /// empty or malformed, otherwise the first failing validation step
    pub fn finish_login(
        &self,
        user: &impl User,
        session: &SessionData,
        body: &[u8],
    ) -> Result<LoginOutcome> {
        self.ensure_configured()?;
        let parsed = parse_credential_request_response(body)
            .inspect_err(|e| log::debug!("Login response rejected: {}", e.kind()))?;
        self.validate_login(user, session, &parsed)
    }

    /// Validate a parsed assertion for a known user
    ///
    /// # Errors
    /// - `BadRequest` for a session of another ceremony or user, an expired
    ///   session, or a user handle that does not match the user
    /// - `BadRequest` if the session allow list names a credential the user
    ///   does not own
    /// - `AuthData` if the credential is outside the allow list or not owned
    ///   by the user
    /// - client data, authenticator data and signature errors
    pub fn validate_login(
        &self,
        user: &impl User,
        session: &SessionData,
        parsed: &ParsedCredentialAssertionData,
    ) -> Result<LoginOutcome> {
        self.ensure_configured()?;
        Self::check_session(session, CeremonyType::Get)?;
        if session.user_id.as_deref() != Some(user.webauthn_id()) {
            return Err(WebAuthnError::new(ErrorKind::BadRequest)
                .with_details("ID mismatch for User and Session"));
        }
        if let Some(handle) = &parsed.user_handle {
            if handle.as_slice() != user.webauthn_id() {
                return Err(WebAuthnError::new(ErrorKind::BadRequest)
                    .with_details("userHandle and User ID do not match"));
            }
        }

        self.verify_assertion(user, session, parsed)
            .inspect_err(|e| log::debug!("Login failed: {} ({})", e.kind(), e.details()))
    }

    /// Complete a discoverable login from the raw response body
    ///
    /// `handler` receives the raw credential ID and the user handle from the
    /// assertion and returns the owning user.
    ///
    /// # Errors
    /// Returns `BadRequest` when the body is malformed or carries no user
    /// handle, the handler's error, or any validation failure
    pub fn finish_discoverable_login<U, F>(
        &self,
        handler: F,
        session: &SessionData,
        body: &[u8],
    ) -> Result<(U, LoginOutcome)>
    where
        U: User,
        F: FnOnce(&[u8], &[u8]) -> Result<U>,
    {
        self.ensure_configured()?;
        let parsed = parse_credential_request_response(body)?;
        self.validate_discoverable_login(handler, session, &parsed)
    }

    /// Validate a parsed discoverable assertion
    ///
    /// # Errors
    /// See [`WebAuthn::finish_discoverable_login`]
    pub fn validate_discoverable_login<U, F>(
        &self,
        handler: F,
        session: &SessionData,
        parsed: &ParsedCredentialAssertionData,
    ) -> Result<(U, LoginOutcome)>
    where
        U: User,
        F: FnOnce(&[u8], &[u8]) -> Result<U>,
    {
        self.ensure_configured()?;
        Self::check_session(session, CeremonyType::Get)?;

        let Some(handle) = parsed.user_handle.as_deref() else {
            return Err(WebAuthnError::new(ErrorKind::BadRequest)
                .with_details("client user handle not present"));
        };
        let user = handler(&parsed.raw_id, handle)?;
        if user.webauthn_id() != handle {
            return Err(WebAuthnError::new(ErrorKind::BadRequest)
                .with_details("userHandle and User ID do not match"));
        }

        let outcome = self
            .verify_assertion(&user, session, parsed)
            .inspect_err(|e| log::debug!("Discoverable login failed: {}", e.kind()))?;
        Ok((user, outcome))
    }

    fn verify_assertion(
        &self,
        user: &impl User,
        session: &SessionData,
        parsed: &ParsedCredentialAssertionData,
    ) -> Result<LoginOutcome> {
        let owned = user.webauthn_credentials();
        if !session.allowed_credential_ids.is_empty() {
            if !session
                .allowed_credential_ids
                .iter()
                .all(|id| owned.iter().any(|c| c.id == *id))
            {
                return Err(WebAuthnError::new(ErrorKind::BadRequest)
                    .with_details("user does not own all credentials from the allow list"));
            }
            if !session
                .allowed_credential_ids
                .iter()
                .any(|id| id.as_slice() == parsed.raw_id.as_slice())
            {
                return Err(WebAuthnError::new(ErrorKind::AuthData)
                    .with_details("user does not own the credential returned"));
            }
        }

        let credential = owned
            .iter()
            .find(|c| c.id.as_slice() == parsed.raw_id.as_slice())
            .ok_or_else(|| {
                WebAuthnError::new(ErrorKind::AuthData)
                    .with_details("unable to find the credential for the returned credential ID")
            })?;

        let client_data = validate_client_data(
            &parsed.raw_client_data,
            CeremonyType::Get,
            &session.challenge,
            &self.settings,
        )?;

        let auth_data = &parsed.auth_data;
        auth_data.verify(
            &rp_id_hash(&session.relying_party_id),
            session.user_verification == UserVerificationRequirement::Required,
        )?;
        if auth_data.attested_credential_data.is_some() {
            return Err(WebAuthnError::new(ErrorKind::AuthData)
                .with_details("unexpected attested credential data in assertion"));
        }
        if auth_data.flags.backup_eligible() != credential.flags.backup_eligible {
            return Err(WebAuthnError::new(ErrorKind::AuthData)
                .with_details("backup eligible flag inconsistency detected during login"));
        }

        let key = credential.resolve_key()?;
        let mut signed_data = parsed.raw_auth_data.clone();
        signed_data.extend_from_slice(&client_data.hash);
        signature::verify_with(
            credential.algorithm,
            &key.public_key,
            &signed_data,
            &parsed.signature,
        )?;

        let mut updated = credential.clone();
        let counter_increased = updated.authenticator.update_counter(auth_data.counter);
        updated.flags.user_present = auth_data.flags.user_present();
        updated.flags.user_verified = auth_data.flags.user_verified();
        updated.flags.backup_state = auth_data.flags.backup_state();
        updated.last_used = Some(Utc::now());

        if counter_increased {
            Ok(LoginOutcome::Verified(updated))
        } else {
            log::warn!(
                "Possible cloned authenticator: counter {} did not increase past {}",
                auth_data.counter,
                credential.authenticator.sign_count
            );
            Ok(LoginOutcome::PossibleClone(updated))
        }
    }
}
