//! Test fixtures providing pre-built test objects

use chrono::Utc;
use uuid::Uuid;

use crate::protocol::attestation::AttestationType;
use crate::protocol::base64url::Base64UrlBytes;
use crate::protocol::challenge::create_challenge;
use crate::protocol::options::{
    CredentialAssertion, CredentialCreation, PublicKeyCredentialRequestOptions,
    UserVerificationRequirement,
};
use crate::settings::RelyingPartySettings;
use crate::webauthn::{
    Authenticator, Credential, CredentialFlags, RegistrationOptions, User, WebAuthn,
};

use super::authenticator::SoftAuthenticator;
use super::builders::{TestSettingsBuilder, TestUserBuilder};
use super::constants::TEST_RP_ID;

/// In-memory user account
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestUser {
    pub id: Vec<u8>,
    pub name: String,
    pub display_name: String,
    pub credentials: Vec<Credential>,
}

impl TestUser {
    /// Register a credential to the user
    pub fn add_credential(&mut self, credential: Credential) {
        self.credentials.push(credential);
    }

    /// Replace a credential after a login
    pub fn update_credential(&mut self, credential: Credential) {
        if let Some(existing) = self.credentials.iter_mut().find(|c| c.id == credential.id) {
            *existing = credential;
        }
    }
}

impl User for TestUser {
    fn webauthn_id(&self) -> &[u8] {
        &self.id
    }

    fn webauthn_name(&self) -> &str {
        &self.name
    }

    fn webauthn_display_name(&self) -> &str {
        &self.display_name
    }

    fn webauthn_credentials(&self) -> &[Credential] {
        &self.credentials
    }
}

/// Central fixture provider for all test data
pub struct TestFixtures;

impl TestFixtures {
    /// Settings for `example.com` served from `https://example.com`
    #[must_use]
    pub fn settings() -> RelyingPartySettings {
        TestSettingsBuilder::new().build()
    }

    /// Engine configured with [`TestFixtures::settings`]
    ///
    /// # Panics
    ///
    /// Panics if the fixture settings fail validation.
    #[must_use]
    pub fn webauthn() -> WebAuthn {
        WebAuthn::new(Self::settings()).expect("fixture settings are valid")
    }

    /// User without credentials
    #[must_use]
    pub fn user() -> TestUser {
        TestUserBuilder::new().build()
    }

    /// Registration options issued by the fixture engine for the fixture user
    ///
    /// # Panics
    ///
    /// Panics if the registration cannot begin.
    #[must_use]
    pub fn creation_options() -> CredentialCreation {
        Self::webauthn()
            .begin_registration(&Self::user(), RegistrationOptions::default())
            .expect("registration begins")
            .0
    }

    /// Login options for the fixture RP ID with a fresh challenge
    ///
    /// # Panics
    ///
    /// Panics if the random generator fails.
    #[must_use]
    pub fn assertion_options() -> CredentialAssertion {
        CredentialAssertion {
            public_key: PublicKeyCredentialRequestOptions {
                challenge: create_challenge().expect("challenge generation"),
                timeout: Some(60_000),
                rp_id: TEST_RP_ID.to_string(),
                allow_credentials: Vec::new(),
                user_verification: UserVerificationRequirement::Preferred,
                extensions: None,
            },
        }
    }

    /// Stored ES256 credential with the given ID, as if registered with `none` attestation
    #[must_use]
    pub fn test_credential(credential_id: &[u8]) -> Credential {
        let authenticator = SoftAuthenticator::es256().with_credential_id(credential_id);
        Credential {
            id: Base64UrlBytes::from(credential_id),
            public_key: Base64UrlBytes::from(authenticator.cose_public_key()),
            algorithm: authenticator.algorithm(),
            attestation_type: AttestationType::None,
            transports: Vec::new(),
            flags: CredentialFlags {
                user_present: true,
                user_verified: true,
                backup_eligible: false,
                backup_state: false,
            },
            authenticator: Authenticator {
                aaguid: Uuid::nil(),
                sign_count: 0,
                clone_warning: false,
                attachment: None,
            },
            created_at: Utc::now(),
            last_used: None,
        }
    }
}
