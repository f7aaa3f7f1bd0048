//! `WebAuthn` core types
//!
//! Users, credentials and the per-ceremony session data handed to the
//! caller's session store between `begin_*` and `finish_*`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::Result;
use crate::protocol::attestation::AttestationType;
use crate::protocol::authenticator_data::AuthenticatorFlags;
use crate::protocol::base64url::Base64UrlBytes;
use crate::protocol::client_data::CeremonyType;
use crate::protocol::cose::{self, COSEAlgorithm, ResolvedKey};
use crate::protocol::options::{
    AuthenticatorAttachment, AuthenticatorTransport, CredentialType, PublicKeyCredentialDescriptor,
    UserVerificationRequirement,
};

/// Account the relying party registers credentials for
///
/// Implemented by the caller's user model; the engine only reads it.
pub trait User {
    /// Stable opaque user handle (at most 64 bytes, no personal data)
    fn webauthn_id(&self) -> &[u8];
    /// Account name, e.g. an email address
    fn webauthn_name(&self) -> &str;
    /// Human friendly name shown by the authenticator
    fn webauthn_display_name(&self) -> &str;
    /// Credentials currently registered to the user
    fn webauthn_credentials(&self) -> &[Credential];
}

/// Authenticator flags recorded for a credential
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CredentialFlags {
    pub user_present: bool,
    pub user_verified: bool,
    pub backup_eligible: bool,
    pub backup_state: bool,
}

impl From<AuthenticatorFlags> for CredentialFlags {
    fn from(flags: AuthenticatorFlags) -> Self {
        Self {
            user_present: flags.user_present(),
            user_verified: flags.user_verified(),
            backup_eligible: flags.backup_eligible(),
            backup_state: flags.backup_state(),
        }
    }
}

/// State of the authenticator holding a credential
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Authenticator {
    pub aaguid: Uuid,
    /// Last signature counter seen from the authenticator
    pub sign_count: u32,
    /// Set when a non-increasing counter suggests a cloned authenticator
    pub clone_warning: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<AuthenticatorAttachment>,
}

impl Authenticator {
    /// Apply the counter from a fresh assertion
    ///
    /// The counter must strictly increase unless both values are zero
    /// (authenticators without a counter). Otherwise the clone warning is set
    /// and the stored counter is left untouched. Returns `false` in that case.
    pub fn update_counter(&mut self, counter: u32) -> bool {
        if counter <= self.sign_count && (counter != 0 || self.sign_count != 0) {
            self.clone_warning = true;
            return false;
        }
        self.sign_count = counter;
        true
    }
}

/// Credential registered to a user
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub id: Base64UrlBytes,              // Credential ID chosen by the authenticator
    pub public_key: Base64UrlBytes,      // COSE-encoded public key
    pub algorithm: COSEAlgorithm,        // Algorithm the key signs with
    pub attestation_type: AttestationType,
    #[serde(default)]
    pub transports: Vec<AuthenticatorTransport>,
    pub flags: CredentialFlags,
    pub authenticator: Authenticator,
    pub created_at: DateTime<Utc>,        // When credential was registered
    pub last_used: Option<DateTime<Utc>>, // When credential last signed a login
}

impl Credential {
    /// Descriptor used in allow and exclude lists
    #[must_use]
    pub fn descriptor(&self) -> PublicKeyCredentialDescriptor {
        PublicKeyCredentialDescriptor {
            r#type: CredentialType::PublicKey,
            id: self.id.clone(),
            transports: self.transports.clone(),
        }
    }

    /// Decode the stored COSE key
    ///
    /// # Errors
    /// Returns the resolver error if the stored key is no longer supported
    pub fn resolve_key(&self) -> Result<ResolvedKey> {
        cose::resolve_public_key(&self.public_key)
    }
}

/// State kept by the caller between `begin_*` and `finish_*`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    pub challenge: Base64UrlBytes,
    /// Absent for discoverable login
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Base64UrlBytes>,
    /// RP ID the ceremony was issued for
    pub relying_party_id: String,
    pub ceremony: CeremonyType,
    /// Allow list for login, exclude list for registration
    #[serde(default)]
    pub allowed_credential_ids: Vec<Base64UrlBytes>,
    pub user_verification: UserVerificationRequirement,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<serde_json::Value>,
}

impl SessionData {
    /// Whether the session is past its expiry at `now`
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires.is_some_and(|expires| now > expires)
    }

    /// Remaining lifetime, used as the session store TTL
    #[must_use]
    pub fn time_to_live(&self, now: DateTime<Utc>) -> Option<std::time::Duration> {
        self.expires
            .map(|expires| (expires - now).to_std().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn authenticator(sign_count: u32) -> Authenticator {
        Authenticator {
            aaguid: Uuid::nil(),
            sign_count,
            clone_warning: false,
            attachment: None,
        }
    }

    #[test]
    fn test_counter_increase() {
        let mut auth = authenticator(5);
        assert!(auth.update_counter(6));
        assert_eq!(auth.sign_count, 6);
        assert!(!auth.clone_warning);
    }

    #[test]
    fn test_counter_both_zero() {
        let mut auth = authenticator(0);
        assert!(auth.update_counter(0));
        assert_eq!(auth.sign_count, 0);
        assert!(!auth.clone_warning);
    }

    #[test]
    fn test_counter_not_increasing() {
        let mut auth = authenticator(5);
        assert!(!auth.update_counter(5));
        assert!(auth.clone_warning);
        assert_eq!(auth.sign_count, 5);

        let mut auth = authenticator(5);
        assert!(!auth.update_counter(0));
        assert!(auth.clone_warning);
    }

    #[test]
    fn test_session_expiry() {
        let now = Utc::now();
        let session = SessionData {
            challenge: Base64UrlBytes::from(vec![0; 32]),
            user_id: None,
            relying_party_id: "example.com".to_string(),
            ceremony: CeremonyType::Get,
            allowed_credential_ids: Vec::new(),
            user_verification: UserVerificationRequirement::Preferred,
            expires: Some(now + Duration::seconds(60)),
            extensions: None,
        };
        assert!(!session.is_expired_at(now));
        assert!(session.is_expired_at(now + Duration::seconds(61)));
        assert_eq!(
            session.time_to_live(now),
            Some(std::time::Duration::from_secs(60))
        );

        let unbounded = SessionData {
            expires: None,
            ..session
        };
        assert!(!unbounded.is_expired_at(now + Duration::days(365)));
        assert!(unbounded.time_to_live(now).is_none());
    }

    #[test]
    fn test_session_wire_format() {
        let session = SessionData {
            challenge: Base64UrlBytes::from(vec![1, 2, 3]),
            user_id: Some(Base64UrlBytes::from(b"user".to_vec())),
            relying_party_id: "example.com".to_string(),
            ceremony: CeremonyType::Create,
            allowed_credential_ids: vec![Base64UrlBytes::from(vec![9])],
            user_verification: UserVerificationRequirement::Required,
            expires: None,
            extensions: None,
        };
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["challenge"], "AQID");
        assert_eq!(json["userId"], "dXNlcg");
        assert_eq!(json["ceremony"], "webauthn.create");
        assert_eq!(json["allowedCredentialIds"][0], "CQ");

        let back: SessionData = serde_json::from_value(json).unwrap();
        assert_eq!(back, session);
    }
}
