//! `WebAuthn` options sent to the client
//!
//! These are the JSON shapes handed to `navigator.credentials.create()` and
//! `navigator.credentials.get()`, plus the enumerations shared with the
//! relying party settings.

use serde::{Deserialize, Serialize};

use super::base64url::Base64UrlBytes;
use super::cose::COSEAlgorithm;

/// Only credential type defined by `WebAuthn`
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CredentialType {
    #[default]
    #[serde(rename = "public-key")]
    PublicKey,
}

/// User verification requirement for a ceremony
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserVerificationRequirement {
    Required,
    #[default]
    Preferred,
    Discouraged,
}

/// Resident key (discoverable credential) requirement
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResidentKeyRequirement {
    Discouraged,
    #[default]
    Preferred,
    Required,
}

/// Authenticator attachment modality
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum AuthenticatorAttachment {
    Platform,
    CrossPlatform,
}

/// How much attestation information the relying party asks for
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AttestationConveyancePreference {
    #[default]
    None,
    Indirect,
    Direct,
    Enterprise,
}

/// Transport hint reported by the client for a credential
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum AuthenticatorTransport {
    Usb,
    Nfc,
    Ble,
    SmartCard,
    Hybrid,
    Internal,
    #[serde(other)]
    Unknown,
}

/// Relying party information
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RelyingPartyEntity {
    pub id: String,   // Domain name (e.g., "example.com")
    pub name: String, // Display name
}

/// User account information
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct UserEntity {
    pub id: Base64UrlBytes, // Opaque user handle
    pub name: String,       // Username (e.g., email)
    #[serde(rename = "displayName")]
    pub display_name: String,
}

/// Public key credential parameters
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct PublicKeyCredentialParameters {
    #[serde(rename = "type")]
    pub r#type: CredentialType,
    pub alg: COSEAlgorithm,
}

impl From<COSEAlgorithm> for PublicKeyCredentialParameters {
    fn from(alg: COSEAlgorithm) -> Self {
        Self {
            r#type: CredentialType::PublicKey,
            alg,
        }
    }
}

/// Public key credential descriptor
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PublicKeyCredentialDescriptor {
    #[serde(rename = "type")]
    pub r#type: CredentialType,
    pub id: Base64UrlBytes,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transports: Vec<AuthenticatorTransport>,
}

/// Authenticator selection criteria
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorSelectionCriteria {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticator_attachment: Option<AuthenticatorAttachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resident_key: Option<ResidentKeyRequirement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_resident_key: Option<bool>,
    #[serde(default)]
    pub user_verification: UserVerificationRequirement,
}

/// Options for `navigator.credentials.create()`
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyCredentialCreationOptions {
    pub rp: RelyingPartyEntity,
    pub user: UserEntity,
    pub challenge: Base64UrlBytes,
    pub pub_key_cred_params: Vec<PublicKeyCredentialParameters>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>, // Milliseconds
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_credentials: Vec<PublicKeyCredentialDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticator_selection: Option<AuthenticatorSelectionCriteria>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attestation: Option<AttestationConveyancePreference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<serde_json::Value>,
}

/// Options for `navigator.credentials.get()`
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyCredentialRequestOptions {
    pub challenge: Base64UrlBytes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>, // Milliseconds
    pub rp_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allow_credentials: Vec<PublicKeyCredentialDescriptor>,
    #[serde(default)]
    pub user_verification: UserVerificationRequirement,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<serde_json::Value>,
}

/// Wrapper returned from `begin_registration`
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CredentialCreation {
    #[serde(rename = "publicKey")]
    pub public_key: PublicKeyCredentialCreationOptions,
}

/// Wrapper returned from `begin_login`
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CredentialAssertion {
    #[serde(rename = "publicKey")]
    pub public_key: PublicKeyCredentialRequestOptions,
}
