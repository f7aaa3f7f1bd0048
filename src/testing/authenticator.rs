//! Software authenticator producing real `WebAuthn` responses
//!
//! [`SoftAuthenticator`] answers `create()` and `get()` options the way a
//! browser plus authenticator would, signing with fixed test keys so the
//! ceremonies can be exercised end to end without hardware.

use ciborium::value::Value;
use p256::ecdsa::signature::Signer;
use p256::pkcs8::DecodePrivateKey;
use rsa::signature::SignatureEncoding;
use rsa::traits::PublicKeyParts;
use sha2::{Digest, Sha256};

use crate::protocol::authenticator_data::{rp_id_hash, AuthenticatorFlags};
use crate::protocol::base64url::{self, Base64UrlBytes};
use crate::protocol::client_data::CeremonyType;
use crate::protocol::cose::COSEAlgorithm;
use crate::protocol::options::{
    AuthenticatorAttachment, AuthenticatorTransport, CredentialAssertion, CredentialCreation,
    CredentialType,
};
use crate::protocol::responses::{
    AuthenticatorAssertionResponse, AuthenticatorAttestationResponse, CredentialAssertionResponse,
    CredentialCreationResponse, PublicKeyCredential,
};

use super::constants::{ATTESTATION_AAGUID, SOFT_AAGUID, TEST_ORIGIN};

const ATTESTATION_CERT: &[u8] = include_bytes!("data/attestation_cert.der");
const ATTESTATION_CA: &[u8] = include_bytes!("data/attestation_ca.der");
const ATTESTATION_KEY_PEM: &str = include_str!("data/attestation_key.pem");
const RSA_KEY_PEM: &str = include_str!("data/rsa_key.pem");

/// Attestation statement the authenticator returns on registration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttestationMode {
    /// `none`
    None,
    /// `packed` signed by the credential key
    PackedSelf,
    /// `packed` signed by the attestation certificate, with a two certificate chain
    PackedFull,
    /// `fido-u2f` with a single attestation certificate (ES256 credentials only)
    FidoU2F,
}

enum CredentialKey {
    Es256(p256::ecdsa::SigningKey),
    Rs256(rsa::pkcs1v15::SigningKey<Sha256>, rsa::RsaPublicKey),
}

impl CredentialKey {
    const fn algorithm(&self) -> COSEAlgorithm {
        match self {
            Self::Es256(_) => COSEAlgorithm::ES256,
            Self::Rs256(..) => COSEAlgorithm::RS256,
        }
    }

    fn sign(&self, message: &[u8]) -> Vec<u8> {
        match self {
            Self::Es256(key) => {
                let signature: p256::ecdsa::Signature = key.sign(message);
                signature.to_der().as_bytes().to_vec()
            }
            Self::Rs256(key, _) => key.sign(message).to_vec(),
        }
    }

    fn uncompressed_point(&self) -> Option<Vec<u8>> {
        match self {
            Self::Es256(key) => Some(
                key.verifying_key()
                    .to_encoded_point(false)
                    .as_bytes()
                    .to_vec(),
            ),
            Self::Rs256(..) => None,
        }
    }

    fn cose_key(&self) -> Vec<u8> {
        let int = |v: i64| Value::Integer(v.into());
        let map = match self {
            Self::Es256(key) => {
                let point = key.verifying_key().to_encoded_point(false);
                let x = point.x().map(|x| x.to_vec()).unwrap_or_default();
                let y = point.y().map(|y| y.to_vec()).unwrap_or_default();
                Value::Map(vec![
                    (int(1), int(2)),
                    (int(3), int(-7)),
                    (int(-1), int(1)),
                    (int(-2), Value::Bytes(x)),
                    (int(-3), Value::Bytes(y)),
                ])
            }
            Self::Rs256(_, public_key) => Value::Map(vec![
                (int(1), int(3)),
                (int(3), int(-257)),
                (int(-1), Value::Bytes(public_key.n().to_bytes_be())),
                (int(-2), Value::Bytes(public_key.e().to_bytes_be())),
            ]),
        };
        encode_cbor(&map)
    }
}

fn encode_cbor(value: &Value) -> Vec<u8> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(value, &mut buf).expect("writing CBOR to a Vec cannot fail");
    buf
}

fn attestation_key() -> p256::ecdsa::SigningKey {
    let secret = p256::SecretKey::from_pkcs8_pem(ATTESTATION_KEY_PEM)
        .expect("bundled attestation key is valid PKCS#8");
    p256::ecdsa::SigningKey::from(secret)
}

fn sign_with_attestation_key(message: &[u8]) -> Vec<u8> {
    let signature: p256::ecdsa::Signature = attestation_key().sign(message);
    signature.to_der().as_bytes().to_vec()
}

/// Software authenticator with a single credential
///
/// # Panics
///
/// Constructors panic only if the bundled test keys fail to load.
pub struct SoftAuthenticator {
    key: CredentialKey,
    attestation: AttestationMode,
    origin: String,
    top_origin: Option<String>,
    credential_id: Vec<u8>,
    counter: u32,
    counter_increment: u32,
    flags: u8,
    user_handle: Option<Vec<u8>>,
}

impl SoftAuthenticator {
    fn with_key(key: CredentialKey) -> Self {
        Self {
            key,
            attestation: AttestationMode::None,
            origin: TEST_ORIGIN.to_string(),
            top_origin: None,
            credential_id: b"soft-credential-0001".to_vec(),
            counter: 0,
            counter_increment: 1,
            flags: AuthenticatorFlags::USER_PRESENT | AuthenticatorFlags::USER_VERIFIED,
            user_handle: None,
        }
    }

    /// Authenticator holding a P-256 credential
    #[must_use]
    pub fn es256() -> Self {
        let key = p256::ecdsa::SigningKey::from_slice(&[0x11; 32])
            .expect("fixed scalar is a valid P-256 key");
        Self::with_key(CredentialKey::Es256(key))
    }

    /// Authenticator holding an RSA 2048 credential
    #[must_use]
    pub fn rs256() -> Self {
        let private_key = rsa::RsaPrivateKey::from_pkcs8_pem(RSA_KEY_PEM)
            .expect("bundled RSA key is valid PKCS#8");
        let public_key = private_key.to_public_key();
        let key = rsa::pkcs1v15::SigningKey::<Sha256>::new(private_key);
        Self::with_key(CredentialKey::Rs256(key, public_key))
    }

    #[must_use]
    pub fn with_attestation(mut self, attestation: AttestationMode) -> Self {
        self.attestation = attestation;
        self
    }

    /// Origin reported in client data
    #[must_use]
    pub fn with_origin(mut self, origin: &str) -> Self {
        self.origin = origin.to_string();
        self
    }

    /// Report a cross origin call from `top_origin`
    #[must_use]
    pub fn with_top_origin(mut self, top_origin: &str) -> Self {
        self.top_origin = Some(top_origin.to_string());
        self
    }

    #[must_use]
    pub fn with_credential_id(mut self, credential_id: &[u8]) -> Self {
        self.credential_id = credential_id.to_vec();
        self
    }

    /// Set the signature counter reported at registration
    #[must_use]
    pub fn with_counter(mut self, counter: u32) -> Self {
        self.counter = counter;
        self
    }

    /// Amount added to the counter before each assertion (0 for counterless)
    #[must_use]
    pub fn with_counter_increment(mut self, increment: u32) -> Self {
        self.counter_increment = increment;
        self
    }

    /// Raw flag bits (UP, UV, BE, BS); `AT` and `ED` are managed internally
    #[must_use]
    pub fn with_flags(mut self, flags: u8) -> Self {
        self.flags = flags;
        self
    }

    /// User handle returned in assertions
    #[must_use]
    pub fn with_user_handle(mut self, user_handle: &[u8]) -> Self {
        self.user_handle = Some(user_handle.to_vec());
        self
    }

    /// Rewind or advance the stored counter
    pub fn set_counter(&mut self, counter: u32) {
        self.counter = counter;
    }

    #[must_use]
    pub fn credential_id(&self) -> &[u8] {
        &self.credential_id
    }

    #[must_use]
    pub fn algorithm(&self) -> COSEAlgorithm {
        self.key.algorithm()
    }

    /// Credential public key as COSE bytes
    #[must_use]
    pub fn cose_public_key(&self) -> Vec<u8> {
        self.key.cose_key()
    }

    fn client_data(&self, ceremony: CeremonyType, challenge: &[u8]) -> Vec<u8> {
        let mut client_data = serde_json::json!({
            "type": ceremony.as_str(),
            "challenge": base64url::encode(challenge),
            "origin": self.origin,
            "crossOrigin": self.top_origin.is_some(),
        });
        if let Some(top_origin) = &self.top_origin {
            client_data["topOrigin"] = serde_json::Value::String(top_origin.clone());
        }
        serde_json::to_vec(&client_data).expect("client data serializes")
    }

    fn auth_data_header(&self, rp_id: &str, extra_flags: u8) -> Vec<u8> {
        let mut raw = rp_id_hash(rp_id).to_vec();
        raw.push(self.flags | extra_flags);
        raw.extend_from_slice(&self.counter.to_be_bytes());
        raw
    }

    fn aaguid(&self) -> [u8; 16] {
        match self.attestation {
            AttestationMode::PackedFull => ATTESTATION_AAGUID,
            AttestationMode::FidoU2F => [0; 16],
            AttestationMode::None | AttestationMode::PackedSelf => SOFT_AAGUID,
        }
    }

    fn attestation_statement(
        &self,
        rp_id: &str,
        auth_data: &[u8],
        client_data_hash: &[u8],
    ) -> (&'static str, Value) {
        let text = |s: &str| Value::Text(s.to_string());
        let mut signed = auth_data.to_vec();
        signed.extend_from_slice(client_data_hash);

        match self.attestation {
            AttestationMode::None => ("none", Value::Map(Vec::new())),
            AttestationMode::PackedSelf => (
                "packed",
                Value::Map(vec![
                    (text("alg"), Value::Integer(self.key.algorithm().id().into())),
                    (text("sig"), Value::Bytes(self.key.sign(&signed))),
                ]),
            ),
            AttestationMode::PackedFull => (
                "packed",
                Value::Map(vec![
                    (text("alg"), Value::Integer(COSEAlgorithm::ES256.id().into())),
                    (text("sig"), Value::Bytes(sign_with_attestation_key(&signed))),
                    (
                        text("x5c"),
                        Value::Array(vec![
                            Value::Bytes(ATTESTATION_CERT.to_vec()),
                            Value::Bytes(ATTESTATION_CA.to_vec()),
                        ]),
                    ),
                ]),
            ),
            AttestationMode::FidoU2F => {
                let point = self
                    .key
                    .uncompressed_point()
                    .expect("fido-u2f requires an ES256 credential");
                let mut verification_data = vec![0x00];
                verification_data.extend_from_slice(&rp_id_hash(rp_id));
                verification_data.extend_from_slice(client_data_hash);
                verification_data.extend_from_slice(&self.credential_id);
                verification_data.extend_from_slice(&point);
                (
                    "fido-u2f",
                    Value::Map(vec![
                        (text("sig"), Value::Bytes(sign_with_attestation_key(&verification_data))),
                        (
                            text("x5c"),
                            Value::Array(vec![Value::Bytes(ATTESTATION_CERT.to_vec())]),
                        ),
                    ]),
                )
            }
        }
    }

    /// Answer `navigator.credentials.create()`
    ///
    /// # Panics
    ///
    /// Panics for `fido-u2f` attestation with an RS256 credential, or a
    /// credential ID longer than `u16::MAX`.
    #[must_use]
    pub fn make_credential(&self, creation: &CredentialCreation) -> CredentialCreationResponse {
        let options = &creation.public_key;
        let client_data_json = self.client_data(CeremonyType::Create, &options.challenge);
        let client_data_hash = Sha256::digest(&client_data_json);

        let mut auth_data =
            self.auth_data_header(&options.rp.id, AuthenticatorFlags::ATTESTED_CREDENTIAL_DATA);
        auth_data.extend_from_slice(&self.aaguid());
        let id_length = u16::try_from(self.credential_id.len()).expect("credential id fits in u16");
        auth_data.extend_from_slice(&id_length.to_be_bytes());
        auth_data.extend_from_slice(&self.credential_id);
        auth_data.extend_from_slice(&self.key.cose_key());

        let (format, statement) =
            self.attestation_statement(&options.rp.id, &auth_data, &client_data_hash);
        let attestation_object = encode_cbor(&Value::Map(vec![
            (Value::Text("fmt".to_string()), Value::Text(format.to_string())),
            (Value::Text("attStmt".to_string()), statement),
            (Value::Text("authData".to_string()), Value::Bytes(auth_data)),
        ]));

        PublicKeyCredential {
            id: base64url::encode(&self.credential_id),
            raw_id: Base64UrlBytes::from(self.credential_id.clone()),
            r#type: CredentialType::PublicKey,
            response: AuthenticatorAttestationResponse {
                client_data_json: Base64UrlBytes::from(client_data_json),
                attestation_object: Base64UrlBytes::from(attestation_object),
                transports: vec![AuthenticatorTransport::Usb],
            },
            authenticator_attachment: Some(AuthenticatorAttachment::CrossPlatform),
            client_extension_results: None,
        }
    }

    /// Answer `navigator.credentials.create()` with the JSON body a client would post
    #[must_use]
    pub fn make_credential_body(&self, creation: &CredentialCreation) -> Vec<u8> {
        to_body(&self.make_credential(creation))
    }

    /// Answer `navigator.credentials.get()`, advancing the counter first
    #[must_use]
    pub fn get_assertion(
        &mut self,
        assertion: &CredentialAssertion,
    ) -> CredentialAssertionResponse {
        self.counter = self.counter.wrapping_add(self.counter_increment);

        let options = &assertion.public_key;
        let client_data_json = self.client_data(CeremonyType::Get, &options.challenge);
        let client_data_hash = Sha256::digest(&client_data_json);

        let auth_data = self.auth_data_header(&options.rp_id, 0);
        let mut signed = auth_data.clone();
        signed.extend_from_slice(&client_data_hash);

        PublicKeyCredential {
            id: base64url::encode(&self.credential_id),
            raw_id: Base64UrlBytes::from(self.credential_id.clone()),
            r#type: CredentialType::PublicKey,
            response: AuthenticatorAssertionResponse {
                client_data_json: Base64UrlBytes::from(client_data_json),
                authenticator_data: Base64UrlBytes::from(auth_data),
                signature: Base64UrlBytes::from(self.key.sign(&signed)),
                user_handle: self.user_handle.clone().map(Base64UrlBytes::from),
            },
            authenticator_attachment: Some(AuthenticatorAttachment::CrossPlatform),
            client_extension_results: None,
        }
    }

    /// Answer `navigator.credentials.get()` with the JSON body a client would post
    #[must_use]
    pub fn get_assertion_body(&mut self, assertion: &CredentialAssertion) -> Vec<u8> {
        to_body(&self.get_assertion(assertion))
    }
}

/// Serialize a response the way a client posts it
///
/// # Panics
///
/// Panics if the response cannot be serialized.
#[must_use]
pub fn to_body<T: serde::Serialize>(response: &T) -> Vec<u8> {
    serde_json::to_vec(response).expect("response serializes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::attestation::AttestationObject;
    use crate::protocol::cose::resolve_public_key;
    use crate::testing::fixtures::TestFixtures;

    #[test]
    fn test_cose_keys_resolve() {
        let es256 = resolve_public_key(&SoftAuthenticator::es256().cose_public_key()).unwrap();
        assert_eq!(es256.algorithm, COSEAlgorithm::ES256);
        let rs256 = resolve_public_key(&SoftAuthenticator::rs256().cose_public_key()).unwrap();
        assert_eq!(rs256.algorithm, COSEAlgorithm::RS256);
    }

    #[test]
    fn test_attestation_object_parses() {
        let creation = TestFixtures::creation_options();
        let response = SoftAuthenticator::es256()
            .with_attestation(AttestationMode::PackedFull)
            .make_credential(&creation);

        let object = AttestationObject::parse(&response.response.attestation_object).unwrap();
        assert_eq!(object.format, "packed");
        let credential = object.auth_data.attested_credential_data.unwrap();
        assert_eq!(credential.aaguid, ATTESTATION_AAGUID);
        assert_eq!(credential.credential_id, b"soft-credential-0001".to_vec());
    }

    #[test]
    fn test_counter_advances_per_assertion() {
        let mut authenticator = SoftAuthenticator::es256().with_counter(10);
        let assertion = TestFixtures::assertion_options();

        let first = authenticator.get_assertion(&assertion);
        let second = authenticator.get_assertion(&assertion);
        assert_eq!(&first.response.authenticator_data[33..37], &11u32.to_be_bytes());
        assert_eq!(&second.response.authenticator_data[33..37], &12u32.to_be_bytes());
    }
}
