//! Client responses to `create()` and `get()`
//!
//! The JSON bodies posted back by the browser, and their parsed forms with
//! the binary members decoded.

use serde::{Deserialize, Serialize};

use super::attestation::AttestationObject;
use super::authenticator_data::AuthenticatorData;
use super::base64url::{self, Base64UrlBytes};
use super::client_data::CollectedClientData;
use super::options::{AuthenticatorAttachment, AuthenticatorTransport, CredentialType};
use crate::errors::{ErrorKind, Result, WebAuthnError};

/// `AuthenticatorAttestationResponse`
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorAttestationResponse {
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: Base64UrlBytes,
    pub attestation_object: Base64UrlBytes,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transports: Vec<AuthenticatorTransport>,
}

/// `AuthenticatorAssertionResponse`
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorAssertionResponse {
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: Base64UrlBytes,
    pub authenticator_data: Base64UrlBytes,
    pub signature: Base64UrlBytes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_handle: Option<Base64UrlBytes>,
}

/// `PublicKeyCredential` wrapper common to both ceremonies
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyCredential<R> {
    pub id: String,
    pub raw_id: Base64UrlBytes,
    #[serde(rename = "type")]
    pub r#type: CredentialType,
    pub response: R,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticator_attachment: Option<AuthenticatorAttachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_extension_results: Option<serde_json::Value>,
}

/// Registration response body
pub type CredentialCreationResponse = PublicKeyCredential<AuthenticatorAttestationResponse>;
/// Login response body
pub type CredentialAssertionResponse = PublicKeyCredential<AuthenticatorAssertionResponse>;

/// Registration response with the client data and attestation object decoded
#[derive(Clone, Debug)]
pub struct ParsedCredentialCreationData {
    pub id: String,
    pub raw_id: Vec<u8>,
    /// Raw `clientDataJSON` bytes, hashed during validation
    pub raw_client_data: Vec<u8>,
    pub client_data: CollectedClientData,
    pub attestation_object: AttestationObject,
    pub transports: Vec<AuthenticatorTransport>,
    pub authenticator_attachment: Option<AuthenticatorAttachment>,
}

/// Login response with its members decoded
#[derive(Clone, Debug)]
pub struct ParsedCredentialAssertionData {
    pub id: String,
    pub raw_id: Vec<u8>,
    pub raw_client_data: Vec<u8>,
    pub client_data: CollectedClientData,
    pub raw_auth_data: Vec<u8>,
    pub auth_data: AuthenticatorData,
    pub signature: Vec<u8>,
    pub user_handle: Option<Vec<u8>>,
}

fn read_body<T: serde::de::DeserializeOwned>(body: &[u8], ceremony: &str) -> Result<T> {
    if body.is_empty() {
        return Err(WebAuthnError::new(ErrorKind::BadRequest)
            .with_details("no response given")
            .with_info(format!("empty {ceremony} response body")));
    }
    serde_json::from_slice(body).map_err(|e| {
        WebAuthnError::new(ErrorKind::BadRequest)
            .with_details(format!("parse error for {ceremony}"))
            .with_source(e)
    })
}

fn check_ids(id: &str, raw_id: &[u8]) -> Result<()> {
    if id.is_empty() {
        return Err(WebAuthnError::new(ErrorKind::BadRequest)
            .with_details("missing credential id"));
    }
    if base64url::decode(id).ok().as_deref() != Some(raw_id) {
        return Err(WebAuthnError::new(ErrorKind::BadRequest)
            .with_details("id and raw id do not match"));
    }
    Ok(())
}

impl CredentialCreationResponse {
    /// Decode the nested binary structures of a registration response
    ///
    /// # Errors
    /// - `BadRequest` when `id` and `rawId` disagree
    /// - `ParseError` for malformed client data or attestation object
    pub fn parse(self) -> Result<ParsedCredentialCreationData> {
        check_ids(&self.id, &self.raw_id)?;

        let raw_client_data = self.response.client_data_json.into_inner();
        let client_data = CollectedClientData::parse(&raw_client_data)?;
        let attestation_object = AttestationObject::parse(&self.response.attestation_object)?;

        Ok(ParsedCredentialCreationData {
            id: self.id,
            raw_id: self.raw_id.into_inner(),
            raw_client_data,
            client_data,
            attestation_object,
            transports: self.response.transports,
            authenticator_attachment: self.authenticator_attachment,
        })
    }
}

impl CredentialAssertionResponse {
    /// Decode the nested binary structures of a login response
    ///
    /// # Errors
    /// - `BadRequest` when `id` and `rawId` disagree
    /// - `ParseError` for malformed client data or authenticator data
    pub fn parse(self) -> Result<ParsedCredentialAssertionData> {
        check_ids(&self.id, &self.raw_id)?;

        let raw_client_data = self.response.client_data_json.into_inner();
        let client_data = CollectedClientData::parse(&raw_client_data)?;
        let raw_auth_data = self.response.authenticator_data.into_inner();
        let auth_data = AuthenticatorData::parse(&raw_auth_data)?;

        Ok(ParsedCredentialAssertionData {
            id: self.id,
            raw_id: self.raw_id.into_inner(),
            raw_client_data,
            client_data,
            raw_auth_data,
            auth_data,
            signature: self.response.signature.into_inner(),
            user_handle: self
                .response
                .user_handle
                .map(Base64UrlBytes::into_inner)
                .filter(|handle| !handle.is_empty()),
        })
    }
}

/// Parse a registration response body
///
/// # Errors
/// `BadRequest` for an empty or malformed body, otherwise see
/// [`CredentialCreationResponse::parse`]
pub fn parse_credential_creation_response(body: &[u8]) -> Result<ParsedCredentialCreationData> {
    read_body::<CredentialCreationResponse>(body, "registration")?.parse()
}

/// Parse a login response body
///
/// # Errors
/// `BadRequest` for an empty or malformed body, otherwise see
/// [`CredentialAssertionResponse::parse`]
pub fn parse_credential_request_response(body: &[u8]) -> Result<ParsedCredentialAssertionData> {
    read_body::<CredentialAssertionResponse>(body, "login")?.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_body() {
        let err = parse_credential_creation_response(b"").unwrap_err();
        assert!(err.is(ErrorKind::BadRequest));
        let err = parse_credential_request_response(b"").unwrap_err();
        assert!(err.is(ErrorKind::BadRequest));
    }

    #[test]
    fn test_malformed_body() {
        let err = parse_credential_creation_response(b"{\"id\":").unwrap_err();
        assert!(err.is(ErrorKind::BadRequest));
    }

    #[test]
    fn test_id_mismatch() {
        let body = serde_json::json!({
            "id": "AQID",
            "rawId": "BAUG",
            "type": "public-key",
            "response": {
                "clientDataJSON": "e30",
                "authenticatorData": "",
                "signature": ""
            }
        });
        let err = parse_credential_request_response(body.to_string().as_bytes()).unwrap_err();
        assert!(err.is(ErrorKind::BadRequest));
    }

    #[test]
    fn test_wrong_credential_type() {
        let body = serde_json::json!({
            "id": "AQID",
            "rawId": "AQID",
            "type": "password",
            "response": {
                "clientDataJSON": "e30",
                "authenticatorData": "",
                "signature": ""
            }
        });
        let err = parse_credential_request_response(body.to_string().as_bytes()).unwrap_err();
        assert!(err.is(ErrorKind::BadRequest));
    }

    #[test]
    fn test_bad_client_data_is_parse_error() {
        // "e30" is "{}", which lacks the required members
        let body = serde_json::json!({
            "id": "AQID",
            "rawId": "AQID",
            "type": "public-key",
            "response": {
                "clientDataJSON": "e30",
                "authenticatorData": "",
                "signature": ""
            }
        });
        let err = parse_credential_request_response(body.to_string().as_bytes()).unwrap_err();
        assert!(err.is(ErrorKind::ParseError));
    }
}
