//! Fluent builders for creating customizable test objects
//!
//! Also holds helpers that tamper with client responses so failure paths can
//! be exercised with otherwise valid signatures.

use crate::protocol::base64url::{self, Base64UrlBytes};
use crate::protocol::options::UserVerificationRequirement;
use crate::settings::{RelyingPartySettings, TopOriginVerificationMode};
use crate::webauthn::Credential;

use super::constants::{
    TEST_DISPLAY_NAME, TEST_ORIGIN, TEST_RP_ID, TEST_RP_NAME, TEST_USER_ID, TEST_USER_NAME,
};
use super::fixtures::TestUser;

/// Builder for relying party settings
pub struct TestSettingsBuilder {
    settings: RelyingPartySettings,
}

impl TestSettingsBuilder {
    /// Settings for `example.com` with a single `https://example.com` origin
    #[must_use]
    pub fn new() -> Self {
        Self {
            settings: RelyingPartySettings {
                rp_id: TEST_RP_ID.to_string(),
                rp_display_name: TEST_RP_NAME.to_string(),
                rp_origins: vec![TEST_ORIGIN.to_string()],
                ..RelyingPartySettings::default()
            },
        }
    }

    #[must_use]
    pub fn with_rp_id(mut self, rp_id: &str) -> Self {
        self.settings.rp_id = rp_id.to_string();
        self
    }

    /// Add an accepted origin
    #[must_use]
    pub fn with_origin(mut self, origin: &str) -> Self {
        self.settings.rp_origins.push(origin.to_string());
        self
    }

    /// Set the top origin mode and its allow list
    #[must_use]
    pub fn with_top_origins(mut self, mode: TopOriginVerificationMode, origins: &[&str]) -> Self {
        self.settings.top_origin_verification_mode = mode;
        self.settings.rp_top_origins = origins.iter().map(ToString::to_string).collect();
        self
    }

    #[must_use]
    pub fn with_user_verification(
        mut self,
        user_verification: UserVerificationRequirement,
    ) -> Self {
        self.settings.authenticator_selection.user_verification = user_verification;
        self
    }

    /// Set the login and registration timeouts (milliseconds)
    #[must_use]
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.settings.timeouts.registration.timeout_ms = timeout_ms;
        self.settings.timeouts.login.timeout_ms = timeout_ms;
        self
    }

    /// Stop rejecting responses after the session expiry
    #[must_use]
    pub fn without_timeout_enforcement(mut self) -> Self {
        self.settings.timeouts.registration.enforce = false;
        self.settings.timeouts.login.enforce = false;
        self
    }

    #[must_use]
    pub fn build(self) -> RelyingPartySettings {
        self.settings
    }
}

impl Default for TestSettingsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for test user accounts
pub struct TestUserBuilder {
    user: TestUser,
}

impl TestUserBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            user: TestUser {
                id: TEST_USER_ID.to_vec(),
                name: TEST_USER_NAME.to_string(),
                display_name: TEST_DISPLAY_NAME.to_string(),
                credentials: Vec::new(),
            },
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: &[u8]) -> Self {
        self.user.id = id.to_vec();
        self
    }

    #[must_use]
    pub fn with_name(mut self, name: &str) -> Self {
        self.user.name = name.to_string();
        self
    }

    #[must_use]
    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.user.credentials.push(credential);
        self
    }

    #[must_use]
    pub fn build(self) -> TestUser {
        self.user
    }
}

impl Default for TestUserBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn edit_client_data(
    client_data_json: &Base64UrlBytes,
    edit: impl FnOnce(&mut serde_json::Map<String, serde_json::Value>),
) -> Base64UrlBytes {
    let mut value: serde_json::Value =
        serde_json::from_slice(client_data_json).expect("client data is JSON");
    if let Some(object) = value.as_object_mut() {
        edit(object);
    }
    Base64UrlBytes::from(serde_json::to_vec(&value).expect("client data serializes"))
}

/// Flip the first byte of the challenge in `clientDataJSON`
///
/// # Panics
///
/// Panics if the client data is not JSON with a base64url challenge.
#[must_use]
pub fn flip_challenge_byte(client_data_json: &Base64UrlBytes) -> Base64UrlBytes {
    edit_client_data(client_data_json, |object| {
        let challenge = object
            .get("challenge")
            .and_then(serde_json::Value::as_str)
            .and_then(|c| base64url::decode(c).ok())
            .expect("client data carries a challenge");
        let mut challenge = challenge;
        if let Some(first) = challenge.first_mut() {
            *first ^= 0x01;
        }
        object.insert(
            "challenge".to_string(),
            serde_json::Value::String(base64url::encode(&challenge)),
        );
    })
}

/// Replace a member of `clientDataJSON`
///
/// # Panics
///
/// Panics if the client data is not JSON.
#[must_use]
pub fn replace_client_data_member(
    client_data_json: &Base64UrlBytes,
    member: &str,
    value: serde_json::Value,
) -> Base64UrlBytes {
    edit_client_data(client_data_json, |object| {
        object.insert(member.to_string(), value);
    })
}

/// Flip the last byte of a signature or other binary member
#[must_use]
pub fn flip_last_byte(bytes: &Base64UrlBytes) -> Base64UrlBytes {
    let mut bytes = bytes.as_slice().to_vec();
    if let Some(last) = bytes.last_mut() {
        *last ^= 0xff;
    }
    Base64UrlBytes::from(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flip_challenge_byte() {
        let original = Base64UrlBytes::from(
            br#"{"type":"webauthn.get","challenge":"AAEC","origin":"https://example.com"}"#
                .to_vec(),
        );
        let flipped = flip_challenge_byte(&original);
        let value: serde_json::Value = serde_json::from_slice(&flipped).unwrap();
        assert_eq!(value["challenge"], "AQEC");
        assert_eq!(value["origin"], "https://example.com");
    }

    #[test]
    fn test_settings_builder() {
        let settings = TestSettingsBuilder::new()
            .with_origin("https://login.example.com")
            .without_timeout_enforcement()
            .build();
        assert_eq!(settings.rp_origins.len(), 2);
        assert!(!settings.timeouts.login.enforce);
        settings.validate().unwrap();
    }
}
