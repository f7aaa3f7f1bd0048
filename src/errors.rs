//! `WebAuthn` error types
//!
//! Every failure the engine reports carries an [`ErrorKind`] from a fixed
//! taxonomy, a human readable detail string, optional debug information and
//! an optional wrapped cause. Errors compare equal when their kinds match, so
//! callers can branch on the category without inspecting strings.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, WebAuthnError>;

type BoxedSource = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error categories reported by the relying party engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request data could not be read or the ceremony was not set up
    BadRequest,
    /// Stored challenge and received challenge do not match
    ChallengeMismatch,
    /// A structure in the authenticator response could not be parsed
    ParseError,
    /// Authenticator data failed validation
    AuthData,
    /// The authenticator response failed validation
    Verification,
    /// Attestation statement verification failed
    Attestation,
    /// Attestation data is invalid or rejected by policy
    InvalidAttestation,
    /// Metadata for the authenticator is invalid
    InvalidMetadata,
    /// The attestation format is unknown or malformed
    AttestationFormat,
    /// An attestation certificate is invalid
    AttestationCertificate,
    /// The assertion signature does not verify
    AssertionSignature,
    /// The public key type is not supported
    UnsupportedKey,
    /// The public key algorithm is not supported
    UnsupportedAlgorithm,
    /// The field is not yet defined by the `WebAuthn` specification
    SpecUnimplemented,
    /// The field is not yet supported by this crate
    NotImplemented,
    /// The relying party configuration is invalid
    Configuration,
    /// The origin or top origin is not accepted
    Origin,
    /// The system random source failed; the ceremony cannot proceed
    RandomSource,
}

impl ErrorKind {
    /// Short machine readable category used as the `type` field on the wire
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BadRequest => "invalid_request",
            Self::ChallengeMismatch => "challenge_mismatch",
            Self::ParseError => "parse_error",
            Self::AuthData => "auth_data",
            Self::Verification => "verification_error",
            Self::Attestation => "attestation_error",
            // The attestation format category shares its wire name with invalid attestation
            Self::InvalidAttestation | Self::AttestationFormat => "invalid_attestation",
            Self::InvalidMetadata => "invalid_metadata",
            Self::AttestationCertificate => "invalid_certificate",
            Self::AssertionSignature => "invalid_signature",
            Self::UnsupportedKey => "invalid_key_type",
            Self::UnsupportedAlgorithm => "unsupported_key_algorithm",
            Self::SpecUnimplemented => "spec_unimplemented",
            Self::NotImplemented => "not_implemented",
            Self::Configuration => "invalid_configuration",
            Self::Origin => "invalid_origin",
            Self::RandomSource => "random_source_unavailable",
        }
    }

    /// Default detail message for the category
    #[must_use]
    pub const fn default_details(self) -> &'static str {
        match self {
            Self::BadRequest => "error reading the request data",
            Self::ChallengeMismatch => "stored challenge and received challenge do not match",
            Self::ParseError => "error parsing the authenticator response",
            Self::AuthData => "error verifying the authenticator data",
            Self::Verification => "error validating the authenticator response",
            Self::Attestation => "error validating the attestation data provided",
            Self::InvalidAttestation => "invalid attestation data",
            Self::InvalidMetadata => "",
            Self::AttestationFormat => "invalid attestation format",
            Self::AttestationCertificate => "invalid attestation certificate",
            Self::AssertionSignature => {
                "assertion signature against auth data and client hash is not valid"
            }
            Self::UnsupportedKey => "unsupported public key type",
            Self::UnsupportedAlgorithm => "unsupported public key algorithm",
            Self::SpecUnimplemented => "this field is not yet supported by the WebAuthn spec",
            Self::NotImplemented => "this field is not yet supported by this library",
            Self::Configuration => "invalid relying party configuration",
            Self::Origin => "origin is not accepted by this relying party",
            Self::RandomSource => "error generating random data",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ErrorKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// `WebAuthn` protocol error
#[derive(thiserror::Error, Serialize)]
pub struct WebAuthnError {
    #[serde(rename = "type")]
    kind: ErrorKind,
    #[serde(rename = "error")]
    details: String,
    #[serde(rename = "debug", skip_serializing_if = "Option::is_none")]
    debug_info: Option<String>,
    #[serde(skip)]
    #[source]
    source: Option<BoxedSource>,
}

impl WebAuthnError {
    /// Create an error of the given kind with its default details
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            details: kind.default_details().to_string(),
            debug_info: None,
            source: None,
        }
    }

    /// Replace the human readable details
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = details.into();
        self
    }

    /// Attach internal debugging information
    #[must_use]
    pub fn with_info(mut self, info: impl Into<String>) -> Self {
        self.debug_info = Some(info.into());
        self
    }

    /// Attach the lower level error that caused this one
    #[must_use]
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Error category
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Human readable details
    #[must_use]
    pub fn details(&self) -> &str {
        &self.details
    }

    /// Internal debugging information, if any
    #[must_use]
    pub fn debug_info(&self) -> Option<&str> {
        self.debug_info.as_deref()
    }

    /// Check whether this error belongs to the given category
    #[must_use]
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }

    /// Protocol facing representation of the error
    #[must_use]
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            error_type: self.kind.as_str().to_string(),
            error: self.details.clone(),
            debug: self.debug_info.clone(),
        }
    }
}

impl From<ErrorKind> for WebAuthnError {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

impl PartialEq for WebAuthnError {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl fmt::Display for WebAuthnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{}: {source}", self.details),
            None => f.write_str(&self.details),
        }
    }
}

impl fmt::Debug for WebAuthnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebAuthnError")
            .field("kind", &self.kind)
            .field("details", &self.details)
            .field("debug_info", &self.debug_info)
            .field("source", &self.source.as_ref().map(ToString::to_string))
            .finish()
    }
}

/// Serialized error shape returned to clients
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ErrorBody {
    #[serde(rename = "type")]
    pub error_type: String,
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_compare_by_kind() {
        let a = WebAuthnError::new(ErrorKind::ChallengeMismatch);
        let b = WebAuthnError::new(ErrorKind::ChallengeMismatch).with_details("other text");
        let c = WebAuthnError::new(ErrorKind::ParseError);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(b.is(ErrorKind::ChallengeMismatch));
    }

    #[test]
    fn test_attestation_format_is_distinct_from_invalid_attestation() {
        let format = WebAuthnError::new(ErrorKind::AttestationFormat);
        let invalid = WebAuthnError::new(ErrorKind::InvalidAttestation);

        assert_ne!(format, invalid);
        assert_eq!(format.to_body().error_type, invalid.to_body().error_type);
    }

    #[test]
    fn test_display_includes_source() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "short read");
        let err = WebAuthnError::new(ErrorKind::ParseError)
            .with_details("Error parsing attestation object")
            .with_source(io);

        assert_eq!(err.to_string(), "Error parsing attestation object: short read");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_serialization_hides_source() {
        let io = std::io::Error::other("internal");
        let err = WebAuthnError::new(ErrorKind::AuthData)
            .with_info("rp id hash mismatch")
            .with_source(io);

        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["type"], "auth_data");
        assert_eq!(json["error"], "error verifying the authenticator data");
        assert_eq!(json["debug"], "rp id hash mismatch");
        assert_eq!(json.as_object().unwrap().len(), 3);
    }

    #[test]
    fn test_debug_omitted_when_absent() {
        let err = WebAuthnError::new(ErrorKind::BadRequest);
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(
            json,
            r#"{"type":"invalid_request","error":"error reading the request data"}"#
        );

        let body: ErrorBody = serde_json::from_str(&json).unwrap();
        assert_eq!(body, err.to_body());
    }
}
