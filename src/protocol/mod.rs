//! `WebAuthn` protocol building blocks
//!
//! Wire formats and the stateless verification steps the ceremonies are
//! composed from. Nothing in here holds state between calls.

pub mod attestation;
pub mod authenticator_data;
pub mod base64url;
pub mod challenge;
pub mod client_data;
pub mod cose;
pub mod options;
pub mod responses;
pub mod signature;

pub use attestation::{
    AcceptAll, AttestationFormat, AttestationObject, AttestationType, TrustAnchorProvider,
};
pub use authenticator_data::{AttestedCredentialData, AuthenticatorData, AuthenticatorFlags};
pub use base64url::Base64UrlBytes;
pub use challenge::{create_challenge, generate_session_token, CHALLENGE_LENGTH};
pub use client_data::{CeremonyType, CollectedClientData};
pub use cose::{COSEAlgorithm, PublicKey, ResolvedKey};
pub use options::*;
pub use responses::{
    CredentialAssertionResponse, CredentialCreationResponse, ParsedCredentialAssertionData,
    ParsedCredentialCreationData,
};
