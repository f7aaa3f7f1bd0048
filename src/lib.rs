#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! `WebAuthn` / FIDO2 relying party engine
//!
//! Issues registration and login challenges, then verifies the attestation
//! and assertion responses returned by clients. Storage stays with the
//! caller: the engine hands back session data and credentials and takes
//! them again on the next call.

/// Version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod errors;
pub mod protocol;
pub mod settings;
pub mod store;
pub mod webauthn;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// Re-export commonly used items
pub use errors::{ErrorKind, WebAuthnError};
pub use settings::RelyingPartySettings;
pub use store::{CredentialStore, SessionStore};
pub use webauthn::{
    AttestationPolicy, Credential, LoginOptions, LoginOutcome, RegistrationOptions, SessionData,
    User, WebAuthn,
};
