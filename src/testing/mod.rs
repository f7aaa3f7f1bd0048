//! Testing utilities for the relying party engine
//!
//! Available to unit tests and, with the `testing` feature, to integration
//! tests and downstream crates.
//!
//! ## Organization
//!
//! - [`authenticator`] - Software authenticator answering `create()` and `get()`
//! - [`fixtures`] - Pre-built settings, users and credentials
//! - [`builders`] - Fluent builders and response tampering helpers
//! - [`assertions`] - Assertion helpers for engine results
//!
//! ## Usage
//!
//! ```rust,ignore
//! use webauthn_rp::testing::{SoftAuthenticator, TestFixtures};
//! use webauthn_rp::webauthn::RegistrationOptions;
//!
//! let webauthn = TestFixtures::webauthn();
//! let user = TestFixtures::user();
//! let (creation, session) = webauthn
//!     .begin_registration(&user, RegistrationOptions::default())
//!     .unwrap();
//!
//! let body = SoftAuthenticator::es256().make_credential_body(&creation);
//! let credential = webauthn.finish_registration(&user, &session, &body).unwrap();
//! assert_eq!(credential.authenticator.sign_count, 0);
//! ```

pub mod assertions;
pub mod authenticator;
pub mod builders;
pub mod fixtures;

pub use assertions::*;
pub use authenticator::{AttestationMode, SoftAuthenticator};
pub use builders::{TestSettingsBuilder, TestUserBuilder};
pub use fixtures::{TestFixtures, TestUser};

/// Common test constants
pub mod constants {
    /// Relying party ID used by the fixtures
    pub const TEST_RP_ID: &str = "example.com";

    /// Relying party display name
    pub const TEST_RP_NAME: &str = "Example Corp";

    /// Origin the software authenticator reports by default
    pub const TEST_ORIGIN: &str = "https://example.com";

    /// Default user handle
    pub const TEST_USER_ID: &[u8] = b"test-user-handle-0001";

    /// Default account name
    pub const TEST_USER_NAME: &str = "test@example.com";

    /// Default display name
    pub const TEST_DISPLAY_NAME: &str = "Test User";

    /// AAGUID reported for `none` and self attestation
    pub const SOFT_AAGUID: [u8; 16] = [
        0x5f, 0x0e, 0x1c, 0x2a, 0x33, 0x44, 0x4b, 0x55, 0x86, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc,
        0xdd,
    ];

    /// AAGUID embedded in the bundled attestation certificate
    /// (6d44ba9b-f6ec-2e49-b930-0c8fe920cb73)
    pub const ATTESTATION_AAGUID: [u8; 16] = [
        0x6d, 0x44, 0xba, 0x9b, 0xf6, 0xec, 0x2e, 0x49, 0xb9, 0x30, 0x0c, 0x8f, 0xe9, 0x20, 0xcb,
        0x73,
    ];
}
