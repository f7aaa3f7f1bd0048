//! `WebAuthn` ceremony engine
//!
//! [`WebAuthn`] sequences the protocol building blocks into the four public
//! operations (`begin_registration`, `finish_registration`, `begin_login`,
//! `finish_login`). The engine holds only the validated relying party
//! settings; everything a ceremony needs between its two halves travels in
//! [`SessionData`], which the caller persists.

mod login;
mod registration;
mod types;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::errors::{ErrorKind, Result, WebAuthnError};
use crate::protocol::attestation::{AcceptAll, AttestationType, TrustAnchorProvider};
use crate::protocol::client_data::CeremonyType;
use crate::settings::{parse_rp_id, RelyingPartySettings};

pub use login::{LoginOptions, LoginOutcome};
pub use registration::RegistrationOptions;
pub use types::*;

/// Which attestation types a relying party accepts after verification
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AttestationPolicy {
    pub allow_none: bool,
    pub allow_self: bool,
}

impl Default for AttestationPolicy {
    fn default() -> Self {
        Self {
            allow_none: true,
            allow_self: true,
        }
    }
}

impl AttestationPolicy {
    /// Only certificate backed attestation is accepted
    #[must_use]
    pub const fn strict() -> Self {
        Self {
            allow_none: false,
            allow_self: false,
        }
    }

    /// # Errors
    /// Returns `InvalidAttestation` when the type is not allowed
    pub fn check(&self, attestation_type: AttestationType) -> Result<()> {
        let allowed = match attestation_type {
            AttestationType::None => self.allow_none,
            AttestationType::SelfAttestation => self.allow_self,
            AttestationType::Basic => true,
        };
        if allowed {
            Ok(())
        } else {
            Err(WebAuthnError::new(ErrorKind::InvalidAttestation)
                .with_info(format!("{attestation_type:?} attestation is not accepted")))
        }
    }
}

/// Relying party engine
#[derive(Clone)]
pub struct WebAuthn {
    settings: RelyingPartySettings,
    policy: AttestationPolicy,
    trust_anchors: Arc<dyn TrustAnchorProvider>,
}

impl Default for WebAuthn {
    /// An unconfigured engine; `finish_*` calls fail until built with [`WebAuthn::new`]
    fn default() -> Self {
        Self {
            settings: RelyingPartySettings::default(),
            policy: AttestationPolicy::default(),
            trust_anchors: Arc::new(AcceptAll),
        }
    }
}

impl fmt::Debug for WebAuthn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebAuthn")
            .field("settings", &self.settings)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl WebAuthn {
    /// Create an engine from validated settings
    ///
    /// # Errors
    /// Returns a `Configuration` error if the settings are invalid
    pub fn new(settings: RelyingPartySettings) -> Result<Self> {
        settings.validate()?;
        log::info!(
            "WebAuthn relying party '{}' configured with {} origin(s)",
            settings.rp_id,
            settings.rp_origins.len()
        );
        Ok(Self {
            settings,
            ..Self::default()
        })
    }

    #[must_use]
    pub fn with_attestation_policy(mut self, policy: AttestationPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_trust_anchors(mut self, trust_anchors: Arc<dyn TrustAnchorProvider>) -> Self {
        self.trust_anchors = trust_anchors;
        self
    }

    #[must_use]
    pub fn settings(&self) -> &RelyingPartySettings {
        &self.settings
    }

    /// The RP ID may be left unset and supplied per ceremony, the origins may not
    fn ensure_configured(&self) -> Result<()> {
        if self.settings.rp_origins.is_empty() {
            return Err(WebAuthnError::new(ErrorKind::BadRequest)
                .with_details("relying party is not configured"));
        }
        Ok(())
    }

    /// RP ID for a ceremony: the per-call override, else the configured one
    fn resolve_rp_id(&self, rp_id: Option<&str>) -> Result<String> {
        let rp_id = rp_id.unwrap_or(&self.settings.rp_id);
        parse_rp_id(rp_id)?;
        Ok(rp_id.to_string())
    }

    /// Deadline for a ceremony started now, when timeouts are enforced
    fn session_expiry(enforce: bool, timeout: Duration) -> Result<Option<DateTime<Utc>>> {
        if !enforce {
            return Ok(None);
        }
        chrono::Duration::from_std(timeout)
            .ok()
            .and_then(|t| Utc::now().checked_add_signed(t))
            .map(Some)
            .ok_or_else(|| {
                WebAuthnError::new(ErrorKind::Configuration)
                    .with_details(
                        "error occurred validating the configuration: \
                         the ceremony timeout is out of range",
                    )
                    .with_info(format!("timeout of {}s", timeout.as_secs()))
            })
    }

    /// Checks shared by every finish call before the response is looked at
    fn check_session(session: &SessionData, ceremony: CeremonyType) -> Result<()> {
        if session.ceremony != ceremony {
            return Err(WebAuthnError::new(ErrorKind::BadRequest)
                .with_details("session data does not belong to this ceremony")
                .with_info(format!(
                    "expected {}, session is {}",
                    ceremony.as_str(),
                    session.ceremony.as_str()
                )));
        }
        if session.is_expired_at(Utc::now()) {
            return Err(WebAuthnError::new(ErrorKind::BadRequest)
                .with_details("session has expired"));
        }
        Ok(())
    }
}
