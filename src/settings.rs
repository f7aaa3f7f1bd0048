//! Relying party settings
//!
//! Settings are layered the same way for every deployment:
//! 1. Defaults
//! 2. `Settings.toml` in the current directory
//! 3. `Settings.toml` in `WEBAUTHN_SETTINGS_DIR` (if set)
//! 4. Environment variables
//!
//! The `[webauthn]` table of the TOML file maps onto [`RelyingPartySettings`].
//! Once validated and handed to the engine the settings are never mutated.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::errors::{ErrorKind, Result, WebAuthnError};
use crate::protocol::cose::COSEAlgorithm;
use crate::protocol::options::{
    AttestationConveyancePreference, AuthenticatorSelectionCriteria, UserVerificationRequirement,
};

const SETTINGS_FILE: &str = "Settings.toml";

/// Default ceremony timeout (5 minutes)
pub const DEFAULT_TIMEOUT_MS: u64 = 300_000;
/// Default ceremony timeout when user verification is discouraged (2 minutes)
pub const DEFAULT_TIMEOUT_UVD_MS: u64 = 120_000;

/// How the `topOrigin` member of client data is checked
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TopOriginVerificationMode {
    /// Top origin is ignored
    #[default]
    Disabled,
    /// Any well formed top origin is accepted
    AcceptAny,
    /// Top origin must be listed in `rp_top_origins`
    Explicit,
}

/// Timeout behaviour for one ceremony kind
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct TimeoutSettings {
    /// Reject responses received after the session expiry
    pub enforce: bool,
    pub timeout_ms: u64,
    /// Used instead of `timeout_ms` when user verification is discouraged
    pub timeout_uvd_ms: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            enforce: true,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            timeout_uvd_ms: DEFAULT_TIMEOUT_UVD_MS,
        }
    }
}

impl TimeoutSettings {
    /// Ceremony timeout for the given user verification requirement
    ///
    /// Zero values fall back to the defaults.
    #[must_use]
    pub fn for_verification(&self, user_verification: UserVerificationRequirement) -> Duration {
        let ms = match user_verification {
            UserVerificationRequirement::Discouraged if self.timeout_uvd_ms > 0 => {
                self.timeout_uvd_ms
            }
            UserVerificationRequirement::Discouraged => DEFAULT_TIMEOUT_UVD_MS,
            _ if self.timeout_ms > 0 => self.timeout_ms,
            _ => DEFAULT_TIMEOUT_MS,
        };
        Duration::from_millis(ms)
    }
}

/// Registration and login timeouts
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(default)]
pub struct TimeoutsSettings {
    pub registration: TimeoutSettings,
    pub login: TimeoutSettings,
}

/// Relying party configuration
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct RelyingPartySettings {
    /// Relying party ID, a registrable domain suffix (e.g., "example.com")
    pub rp_id: String,
    /// Name shown to the user during registration
    pub rp_display_name: String,
    /// Accepted origins (e.g., "<https://login.example.com>")
    pub rp_origins: Vec<String>,
    /// Accepted top level origins for cross origin iframes
    pub rp_top_origins: Vec<String>,
    pub top_origin_verification_mode: TopOriginVerificationMode,
    pub attestation_preference: AttestationConveyancePreference,
    pub authenticator_selection: AuthenticatorSelectionCriteria,
    /// Algorithms offered in `pubKeyCredParams`, most preferred first
    pub preferred_algorithms: Vec<COSEAlgorithm>,
    pub timeouts: TimeoutsSettings,
}

impl Default for RelyingPartySettings {
    fn default() -> Self {
        Self {
            rp_id: String::new(),
            rp_display_name: String::new(),
            rp_origins: Vec::new(),
            rp_top_origins: Vec::new(),
            top_origin_verification_mode: TopOriginVerificationMode::Disabled,
            attestation_preference: AttestationConveyancePreference::None,
            authenticator_selection: AuthenticatorSelectionCriteria {
                resident_key: Some(crate::protocol::options::ResidentKeyRequirement::Preferred),
                ..AuthenticatorSelectionCriteria::default()
            },
            preferred_algorithms: vec![COSEAlgorithm::ES256, COSEAlgorithm::RS256],
            timeouts: TimeoutsSettings::default(),
        }
    }
}

/// Top level layout of `Settings.toml`
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
struct SettingsFile {
    #[serde(default)]
    webauthn: RelyingPartySettings,
}

fn configuration_error(details: String) -> WebAuthnError {
    WebAuthnError::new(ErrorKind::Configuration)
        .with_details(format!("error occurred validating the configuration: {details}"))
}

/// Parse a relying party ID as a URI
///
/// A bare host such as `example.com` is read as `https://example.com`.
///
/// # Errors
/// Returns a `Configuration` error if the value is empty, does not parse,
/// or has no host
pub fn parse_rp_id(rp_id: &str) -> Result<Url> {
    if rp_id.is_empty() {
        return Err(configuration_error(
            "the field 'rp_id' must be configured".to_string(),
        ));
    }

    let candidate = if rp_id.contains("://") {
        rp_id.to_string()
    } else {
        format!("https://{rp_id}")
    };

    let url = Url::parse(&candidate).map_err(|e| {
        configuration_error("the field 'rp_id' is not a valid URI".to_string()).with_source(e)
    })?;

    if url.host_str().is_none_or(str::is_empty) {
        return Err(configuration_error(
            "the field 'rp_id' is not a valid URI".to_string(),
        ));
    }
    Ok(url)
}

impl RelyingPartySettings {
    /// Check the configuration invariants
    ///
    /// # Errors
    /// Returns a `Configuration` error naming the offending field when:
    /// - `rp_id` is set but not a URI; an unset RP ID must then be given in
    ///   the options of every ceremony
    /// - `rp_origins` is empty or contains a value that is not a URI
    /// - `top_origin_verification_mode` is `explicit` and `rp_top_origins` is empty
    pub fn validate(&self) -> Result<()> {
        if !self.rp_id.is_empty() {
            parse_rp_id(&self.rp_id)?;
        }

        if self.rp_origins.is_empty() {
            return Err(configuration_error(
                "must provide at least one value to the 'rp_origins' field".to_string(),
            ));
        }

        for origin in &self.rp_origins {
            Url::parse(origin).map_err(|e| {
                configuration_error(format!(
                    "the field 'rp_origins' contains an invalid URI '{origin}'"
                ))
                .with_source(e)
            })?;
        }

        if self.top_origin_verification_mode == TopOriginVerificationMode::Explicit
            && self.rp_top_origins.is_empty()
        {
            return Err(configuration_error(
                "must provide at least one value to the 'rp_top_origins' field when \
                 'top_origin_verification_mode' is set to 'explicit'"
                    .to_string(),
            ));
        }

        for origin in &self.rp_top_origins {
            Url::parse(origin).map_err(|e| {
                configuration_error(format!(
                    "the field 'rp_top_origins' contains an invalid URI '{origin}'"
                ))
                .with_source(e)
            })?;
        }

        Ok(())
    }

    /// Load settings from configuration files and environment variables
    ///
    /// Also initializes `env_logger`; an already installed logger is kept.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A settings file exists but cannot be read
    /// - TOML parsing fails
    pub fn load() -> anyhow::Result<Self> {
        Self::initialize_logging();

        let mut settings = Self::load_base_settings()?;
        Self::apply_env_overrides(&mut settings);

        Ok(settings)
    }

    fn initialize_logging() {
        if env_logger::try_init().is_err() {
            log::debug!("Logger already initialized, keeping existing logger");
        }
    }

    /// Read the `[webauthn]` table from a TOML settings file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        let file: SettingsFile = basic_toml::from_str(&content)
            .with_context(|| format!("Failed to parse settings file {}", path.display()))?;
        Ok(file.webauthn)
    }

    /// Base settings from TOML file(s) or defaults
    ///
    /// Priority (highest to lowest):
    /// 1. Settings.toml in `WEBAUTHN_SETTINGS_DIR`
    /// 2. Settings.toml in the current directory
    /// 3. Default settings
    fn load_base_settings() -> anyhow::Result<Self> {
        let mut settings = Self::default();

        let default_path = PathBuf::from(SETTINGS_FILE);
        if default_path.exists() {
            settings = Self::from_file(&default_path)?;
            log::info!("Loaded relying party settings from {}", default_path.display());
        }

        if let Ok(settings_dir) = std::env::var("WEBAUTHN_SETTINGS_DIR") {
            let override_path = Path::new(&settings_dir).join(SETTINGS_FILE);
            if override_path.exists() {
                settings = Self::from_file(&override_path)?;
                log::info!("Overriding settings from {}", override_path.display());
            } else {
                log::info!(
                    "WEBAUTHN_SETTINGS_DIR set but no Settings.toml found at: {}",
                    override_path.display()
                );
            }
        }

        Ok(settings)
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(settings: &mut Self) {
        if let Ok(rp_id) = std::env::var("WEBAUTHN_RP_ID") {
            settings.rp_id = rp_id;
        }
        if let Ok(name) = std::env::var("WEBAUTHN_RP_DISPLAY_NAME") {
            settings.rp_display_name = name;
        }
        if let Ok(origins) = std::env::var("WEBAUTHN_RP_ORIGINS") {
            settings.rp_origins = Self::split_list(&origins);
        }
        if let Ok(origins) = std::env::var("WEBAUTHN_RP_TOP_ORIGINS") {
            settings.rp_top_origins = Self::split_list(&origins);
        }
        Self::apply_numeric_env_override(
            "WEBAUTHN_REGISTRATION_TIMEOUT_MS",
            &mut settings.timeouts.registration.timeout_ms,
        );
        Self::apply_numeric_env_override(
            "WEBAUTHN_LOGIN_TIMEOUT_MS",
            &mut settings.timeouts.login.timeout_ms,
        );
    }

    fn apply_numeric_env_override(env_var: &str, target: &mut u64) {
        if let Ok(value_str) = std::env::var(env_var) {
            if let Ok(value) = value_str.parse::<u64>() {
                *target = value;
            } else {
                log::warn!("Ignoring non-numeric value for {env_var}");
            }
        }
    }

    fn split_list(value: &str) -> Vec<String> {
        value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
            .collect()
    }
}
