//! Challenge generation
//!
//! Challenges and session tokens are drawn from the operating system CSPRNG
//! through `ring`. `SystemRandom` is stateless and safe to share between
//! concurrent ceremonies.

use once_cell::sync::Lazy;
use ring::rand::{SecureRandom, SystemRandom};

use super::base64url::{self, Base64UrlBytes};
use crate::errors::{ErrorKind, Result, WebAuthnError};

/// Number of random bytes in a challenge
pub const CHALLENGE_LENGTH: usize = 32;

/// Number of random bytes in a session token
const SESSION_TOKEN_LENGTH: usize = 24;

static RNG: Lazy<SystemRandom> = Lazy::new(SystemRandom::new);

fn fill_random(buf: &mut [u8]) -> Result<()> {
    RNG.fill(buf).map_err(|_| random_source_error())
}

fn random_source_error() -> WebAuthnError {
    log::error!("System random source failed; no challenge can be issued");
    WebAuthnError::new(ErrorKind::RandomSource).with_info("system random source is unavailable")
}

/// Create a new 32 byte challenge for a ceremony
///
/// # Errors
/// Returns an error only if the system random source fails
pub fn create_challenge() -> Result<Base64UrlBytes> {
    let mut bytes = [0u8; CHALLENGE_LENGTH];
    fill_random(&mut bytes)?;
    Ok(Base64UrlBytes::from(bytes))
}

/// Generate an opaque token for keying session data in a session store
///
/// 24 bytes (192 bits) of entropy, encoded as 32 URL-safe characters.
///
/// # Errors
/// Returns an error only if the system random source fails
pub fn generate_session_token() -> Result<String> {
    let mut bytes = [0u8; SESSION_TOKEN_LENGTH];
    fill_random(&mut bytes)?;
    Ok(base64url::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_random_source_failure_is_distinct() {
        let err = random_source_error();
        assert!(err.is(ErrorKind::RandomSource));
        assert!(!err.is(ErrorKind::BadRequest));
        assert_eq!(err.kind().as_str(), "random_source_unavailable");
    }

    #[test]
    fn test_challenge_length() {
        let challenge = create_challenge().unwrap();
        assert_eq!(challenge.len(), CHALLENGE_LENGTH);
    }

    #[test]
    fn test_challenges_are_unique() {
        let challenges: HashSet<Vec<u8>> = (0..64)
            .map(|_| create_challenge().unwrap().into_inner())
            .collect();
        assert_eq!(challenges.len(), 64);
    }

    #[test]
    fn test_concurrent_generation() {
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| create_challenge().map(Base64UrlBytes::into_inner)))
            .collect();

        let challenges: HashSet<Vec<u8>> = handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect();
        assert_eq!(challenges.len(), 8);
    }

    #[test]
    fn test_session_token_format() {
        let token = generate_session_token().unwrap();
        assert_eq!(token.len(), 32);
        assert!(!token.contains('='));
        assert_eq!(base64url::decode(&token).unwrap().len(), SESSION_TOKEN_LENGTH);
    }
}
