use std::time::Duration;

use webauthn_rp::store::{
    save_session, take_session, CredentialStore, MemoryCredentialStore, MemorySessionStore,
};
use webauthn_rp::testing::{
    assert_error_details, SoftAuthenticator, TestFixtures, TestSettingsBuilder, TestUser,
};
use webauthn_rp::{ErrorKind, LoginOptions, RegistrationOptions, WebAuthn};

const DEFAULT_TTL: Duration = Duration::from_secs(300);

#[test]
fn test_full_ceremony_through_stores() {
    let webauthn = TestFixtures::webauthn();
    let sessions = MemorySessionStore::new();
    let credentials = MemoryCredentialStore::new();
    let mut authenticator = SoftAuthenticator::es256();
    let user = TestFixtures::user();

    // Registration
    let (creation, session) = webauthn
        .begin_registration(&user, RegistrationOptions::default())
        .unwrap();
    let token = save_session(&sessions, session, DEFAULT_TTL).unwrap();
    let session = take_session(&sessions, &token).unwrap();
    let credential = webauthn
        .finish_registration(&user, &session, &authenticator.make_credential_body(&creation))
        .unwrap();
    credentials.add_credential(&user.id, credential).unwrap();

    // Login with the user reloaded from the credential store
    let user = TestUser {
        credentials: credentials.credentials_for_user(&user.id).unwrap(),
        ..user
    };
    let (assertion, session) = webauthn.begin_login(&user, LoginOptions::default()).unwrap();
    let token = save_session(&sessions, session, DEFAULT_TTL).unwrap();
    let session = take_session(&sessions, &token).unwrap();
    let outcome = webauthn
        .finish_login(&user, &session, &authenticator.get_assertion_body(&assertion))
        .unwrap();
    credentials.update_credential(outcome.credential()).unwrap();

    let (owner, stored) = credentials
        .credential_by_id(authenticator.credential_id())
        .unwrap()
        .unwrap();
    assert_eq!(owner, user.id);
    assert_eq!(stored.authenticator.sign_count, 1);
    assert!(sessions.is_empty().unwrap());
}

#[test]
fn test_session_cannot_be_replayed() {
    let webauthn = TestFixtures::webauthn();
    let sessions = MemorySessionStore::new();
    let user = TestFixtures::user();

    let (_, session) = webauthn
        .begin_registration(&user, RegistrationOptions::default())
        .unwrap();
    let token = save_session(&sessions, session, DEFAULT_TTL).unwrap();

    take_session(&sessions, &token).unwrap();
    assert_error_details(
        take_session(&sessions, &token),
        ErrorKind::ChallengeMismatch,
        "session not found or already consumed",
    );
}

#[test]
fn test_unknown_session_token() {
    let sessions = MemorySessionStore::new();
    assert_error_details(
        take_session(&sessions, "never-issued"),
        ErrorKind::ChallengeMismatch,
        "session not found",
    );
}

#[test]
fn test_unexpiring_session_with_huge_default_ttl() {
    let settings = TestSettingsBuilder::new().without_timeout_enforcement().build();
    let webauthn = WebAuthn::new(settings).unwrap();
    let sessions = MemorySessionStore::new();
    let user = TestFixtures::user();

    let (_, session) = webauthn
        .begin_registration(&user, RegistrationOptions::default())
        .unwrap();
    let token = save_session(&sessions, session.clone(), Duration::MAX).unwrap();
    assert_eq!(take_session(&sessions, &token).unwrap(), session);
}

#[test]
fn test_session_tokens_are_unique() {
    let webauthn = TestFixtures::webauthn();
    let sessions = MemorySessionStore::new();
    let user = TestFixtures::user();

    let mut tokens = Vec::new();
    for _ in 0..8 {
        let (_, session) = webauthn
            .begin_registration(&user, RegistrationOptions::default())
            .unwrap();
        tokens.push(save_session(&sessions, session, DEFAULT_TTL).unwrap());
    }
    tokens.sort();
    tokens.dedup();
    assert_eq!(tokens.len(), 8);
    assert_eq!(sessions.len().unwrap(), 8);
}
