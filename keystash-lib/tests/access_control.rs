//! Access control, lock state and authentication context.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use keystash_lib::backend::{ChallengeOutcome, MemoryKeychain, StaticAuthenticator};
use keystash_lib::{
    AccessControlPolicy, Accessibility, AuthenticationContext, KeychainErrorCode, SecureStore,
    StoreConfig,
};

fn protected_config() -> StoreConfig {
    StoreConfig::new("svc")
        .with_accessibility(Accessibility::WhenPasscodeSetThisDeviceOnly)
        .with_access_control(true)
}

fn store(config: StoreConfig, backend: &Arc<MemoryKeychain>) -> SecureStore {
    SecureStore::open_with_backend(config, backend.clone()).unwrap()
}

#[test]
fn test_challenge_outcomes_map_to_codes() {
    let cases = [
        (ChallengeOutcome::Denied, KeychainErrorCode::AuthenticationFailed),
        (ChallengeOutcome::Cancelled, KeychainErrorCode::UserCanceled),
    ];

    for (outcome, expected) in cases {
        let backend =
            Arc::new(MemoryKeychain::new().with_authenticator(StaticAuthenticator(outcome)));
        let store = store(protected_config(), &backend);

        assert!(store.set_string("token", "secret"));
        let err = store.fetch_string("token", Some("Unlock token")).unwrap_err();
        assert_eq!(err.code, expected);
        assert!(err.requires_authentication());
        assert_eq!(store.string("token"), None);
    }
}

#[test]
fn test_prompt_is_passed_verbatim() {
    let backend = Arc::new(MemoryKeychain::new());
    let store = store(protected_config(), &backend);

    assert!(store.set_string("token", "secret"));
    assert_eq!(
        store
            .string_with_prompt("token", Some("Authenticate to read your token"))
            .as_deref(),
        Some("secret")
    );
    assert_eq!(
        backend.last_prompt().as_deref(),
        Some("Authenticate to read your token")
    );
}

#[test]
fn test_policy_reaches_authenticator() {
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = seen.clone();
    let backend = Arc::new(MemoryKeychain::new().with_authenticator(
        move |_prompt: Option<&str>, policy: AccessControlPolicy| {
            if policy == AccessControlPolicy::BiometryCurrentSet {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            ChallengeOutcome::Approved
        },
    ));
    let store = store(
        protected_config().with_access_control_policy(AccessControlPolicy::BiometryCurrentSet),
        &backend,
    );

    assert!(store.set_string("token", "secret"));
    assert_eq!(store.string("token").as_deref(), Some("secret"));
    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

#[test]
fn test_existence_check_raises_challenge() {
    let backend = Arc::new(MemoryKeychain::new());
    let store = store(protected_config(), &backend);
    assert!(store.set_string("token", "secret"));

    assert!(store.has_value("token"));
    assert_eq!(backend.challenge_count(), 1);

    let quiet = SecureStore::open_with_backend(
        protected_config().with_authentication(AuthenticationContext::non_interactive()),
        backend.clone(),
    )
    .unwrap();
    let err = quiet.try_has_value("token").unwrap_err();
    assert_eq!(err.code, KeychainErrorCode::InteractionNotAllowed);
    assert_eq!(backend.challenge_count(), 1);
}

#[test]
fn test_enumeration_and_delete_do_not_challenge() {
    let backend = Arc::new(
        MemoryKeychain::new().with_authenticator(StaticAuthenticator(ChallengeOutcome::Denied)),
    );
    let store = store(protected_config(), &backend);
    assert!(store.set_string("a", "1"));
    assert!(store.set_string("b", "2"));

    assert_eq!(store.keys().len(), 2);
    assert_eq!(store.try_clear_all().unwrap(), 2);
    assert_eq!(backend.challenge_count(), 0);
}

#[test]
fn test_locked_device_tiers() {
    let backend = Arc::new(MemoryKeychain::new());
    let when_unlocked = store(
        StoreConfig::new("svc.locked").with_accessibility(Accessibility::WhenUnlocked),
        &backend,
    );
    let always = store(
        StoreConfig::new("svc.always").with_accessibility(Accessibility::Always),
        &backend,
    );
    assert!(when_unlocked.set_string("token", "a"));
    assert!(always.set_string("token", "b"));

    backend.lock().unwrap();
    assert_eq!(
        when_unlocked.fetch_string("token", None).unwrap_err().code,
        KeychainErrorCode::InteractionNotAllowed
    );
    assert_eq!(always.string("token").as_deref(), Some("b"));

    backend.unlock().unwrap();
    assert_eq!(when_unlocked.string("token").as_deref(), Some("a"));
}

#[test]
fn test_protected_entry_can_be_replaced_without_access_control() {
    let backend = Arc::new(MemoryKeychain::new());
    let protected = store(protected_config(), &backend);
    let plain = store(StoreConfig::new("svc"), &backend);

    assert!(protected.set_string("token", "guarded"));
    assert!(plain.set_string("token", "open"));
    assert_eq!(plain.string("token").as_deref(), Some("open"));
}

#[test]
fn test_denied_overwrite_keeps_protected_value() {
    let answered = Arc::new(AtomicUsize::new(0));
    let counter = answered.clone();
    let backend = Arc::new(MemoryKeychain::new().with_authenticator(
        move |_prompt: Option<&str>, _policy: AccessControlPolicy| {
            // Deny the first challenge only.
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                ChallengeOutcome::Denied
            } else {
                ChallengeOutcome::Approved
            }
        },
    ));
    let store = store(protected_config(), &backend);
    assert!(store.set_string("token", "first"));

    let err = store.try_set("token", b"second", Some("Replace token")).unwrap_err();
    assert_eq!(err.code, KeychainErrorCode::AuthenticationFailed);

    assert_eq!(store.string("token").as_deref(), Some("first"));
    assert_eq!(store.keys(), vec!["token".to_string()]);
    assert_eq!(answered.load(Ordering::SeqCst), 2);
}
