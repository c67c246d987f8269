//! Command implementations driven against an in-memory keychain.

use keystash_demo_cli::commands::{entries, key_pairs};
use keystash_lib::test_utils::{assert_stored, unique_service, TestFixtures};
use keystash_lib::{KeychainErrorCode, RsaKeySize, StoreConfig};

#[test]
fn test_set_get_delete() {
    let (_backend, store) = TestFixtures::memory_store(&unique_service("cli.entries"));

    entries::set(&store, "token", "abc123", false, None).unwrap();
    assert_stored(&store, "token", b"abc123");
    entries::get(&store, "token", false, None).unwrap();
    assert!(entries::has(&store, "token").unwrap());

    entries::delete(&store, "token").unwrap();
    assert!(!entries::has(&store, "token").unwrap());
    assert!(entries::get(&store, "token", false, None).is_err());
}

#[test]
fn test_set_hex_value() {
    let (_backend, store) = TestFixtures::memory_store(&unique_service("cli.hex"));

    entries::set(&store, "blob", "00ff10", true, None).unwrap();
    assert_stored(&store, "blob", &[0x00, 0xff, 0x10]);
    assert!(entries::set(&store, "bad", "not-hex", true, None).is_err());
    assert!(!store.has_value("bad"));
}

#[test]
fn test_empty_key_is_rejected() {
    let (_backend, store) = TestFixtures::memory_store(&unique_service("cli.empty"));

    let err = entries::set(&store, "", "value", false, None).unwrap_err();
    let cause = err.downcast_ref::<keystash_lib::KeychainError>().unwrap();
    assert_eq!(cause.code, KeychainErrorCode::WrongParameter);
}

#[test]
fn test_keys_and_clear() {
    let (backend, store) = TestFixtures::memory_store(&unique_service("cli.keys"));
    let other = TestFixtures::store_on(&backend, StoreConfig::new(unique_service("cli.other")));
    other.set_string("untouched", "value");

    for (key, value) in TestFixtures::SAMPLE_ENTRIES {
        assert!(store.set_data(key, value));
    }

    let keys = entries::keys(&store).unwrap();
    assert_eq!(keys.len(), TestFixtures::SAMPLE_ENTRIES.len());
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);

    let removed = entries::clear(&store, true).unwrap();
    assert_eq!(removed, TestFixtures::SAMPLE_ENTRIES.len());
    assert!(entries::keys(&store).unwrap().is_empty());
    assert_eq!(other.string("untouched").as_deref(), Some("value"));
}

#[test]
fn test_clear_empty_store() {
    let (_backend, store) = TestFixtures::memory_store(&unique_service("cli.clear"));
    assert_eq!(entries::clear(&store, true).unwrap(), 0);
}

#[test]
fn test_key_pair_commands() {
    let (_backend, store) = TestFixtures::memory_store(&unique_service("cli.keypair"));

    key_pairs::keygen(&store, "cli.pub", "cli.priv", RsaKeySize::Bits512).unwrap();
    assert!(key_pairs::has(&store, "cli.pub").unwrap());
    assert!(key_pairs::has(&store, "cli.priv").unwrap());

    let exported = key_pairs::export(&store, "cli.pub").unwrap();
    assert_eq!(hex::decode(&exported).unwrap(), store.rsa_key_data("cli.pub").unwrap());

    assert!(key_pairs::keygen(&store, "cli.pub", "cli.other", RsaKeySize::Bits512).is_err());

    key_pairs::delete(&store, "cli.pub").unwrap();
    assert!(!key_pairs::has(&store, "cli.pub").unwrap());
    assert!(key_pairs::export(&store, "cli.pub").is_err());
}
