//! RSA key pairs through `SecureStore` on the in-memory keychain.

use std::sync::Arc;

use keystash_lib::backend::MemoryKeychain;
use keystash_lib::{KeyClass, KeychainErrorCode, RsaKeySize, SecureStore, StoreConfig};

fn store(config: StoreConfig, backend: Arc<MemoryKeychain>) -> SecureStore {
    SecureStore::open_with_backend(config, backend).unwrap()
}

#[test]
fn test_generate_then_delete_one_half() {
    let store = store(StoreConfig::new("svc"), Arc::new(MemoryKeychain::new()));

    assert!(store.generate_rsa_key_pair(RsaKeySize::Bits1024, "com.example.pub", "com.example.priv"));
    assert!(store.has_rsa_key("com.example.pub"));
    assert!(store.has_rsa_key("com.example.priv"));

    assert!(store.delete_rsa_key("com.example.pub"));
    assert!(!store.has_rsa_key("com.example.pub"));
    assert!(store.has_rsa_key("com.example.priv"));
}

#[test]
fn test_keys_do_not_mix_with_entries() {
    let store = store(StoreConfig::new("svc"), Arc::new(MemoryKeychain::new()));
    assert!(store.generate_rsa_key_pair(RsaKeySize::Bits512, "tag.pub", "tag.priv"));
    assert!(store.set_string("tag.pub", "entry"));

    assert_eq!(store.keys(), vec!["tag.pub".to_string()]);
    store.clear_all();
    assert!(store.has_rsa_key("tag.pub"));
}

#[test]
fn test_keys_visible_across_services() {
    let backend = Arc::new(MemoryKeychain::new());
    let first = store(StoreConfig::new("svc.first"), backend.clone());
    let second = store(StoreConfig::new("svc.second"), backend);

    assert!(first.generate_rsa_key_pair(RsaKeySize::Bits512, "pub", "priv"));
    assert!(second.has_rsa_key("pub"));
}

#[test]
fn test_duplicate_tags_rejected() {
    let store = store(StoreConfig::new("svc"), Arc::new(MemoryKeychain::new()));
    assert!(store.generate_rsa_key_pair(RsaKeySize::Bits512, "pub", "priv"));

    let err = store
        .try_generate_rsa_key_pair(RsaKeySize::Bits512, "pub", "other")
        .unwrap_err();
    assert_eq!(err.code, KeychainErrorCode::DuplicateItem);
    assert!(!store.has_rsa_key("other"));
}

#[test]
fn test_handle_round_trip() {
    let store = store(StoreConfig::new("svc"), Arc::new(MemoryKeychain::new()));
    assert!(store.generate_rsa_key_pair(RsaKeySize::Bits1024, "pub", "priv"));

    let public = store.rsa_key_handle("pub").unwrap();
    let private = store.rsa_key_handle("priv").unwrap();
    assert_eq!(public.key_class(), KeyClass::Public);
    assert_eq!(public.size_in_bits(), 1024);

    let signature = private.sign(b"payload").unwrap();
    assert!(public.verify(b"payload", &signature).unwrap());

    let ciphertext = public.encrypt(b"secret").unwrap();
    assert_eq!(private.decrypt(&ciphertext).unwrap(), b"secret");

    assert_eq!(
        store.rsa_key_data("pub").unwrap(),
        public.external_representation().unwrap()
    );
}

#[test]
fn test_handle_outlives_deletion() {
    let store = store(StoreConfig::new("svc"), Arc::new(MemoryKeychain::new()));
    assert!(store.generate_rsa_key_pair(RsaKeySize::Bits512, "pub", "priv"));

    let private = store.rsa_key_handle("priv").unwrap();
    assert!(store.delete_rsa_key("priv"));
    assert!(store.rsa_key_handle("priv").is_none());
    assert!(private.sign(b"still usable").is_ok());
}

#[test]
fn test_access_group_scopes_keys() {
    let backend = Arc::new(MemoryKeychain::new().with_access_groups(["team.a", "team.b"]));
    let a = store(StoreConfig::new("svc").with_access_group("team.a"), backend.clone());
    let b = store(StoreConfig::new("svc").with_access_group("team.b"), backend);

    assert!(a.generate_rsa_key_pair(RsaKeySize::Bits512, "pub", "priv"));
    assert!(a.has_rsa_key("pub"));
    assert!(!b.has_rsa_key("pub"));
}
