//! Test fixtures and data generators.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::backend::{ChallengeOutcome, MemoryKeychain, StaticAuthenticator};
use crate::config::StoreConfig;
use crate::store::SecureStore;

/// Collection of commonly used test fixtures.
pub struct TestFixtures;

impl TestFixtures {
    /// Service used by the end-to-end scenario.
    pub const SERVICE: &'static str = "com.example.app";

    /// Access group used for sharing scenarios.
    pub const ACCESS_GROUP: &'static str = "ABCDE12345.com.example.shared";

    /// Sample entries, including a non-ASCII key and an empty value.
    pub const SAMPLE_ENTRIES: &'static [(&'static str, &'static [u8])] = &[
        ("token", b"abc123"),
        ("refresh-token", b"def456"),
        ("clé", "välue".as_bytes()),
        ("empty", b""),
        ("binary", &[0x00, 0xff, 0x10, 0x80]),
    ];

    /// A fresh unlocked backend and a store for `service` on it.
    pub fn memory_store(service: &str) -> (Arc<MemoryKeychain>, SecureStore) {
        let backend = Arc::new(MemoryKeychain::new());
        let store = Self::store_on(&backend, StoreConfig::new(service));
        (backend, store)
    }

    /// A store with `config` on an existing backend.
    ///
    /// # Panics
    /// Panics if `config` is invalid.
    pub fn store_on(backend: &Arc<MemoryKeychain>, config: StoreConfig) -> SecureStore {
        SecureStore::open_with_backend(config, backend.clone())
            .unwrap_or_else(|err| panic!("invalid test configuration: {}", err))
    }

    /// A backend whose challenges always end with `outcome`.
    pub fn challenging_backend(outcome: ChallengeOutcome) -> Arc<MemoryKeychain> {
        Arc::new(MemoryKeychain::new().with_authenticator(StaticAuthenticator(outcome)))
    }
}

/// A service name no other test in this process uses.
pub fn unique_service(prefix: &str) -> String {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    format!(
        "{}.{}.{}",
        prefix,
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    )
}
