//! Keystash library.
//!
//! A thin facade over the platform keychain: string and binary key-value
//! storage scoped by service and access group, accessibility tiers,
//! optional biometric/passcode access control, and RSA key pairs.
//!
//! # Features
//!
//! - **Key-value storage**: [`SecureStore`] with typed `try_*` operations and
//!   `bool`/`Option` convenience projections
//! - **Key pairs**: RSA generation and lookup by tag, live [`KeyHandle`]s
//! - **Backends**: the Security framework on Apple targets, the Secret
//!   Service on Linux, and an in-memory emulation for tests
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use keystash_lib::backend::MemoryKeychain;
//! use keystash_lib::{RsaKeySize, SecureStore, StoreConfig};
//!
//! let store = SecureStore::open_with_backend(
//!     StoreConfig::new("com.example.app"),
//!     Arc::new(MemoryKeychain::new()),
//! )?;
//!
//! store.try_set("token", b"abc123", None)?;
//! assert_eq!(store.fetch_data("token", None)?, b"abc123");
//!
//! store.try_generate_rsa_key_pair(RsaKeySize::Bits512, "app.pub", "app.priv")?;
//! assert!(store.has_rsa_key("app.pub"));
//! # Ok::<(), keystash_lib::KeychainError>(())
//! ```

pub mod accessibility;
pub mod backend;
pub mod config;
pub mod errors;
pub mod key_handle;
pub mod key_pair;
pub mod prelude;
pub mod query;
pub mod store;

/// Test utilities for keychain testing.
///
/// This module is only available with the `test-utils` feature or in test builds.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use accessibility::{AccessControl, AccessControlPolicy, Accessibility};
pub use backend::{Capabilities, KeychainBackend};
pub use config::{AuthenticationContext, ConfigError, StoreConfig};
pub use errors::{KeychainError, KeychainErrorCode, KeychainResult, OsStatus};
pub use key_handle::{KeyHandle, KeyOperations};
pub use key_pair::{KeyClass, RsaKeySize};
pub use store::SecureStore;

/// Common result alias for keychain operations.
pub type Result<T> = std::result::Result<T, KeychainError>;
