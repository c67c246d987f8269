//! Test utilities for keystash.
//!
//! Helpers for exercising a [`SecureStore`](crate::SecureStore) against the
//! in-memory keychain:
//! - fixtures that build isolated stores and shared backends
//! - assertion helpers for keychain error codes
//!
//! ## Usage
//!
//! ```rust,ignore
//! use keystash_lib::test_utils::{assert_code, TestFixtures};
//! use keystash_lib::KeychainErrorCode;
//!
//! let (backend, store) = TestFixtures::memory_store("com.example.app");
//! assert!(store.set_string("token", "abc123"));
//!
//! backend.lock().unwrap();
//! assert_code(&store.fetch_string("token", None), KeychainErrorCode::InteractionNotAllowed);
//! ```

mod assertions;
mod fixtures;

pub use assertions::{assert_code, assert_not_found, assert_stored};
pub use fixtures::{unique_service, TestFixtures};
