//! Prelude module for convenient imports.
//!
//! ```rust,ignore
//! use keystash_lib::prelude::*;
//! ```
//!
//! ## What's Included
//!
//! - The store: `SecureStore`, `StoreConfig`, `AuthenticationContext`
//! - Policy types: `Accessibility`, `AccessControlPolicy`
//! - Errors: `KeychainError`, `KeychainErrorCode`, `Result`
//! - Key pairs: `RsaKeySize`, `KeyClass`, `KeyHandle`
//! - Backends: `KeychainBackend`, `MemoryKeychain`, `platform_default`

// Store
pub use crate::config::{AuthenticationContext, StoreConfig};
pub use crate::store::SecureStore;

// Policy
pub use crate::accessibility::{AccessControlPolicy, Accessibility};

// Error handling
pub use crate::errors::{KeychainError, KeychainErrorCode};
pub use crate::Result;

// Key pairs
pub use crate::key_handle::KeyHandle;
pub use crate::key_pair::{KeyClass, RsaKeySize};

// Backends
pub use crate::backend::{platform_default, KeychainBackend, MemoryKeychain};
