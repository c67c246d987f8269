//! Native secure-storage backends.
//!
//! A [`KeychainBackend`] exposes exactly the primitives of a platform
//! keychain: add, update, delete, copy-matching and key-pair generation.
//! Implementations:
//! - [`MemoryKeychain`] - in-process emulation (always available)
//! - `AppleKeychain` - Security framework keychain (macOS / iOS)
//! - `SecretServiceKeychain` - freedesktop Secret Service (Linux)
//! - [`UnsupportedKeychain`] - every primitive reports `NotAvailable`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use keystash_lib::backend::{platform_default, MemoryKeychain};
//!
//! // The host's keychain
//! let native = platform_default();
//!
//! // Or an isolated in-process one for tests
//! let memory = std::sync::Arc::new(MemoryKeychain::new());
//! ```

mod memory;
mod unsupported;

#[cfg(any(target_os = "macos", target_os = "ios"))]
mod apple;

#[cfg(target_os = "linux")]
mod secret_service;

use std::sync::Arc;

use crate::accessibility::Accessibility;
use crate::errors::KeychainResult;
use crate::key_handle::KeyHandle;
use crate::query::{AttributeUpdate, KeyPairRequest, Query};

pub use memory::{Authenticator, ChallengeOutcome, MemoryKeychain, StaticAuthenticator};
pub use unsupported::UnsupportedKeychain;

#[cfg(any(target_os = "macos", target_os = "ios"))]
pub use apple::AppleKeychain;

#[cfg(target_os = "linux")]
pub use secret_service::SecretServiceKeychain;

/// What a backend can do beyond plain generic secrets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Capabilities {
    /// Items can be gated behind a biometric/passcode challenge.
    pub access_control: bool,
    /// RSA key pairs can be generated and stored.
    pub key_pairs: bool,
}

/// Attributes of one matched item.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct ItemAttributes {
    /// Entry key.
    pub account: Option<String>,
    /// Service namespace.
    pub service: Option<String>,
    /// Access group.
    pub access_group: Option<String>,
    /// Key tag.
    pub application_tag: Option<Vec<u8>>,
    /// Accessibility tier.
    pub accessibility: Option<Accessibility>,
}

/// Result of a successful copy-matching call.
pub enum MatchOutput {
    /// Something matched; nothing was requested back.
    Found,
    /// Secret bytes of the single match.
    Data(Vec<u8>),
    /// Attributes of every match.
    Attributes(Vec<ItemAttributes>),
    /// Handle to the matched key.
    Key(KeyHandle),
}

impl std::fmt::Debug for MatchOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Found => f.write_str("Found"),
            Self::Data(data) => write!(f, "Data({} bytes)", data.len()),
            Self::Attributes(items) => write!(f, "Attributes({} items)", items.len()),
            Self::Key(handle) => write!(f, "Key({:?})", handle),
        }
    }
}

/// The native secure-storage primitives.
///
/// Every method is one synchronous request-response with the platform
/// service and reports the native status through [`KeychainResult`].
/// Implementations must be thread-safe; the platform does its own
/// serialization.
pub trait KeychainBackend: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Capabilities of this backend on the running host.
    fn capabilities(&self) -> Capabilities;

    /// Create a new item.
    ///
    /// # Errors
    /// - `DuplicateItem` if a matching item exists
    /// - `WrongParameter` if required attributes are missing
    fn add(&self, query: &Query) -> KeychainResult<()>;

    /// Replace attributes of every item matching `query`.
    ///
    /// # Errors
    /// - `NotFound` if nothing matches
    fn update(&self, query: &Query, update: &AttributeUpdate) -> KeychainResult<()>;

    /// Remove every item matching `query`.
    ///
    /// # Errors
    /// - `NotFound` if nothing matches
    fn delete(&self, query: &Query) -> KeychainResult<()>;

    /// Look items up, returning what `query.returning` asks for.
    ///
    /// # Errors
    /// - `NotFound` if nothing matches
    /// - `AuthenticationFailed`, `UserCanceled`, `InteractionNotAllowed`
    ///   when a challenge guards the item
    fn copy_matching(&self, query: &Query) -> KeychainResult<MatchOutput>;

    /// Generate and persist an RSA key pair in one request.
    fn generate_key_pair(&self, request: &KeyPairRequest) -> KeychainResult<()>;
}

/// The host platform's keychain.
///
/// Falls back to [`UnsupportedKeychain`] where no native store exists, so
/// operations fail with `NotAvailable` instead of silently using memory.
/// On Linux that includes being called from within a tokio runtime.
pub fn platform_default() -> Arc<dyn KeychainBackend> {
    #[cfg(any(target_os = "macos", target_os = "ios"))]
    {
        Arc::new(AppleKeychain::new())
    }

    #[cfg(target_os = "linux")]
    {
        match SecretServiceKeychain::new() {
            Ok(backend) => Arc::new(backend),
            Err(_err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!("secret service backend unavailable: {_err}");
                Arc::new(UnsupportedKeychain)
            }
        }
    }

    #[cfg(not(any(target_os = "macos", target_os = "ios", target_os = "linux")))]
    {
        Arc::new(UnsupportedKeychain)
    }
}
