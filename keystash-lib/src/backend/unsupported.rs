//! Backend for hosts without a native keychain.

use super::{Capabilities, KeychainBackend, MatchOutput};
use crate::errors::{KeychainError, KeychainResult};
use crate::query::{AttributeUpdate, KeyPairRequest, Query};

/// Every primitive fails with `NotAvailable`.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnsupportedKeychain;

impl KeychainBackend for UnsupportedKeychain {
    fn name(&self) -> &'static str {
        "unsupported"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    fn add(&self, _query: &Query) -> KeychainResult<()> {
        Err(KeychainError::unavailable("secure storage"))
    }

    fn update(&self, _query: &Query, _update: &AttributeUpdate) -> KeychainResult<()> {
        Err(KeychainError::unavailable("secure storage"))
    }

    fn delete(&self, _query: &Query) -> KeychainResult<()> {
        Err(KeychainError::unavailable("secure storage"))
    }

    fn copy_matching(&self, _query: &Query) -> KeychainResult<MatchOutput> {
        Err(KeychainError::unavailable("secure storage"))
    }

    fn generate_key_pair(&self, _request: &KeyPairRequest) -> KeychainResult<()> {
        Err(KeychainError::unavailable("RSA key pair generation"))
    }
}
