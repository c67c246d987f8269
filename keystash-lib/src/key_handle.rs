//! Live handles to stored keys.

use std::fmt;

use crate::errors::KeychainResult;
use crate::key_pair::KeyClass;

/// Cryptographic operations a backend offers on one stored key.
///
/// Signatures use PKCS#1 v1.5 over SHA-256; encryption uses PKCS#1 v1.5
/// padding. Calling an operation on the wrong half of a pair fails with
/// `WrongParameter`.
pub trait KeyOperations: Send + Sync {
    /// Whether this is the public or private half.
    fn key_class(&self) -> KeyClass;

    /// Modulus size in bits.
    fn size_in_bits(&self) -> usize;

    /// Exportable representation (PKCS#1 DER), if the key permits export.
    fn external_representation(&self) -> Option<Vec<u8>>;

    /// Sign `message` (private keys).
    fn sign(&self, message: &[u8]) -> KeychainResult<Vec<u8>>;

    /// Verify `signature` over `message` (public keys).
    fn verify(&self, message: &[u8], signature: &[u8]) -> KeychainResult<bool>;

    /// Encrypt `plaintext` (public keys).
    fn encrypt(&self, plaintext: &[u8]) -> KeychainResult<Vec<u8>>;

    /// Decrypt `ciphertext` (private keys).
    fn decrypt(&self, ciphertext: &[u8]) -> KeychainResult<Vec<u8>>;
}

/// Handle to a key held by the keychain.
///
/// The key material stays inside the backend. The handle is released when
/// dropped.
pub struct KeyHandle {
    inner: Box<dyn KeyOperations>,
}

impl KeyHandle {
    /// Wrap backend-specific key operations.
    pub fn new(inner: impl KeyOperations + 'static) -> Self {
        Self {
            inner: Box::new(inner),
        }
    }

    /// Whether this is the public or private half.
    pub fn key_class(&self) -> KeyClass {
        self.inner.key_class()
    }

    /// Modulus size in bits.
    pub fn size_in_bits(&self) -> usize {
        self.inner.size_in_bits()
    }

    /// Exportable representation, if permitted.
    pub fn external_representation(&self) -> Option<Vec<u8>> {
        self.inner.external_representation()
    }

    /// Sign `message` with a private key.
    pub fn sign(&self, message: &[u8]) -> KeychainResult<Vec<u8>> {
        self.inner.sign(message)
    }

    /// Verify a signature with a public key.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> KeychainResult<bool> {
        self.inner.verify(message, signature)
    }

    /// Encrypt with a public key.
    pub fn encrypt(&self, plaintext: &[u8]) -> KeychainResult<Vec<u8>> {
        self.inner.encrypt(plaintext)
    }

    /// Decrypt with a private key.
    pub fn decrypt(&self, ciphertext: &[u8]) -> KeychainResult<Vec<u8>> {
        self.inner.decrypt(ciphertext)
    }
}

impl fmt::Debug for KeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyHandle")
            .field("class", &self.key_class())
            .field("bits", &self.size_in_bits())
            .finish()
    }
}
