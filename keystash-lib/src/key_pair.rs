//! RSA key pairs held in the keychain.
//!
//! Keys are addressed by an application tag instead of an entry key and are
//! scoped only by the store's access group; they carry no service.

use std::fmt;
use std::str::FromStr;

use crate::backend::MatchOutput;
use crate::errors::{KeychainError, KeychainResult};
use crate::key_handle::KeyHandle;
use crate::query::{KeyPairRequest, Query, Returning};
use crate::store::{unexpected_output, SecureStore};

/// Supported RSA modulus sizes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum RsaKeySize {
    /// 512-bit modulus.
    Bits512,
    /// 1024-bit modulus.
    Bits1024,
    /// 2048-bit modulus.
    #[default]
    Bits2048,
}

impl RsaKeySize {
    /// Modulus size in bits.
    pub fn bits(&self) -> usize {
        match self {
            Self::Bits512 => 512,
            Self::Bits1024 => 1024,
            Self::Bits2048 => 2048,
        }
    }
}

impl fmt::Display for RsaKeySize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits())
    }
}

impl TryFrom<u32> for RsaKeySize {
    type Error = KeychainError;

    fn try_from(bits: u32) -> Result<Self, Self::Error> {
        match bits {
            512 => Ok(Self::Bits512),
            1024 => Ok(Self::Bits1024),
            2048 => Ok(Self::Bits2048),
            other => Err(KeychainError::wrong_parameter(format!(
                "unsupported RSA key size: {} (expected 512, 1024 or 2048)",
                other
            ))),
        }
    }
}

impl FromStr for RsaKeySize {
    type Err = KeychainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bits: u32 = s
            .trim()
            .parse()
            .map_err(|_| KeychainError::wrong_parameter(format!("invalid key size: {}", s)))?;
        Self::try_from(bits)
    }
}

/// Which half of a key pair a key is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyClass {
    /// Public key.
    Public,
    /// Private key.
    Private,
}

impl SecureStore {
    fn key_query(&self, tag: &[u8]) -> KeychainResult<Query> {
        if tag.is_empty() {
            return Err(KeychainError::wrong_parameter("key tag must not be empty"));
        }
        Ok(Query::key()
            .application_tag(tag)
            .access_group(self.config.access_group.as_deref())
            .authentication(self.config.authentication))
    }

    fn require_key_pairs(&self) -> KeychainResult<()> {
        if self.capabilities.key_pairs {
            Ok(())
        } else {
            Err(KeychainError::unavailable("RSA key pair generation"))
        }
    }

    /// Generate and persist an RSA key pair in one native request.
    ///
    /// # Errors
    /// - `WrongParameter` if a tag is empty or both tags are equal
    /// - `NotAvailable` if the backend cannot hold key pairs
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self, public_tag, private_tag)))]
    pub fn try_generate_rsa_key_pair(
        &self,
        size: RsaKeySize,
        public_tag: impl AsRef<[u8]>,
        private_tag: impl AsRef<[u8]>,
    ) -> KeychainResult<()> {
        self.require_key_pairs()?;
        let (public_tag, private_tag) = (public_tag.as_ref(), private_tag.as_ref());
        if public_tag.is_empty() || private_tag.is_empty() {
            return Err(KeychainError::wrong_parameter("key tags must not be empty"));
        }
        if public_tag == private_tag {
            return Err(KeychainError::wrong_parameter(
                "public and private key tags must differ",
            ));
        }

        self.backend.generate_key_pair(&KeyPairRequest {
            size,
            public_tag: public_tag.to_vec(),
            private_tag: private_tag.to_vec(),
            access_group: self.config.access_group.clone(),
        })
    }

    /// Generate a key pair. True only on native success.
    pub fn generate_rsa_key_pair(
        &self,
        size: RsaKeySize,
        public_tag: impl AsRef<[u8]>,
        private_tag: impl AsRef<[u8]>,
    ) -> bool {
        match self.try_generate_rsa_key_pair(size, public_tag, private_tag) {
            Ok(()) => true,
            Err(_err) => {
                #[cfg(feature = "tracing")]
                tracing::debug!("key pair generation failed: {_err}");
                false
            }
        }
    }

    /// Exportable representation of the key tagged `tag`.
    pub fn try_rsa_key_data(&self, tag: impl AsRef<[u8]>) -> KeychainResult<Option<Vec<u8>>> {
        self.require_key_pairs()?;
        let query = self.key_query(tag.as_ref())?.returning(Returning::Data);
        match self.backend.copy_matching(&query) {
            Ok(MatchOutput::Data(data)) => Ok(Some(data)),
            Ok(other) => Err(unexpected_output(other)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Exportable representation of a key; `None` if missing or not exportable.
    pub fn rsa_key_data(&self, tag: impl AsRef<[u8]>) -> Option<Vec<u8>> {
        self.try_rsa_key_data(tag).ok().flatten()
    }

    /// Live handle to the key tagged `tag`.
    pub fn try_rsa_key_handle(&self, tag: impl AsRef<[u8]>) -> KeychainResult<Option<KeyHandle>> {
        self.require_key_pairs()?;
        let query = self
            .key_query(tag.as_ref())?
            .returning(Returning::Reference);
        match self.backend.copy_matching(&query) {
            Ok(MatchOutput::Key(handle)) => Ok(Some(handle)),
            Ok(other) => Err(unexpected_output(other)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Live handle to a key; `None` on any failure.
    pub fn rsa_key_handle(&self, tag: impl AsRef<[u8]>) -> Option<KeyHandle> {
        self.try_rsa_key_handle(tag).ok().flatten()
    }

    /// Delete the key tagged `tag`. A missing key counts as success.
    pub fn try_delete_rsa_key(&self, tag: impl AsRef<[u8]>) -> KeychainResult<()> {
        self.require_key_pairs()?;
        match self.backend.delete(&self.key_query(tag.as_ref())?) {
            Err(err) if err.is_not_found() => Ok(()),
            result => result,
        }
    }

    /// Delete a key. True on success or when nothing was stored.
    pub fn delete_rsa_key(&self, tag: impl AsRef<[u8]>) -> bool {
        self.try_delete_rsa_key(tag).is_ok()
    }

    /// Whether a key tagged `tag` exists.
    pub fn try_has_rsa_key(&self, tag: impl AsRef<[u8]>) -> KeychainResult<bool> {
        self.require_key_pairs()?;
        let query = self.key_query(tag.as_ref())?.returning(Returning::Nothing);
        match self.backend.copy_matching(&query) {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Whether a key exists; false on any failure.
    pub fn has_rsa_key(&self, tag: impl AsRef<[u8]>) -> bool {
        self.try_has_rsa_key(tag).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::backend::{Capabilities, MemoryKeychain};
    use crate::config::StoreConfig;
    use crate::errors::KeychainErrorCode;

    fn store() -> SecureStore {
        SecureStore::open_with_backend(StoreConfig::new("svc"), Arc::new(MemoryKeychain::new()))
            .unwrap()
    }

    #[test]
    fn test_key_size_parsing() {
        assert_eq!("1024".parse::<RsaKeySize>().unwrap(), RsaKeySize::Bits1024);
        assert_eq!(RsaKeySize::try_from(512).unwrap().bits(), 512);
        assert!(RsaKeySize::try_from(4096).is_err());
        assert!("big".parse::<RsaKeySize>().is_err());
        assert_eq!(RsaKeySize::default().to_string(), "2048");
    }

    #[test]
    fn test_generate_has_delete() {
        let store = store();
        assert!(store.generate_rsa_key_pair(RsaKeySize::Bits512, "pub", "priv"));
        assert!(store.has_rsa_key("pub"));
        assert!(store.has_rsa_key("priv"));

        assert!(store.delete_rsa_key("pub"));
        assert!(!store.has_rsa_key("pub"));
        assert!(store.has_rsa_key("priv"));
        assert!(store.delete_rsa_key("pub"));
    }

    #[test]
    fn test_equal_tags_rejected() {
        let err = store()
            .try_generate_rsa_key_pair(RsaKeySize::Bits512, b"same", b"same")
            .unwrap_err();
        assert_eq!(err.code, KeychainErrorCode::WrongParameter);
    }

    #[test]
    fn test_key_data_and_handle() {
        let store = store();
        assert!(store.generate_rsa_key_pair(RsaKeySize::Bits512, b"pub", b"priv"));

        let der = store.rsa_key_data(b"pub").unwrap();
        assert!(!der.is_empty());

        let private = store.rsa_key_handle(b"priv").unwrap();
        let public = store.rsa_key_handle(b"pub").unwrap();
        assert_eq!(private.key_class(), KeyClass::Private);
        assert_eq!(public.key_class(), KeyClass::Public);

        let signature = private.sign(b"message").unwrap();
        assert!(public.verify(b"message", &signature).unwrap());
        assert!(!public.verify(b"tampered", &signature).unwrap());

        let ciphertext = public.encrypt(b"secret").unwrap();
        assert_eq!(private.decrypt(&ciphertext).unwrap(), b"secret");

        assert_eq!(
            public.sign(b"message").unwrap_err().code,
            KeychainErrorCode::WrongParameter
        );
    }

    #[test]
    fn test_missing_key() {
        let store = store();
        assert!(store.rsa_key_data("nope").is_none());
        assert!(store.rsa_key_handle("nope").is_none());
        assert_eq!(store.try_rsa_key_data("nope").unwrap(), None);
    }

    #[test]
    fn test_key_pairs_unavailable() {
        let backend = MemoryKeychain::new().with_capabilities(Capabilities {
            access_control: true,
            key_pairs: false,
        });
        let store =
            SecureStore::open_with_backend(StoreConfig::new("svc"), Arc::new(backend)).unwrap();

        let err = store
            .try_generate_rsa_key_pair(RsaKeySize::Bits512, "pub", "priv")
            .unwrap_err();
        assert_eq!(err.code, KeychainErrorCode::NotAvailable);
        assert!(!store.has_rsa_key("pub"));
    }
}
