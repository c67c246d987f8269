//! The secure key-value store.
//!
//! [`SecureStore`] scopes every entry by `(service, access group, key)` and
//! issues exactly one native primitive per step. Each public entry point
//! comes in two shapes:
//!
//! - a typed `try_*` core returning [`KeychainResult`], which preserves the
//!   native status
//! - a convenience projection (`bool` / `Option`) that discards it
//!
//! # Existence checks and access control
//!
//! [`SecureStore::has_value`] performs the same lookup as a read. For an
//! access-controlled entry this means the platform may show an
//! authentication prompt just to answer whether the entry exists. Use a
//! non-interactive [`AuthenticationContext`](crate::config::AuthenticationContext)
//! to turn that prompt into an `InteractionNotAllowed` error instead.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use keystash_lib::backend::MemoryKeychain;
//! use keystash_lib::{SecureStore, StoreConfig};
//!
//! let store = SecureStore::open_with_backend(
//!     StoreConfig::new("com.example.app"),
//!     Arc::new(MemoryKeychain::new()),
//! )
//! .unwrap();
//!
//! assert!(store.set_string("token", "abc123"));
//! assert_eq!(store.string("token").as_deref(), Some("abc123"));
//! assert!(store.delete_entry("token"));
//! assert_eq!(store.string("token"), None);
//! ```

use std::fmt;
use std::sync::Arc;

use crate::backend::{platform_default, Capabilities, KeychainBackend, MatchOutput};
use crate::config::StoreConfig;
use crate::errors::{KeychainError, KeychainErrorCode, KeychainResult};
use crate::query::{AttributeUpdate, MatchLimit, Query, Returning};

/// Facade over one `(service, access group)` scope of the keychain.
///
/// Cheap to clone; clones share the backend.
#[derive(Clone)]
pub struct SecureStore {
    pub(crate) config: StoreConfig,
    pub(crate) backend: Arc<dyn KeychainBackend>,
    pub(crate) capabilities: Capabilities,
}

impl fmt::Debug for SecureStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureStore")
            .field("config", &self.config)
            .field("backend", &self.backend.name())
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

impl Default for SecureStore {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn unexpected_output(output: MatchOutput) -> KeychainError {
    KeychainError::unknown(format!("unexpected copy-matching output: {:?}", output))
}

impl SecureStore {
    /// Store for the application's default service, without an access
    /// group, on the platform keychain.
    ///
    /// On Linux the Secret Service client runs on a private runtime. Created
    /// from inside a tokio runtime, the store falls back to a backend whose
    /// operations fail with `NotAvailable`; call it from a blocking context
    /// (e.g. `tokio::task::spawn_blocking`) instead.
    pub fn new() -> Self {
        Self::with_backend_unchecked(StoreConfig::default(), platform_default())
    }

    /// Store for `service` on the platform keychain.
    ///
    /// # Errors
    /// `WrongParameter` if `service` is empty.
    pub fn for_service(service: impl Into<String>) -> KeychainResult<Self> {
        Self::open(StoreConfig::new(service))
    }

    /// Store for `service`, shared through `access_group`.
    ///
    /// The platform checks the group on each operation; an unauthorized
    /// group fails there with `MissingEntitlement`.
    ///
    /// # Errors
    /// `WrongParameter` if either argument is empty.
    pub fn for_service_in_group(
        service: impl Into<String>,
        access_group: impl Into<String>,
    ) -> KeychainResult<Self> {
        Self::open(StoreConfig::new(service).with_access_group(access_group))
    }

    /// Store with an explicit configuration on the platform keychain.
    pub fn open(config: StoreConfig) -> KeychainResult<Self> {
        Self::open_with_backend(config, platform_default())
    }

    /// Store with an explicit configuration and backend.
    pub fn open_with_backend(
        config: StoreConfig,
        backend: Arc<dyn KeychainBackend>,
    ) -> KeychainResult<Self> {
        config.validate()?;
        Ok(Self::with_backend_unchecked(config, backend))
    }

    fn with_backend_unchecked(config: StoreConfig, backend: Arc<dyn KeychainBackend>) -> Self {
        let capabilities = backend.capabilities();
        #[cfg(feature = "tracing")]
        tracing::debug!(
            service = %config.service,
            backend = backend.name(),
            access_control = capabilities.access_control,
            key_pairs = capabilities.key_pairs,
            "opened secure store"
        );
        Self {
            config,
            backend,
            capabilities,
        }
    }

    /// The store's configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Service namespace.
    pub fn service(&self) -> &str {
        &self.config.service
    }

    /// Access group, if sharing is configured.
    pub fn access_group(&self) -> Option<&str> {
        self.config.access_group.as_deref()
    }

    /// Capabilities resolved from the backend at construction.
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Name of the backend in use.
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    fn scope_query(&self) -> Query {
        Query::generic_password()
            .service(self.config.service.as_str())
            .access_group(self.config.access_group.as_deref())
            .authentication(self.config.authentication)
    }

    fn entry_query(&self, key: &str) -> KeychainResult<Query> {
        if key.is_empty() {
            return Err(KeychainError::wrong_parameter("entry key must not be empty"));
        }
        Ok(self.scope_query().account(key))
    }

    // ---- Write ----

    /// Store `value` under `key`, replacing any existing entry.
    ///
    /// The entry is added, and on `DuplicateItem` its value is updated in
    /// place. A failed write leaves any previous value untouched. An existing
    /// entry keeps the protection it was created with; only unprotected
    /// entries have their accessibility tier replaced.
    ///
    /// # Errors
    /// - `WrongParameter` for an empty key
    /// - `NotAvailable` if access control is configured but unsupported
    /// - any native status from add/update, including challenge failures
    ///   raised while updating a protected entry
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self, value), fields(service = %self.config.service, len = value.len())))]
    pub fn try_set(&self, key: &str, value: &[u8], prompt: Option<&str>) -> KeychainResult<()> {
        let query = self.entry_query(key)?.prompt(prompt);

        let (add, update) = match self.config.access_control() {
            None => (
                query.clone().value(value).accessibility(self.config.accessibility),
                AttributeUpdate::new(value, self.config.accessibility),
            ),
            Some(control) => {
                if !self.capabilities.access_control {
                    return Err(KeychainError::unavailable("access control"));
                }
                (
                    query.clone().value(value).access_control(control),
                    AttributeUpdate::value_only(value),
                )
            }
        };

        match self.backend.add(&add) {
            Err(err) if err.code == KeychainErrorCode::DuplicateItem => {
                #[cfg(feature = "tracing")]
                tracing::debug!("entry exists, updating in place");
                self.backend.update(&query, &update)
            }
            result => result,
        }
    }

    /// Store bytes. True only on native success.
    pub fn set_data(&self, key: &str, value: &[u8]) -> bool {
        self.set_data_with_prompt(key, value, None)
    }

    /// Store bytes, showing `prompt` if a challenge is raised.
    pub fn set_data_with_prompt(&self, key: &str, value: &[u8], prompt: Option<&str>) -> bool {
        self.try_set(key, value, prompt)
            .map_err(|_err| {
                #[cfg(feature = "tracing")]
                tracing::debug!("set failed: {_err}");
            })
            .is_ok()
    }

    /// Store a UTF-8 string.
    pub fn set_string(&self, key: &str, value: &str) -> bool {
        self.set_data(key, value.as_bytes())
    }

    /// Store a UTF-8 string, showing `prompt` if a challenge is raised.
    pub fn set_string_with_prompt(&self, key: &str, value: &str, prompt: Option<&str>) -> bool {
        self.set_data_with_prompt(key, value.as_bytes(), prompt)
    }

    // ---- Read ----

    /// Read the value of `key`; `Ok(None)` when nothing matches.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), fields(service = %self.config.service)))]
    pub fn try_get(&self, key: &str, prompt: Option<&str>) -> KeychainResult<Option<Vec<u8>>> {
        let query = self
            .entry_query(key)?
            .prompt(prompt)
            .returning(Returning::Data);

        match self.backend.copy_matching(&query) {
            Ok(MatchOutput::Data(data)) => Ok(Some(data)),
            Ok(other) => Err(unexpected_output(other)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Read the value of `key`, reporting a missing entry as `NotFound`.
    pub fn fetch_data(&self, key: &str, prompt: Option<&str>) -> KeychainResult<Vec<u8>> {
        self.try_get(key, prompt)?
            .ok_or_else(KeychainError::not_found)
    }

    /// Read a UTF-8 string, reporting a missing entry as `NotFound`.
    ///
    /// # Errors
    /// `Decode` if the stored bytes are not UTF-8.
    pub fn fetch_string(&self, key: &str, prompt: Option<&str>) -> KeychainResult<String> {
        let data = self.fetch_data(key, prompt)?;
        String::from_utf8(data).map_err(|_| {
            KeychainError::new(
                KeychainErrorCode::Decode,
                format!("entry '{}' is not valid UTF-8", key),
            )
        })
    }

    /// Read bytes; `None` on any failure.
    pub fn data(&self, key: &str) -> Option<Vec<u8>> {
        self.data_with_prompt(key, None)
    }

    /// Read bytes, showing `prompt` if a challenge is raised.
    pub fn data_with_prompt(&self, key: &str, prompt: Option<&str>) -> Option<Vec<u8>> {
        self.try_get(key, prompt).unwrap_or_else(|_err| {
            #[cfg(feature = "tracing")]
            tracing::debug!("read failed: {_err}");
            None
        })
    }

    /// Read a UTF-8 string; `None` on any failure.
    pub fn string(&self, key: &str) -> Option<String> {
        self.string_with_prompt(key, None)
    }

    /// Read a UTF-8 string, showing `prompt` if a challenge is raised.
    pub fn string_with_prompt(&self, key: &str, prompt: Option<&str>) -> Option<String> {
        self.data_with_prompt(key, prompt)
            .and_then(|data| String::from_utf8(data).ok())
    }

    // ---- Delete ----

    /// Remove `key`. A missing entry counts as success.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), fields(service = %self.config.service)))]
    pub fn try_delete(&self, key: &str) -> KeychainResult<()> {
        match self.backend.delete(&self.entry_query(key)?) {
            Err(err) if err.is_not_found() => Ok(()),
            result => result,
        }
    }

    /// Remove `key`. True on success or when nothing was stored.
    pub fn delete_entry(&self, key: &str) -> bool {
        self.try_delete(key).is_ok()
    }

    /// Remove every entry in this scope, one at a time.
    ///
    /// Individual failures are logged and skipped. Returns how many entries
    /// were removed.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), fields(service = %self.config.service)))]
    pub fn try_clear_all(&self) -> KeychainResult<usize> {
        let mut removed = 0;
        for key in self.try_keys()? {
            match self.backend.delete(&self.entry_query(&key)?) {
                Ok(()) => removed += 1,
                Err(err) if err.is_not_found() => {}
                Err(_err) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!("failed to delete entry '{key}': {_err}");
                }
            }
        }
        Ok(removed)
    }

    /// Remove every entry in this scope, best effort.
    pub fn clear_all(&self) {
        if let Err(_err) = self.try_clear_all() {
            #[cfg(feature = "tracing")]
            tracing::warn!("clear all failed: {_err}");
        }
    }

    // ---- Inspect ----

    /// Whether `key` holds a value.
    ///
    /// Uses the read path, so an access-controlled entry may raise a
    /// challenge.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), fields(service = %self.config.service)))]
    pub fn try_has_value(&self, key: &str) -> KeychainResult<bool> {
        let query = self.entry_query(key)?.returning(Returning::Nothing);
        match self.backend.copy_matching(&query) {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Whether `key` holds a value; false on any failure.
    pub fn has_value(&self, key: &str) -> bool {
        self.try_has_value(key).unwrap_or(false)
    }

    /// Every key in this scope, in no particular order.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), fields(service = %self.config.service)))]
    pub fn try_keys(&self) -> KeychainResult<Vec<String>> {
        let query = self
            .scope_query()
            .returning(Returning::Attributes)
            .limit(MatchLimit::All);

        match self.backend.copy_matching(&query) {
            Ok(MatchOutput::Attributes(items)) => {
                Ok(items.into_iter().filter_map(|item| item.account).collect())
            }
            Ok(other) => Err(unexpected_output(other)),
            Err(err) if err.is_not_found() => Ok(Vec::new()),
            Err(err) => Err(err),
        }
    }

    /// Every key in this scope; empty on failure.
    pub fn keys(&self) -> Vec<String> {
        self.try_keys().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessibility::Accessibility;
    use crate::backend::{ChallengeOutcome, MemoryKeychain, StaticAuthenticator};
    use crate::config::AuthenticationContext;

    fn store_on(backend: Arc<MemoryKeychain>, config: StoreConfig) -> SecureStore {
        SecureStore::open_with_backend(config, backend).unwrap()
    }

    fn memory_store(service: &str) -> SecureStore {
        store_on(Arc::new(MemoryKeychain::new()), StoreConfig::new(service))
    }

    #[test]
    fn test_construction_validates() {
        let backend: Arc<dyn KeychainBackend> = Arc::new(MemoryKeychain::new());
        let err = SecureStore::open_with_backend(StoreConfig::new(""), backend.clone())
            .unwrap_err();
        assert_eq!(err.code, KeychainErrorCode::WrongParameter);

        let err = SecureStore::open_with_backend(
            StoreConfig::new("svc").with_access_group(""),
            backend,
        )
        .unwrap_err();
        assert_eq!(err.code, KeychainErrorCode::WrongParameter);
    }

    #[test]
    fn test_set_get_roundtrip() {
        let store = memory_store("svc");
        assert!(store.set_data("blob", &[0, 1, 2, 255]));
        assert_eq!(store.data("blob"), Some(vec![0, 1, 2, 255]));
    }

    #[test]
    fn test_overwrite() {
        let store = memory_store("svc");
        assert!(store.set_string("token", "v1"));
        assert!(store.set_string("token", "v2"));
        assert_eq!(store.string("token").as_deref(), Some("v2"));
        assert_eq!(store.keys(), vec!["token".to_string()]);
    }

    #[test]
    fn test_overwrite_updates_accessibility() {
        let backend = Arc::new(MemoryKeychain::new());
        let first = store_on(backend.clone(), StoreConfig::new("svc"));
        assert!(first.set_string("token", "v1"));

        let second = store_on(
            backend.clone(),
            StoreConfig::new("svc").with_accessibility(Accessibility::WhenUnlocked),
        );
        assert!(second.set_string("token", "v2"));

        backend.lock().unwrap();
        let err = first.try_get("token", None).unwrap_err();
        assert_eq!(err.code, KeychainErrorCode::InteractionNotAllowed);
    }

    #[test]
    fn test_empty_key_rejected() {
        let store = memory_store("svc");
        assert!(!store.set_string("", "x"));
        assert_eq!(
            store.try_get("", None).unwrap_err().code,
            KeychainErrorCode::WrongParameter
        );
    }

    #[test]
    fn test_missing_entry() {
        let store = memory_store("svc");
        assert_eq!(store.try_get("missing", None).unwrap(), None);
        assert!(store.fetch_data("missing", None).unwrap_err().is_not_found());
        assert_eq!(store.data("missing"), None);
        assert!(!store.has_value("missing"));
    }

    #[test]
    fn test_fetch_string_decode_error() {
        let store = memory_store("svc");
        assert!(store.set_data("bin", &[0xff, 0xfe]));
        let err = store.fetch_string("bin", None).unwrap_err();
        assert_eq!(err.code, KeychainErrorCode::Decode);
        assert_eq!(store.string("bin"), None);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let store = memory_store("svc");
        assert!(store.delete_entry("never-set"));
        assert!(store.set_string("token", "x"));
        assert!(store.delete_entry("token"));
        assert!(store.delete_entry("token"));
        assert_eq!(store.data("token"), None);
    }

    #[test]
    fn test_clear_all_is_scoped() {
        let backend = Arc::new(MemoryKeychain::new());
        let a = store_on(backend.clone(), StoreConfig::new("svc.a"));
        let b = store_on(backend, StoreConfig::new("svc.b"));

        assert!(a.set_string("one", "1"));
        assert!(a.set_string("two", "2"));
        assert!(b.set_string("one", "other"));

        assert_eq!(a.try_clear_all().unwrap(), 2);
        assert!(a.keys().is_empty());
        assert_eq!(b.string("one").as_deref(), Some("other"));
    }

    #[test]
    fn test_access_control_unavailable() {
        let backend = Arc::new(MemoryKeychain::new().with_capabilities(Capabilities {
            access_control: false,
            key_pairs: false,
        }));
        let store = store_on(backend, StoreConfig::new("svc").with_access_control(true));

        let err = store.try_set("token", b"x", None).unwrap_err();
        assert_eq!(err.code, KeychainErrorCode::NotAvailable);
        assert!(err.message.contains("not available on this platform"));
    }

    #[test]
    fn test_access_control_write_replaces_entry() {
        let backend = Arc::new(MemoryKeychain::new());
        let store = store_on(
            backend.clone(),
            StoreConfig::new("svc").with_access_control(true),
        );

        assert!(store.set_string_with_prompt("token", "v1", Some("Save")));
        assert!(store.set_string_with_prompt("token", "v2", Some("Save")));
        assert_eq!(
            store.string_with_prompt("token", Some("Read")).as_deref(),
            Some("v2")
        );
        assert_eq!(backend.last_prompt().as_deref(), Some("Read"));
        assert_eq!(backend.len(), 1);
    }

    #[test]
    fn test_failed_protected_overwrite_keeps_value() {
        let backend = Arc::new(MemoryKeychain::new());
        let store = store_on(
            backend.clone(),
            StoreConfig::new("svc")
                .with_accessibility(Accessibility::WhenUnlocked)
                .with_access_control(true),
        );
        assert!(store.set_string("token", "v1"));

        backend.lock().unwrap();
        assert!(!store.set_string("token", "v2"));
        backend.unlock().unwrap();

        assert_eq!(store.string("token").as_deref(), Some("v1"));
        assert_eq!(backend.len(), 1);
    }

    #[test]
    fn test_declined_protected_overwrite_keeps_value() {
        // Answers are popped from the back: cancel the overwrite, approve the read.
        let answers = Arc::new(std::sync::Mutex::new(vec![
            ChallengeOutcome::Approved,
            ChallengeOutcome::Cancelled,
        ]));
        let backend = Arc::new(MemoryKeychain::new().with_authenticator(
            move |_: Option<&str>, _: crate::accessibility::AccessControlPolicy| {
                answers
                    .lock()
                    .unwrap()
                    .pop()
                    .unwrap_or(ChallengeOutcome::Approved)
            },
        ));
        let store = store_on(
            backend.clone(),
            StoreConfig::new("svc").with_access_control(true),
        );
        assert!(store.set_string("token", "v1"));

        let err = store.try_set("token", b"v2", Some("Replace")).unwrap_err();
        assert_eq!(err.code, KeychainErrorCode::UserCanceled);
        assert_eq!(store.string("token").as_deref(), Some("v1"));
        assert_eq!(backend.challenge_count(), 2);
    }

    #[test]
    fn test_has_value_goes_through_challenge() {
        let backend = Arc::new(
            MemoryKeychain::new().with_authenticator(StaticAuthenticator(ChallengeOutcome::Denied)),
        );
        let store = store_on(
            backend.clone(),
            StoreConfig::new("svc").with_access_control(true),
        );
        assert!(store.set_string("token", "x"));

        let err = store.try_has_value("token").unwrap_err();
        assert_eq!(err.code, KeychainErrorCode::AuthenticationFailed);
        assert!(!store.has_value("token"));
        assert_eq!(backend.challenge_count(), 2);
    }

    #[test]
    fn test_non_interactive_context() {
        let backend = Arc::new(MemoryKeychain::new());
        let writer = store_on(
            backend.clone(),
            StoreConfig::new("svc").with_access_control(true),
        );
        assert!(writer.set_string("token", "x"));

        let reader = store_on(
            backend.clone(),
            StoreConfig::new("svc")
                .with_access_control(true)
                .with_authentication(AuthenticationContext::non_interactive()),
        );
        let err = reader.fetch_string("token", Some("Unlock")).unwrap_err();
        assert_eq!(err.code, KeychainErrorCode::InteractionNotAllowed);
        assert_eq!(backend.challenge_count(), 0);
    }
}
