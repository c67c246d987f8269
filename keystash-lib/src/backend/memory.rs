//! In-memory keychain emulation.
//!
//! Reproduces the observable contract of a platform keychain inside the
//! process: the native status vocabulary, access groups and entitlements,
//! accessibility tiers against a simulated lock state, access-control
//! challenges, and RSA key generation. Nothing is persisted and nothing is
//! encrypted at rest.
//!
//! # Thread Safety
//!
//! Items and device state sit behind `RwLock`s. Lock poisoning is reported
//! as an error rather than a panic.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use rand::rngs::OsRng;
use rsa::pkcs1::{EncodeRsaPrivateKey, EncodeRsaPublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Encrypt, Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use super::{Capabilities, ItemAttributes, KeychainBackend, MatchOutput};
use crate::accessibility::{AccessControl, AccessControlPolicy, Accessibility};
use crate::errors::{KeychainError, KeychainErrorCode, KeychainResult};
use crate::key_handle::{KeyHandle, KeyOperations};
use crate::key_pair::KeyClass;
use crate::query::{AttributeUpdate, ItemClass, KeyPairRequest, MatchLimit, Query, Returning};

/// Outcome of an access-control challenge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChallengeOutcome {
    /// The user authenticated.
    Approved,
    /// Authentication failed.
    Denied,
    /// The user dismissed the prompt.
    Cancelled,
}

/// Answers access-control challenges raised by [`MemoryKeychain`].
pub trait Authenticator: Send + Sync {
    /// Run one challenge showing `prompt`.
    fn challenge(&self, prompt: Option<&str>, policy: AccessControlPolicy) -> ChallengeOutcome;
}

impl<F> Authenticator for F
where
    F: Fn(Option<&str>, AccessControlPolicy) -> ChallengeOutcome + Send + Sync,
{
    fn challenge(&self, prompt: Option<&str>, policy: AccessControlPolicy) -> ChallengeOutcome {
        self(prompt, policy)
    }
}

/// Authenticator that always answers the same way.
#[derive(Clone, Copy, Debug)]
pub struct StaticAuthenticator(pub ChallengeOutcome);

impl Authenticator for StaticAuthenticator {
    fn challenge(&self, _prompt: Option<&str>, _policy: AccessControlPolicy) -> ChallengeOutcome {
        self.0
    }
}

#[derive(Clone)]
enum RsaMaterial {
    Public(RsaPublicKey),
    Private(RsaPrivateKey),
}

/// Key handle backed by in-memory RSA material.
struct MemoryKey {
    material: Arc<RsaMaterial>,
}

fn crypto_error(err: rsa::Error) -> KeychainError {
    KeychainError::new(
        KeychainErrorCode::Decode,
        format!("RSA operation failed: {}", err),
    )
}

fn wrong_half(operation: &str) -> KeychainError {
    KeychainError::wrong_parameter(format!("{} is not supported by this key class", operation))
}

impl KeyOperations for MemoryKey {
    fn key_class(&self) -> KeyClass {
        match self.material.as_ref() {
            RsaMaterial::Public(_) => KeyClass::Public,
            RsaMaterial::Private(_) => KeyClass::Private,
        }
    }

    fn size_in_bits(&self) -> usize {
        match self.material.as_ref() {
            RsaMaterial::Public(key) => key.size() * 8,
            RsaMaterial::Private(key) => key.size() * 8,
        }
    }

    fn external_representation(&self) -> Option<Vec<u8>> {
        match self.material.as_ref() {
            RsaMaterial::Public(key) => key.to_pkcs1_der().ok().map(|doc| doc.as_bytes().to_vec()),
            RsaMaterial::Private(key) => key.to_pkcs1_der().ok().map(|doc| doc.as_bytes().to_vec()),
        }
    }

    fn sign(&self, message: &[u8]) -> KeychainResult<Vec<u8>> {
        match self.material.as_ref() {
            RsaMaterial::Private(key) => key
                .sign(Pkcs1v15Sign::new::<Sha256>(), &Sha256::digest(message))
                .map_err(crypto_error),
            RsaMaterial::Public(_) => Err(wrong_half("signing")),
        }
    }

    fn verify(&self, message: &[u8], signature: &[u8]) -> KeychainResult<bool> {
        match self.material.as_ref() {
            RsaMaterial::Public(key) => {
                match key.verify(
                    Pkcs1v15Sign::new::<Sha256>(),
                    &Sha256::digest(message),
                    signature,
                ) {
                    Ok(()) => Ok(true),
                    Err(rsa::Error::Verification) => Ok(false),
                    Err(err) => Err(crypto_error(err)),
                }
            }
            RsaMaterial::Private(_) => Err(wrong_half("verification")),
        }
    }

    fn encrypt(&self, plaintext: &[u8]) -> KeychainResult<Vec<u8>> {
        match self.material.as_ref() {
            RsaMaterial::Public(key) => key
                .encrypt(&mut OsRng, Pkcs1v15Encrypt, plaintext)
                .map_err(crypto_error),
            RsaMaterial::Private(_) => Err(wrong_half("encryption")),
        }
    }

    fn decrypt(&self, ciphertext: &[u8]) -> KeychainResult<Vec<u8>> {
        match self.material.as_ref() {
            RsaMaterial::Private(key) => key
                .decrypt(Pkcs1v15Encrypt, ciphertext)
                .map_err(crypto_error),
            RsaMaterial::Public(_) => Err(wrong_half("decryption")),
        }
    }
}

enum Payload {
    Secret(Zeroizing<Vec<u8>>),
    Key(Arc<RsaMaterial>),
}

/// One stored item.
struct StoredItem {
    class: ItemClass,
    service: Option<String>,
    access_group: Option<String>,
    account: Option<String>,
    application_tag: Option<Vec<u8>>,
    accessibility: Accessibility,
    access_control: Option<AccessControl>,
    payload: Payload,
}

impl StoredItem {
    fn matches(&self, query: &Query) -> bool {
        fn field_matches<T: PartialEq + ?Sized>(wanted: Option<&T>, actual: Option<&T>) -> bool {
            wanted.map_or(true, |wanted| actual == Some(wanted))
        }

        self.class == query.class
            && field_matches(query.service.as_deref(), self.service.as_deref())
            && field_matches(query.access_group.as_deref(), self.access_group.as_deref())
            && field_matches(query.account.as_deref(), self.account.as_deref())
            && field_matches(
                query.application_tag.as_deref(),
                self.application_tag.as_deref(),
            )
    }

    fn attributes(&self) -> ItemAttributes {
        ItemAttributes {
            account: self.account.clone(),
            service: self.service.clone(),
            access_group: self.access_group.clone(),
            application_tag: self.application_tag.clone(),
            accessibility: Some(self.accessibility),
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct DeviceState {
    locked: bool,
    unlocked_since_boot: bool,
}

/// In-memory implementation of the keychain primitives.
///
/// **Warning**: This is for testing and for hosts without a native store.
/// Items are not encrypted and are lost when the process exits.
pub struct MemoryKeychain {
    items: RwLock<Vec<StoredItem>>,
    device: RwLock<DeviceState>,
    authorized_groups: Vec<String>,
    capabilities: Capabilities,
    authenticator: Box<dyn Authenticator>,
    challenges: AtomicUsize,
    last_prompt: Mutex<Option<String>>,
}

/// Helper function to handle lock poisoning gracefully.
fn lock_error(context: &str) -> KeychainError {
    KeychainError::unknown(format!("MemoryKeychain: lock poisoned during {}", context))
}

impl MemoryKeychain {
    /// Create an unlocked keychain with every capability and an
    /// authenticator that approves every challenge.
    pub fn new() -> Self {
        Self {
            items: RwLock::new(Vec::new()),
            device: RwLock::new(DeviceState {
                locked: false,
                unlocked_since_boot: true,
            }),
            authorized_groups: Vec::new(),
            capabilities: Capabilities {
                access_control: true,
                key_pairs: true,
            },
            authenticator: Box::new(StaticAuthenticator(ChallengeOutcome::Approved)),
            challenges: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
        }
    }

    /// Restrict the access groups this process is entitled to.
    ///
    /// The first group becomes the default for items added without one.
    pub fn with_access_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.authorized_groups = groups.into_iter().map(Into::into).collect();
        self
    }

    /// Override the reported capabilities.
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Answer challenges with `authenticator`.
    pub fn with_authenticator(mut self, authenticator: impl Authenticator + 'static) -> Self {
        self.authenticator = Box::new(authenticator);
        self
    }

    /// Simulate locking the device.
    pub fn lock(&self) -> KeychainResult<()> {
        self.device.write().map_err(|_| lock_error("lock"))?.locked = true;
        Ok(())
    }

    /// Simulate unlocking the device.
    pub fn unlock(&self) -> KeychainResult<()> {
        let mut device = self.device.write().map_err(|_| lock_error("unlock"))?;
        device.locked = false;
        device.unlocked_since_boot = true;
        Ok(())
    }

    /// Simulate a restart: locked, and not unlocked since.
    pub fn reboot(&self) -> KeychainResult<()> {
        let mut device = self.device.write().map_err(|_| lock_error("reboot"))?;
        device.locked = true;
        device.unlocked_since_boot = false;
        Ok(())
    }

    /// Number of challenges raised so far.
    pub fn challenge_count(&self) -> usize {
        self.challenges.load(Ordering::SeqCst)
    }

    /// Prompt shown by the most recent challenge.
    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().ok().and_then(|prompt| prompt.clone())
    }

    /// Get the number of stored items.
    ///
    /// Returns 0 if the lock is poisoned.
    pub fn len(&self) -> usize {
        self.items.read().map(|items| items.len()).unwrap_or(0)
    }

    /// Check if no items are stored.
    ///
    /// Returns true if the lock is poisoned.
    pub fn is_empty(&self) -> bool {
        self.items.read().map(|items| items.is_empty()).unwrap_or(true)
    }

    fn check_entitlement(&self, group: Option<&str>) -> KeychainResult<()> {
        match group {
            Some(group)
                if !self.authorized_groups.is_empty()
                    && !self.authorized_groups.iter().any(|g| g == group) =>
            {
                Err(KeychainError::new(
                    KeychainErrorCode::MissingEntitlement,
                    format!("access group '{}' is not authorized for this process", group),
                ))
            }
            _ => Ok(()),
        }
    }

    fn resolve_group(&self, group: Option<&str>) -> Option<String> {
        group
            .map(str::to_string)
            .or_else(|| self.authorized_groups.first().cloned())
    }

    fn check_unlocked(&self, accessibility: Accessibility) -> KeychainResult<()> {
        let device = *self.device.read().map_err(|_| lock_error("device state"))?;
        if accessibility.permits(device.locked, device.unlocked_since_boot) {
            Ok(())
        } else {
            Err(KeychainError::new(
                KeychainErrorCode::InteractionNotAllowed,
                format!("item is not accessible ({}) in the current device state", accessibility),
            ))
        }
    }

    fn challenge(&self, control: &AccessControl, query: &Query) -> KeychainResult<()> {
        if !query.interaction_allowed() {
            return Err(KeychainError::from_code(
                KeychainErrorCode::InteractionNotAllowed,
            ));
        }

        self.challenges.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_prompt.lock() {
            *last = query.prompt.clone();
        }

        match self
            .authenticator
            .challenge(query.prompt.as_deref(), control.policy)
        {
            ChallengeOutcome::Approved => Ok(()),
            ChallengeOutcome::Denied => Err(KeychainError::from_code(
                KeychainErrorCode::AuthenticationFailed,
            )),
            ChallengeOutcome::Cancelled => {
                Err(KeychainError::from_code(KeychainErrorCode::UserCanceled))
            }
        }
    }

    /// Gate access to an item's protected content.
    fn release(&self, item: &StoredItem, query: &Query) -> KeychainResult<()> {
        self.check_unlocked(item.accessibility)?;
        match &item.access_control {
            Some(control) => self.challenge(control, query),
            None => Ok(()),
        }
    }
}

impl Default for MemoryKeychain {
    fn default() -> Self {
        Self::new()
    }
}

impl KeychainBackend for MemoryKeychain {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn add(&self, query: &Query) -> KeychainResult<()> {
        self.check_entitlement(query.access_group.as_deref())?;

        if query.access_control.is_some() && !self.capabilities.access_control {
            return Err(KeychainError::unavailable("access control"));
        }
        let value = match (&query.class, &query.account, &query.value) {
            (ItemClass::GenericPassword, Some(_), Some(value)) => value.clone(),
            _ => {
                return Err(KeychainError::wrong_parameter(
                    "add requires a generic-password class, an account and a value",
                ))
            }
        };

        let accessibility = query
            .access_control
            .map(|control| control.accessibility)
            .or(query.accessibility)
            .unwrap_or_default();
        self.check_unlocked(accessibility)?;

        let item = StoredItem {
            class: query.class,
            service: query.service.clone(),
            access_group: self.resolve_group(query.access_group.as_deref()),
            account: query.account.clone(),
            application_tag: None,
            accessibility,
            access_control: query.access_control,
            payload: Payload::Secret(value),
        };

        let mut items = self.items.write().map_err(|_| lock_error("add"))?;
        let duplicate = items.iter().any(|existing| {
            existing.class == item.class
                && existing.service == item.service
                && existing.access_group == item.access_group
                && existing.account == item.account
        });
        if duplicate {
            return Err(KeychainError::from_code(KeychainErrorCode::DuplicateItem));
        }
        items.push(item);
        Ok(())
    }

    fn update(&self, query: &Query, update: &AttributeUpdate) -> KeychainResult<()> {
        self.check_entitlement(query.access_group.as_deref())?;

        let mut items = self.items.write().map_err(|_| lock_error("update"))?;
        let matched: Vec<usize> = items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.matches(query))
            .map(|(index, _)| index)
            .collect();
        if matched.is_empty() {
            return Err(KeychainError::not_found());
        }

        for &index in &matched {
            self.release(&items[index], query)?;
        }

        for index in matched {
            let item = &mut items[index];
            if let Some(value) = &update.value {
                item.payload = Payload::Secret(value.clone());
            }
            if let Some(accessibility) = update.accessibility {
                if item.access_control.is_none() {
                    item.accessibility = accessibility;
                }
            }
        }
        Ok(())
    }

    fn delete(&self, query: &Query) -> KeychainResult<()> {
        self.check_entitlement(query.access_group.as_deref())?;

        let mut items = self.items.write().map_err(|_| lock_error("delete"))?;
        let before = items.len();
        items.retain(|item| !item.matches(query));
        if items.len() == before {
            Err(KeychainError::not_found())
        } else {
            Ok(())
        }
    }

    fn copy_matching(&self, query: &Query) -> KeychainResult<MatchOutput> {
        self.check_entitlement(query.access_group.as_deref())?;

        let items = self.items.read().map_err(|_| lock_error("copy_matching"))?;
        let mut matches = items.iter().filter(|item| item.matches(query));

        let first = matches.next().ok_or_else(KeychainError::not_found)?;

        match query.returning {
            Returning::Nothing => {
                self.release(first, query)?;
                Ok(MatchOutput::Found)
            }
            Returning::Attributes => {
                let mut attributes = vec![first.attributes()];
                if query.limit == MatchLimit::All {
                    attributes.extend(matches.map(StoredItem::attributes));
                }
                Ok(MatchOutput::Attributes(attributes))
            }
            Returning::Data => {
                if query.limit == MatchLimit::All {
                    return Err(KeychainError::wrong_parameter(
                        "returning data requires a match limit of one",
                    ));
                }
                self.release(first, query)?;
                match &first.payload {
                    Payload::Secret(value) => Ok(MatchOutput::Data(value.to_vec())),
                    Payload::Key(material) => MemoryKey {
                        material: Arc::clone(material),
                    }
                    .external_representation()
                    .map(MatchOutput::Data)
                    .ok_or_else(|| KeychainError::from_code(KeychainErrorCode::Decode)),
                }
            }
            Returning::Reference => {
                self.release(first, query)?;
                match &first.payload {
                    Payload::Key(material) => Ok(MatchOutput::Key(KeyHandle::new(MemoryKey {
                        material: Arc::clone(material),
                    }))),
                    Payload::Secret(_) => Err(KeychainError::wrong_parameter(
                        "generic secrets have no key reference",
                    )),
                }
            }
        }
    }

    fn generate_key_pair(&self, request: &KeyPairRequest) -> KeychainResult<()> {
        if !self.capabilities.key_pairs {
            return Err(KeychainError::unavailable("RSA key pair generation"));
        }
        self.check_entitlement(request.access_group.as_deref())?;

        if request.public_tag.is_empty() || request.private_tag.is_empty() {
            return Err(KeychainError::wrong_parameter("key tags must not be empty"));
        }
        if request.public_tag == request.private_tag {
            return Err(KeychainError::wrong_parameter(
                "public and private key tags must differ",
            ));
        }

        let private_key = RsaPrivateKey::new(&mut OsRng, request.size.bits()).map_err(|err| {
            KeychainError::new(
                KeychainErrorCode::Allocation,
                format!("RSA key generation failed: {}", err),
            )
        })?;
        let public_key = RsaPublicKey::from(&private_key);

        let access_group = self.resolve_group(request.access_group.as_deref());
        let mut items = self.items.write().map_err(|_| lock_error("generate_key_pair"))?;
        let taken = items.iter().any(|item| {
            item.class == ItemClass::Key
                && item.access_group == access_group
                && (item.application_tag.as_deref() == Some(request.public_tag.as_slice())
                    || item.application_tag.as_deref() == Some(request.private_tag.as_slice()))
        });
        if taken {
            return Err(KeychainError::from_code(KeychainErrorCode::DuplicateItem));
        }

        let key_item = |tag: &[u8], material: RsaMaterial| StoredItem {
            class: ItemClass::Key,
            service: None,
            access_group: access_group.clone(),
            account: None,
            application_tag: Some(tag.to_vec()),
            accessibility: Accessibility::default(),
            access_control: None,
            payload: Payload::Key(Arc::new(material)),
        };
        items.push(key_item(&request.public_tag, RsaMaterial::Public(public_key)));
        items.push(key_item(
            &request.private_tag,
            RsaMaterial::Private(private_key),
        ));
        Ok(())
    }
}
