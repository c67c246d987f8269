//! Security framework keychain (macOS / iOS).
//!
//! Each primitive builds one attribute dictionary from the typed [`Query`]
//! and hands it to the matching keychain item call; the `OSStatus` comes
//! back unchanged as the [`KeychainErrorCode`].
//!
//! Adds, access-control objects and key generation go through the safe
//! `security-framework` wrappers. Update, delete and copy-matching need
//! prompts, UI policy and application tags that `ItemSearchOptions` does not
//! carry, so they call the `security-framework-sys` functions directly.

use std::ptr;

use core_foundation::array::{CFArray, CFArrayRef};
use core_foundation::base::{CFType, CFTypeRef, TCFType};
use core_foundation::boolean::CFBoolean;
use core_foundation::data::CFData;
use core_foundation::dictionary::{CFDictionary, CFDictionaryRef};
use core_foundation::error::CFError;
use core_foundation::number::CFNumber;
use core_foundation::string::CFString;
use security_framework::access_control::{ProtectionMode, SecAccessControl};
use security_framework::item::add_item;
use security_framework::key::{Algorithm, SecKey};
use security_framework_sys::base::SecKeyRef;
use security_framework_sys::keychain_item::{SecItemCopyMatching, SecItemDelete, SecItemUpdate};

use super::{Capabilities, ItemAttributes, KeychainBackend, MatchOutput};
use crate::accessibility::{AccessControl, Accessibility};
use crate::errors::{check_status, KeychainError, KeychainErrorCode, KeychainResult};
use crate::key_handle::{KeyHandle, KeyOperations};
use crate::key_pair::KeyClass;
use crate::query::{AttributeUpdate, ItemClass, KeyPairRequest, MatchLimit, Query, Returning};

/// Attribute names exported by `security-framework-sys`.
macro_rules! sec_keys {
    ($($name:ident => $constant:ident),* $(,)?) => {
        mod sec {
            use core_foundation::base::TCFType;
            use core_foundation::string::CFString;

            $(
                pub(super) fn $name() -> CFString {
                    unsafe { CFString::wrap_under_get_rule(security_framework_sys::item::$constant) }
                }
            )*
        }
    };
}

sec_keys! {
    class => kSecClass,
    class_generic_password => kSecClassGenericPassword,
    class_key => kSecClassKey,
    service => kSecAttrService,
    account => kSecAttrAccount,
    access_group => kSecAttrAccessGroup,
    access_control => kSecAttrAccessControl,
    application_tag => kSecAttrApplicationTag,
    key_type => kSecAttrKeyType,
    key_type_rsa => kSecAttrKeyTypeRSA,
    key_size_in_bits => kSecAttrKeySizeInBits,
    key_class => kSecAttrKeyClass,
    key_class_private => kSecAttrKeyClassPrivate,
    is_permanent => kSecAttrIsPermanent,
    private_key_attrs => kSecPrivateKeyAttrs,
    value_data => kSecValueData,
    value_ref => kSecValueRef,
    return_data => kSecReturnData,
    return_attributes => kSecReturnAttributes,
    return_ref => kSecReturnRef,
    match_limit => kSecMatchLimit,
    match_limit_all => kSecMatchLimitAll,
}

// Keys with no binding in security-framework-sys, by their constant values.
const ATTR_ACCESSIBLE: &str = "pdmn";
const USE_OPERATION_PROMPT: &str = "u_OpPrompt";
const USE_AUTHENTICATION_UI: &str = "u_AuthUI";
const USE_AUTHENTICATION_UI_FAIL: &str = "u_AuthUIF";
const MATCH_LIMIT_ONE: &str = "m_LimitOne";

fn framework_error(err: security_framework::base::Error) -> KeychainError {
    KeychainError::from_status(err.code())
}

fn cf_error(err: CFError) -> KeychainError {
    KeychainError::new(
        KeychainErrorCode::from_status(err.code() as i32).unwrap_or(KeychainErrorCode::Unknown),
        err.description().to_string(),
    )
}

fn protection_mode(accessibility: Accessibility) -> KeychainResult<ProtectionMode> {
    match accessibility {
        Accessibility::WhenUnlocked => Ok(ProtectionMode::AccessibleWhenUnlocked),
        Accessibility::WhenUnlockedThisDeviceOnly => {
            Ok(ProtectionMode::AccessibleWhenUnlockedThisDeviceOnly)
        }
        Accessibility::AfterFirstUnlock => Ok(ProtectionMode::AccessibleAfterFirstUnlock),
        Accessibility::AfterFirstUnlockThisDeviceOnly => {
            Ok(ProtectionMode::AccessibleAfterFirstUnlockThisDeviceOnly)
        }
        Accessibility::WhenPasscodeSetThisDeviceOnly => {
            Ok(ProtectionMode::AccessibleWhenPasscodeSetThisDeviceOnly)
        }
        Accessibility::Always | Accessibility::AlwaysThisDeviceOnly => {
            Err(KeychainError::wrong_parameter(format!(
                "accessibility tier {} cannot carry access control",
                accessibility
            )))
        }
    }
}

fn access_control_object(control: &AccessControl) -> KeychainResult<SecAccessControl> {
    SecAccessControl::create_with_protection(
        Some(protection_mode(control.accessibility)?),
        control.policy.flags() as _,
    )
    .map_err(framework_error)
}

/// Builds the attribute dictionary passed to one keychain item call.
#[derive(Default)]
struct Attributes {
    pairs: Vec<(CFString, CFType)>,
}

impl Attributes {
    fn set(&mut self, name: CFString, value: CFType) -> &mut Self {
        self.pairs.push((name, value));
        self
    }

    fn set_str(&mut self, name: CFString, value: &str) -> &mut Self {
        self.set(name, CFString::new(value).as_CFType())
    }

    fn set_data(&mut self, name: CFString, value: &[u8]) -> &mut Self {
        self.set(name, CFData::from_buffer(value).as_CFType())
    }

    fn set_flag(&mut self, name: CFString, value: bool) -> &mut Self {
        self.set(name, CFBoolean::from(value).as_CFType())
    }

    fn build(&self) -> CFDictionary<CFString, CFType> {
        CFDictionary::from_CFType_pairs(&self.pairs)
    }
}

/// Scoping attributes shared by every primitive.
fn scoped(query: &Query) -> Attributes {
    let mut attributes = Attributes::default();
    match query.class {
        ItemClass::GenericPassword => {
            attributes.set(sec::class(), sec::class_generic_password().as_CFType());
        }
        ItemClass::Key => {
            attributes.set(sec::class(), sec::class_key().as_CFType());
            attributes.set(sec::key_type(), sec::key_type_rsa().as_CFType());
        }
    }
    if let Some(service) = &query.service {
        attributes.set_str(sec::service(), service);
    }
    if let Some(group) = &query.access_group {
        attributes.set_str(sec::access_group(), group);
    }
    if let Some(account) = &query.account {
        attributes.set_str(sec::account(), account);
    }
    if let Some(tag) = &query.application_tag {
        attributes.set_data(sec::application_tag(), tag);
    }
    if let Some(prompt) = &query.prompt {
        attributes.set_str(CFString::from_static_string(USE_OPERATION_PROMPT), prompt);
    }
    if !query.interaction_allowed() {
        attributes.set_str(
            CFString::from_static_string(USE_AUTHENTICATION_UI),
            USE_AUTHENTICATION_UI_FAIL,
        );
    }
    attributes
}

type AttributeMap = CFDictionary<CFString, CFType>;

fn string_attribute(map: &AttributeMap, name: &CFString) -> Option<String> {
    map.find(name)
        .and_then(|value| value.downcast::<CFString>())
        .map(|value| value.to_string())
}

fn item_attributes(map: &AttributeMap) -> ItemAttributes {
    ItemAttributes {
        account: string_attribute(map, &sec::account()),
        service: string_attribute(map, &sec::service()),
        access_group: string_attribute(map, &sec::access_group()),
        application_tag: map
            .find(&sec::application_tag())
            .and_then(|value| value.downcast::<CFData>())
            .map(|value| value.bytes().to_vec()),
        accessibility: string_attribute(map, &CFString::from_static_string(ATTR_ACCESSIBLE))
            .map(|value| Accessibility::from_native_value(&value)),
    }
}

/// Key handle over a `SecKey`.
struct AppleKey {
    key: SecKey,
    class: KeyClass,
    bits: usize,
}

impl KeyOperations for AppleKey {
    fn key_class(&self) -> KeyClass {
        self.class
    }

    fn size_in_bits(&self) -> usize {
        self.bits
    }

    fn external_representation(&self) -> Option<Vec<u8>> {
        self.key
            .external_representation()
            .map(|data| data.bytes().to_vec())
    }

    fn sign(&self, message: &[u8]) -> KeychainResult<Vec<u8>> {
        self.key
            .create_signature(Algorithm::RSASignatureMessagePKCS1v15SHA256, message)
            .map_err(cf_error)
    }

    fn verify(&self, message: &[u8], signature: &[u8]) -> KeychainResult<bool> {
        self.key
            .verify_signature(
                Algorithm::RSASignatureMessagePKCS1v15SHA256,
                message,
                signature,
            )
            .map_err(cf_error)
    }

    fn encrypt(&self, plaintext: &[u8]) -> KeychainResult<Vec<u8>> {
        self.key
            .encrypt_data(Algorithm::RSAEncryptionPKCS1, plaintext)
            .map_err(cf_error)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> KeychainResult<Vec<u8>> {
        self.key
            .decrypt_data(Algorithm::RSAEncryptionPKCS1, ciphertext)
            .map_err(cf_error)
    }
}

fn copy_matching_raw(search: &AttributeMap) -> KeychainResult<CFType> {
    let mut result: CFTypeRef = ptr::null();
    check_status(unsafe { SecItemCopyMatching(search.as_concrete_TypeRef(), &mut result) })?;
    if result.is_null() {
        return Err(KeychainError::from_code(KeychainErrorCode::Decode));
    }
    Ok(unsafe { CFType::wrap_under_create_rule(result) })
}

fn as_attribute_map(value: &CFType) -> AttributeMap {
    unsafe { CFDictionary::wrap_under_get_rule(value.as_CFTypeRef() as CFDictionaryRef) }
}

fn key_from_attributes(map: &AttributeMap) -> KeychainResult<KeyHandle> {
    let reference = map
        .find(&sec::value_ref())
        .map(|value| value.as_CFTypeRef())
        .ok_or_else(|| KeychainError::from_code(KeychainErrorCode::Decode))?;
    let key = unsafe { SecKey::wrap_under_get_rule(reference as SecKeyRef) };

    let class = match string_attribute(map, &sec::key_class()) {
        Some(value) if value == sec::key_class_private().to_string() => KeyClass::Private,
        _ => KeyClass::Public,
    };
    let bits = map
        .find(&sec::key_size_in_bits())
        .and_then(|value| value.downcast::<CFNumber>())
        .and_then(|value| value.to_i64())
        .unwrap_or_default() as usize;

    Ok(KeyHandle::new(AppleKey { key, class, bits }))
}

/// The system keychain through the Security framework.
#[derive(Clone, Copy, Debug, Default)]
pub struct AppleKeychain;

impl AppleKeychain {
    /// Create the backend. The keychain itself needs no setup.
    pub fn new() -> Self {
        Self
    }

    fn tag_in_use(&self, tag: &[u8], access_group: Option<&str>) -> KeychainResult<bool> {
        let query = Query::key().application_tag(tag).access_group(access_group);
        match self.copy_matching(&query) {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    fn key_search(tag: &[u8], access_group: Option<&str>) -> AttributeMap {
        scoped(&Query::key().application_tag(tag).access_group(access_group)).build()
    }
}

impl KeychainBackend for AppleKeychain {
    fn name(&self) -> &'static str {
        "apple-keychain"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            access_control: true,
            key_pairs: true,
        }
    }

    fn add(&self, query: &Query) -> KeychainResult<()> {
        let mut attributes = scoped(query);
        if let Some(value) = &query.value {
            attributes.set_data(sec::value_data(), value);
        }
        match (&query.access_control, query.accessibility) {
            (Some(control), _) => {
                let object = access_control_object(control)?;
                attributes.set(sec::access_control(), object.as_CFType());
            }
            (None, Some(accessibility)) => {
                attributes.set_str(
                    CFString::from_static_string(ATTR_ACCESSIBLE),
                    accessibility.native_value(),
                );
            }
            (None, None) => {}
        }

        add_item(attributes.build().to_untyped()).map_err(framework_error)
    }

    fn update(&self, query: &Query, update: &AttributeUpdate) -> KeychainResult<()> {
        let search = scoped(query).build();
        let mut changes = Attributes::default();
        if let Some(value) = &update.value {
            changes.set_data(sec::value_data(), value);
        }
        if let Some(accessibility) = update.accessibility {
            changes.set_str(
                CFString::from_static_string(ATTR_ACCESSIBLE),
                accessibility.native_value(),
            );
        }
        let changes = changes.build();
        check_status(unsafe {
            SecItemUpdate(search.as_concrete_TypeRef(), changes.as_concrete_TypeRef())
        })
    }

    fn delete(&self, query: &Query) -> KeychainResult<()> {
        let search = scoped(query).build();
        check_status(unsafe { SecItemDelete(search.as_concrete_TypeRef()) })
    }

    fn copy_matching(&self, query: &Query) -> KeychainResult<MatchOutput> {
        let mut attributes = scoped(query);
        match query.limit {
            MatchLimit::One => attributes.set(
                sec::match_limit(),
                CFString::from_static_string(MATCH_LIMIT_ONE).as_CFType(),
            ),
            MatchLimit::All => attributes.set(sec::match_limit(), sec::match_limit_all().as_CFType()),
        };

        match query.returning {
            Returning::Nothing => {
                let search = attributes.build();
                check_status(unsafe {
                    SecItemCopyMatching(search.as_concrete_TypeRef(), ptr::null_mut())
                })?;
                Ok(MatchOutput::Found)
            }
            Returning::Data => {
                attributes.set_flag(sec::return_data(), true);
                copy_matching_raw(&attributes.build())?
                    .downcast::<CFData>()
                    .map(|data| MatchOutput::Data(data.bytes().to_vec()))
                    .ok_or_else(|| KeychainError::from_code(KeychainErrorCode::Decode))
            }
            Returning::Attributes => {
                attributes.set_flag(sec::return_attributes(), true);
                let result = copy_matching_raw(&attributes.build())?;
                let items = if result.type_of() == CFArray::<CFType>::type_id() {
                    let array: CFArray<AttributeMap> =
                        unsafe { CFArray::wrap_under_get_rule(result.as_CFTypeRef() as CFArrayRef) };
                    array.iter().map(|map| item_attributes(&map)).collect()
                } else {
                    vec![item_attributes(&as_attribute_map(&result))]
                };
                Ok(MatchOutput::Attributes(items))
            }
            Returning::Reference => {
                attributes
                    .set_flag(sec::return_ref(), true)
                    .set_flag(sec::return_attributes(), true);
                let result = copy_matching_raw(&attributes.build())?;
                key_from_attributes(&as_attribute_map(&result)).map(MatchOutput::Key)
            }
        }
    }

    fn generate_key_pair(&self, request: &KeyPairRequest) -> KeychainResult<()> {
        let group = request.access_group.as_deref();
        for tag in [&request.public_tag, &request.private_tag] {
            if self.tag_in_use(tag, group)? {
                return Err(KeychainError::from_code(KeychainErrorCode::DuplicateItem));
            }
        }

        let mut private_attributes = Attributes::default();
        private_attributes
            .set_flag(sec::is_permanent(), true)
            .set_data(sec::application_tag(), &request.private_tag);
        if let Some(group) = group {
            private_attributes.set_str(sec::access_group(), group);
        }

        let mut parameters = Attributes::default();
        parameters
            .set(sec::key_type(), sec::key_type_rsa().as_CFType())
            .set(
                sec::key_size_in_bits(),
                CFNumber::from(request.size.bits() as i64).as_CFType(),
            )
            .set(
                sec::private_key_attrs(),
                private_attributes.build().as_CFType(),
            );

        let private_key = SecKey::generate(parameters.build().to_untyped()).map_err(cf_error)?;
        let public_key = private_key
            .public_key()
            .ok_or_else(|| KeychainError::from_code(KeychainErrorCode::Decode))?;

        // The public half is only derived, so it is stored as its own item.
        let mut public_item = Attributes::default();
        public_item
            .set(sec::class(), sec::class_key().as_CFType())
            .set(sec::value_ref(), public_key.as_CFType())
            .set_flag(sec::is_permanent(), true)
            .set_data(sec::application_tag(), &request.public_tag);
        if let Some(group) = group {
            public_item.set_str(sec::access_group(), group);
        }

        if let Err(err) = add_item(public_item.build().to_untyped()) {
            let search = Self::key_search(&request.private_tag, group);
            let _ = check_status(unsafe { SecItemDelete(search.as_concrete_TypeRef()) });
            return Err(framework_error(err));
        }
        Ok(())
    }
}
