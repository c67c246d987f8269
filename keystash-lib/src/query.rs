//! Typed native queries.
//!
//! A [`Query`] names every attribute the store may send to the native
//! service. Backends translate it into their own wire shape (a
//! `CFDictionary`, a Secret Service attribute map, ...) at the call site of
//! each primitive; nothing outside `backend/` sees that shape.

use zeroize::Zeroizing;

use crate::accessibility::{AccessControl, Accessibility};
use crate::config::AuthenticationContext;
use crate::key_pair::RsaKeySize;

/// Class of a stored item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ItemClass {
    /// Generic secret (`kSecClassGenericPassword`).
    GenericPassword,
    /// Asymmetric key (`kSecClassKey`).
    Key,
}

/// How many matches a copy-matching call returns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum MatchLimit {
    /// At most one item.
    #[default]
    One,
    /// Every matching item.
    All,
}

/// What a copy-matching call hands back.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Returning {
    /// Only whether something matched.
    #[default]
    Nothing,
    /// The stored secret bytes.
    Data,
    /// Attributes of every match.
    Attributes,
    /// A live key handle.
    Reference,
}

/// A native query, built per call.
#[derive(Clone, Debug)]
pub struct Query {
    /// Item class.
    pub class: ItemClass,
    /// Service namespace (generic secrets only).
    pub service: Option<String>,
    /// Sharing group; `None` searches every group the caller may use.
    pub access_group: Option<String>,
    /// Entry key (the native account attribute).
    pub account: Option<String>,
    /// Key tag (keys only).
    pub application_tag: Option<Vec<u8>>,
    /// Secret value for add.
    pub value: Option<Zeroizing<Vec<u8>>>,
    /// Accessibility tier for add, when access control is off.
    pub accessibility: Option<Accessibility>,
    /// Access-control requirement for add.
    pub access_control: Option<AccessControl>,
    /// Message shown by an authentication challenge.
    pub prompt: Option<String>,
    /// What copy-matching returns.
    pub returning: Returning,
    /// How many matches copy-matching returns.
    pub limit: MatchLimit,
    /// Authentication context applied to challenges.
    pub authentication: Option<AuthenticationContext>,
}

impl Query {
    fn with_class(class: ItemClass) -> Self {
        Self {
            class,
            service: None,
            access_group: None,
            account: None,
            application_tag: None,
            value: None,
            accessibility: None,
            access_control: None,
            prompt: None,
            returning: Returning::Nothing,
            limit: MatchLimit::One,
            authentication: None,
        }
    }

    /// Query over generic secrets.
    pub fn generic_password() -> Self {
        Self::with_class(ItemClass::GenericPassword)
    }

    /// Query over asymmetric keys.
    pub fn key() -> Self {
        Self::with_class(ItemClass::Key)
    }

    /// Set the service namespace.
    pub fn service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    /// Set the access group, if any.
    pub fn access_group(mut self, group: Option<&str>) -> Self {
        self.access_group = group.map(str::to_string);
        self
    }

    /// Set the entry key.
    pub fn account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }

    /// Set the key tag.
    pub fn application_tag(mut self, tag: impl Into<Vec<u8>>) -> Self {
        self.application_tag = Some(tag.into());
        self
    }

    /// Set the secret value.
    pub fn value(mut self, value: &[u8]) -> Self {
        self.value = Some(Zeroizing::new(value.to_vec()));
        self
    }

    /// Set the accessibility tier.
    pub fn accessibility(mut self, accessibility: Accessibility) -> Self {
        self.accessibility = Some(accessibility);
        self
    }

    /// Set the access-control requirement.
    pub fn access_control(mut self, control: AccessControl) -> Self {
        self.access_control = Some(control);
        self
    }

    /// Set the challenge prompt, if any.
    pub fn prompt(mut self, prompt: Option<&str>) -> Self {
        self.prompt = prompt.map(str::to_string);
        self
    }

    /// Choose what copy-matching returns.
    pub fn returning(mut self, returning: Returning) -> Self {
        self.returning = returning;
        self
    }

    /// Choose how many matches copy-matching returns.
    pub fn limit(mut self, limit: MatchLimit) -> Self {
        self.limit = limit;
        self
    }

    /// Attach an authentication context.
    pub fn authentication(mut self, context: AuthenticationContext) -> Self {
        self.authentication = Some(context);
        self
    }

    /// Whether the caller may be prompted while this query runs.
    pub fn interaction_allowed(&self) -> bool {
        self.authentication
            .map(|context| context.interaction_allowed)
            .unwrap_or(true)
    }
}

/// Attributes replaced by an update.
#[derive(Clone, Debug, Default)]
pub struct AttributeUpdate {
    /// New secret value.
    pub value: Option<Zeroizing<Vec<u8>>>,
    /// New accessibility tier.
    pub accessibility: Option<Accessibility>,
}

impl AttributeUpdate {
    /// Replace the value and accessibility of an item.
    pub fn new(value: &[u8], accessibility: Accessibility) -> Self {
        Self {
            value: Some(Zeroizing::new(value.to_vec())),
            accessibility: Some(accessibility),
        }
    }

    /// Replace only the value, leaving protection attributes alone.
    pub fn value_only(value: &[u8]) -> Self {
        Self {
            value: Some(Zeroizing::new(value.to_vec())),
            accessibility: None,
        }
    }
}

/// A single RSA key-pair generation request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyPairRequest {
    /// Modulus size.
    pub size: RsaKeySize,
    /// Tag of the public key.
    pub public_tag: Vec<u8>,
    /// Tag of the private key.
    pub private_tag: Vec<u8>,
    /// Access group both keys are created in.
    pub access_group: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessibility::AccessControlPolicy;

    #[test]
    fn test_generic_password_query() {
        let query = Query::generic_password()
            .service("svc")
            .access_group(Some("group"))
            .account("token")
            .value(b"abc")
            .accessibility(Accessibility::Always)
            .prompt(Some("Unlock"));

        assert_eq!(query.class, ItemClass::GenericPassword);
        assert_eq!(query.service.as_deref(), Some("svc"));
        assert_eq!(query.access_group.as_deref(), Some("group"));
        assert_eq!(query.account.as_deref(), Some("token"));
        assert_eq!(query.value.as_deref().map(Vec::as_slice), Some(&b"abc"[..]));
        assert_eq!(query.prompt.as_deref(), Some("Unlock"));
        assert_eq!(query.returning, Returning::Nothing);
        assert_eq!(query.limit, MatchLimit::One);
    }

    #[test]
    fn test_key_query() {
        let query = Query::key()
            .application_tag(b"pub".to_vec())
            .access_control(AccessControl::new(
                Accessibility::WhenUnlocked,
                AccessControlPolicy::DevicePasscode,
            ))
            .returning(Returning::Reference);

        assert_eq!(query.class, ItemClass::Key);
        assert_eq!(query.application_tag.as_deref(), Some(&b"pub"[..]));
        assert!(query.service.is_none());
        assert_eq!(query.returning, Returning::Reference);
    }

    #[test]
    fn test_interaction_defaults_to_allowed() {
        assert!(Query::generic_password().interaction_allowed());
        assert!(!Query::generic_password()
            .authentication(AuthenticationContext::non_interactive())
            .interaction_allowed());
    }
}
