//! freedesktop Secret Service keychain (Linux).
//!
//! Generic secrets map to items in the default collection, tagged with
//! `service`, `account`, `access_group` and `accessibility` attributes.
//! The Secret Service has no per-item access control and no key objects,
//! so both fail with `NotAvailable`.
//!
//! The `secret-service` client is async; every primitive runs to completion
//! on a private current-thread tokio runtime.

use std::collections::HashMap;
use std::future::Future;

use secret_service::{Collection, EncryptionType, Item, SecretService};
use tokio::runtime::Runtime;

use super::{Capabilities, ItemAttributes, KeychainBackend, MatchOutput};
use crate::accessibility::Accessibility;
use crate::errors::{KeychainError, KeychainErrorCode, KeychainResult};
use crate::query::{AttributeUpdate, ItemClass, KeyPairRequest, MatchLimit, Query, Returning};

const SCHEMA_ATTRIBUTE: &str = "xdg:schema";
const SCHEMA: &str = "com.keystash.GenericPassword";
const SERVICE_ATTRIBUTE: &str = "service";
const ACCOUNT_ATTRIBUTE: &str = "account";
const ACCESS_GROUP_ATTRIBUTE: &str = "access_group";
const ACCESSIBILITY_ATTRIBUTE: &str = "accessibility";
const CONTENT_TYPE: &str = "application/octet-stream";

fn map_error(err: secret_service::Error, context: &str) -> KeychainError {
    let code = match &err {
        secret_service::Error::Locked => KeychainErrorCode::InteractionNotAllowed,
        secret_service::Error::Prompt => KeychainErrorCode::UserCanceled,
        secret_service::Error::NoResult => KeychainErrorCode::NotFound,
        _ => KeychainErrorCode::NotAvailable,
    };
    KeychainError::new(code, format!("{}: {}", context, err))
}

fn search_attributes(query: &Query) -> HashMap<&str, &str> {
    let mut attributes = HashMap::new();
    attributes.insert(SCHEMA_ATTRIBUTE, SCHEMA);
    if let Some(service) = query.service.as_deref() {
        attributes.insert(SERVICE_ATTRIBUTE, service);
    }
    if let Some(account) = query.account.as_deref() {
        attributes.insert(ACCOUNT_ATTRIBUTE, account);
    }
    if let Some(group) = query.access_group.as_deref() {
        attributes.insert(ACCESS_GROUP_ATTRIBUTE, group);
    }
    attributes
}

fn generic_only(query: &Query) -> KeychainResult<()> {
    match query.class {
        ItemClass::GenericPassword => Ok(()),
        ItemClass::Key => Err(KeychainError::unavailable("key storage in the Secret Service")),
    }
}

async fn unlock_collection(
    collection: &Collection<'_>,
    interaction_allowed: bool,
) -> KeychainResult<()> {
    if collection.is_locked().await.unwrap_or(true) {
        if !interaction_allowed {
            return Err(KeychainError::new(
                KeychainErrorCode::InteractionNotAllowed,
                "default collection is locked and interaction is not allowed",
            ));
        }
        collection
            .unlock()
            .await
            .map_err(|e| map_error(e, "failed to unlock collection"))?;
    }
    Ok(())
}

async fn unlock_item(item: &Item<'_>, interaction_allowed: bool) -> KeychainResult<()> {
    if item.is_locked().await.unwrap_or(true) {
        if !interaction_allowed {
            return Err(KeychainError::from_code(
                KeychainErrorCode::InteractionNotAllowed,
            ));
        }
        item.unlock()
            .await
            .map_err(|e| map_error(e, "failed to unlock item"))?;
    }
    Ok(())
}

async fn read_attributes(item: &Item<'_>) -> KeychainResult<ItemAttributes> {
    let attributes = item
        .get_attributes()
        .await
        .map_err(|e| map_error(e, "failed to read item attributes"))?;
    Ok(ItemAttributes {
        account: attributes.get(ACCOUNT_ATTRIBUTE).cloned(),
        service: attributes.get(SERVICE_ATTRIBUTE).cloned(),
        access_group: attributes.get(ACCESS_GROUP_ATTRIBUTE).cloned(),
        application_tag: None,
        accessibility: attributes
            .get(ACCESSIBILITY_ATTRIBUTE)
            .map(|value| Accessibility::from_native_value(value)),
    })
}

/// `NotAvailable` on a thread that is already driving a tokio runtime.
fn ensure_outside_runtime() -> KeychainResult<()> {
    if tokio::runtime::Handle::try_current().is_ok() {
        return Err(KeychainError::new(
            KeychainErrorCode::NotAvailable,
            "the Secret Service backend cannot be used from within an async runtime",
        ));
    }
    Ok(())
}

/// Secret Service backed keychain.
pub struct SecretServiceKeychain {
    runtime: Runtime,
}

impl std::fmt::Debug for SecretServiceKeychain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretServiceKeychain").finish_non_exhaustive()
    }
}

impl SecretServiceKeychain {
    /// Connect to the session's Secret Service.
    ///
    /// # Errors
    /// `NotAvailable` if called from within a tokio runtime, if no runtime
    /// can be built, or if no service answers.
    pub fn new() -> KeychainResult<Self> {
        ensure_outside_runtime()?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| {
                KeychainError::new(
                    KeychainErrorCode::NotAvailable,
                    format!("failed to start Secret Service runtime: {}", e),
                )
            })?;

        runtime.block_on(async {
            SecretService::connect(EncryptionType::Dh)
                .await
                .map(|_| ())
                .map_err(|e| map_error(e, "Secret Service connection failed"))
        })?;

        Ok(Self { runtime })
    }

    fn block_on<T>(&self, operation: impl Future<Output = KeychainResult<T>>) -> KeychainResult<T> {
        ensure_outside_runtime()?;
        self.runtime.block_on(operation)
    }

    async fn add_async(&self, query: &Query) -> KeychainResult<()> {
        let ss = SecretService::connect(EncryptionType::Dh)
            .await
            .map_err(|e| map_error(e, "Secret Service connection failed"))?;
        let collection = ss
            .get_default_collection()
            .await
            .map_err(|e| map_error(e, "failed to get default collection"))?;
        unlock_collection(&collection, query.interaction_allowed()).await?;

        let existing = collection
            .search_items(search_attributes(query))
            .await
            .map_err(|e| map_error(e, "failed to search secrets"))?;
        if !existing.is_empty() {
            return Err(KeychainError::from_code(KeychainErrorCode::DuplicateItem));
        }

        let (account, value) = match (&query.account, &query.value) {
            (Some(account), Some(value)) => (account, value),
            _ => {
                return Err(KeychainError::wrong_parameter(
                    "add requires an account and a value",
                ))
            }
        };
        let accessibility = query.accessibility.unwrap_or_default();
        let mut attributes = search_attributes(query);
        attributes.insert(ACCESSIBILITY_ATTRIBUTE, accessibility.native_value());

        let label = format!(
            "{}/{}",
            query.service.as_deref().unwrap_or_default(),
            account
        );
        collection
            .create_item(&label, attributes, value, false, CONTENT_TYPE)
            .await
            .map_err(|e| map_error(e, "failed to store secret"))?;
        Ok(())
    }

    async fn update_async(&self, query: &Query, update: &AttributeUpdate) -> KeychainResult<()> {
        let ss = SecretService::connect(EncryptionType::Dh)
            .await
            .map_err(|e| map_error(e, "Secret Service connection failed"))?;
        let collection = ss
            .get_default_collection()
            .await
            .map_err(|e| map_error(e, "failed to get default collection"))?;
        unlock_collection(&collection, query.interaction_allowed()).await?;

        let items = collection
            .search_items(search_attributes(query))
            .await
            .map_err(|e| map_error(e, "failed to search secrets"))?;
        if items.is_empty() {
            return Err(KeychainError::not_found());
        }

        for item in items {
            unlock_item(&item, query.interaction_allowed()).await?;
            if let Some(value) = &update.value {
                item.set_secret(value, CONTENT_TYPE)
                    .await
                    .map_err(|e| map_error(e, "failed to update secret"))?;
            }
            if let Some(accessibility) = update.accessibility {
                let mut current = item
                    .get_attributes()
                    .await
                    .map_err(|e| map_error(e, "failed to read item attributes"))?;
                current.insert(
                    ACCESSIBILITY_ATTRIBUTE.to_string(),
                    accessibility.native_value().to_string(),
                );
                let replaced: HashMap<&str, &str> = current
                    .iter()
                    .map(|(name, value)| (name.as_str(), value.as_str()))
                    .collect();
                item.set_attributes(replaced)
                    .await
                    .map_err(|e| map_error(e, "failed to update item attributes"))?;
            }
        }
        Ok(())
    }

    async fn delete_async(&self, query: &Query) -> KeychainResult<()> {
        let ss = SecretService::connect(EncryptionType::Dh)
            .await
            .map_err(|e| map_error(e, "Secret Service connection failed"))?;
        let collection = ss
            .get_default_collection()
            .await
            .map_err(|e| map_error(e, "failed to get default collection"))?;

        let items = collection
            .search_items(search_attributes(query))
            .await
            .map_err(|e| map_error(e, "failed to search secrets"))?;
        if items.is_empty() {
            return Err(KeychainError::not_found());
        }

        for item in items {
            item.delete()
                .await
                .map_err(|e| map_error(e, "failed to delete secret"))?;
        }
        Ok(())
    }

    async fn copy_matching_async(&self, query: &Query) -> KeychainResult<MatchOutput> {
        let ss = SecretService::connect(EncryptionType::Dh)
            .await
            .map_err(|e| map_error(e, "Secret Service connection failed"))?;
        let collection = ss
            .get_default_collection()
            .await
            .map_err(|e| map_error(e, "failed to get default collection"))?;

        let items = collection
            .search_items(search_attributes(query))
            .await
            .map_err(|e| map_error(e, "failed to search secrets"))?;
        let first = items.first().ok_or_else(KeychainError::not_found)?;

        match query.returning {
            Returning::Nothing => Ok(MatchOutput::Found),
            Returning::Attributes => {
                let selected = match query.limit {
                    MatchLimit::One => &items[..1],
                    MatchLimit::All => &items[..],
                };
                let mut attributes = Vec::with_capacity(selected.len());
                for item in selected {
                    attributes.push(read_attributes(item).await?);
                }
                Ok(MatchOutput::Attributes(attributes))
            }
            Returning::Data => {
                if query.limit == MatchLimit::All {
                    return Err(KeychainError::wrong_parameter(
                        "returning data requires a match limit of one",
                    ));
                }
                unlock_item(first, query.interaction_allowed()).await?;
                let secret = first
                    .get_secret()
                    .await
                    .map_err(|e| map_error(e, "failed to retrieve secret"))?;
                Ok(MatchOutput::Data(secret))
            }
            Returning::Reference => Err(KeychainError::unavailable(
                "key references in the Secret Service",
            )),
        }
    }
}

impl KeychainBackend for SecretServiceKeychain {
    fn name(&self) -> &'static str {
        "secret-service"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            access_control: false,
            key_pairs: false,
        }
    }

    fn add(&self, query: &Query) -> KeychainResult<()> {
        generic_only(query)?;
        if query.access_control.is_some() {
            return Err(KeychainError::unavailable("access control"));
        }
        self.block_on(self.add_async(query))
    }

    fn update(&self, query: &Query, update: &AttributeUpdate) -> KeychainResult<()> {
        generic_only(query)?;
        self.block_on(self.update_async(query, update))
    }

    fn delete(&self, query: &Query) -> KeychainResult<()> {
        generic_only(query)?;
        self.block_on(self.delete_async(query))
    }

    fn copy_matching(&self, query: &Query) -> KeychainResult<MatchOutput> {
        generic_only(query)?;
        self.block_on(self.copy_matching_async(query))
    }

    fn generate_key_pair(&self, _request: &KeyPairRequest) -> KeychainResult<()> {
        Err(KeychainError::unavailable("RSA key pair generation"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_attributes() {
        let query = Query::generic_password()
            .service("svc")
            .account("token")
            .access_group(Some("group"));
        let attributes = search_attributes(&query);

        assert_eq!(attributes.get(SCHEMA_ATTRIBUTE), Some(&SCHEMA));
        assert_eq!(attributes.get(SERVICE_ATTRIBUTE), Some(&"svc"));
        assert_eq!(attributes.get(ACCOUNT_ATTRIBUTE), Some(&"token"));
        assert_eq!(attributes.get(ACCESS_GROUP_ATTRIBUTE), Some(&"group"));
    }

    #[test]
    fn test_scope_without_account() {
        let query = Query::generic_password().service("svc");
        let attributes = search_attributes(&query);
        assert!(!attributes.contains_key(ACCOUNT_ATTRIBUTE));
        assert!(!attributes.contains_key(ACCESS_GROUP_ATTRIBUTE));
    }

    #[test]
    fn test_key_items_are_unavailable() {
        let err = generic_only(&Query::key().application_tag(b"tag".to_vec())).unwrap_err();
        assert_eq!(err.code, KeychainErrorCode::NotAvailable);
    }

    #[test]
    fn test_refuses_to_start_inside_runtime() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let err = runtime.block_on(async { SecretServiceKeychain::new().unwrap_err() });
        assert_eq!(err.code, KeychainErrorCode::NotAvailable);
    }

    #[test]
    fn test_error_mapping() {
        assert_eq!(
            map_error(secret_service::Error::Locked, "read").code,
            KeychainErrorCode::InteractionNotAllowed
        );
        assert_eq!(
            map_error(secret_service::Error::Prompt, "unlock").code,
            KeychainErrorCode::UserCanceled
        );
        assert_eq!(
            map_error(secret_service::Error::NoResult, "search").code,
            KeychainErrorCode::NotFound
        );
    }
}
