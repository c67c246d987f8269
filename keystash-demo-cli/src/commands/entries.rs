//! Entry commands - set, get, has, delete, keys, clear

use anyhow::{bail, Context, Result};
use keystash_lib::SecureStore;

use super::{decode_value, encode_value};
use crate::ui;

/// Store `value` under `key`.
pub fn set(
    store: &SecureStore,
    key: &str,
    value: &str,
    hex_encoded: bool,
    prompt: Option<&str>,
) -> Result<()> {
    let data = decode_value(value, hex_encoded)?;
    store
        .try_set(key, &data, prompt)
        .with_context(|| format!("failed to store '{}'", key))?;

    tracing::debug!(key, len = data.len(), "stored entry");
    ui::success(&format!("Stored '{}' in {}", key, store.service()));
    Ok(())
}

/// Print the value of `key`.
pub fn get(store: &SecureStore, key: &str, hex_encoded: bool, prompt: Option<&str>) -> Result<()> {
    let data = store
        .fetch_data(key, prompt)
        .with_context(|| format!("failed to read '{}'", key))?;
    println!("{}", encode_value(&data, hex_encoded));
    Ok(())
}

/// Report whether `key` holds a value.
pub fn has(store: &SecureStore, key: &str) -> Result<bool> {
    let present = store
        .try_has_value(key)
        .with_context(|| format!("failed to look up '{}'", key))?;
    if present {
        ui::success(&format!("'{}' is set", key));
    } else {
        ui::info(&format!("'{}' is not set", key));
    }
    Ok(present)
}

/// Delete `key`.
pub fn delete(store: &SecureStore, key: &str) -> Result<()> {
    store
        .try_delete(key)
        .with_context(|| format!("failed to delete '{}'", key))?;
    ui::success(&format!("Deleted '{}'", key));
    Ok(())
}

/// List every key in the store's scope.
pub fn keys(store: &SecureStore) -> Result<Vec<String>> {
    let mut keys = store.try_keys().context("failed to list keys")?;
    keys.sort();

    ui::header(&format!("Keys in {}", store.service()));
    if let Some(group) = store.access_group() {
        ui::key_value("Access group", group);
    }
    if keys.is_empty() {
        ui::info("No entries");
    }
    for key in &keys {
        ui::item(key);
    }
    Ok(keys)
}

/// Delete every entry in the store's scope.
pub fn clear(store: &SecureStore, skip_confirmation: bool) -> Result<usize> {
    if !skip_confirmation {
        let prompt = format!("Delete every entry in {}?", store.service());
        if !ui::confirm(&prompt, false)? {
            ui::info("Nothing deleted");
            return Ok(0);
        }
    }

    let before = store.try_keys().context("failed to list keys")?.len();
    let removed = store.try_clear_all().context("failed to clear entries")?;
    if removed < before {
        ui::warning(&format!("{} of {} entries could not be deleted", before - removed, before));
    }
    if removed == 0 && before > 0 {
        bail!("no entries could be deleted");
    }
    ui::success(&format!("Deleted {} entries", removed));
    Ok(removed)
}
