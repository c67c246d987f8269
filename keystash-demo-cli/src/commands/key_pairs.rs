//! Key pair commands - keygen, key-export, key-delete, key-has

use anyhow::{anyhow, Context, Result};
use keystash_lib::{RsaKeySize, SecureStore};

use crate::ui;

/// Generate an RSA key pair.
pub fn keygen(
    store: &SecureStore,
    public_tag: &str,
    private_tag: &str,
    size: RsaKeySize,
) -> Result<()> {
    store
        .try_generate_rsa_key_pair(size, public_tag, private_tag)
        .context("failed to generate key pair")?;

    ui::success(&format!("Generated {}-bit RSA key pair", size));
    ui::key_value("Public tag", public_tag);
    ui::key_value("Private tag", private_tag);
    Ok(())
}

/// Print the hex-encoded external representation of a key.
pub fn export(store: &SecureStore, tag: &str) -> Result<String> {
    let data = store
        .try_rsa_key_data(tag)
        .with_context(|| format!("failed to read key '{}'", tag))?
        .ok_or_else(|| anyhow!("no key tagged '{}'", tag))?;

    let encoded = hex::encode(&data);
    println!("{}", encoded);
    Ok(encoded)
}

/// Delete a key.
pub fn delete(store: &SecureStore, tag: &str) -> Result<()> {
    store
        .try_delete_rsa_key(tag)
        .with_context(|| format!("failed to delete key '{}'", tag))?;
    ui::success(&format!("Deleted key '{}'", tag));
    Ok(())
}

/// Report whether a key exists.
pub fn has(store: &SecureStore, tag: &str) -> Result<bool> {
    let present = store
        .try_has_rsa_key(tag)
        .with_context(|| format!("failed to look up key '{}'", tag))?;
    if present {
        ui::success(&format!("Key '{}' exists", tag));
    } else {
        ui::info(&format!("Key '{}' does not exist", tag));
    }
    Ok(present)
}
