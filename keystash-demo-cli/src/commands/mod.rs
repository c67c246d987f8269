//! CLI command implementations

pub mod entries;
pub mod key_pairs;

use anyhow::{Context, Result};

/// Decode a command-line value into the bytes to store.
pub fn decode_value(value: &str, hex_encoded: bool) -> Result<Vec<u8>> {
    if hex_encoded {
        hex::decode(value.trim()).context("value is not valid hex")
    } else {
        Ok(value.as_bytes().to_vec())
    }
}

/// Render stored bytes for the terminal.
///
/// Non-UTF-8 values fall back to hex.
pub fn encode_value(data: &[u8], hex_encoded: bool) -> String {
    if hex_encoded {
        return hex::encode(data);
    }
    match std::str::from_utf8(data) {
        Ok(text) => text.to_string(),
        Err(_) => hex::encode(data),
    }
}
