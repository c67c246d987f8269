//! Test assertions and verification helpers.

use std::fmt::Debug;

use crate::errors::{KeychainErrorCode, KeychainResult};
use crate::store::SecureStore;

/// Assert that `result` failed with `code`.
///
/// # Panics
/// Panics if the result succeeded or carries another code.
pub fn assert_code<T: Debug>(result: &KeychainResult<T>, code: KeychainErrorCode) {
    match result {
        Ok(value) => panic!("expected {:?}, got Ok({:?})", code, value),
        Err(err) => assert_eq!(
            err.code, code,
            "expected {:?}, got {:?}: {}",
            code, err.code, err
        ),
    }
}

/// Assert that `result` failed with `NotFound`.
pub fn assert_not_found<T: Debug>(result: &KeychainResult<T>) {
    assert_code(result, KeychainErrorCode::NotFound);
}

/// Assert that `key` holds exactly `expected` in `store`.
///
/// # Panics
/// Panics if the read fails or returns other bytes.
pub fn assert_stored(store: &SecureStore, key: &str, expected: &[u8]) {
    match store.try_get(key, None) {
        Ok(Some(data)) => assert_eq!(data, expected, "unexpected value for '{}'", key),
        Ok(None) => panic!("entry '{}' is missing", key),
        Err(err) => panic!("reading '{}' failed: {}", key, err),
    }
}
