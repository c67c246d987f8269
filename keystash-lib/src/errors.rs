//! Error types for keychain operations.
//!
//! Every native call funnels through a single `OSStatus`-style status code.
//! [`KeychainErrorCode`] mirrors that vocabulary one-to-one so the numeric
//! value survives the trip back to callers, and [`KeychainError`] pairs it
//! with a human-readable message.

use std::fmt;

/// Native status code as returned by the platform secure-storage service.
pub type OsStatus = i32;

/// Error domain reported alongside every [`KeychainError`].
pub const ERROR_DOMAIN: &str = "com.keystash.keychain";

/// Raw status values of the native secure-storage service.
pub mod status {
    use super::OsStatus;

    /// No error.
    pub const SUCCESS: OsStatus = 0;
    /// Function or operation not implemented.
    pub const UNIMPLEMENTED: OsStatus = -4;
    /// One or more parameters passed to a function were not valid.
    pub const PARAM: OsStatus = -50;
    /// Failed to allocate memory.
    pub const ALLOCATE: OsStatus = -108;
    /// User canceled the operation.
    pub const USER_CANCELED: OsStatus = -128;
    /// No keychain is available.
    pub const NOT_AVAILABLE: OsStatus = -25291;
    /// Authorization or authentication failed.
    pub const AUTH_FAILED: OsStatus = -25293;
    /// The item already exists.
    pub const DUPLICATE_ITEM: OsStatus = -25299;
    /// The item cannot be found.
    pub const ITEM_NOT_FOUND: OsStatus = -25300;
    /// Interaction with the Security Server is not allowed.
    pub const INTERACTION_NOT_ALLOWED: OsStatus = -25308;
    /// Unable to decode the provided data.
    pub const DECODE: OsStatus = -26275;
    /// A required entitlement (such as an access group) is missing.
    pub const MISSING_ENTITLEMENT: OsStatus = -34018;
}

/// Error codes mirroring the native status vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeychainErrorCode {
    /// Function or operation not implemented (`errSecUnimplemented`)
    Unimplemented,
    /// Invalid parameters (`errSecParam`)
    WrongParameter,
    /// Memory allocation failed (`errSecAllocate`)
    Allocation,
    /// User canceled the authentication challenge (`errSecUserCanceled`)
    UserCanceled,
    /// Service or capability not available (`errSecNotAvailable`)
    NotAvailable,
    /// Authentication failed (`errSecAuthFailed`)
    AuthenticationFailed,
    /// Item already exists (`errSecDuplicateItem`)
    DuplicateItem,
    /// Item not found (`errSecItemNotFound`)
    NotFound,
    /// Interaction not allowed in the current context (`errSecInteractionNotAllowed`)
    InteractionNotAllowed,
    /// Data could not be decoded (`errSecDecode`)
    Decode,
    /// Missing entitlement, usually an unauthorized access group (`errSecMissingEntitlement`)
    MissingEntitlement,
    /// Any other native status
    Other(OsStatus),
    /// Failure inside the facade that carries no native status
    Unknown,
}

impl KeychainErrorCode {
    /// Map a native status to an error code.
    ///
    /// Returns `None` for [`status::SUCCESS`].
    pub fn from_status(code: OsStatus) -> Option<Self> {
        let mapped = match code {
            status::SUCCESS => return None,
            status::UNIMPLEMENTED => Self::Unimplemented,
            status::PARAM => Self::WrongParameter,
            status::ALLOCATE => Self::Allocation,
            status::USER_CANCELED => Self::UserCanceled,
            status::NOT_AVAILABLE => Self::NotAvailable,
            status::AUTH_FAILED => Self::AuthenticationFailed,
            status::DUPLICATE_ITEM => Self::DuplicateItem,
            status::ITEM_NOT_FOUND => Self::NotFound,
            status::INTERACTION_NOT_ALLOWED => Self::InteractionNotAllowed,
            status::DECODE => Self::Decode,
            status::MISSING_ENTITLEMENT => Self::MissingEntitlement,
            other => Self::Other(other),
        };
        Some(mapped)
    }

    /// The native status value for this code.
    ///
    /// [`KeychainErrorCode::Unknown`] is not a native error and reports
    /// [`status::SUCCESS`].
    pub fn status(&self) -> OsStatus {
        match self {
            Self::Unimplemented => status::UNIMPLEMENTED,
            Self::WrongParameter => status::PARAM,
            Self::Allocation => status::ALLOCATE,
            Self::UserCanceled => status::USER_CANCELED,
            Self::NotAvailable => status::NOT_AVAILABLE,
            Self::AuthenticationFailed => status::AUTH_FAILED,
            Self::DuplicateItem => status::DUPLICATE_ITEM,
            Self::NotFound => status::ITEM_NOT_FOUND,
            Self::InteractionNotAllowed => status::INTERACTION_NOT_ALLOWED,
            Self::Decode => status::DECODE,
            Self::MissingEntitlement => status::MISSING_ENTITLEMENT,
            Self::Other(code) => *code,
            Self::Unknown => status::SUCCESS,
        }
    }

    /// Native constant name plus description, used as the default message.
    pub fn description(&self) -> String {
        let text = match self {
            Self::Unimplemented => "errSecUnimplemented: Function or operation not implemented.",
            Self::WrongParameter => {
                "errSecParam: One or more parameters passed to the function were not valid."
            }
            Self::Allocation => "errSecAllocate: Failed to allocate memory.",
            Self::UserCanceled => "errSecUserCanceled: User canceled the operation.",
            Self::NotAvailable => "errSecNotAvailable: No keychain is available.",
            Self::AuthenticationFailed => {
                "errSecAuthFailed: Authorization and/or authentication failed."
            }
            Self::DuplicateItem => "errSecDuplicateItem: The item already exists.",
            Self::NotFound => "errSecItemNotFound: The item cannot be found.",
            Self::InteractionNotAllowed => {
                "errSecInteractionNotAllowed: Interaction with the Security Server is not allowed."
            }
            Self::Decode => "errSecDecode: Unable to decode the provided data.",
            Self::MissingEntitlement => {
                "errSecMissingEntitlement: A required entitlement isn't present."
            }
            Self::Other(code) => return format!("Unspecified keychain error: {}.", code),
            Self::Unknown => "Unknown keychain facade error.",
        };
        text.to_string()
    }
}

/// Error type for keychain operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeychainError {
    /// Error code mirroring the native status
    pub code: KeychainErrorCode,
    /// Human-readable error message
    pub message: String,
}

impl KeychainError {
    /// Create an error with an explicit message.
    pub fn new(code: KeychainErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Create an error with the default description of `code`.
    pub fn from_code(code: KeychainErrorCode) -> Self {
        Self::new(code, code.description())
    }

    /// Create an error from a native status.
    ///
    /// A success status has no error counterpart and becomes
    /// [`KeychainErrorCode::Unknown`].
    pub fn from_status(code: OsStatus) -> Self {
        Self::from_code(KeychainErrorCode::from_status(code).unwrap_or(KeychainErrorCode::Unknown))
    }

    /// Create a "not found" error.
    pub fn not_found() -> Self {
        Self::from_code(KeychainErrorCode::NotFound)
    }

    /// Create a "wrong parameter" error with context.
    pub fn wrong_parameter(reason: impl Into<String>) -> Self {
        Self::new(KeychainErrorCode::WrongParameter, reason)
    }

    /// Create a "not available on this platform" error.
    pub fn unavailable(feature: impl AsRef<str>) -> Self {
        Self::new(
            KeychainErrorCode::NotAvailable,
            format!("{} is not available on this platform", feature.as_ref()),
        )
    }

    /// Create a facade-side error that has no native status.
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(KeychainErrorCode::Unknown, message)
    }

    /// Numeric native status carried by this error.
    pub fn status(&self) -> OsStatus {
        self.code.status()
    }

    /// Error domain string.
    pub fn domain(&self) -> &'static str {
        ERROR_DOMAIN
    }

    /// Check if this error indicates the item wasn't found.
    pub fn is_not_found(&self) -> bool {
        self.code == KeychainErrorCode::NotFound
    }

    /// Check if this error came out of an authentication challenge.
    pub fn requires_authentication(&self) -> bool {
        matches!(
            self.code,
            KeychainErrorCode::AuthenticationFailed
                | KeychainErrorCode::UserCanceled
                | KeychainErrorCode::InteractionNotAllowed
        )
    }
}

impl fmt::Display for KeychainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} {})", self.message, self.domain(), self.status())
    }
}

impl std::error::Error for KeychainError {}

/// Turn a native status into a result.
pub fn check_status(code: OsStatus) -> KeychainResult<()> {
    match KeychainErrorCode::from_status(code) {
        None => Ok(()),
        Some(code) => Err(KeychainError::from_code(code)),
    }
}

/// Result type for keychain operations.
pub type KeychainResult<T> = Result<T, KeychainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping_preserves_values() {
        let known = [
            status::UNIMPLEMENTED,
            status::PARAM,
            status::ALLOCATE,
            status::USER_CANCELED,
            status::NOT_AVAILABLE,
            status::AUTH_FAILED,
            status::DUPLICATE_ITEM,
            status::ITEM_NOT_FOUND,
            status::INTERACTION_NOT_ALLOWED,
            status::DECODE,
            status::MISSING_ENTITLEMENT,
            -67_000,
        ];
        for value in known {
            let code = KeychainErrorCode::from_status(value).unwrap();
            assert_eq!(code.status(), value);
        }
    }

    #[test]
    fn test_success_is_not_an_error() {
        assert_eq!(KeychainErrorCode::from_status(status::SUCCESS), None);
        assert!(check_status(status::SUCCESS).is_ok());
    }

    #[test]
    fn test_other_status() {
        let err = KeychainError::from_status(-1234);
        assert_eq!(err.code, KeychainErrorCode::Other(-1234));
        assert_eq!(err.status(), -1234);
        assert!(err.message.contains("-1234"));
    }

    #[test]
    fn test_error_display() {
        let err = check_status(status::ITEM_NOT_FOUND).unwrap_err();
        assert!(err.is_not_found());
        let text = err.to_string();
        assert!(text.contains("errSecItemNotFound"));
        assert!(text.contains(ERROR_DOMAIN));
        assert!(text.contains("-25300"));
    }

    #[test]
    fn test_authentication_errors() {
        assert!(KeychainError::from_status(status::AUTH_FAILED).requires_authentication());
        assert!(KeychainError::from_status(status::USER_CANCELED).requires_authentication());
        assert!(!KeychainError::not_found().requires_authentication());
    }

    #[test]
    fn test_helper_constructors() {
        let err = KeychainError::unavailable("access control");
        assert_eq!(err.code, KeychainErrorCode::NotAvailable);
        assert!(err.message.contains("not available on this platform"));

        let err = KeychainError::unknown("cast failed");
        assert_eq!(err.status(), status::SUCCESS);
    }
}
