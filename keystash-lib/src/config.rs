//! Store configuration.
//!
//! # Environment Variables
//!
//! [`StoreConfig::from_env`] starts from the defaults and applies:
//!
//! - `KEYSTASH_SERVICE` - service namespace
//! - `KEYSTASH_ACCESS_GROUP` - access group used for sharing
//! - `KEYSTASH_ACCESSIBILITY` - accessibility tier (e.g. `when-unlocked`)
//! - `KEYSTASH_ACCESS_CONTROL` - `true`/`false`, gate items behind a challenge
//! - `KEYSTASH_INTERACTION` - `true`/`false`, allow authentication UI

use serde::{Deserialize, Serialize};

use crate::accessibility::{AccessControl, AccessControlPolicy, Accessibility};
use crate::errors::{KeychainError, KeychainResult};

/// Fallback service name when no application identifier can be found.
pub const FALLBACK_SERVICE: &str = "keystash";

/// Configuration parsing errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Unrecognized accessibility tier name.
    #[error("unknown accessibility tier: {0}")]
    InvalidAccessibility(String),
    /// A boolean setting that is neither true nor false.
    #[error("invalid boolean for {name}: {value}")]
    InvalidBool {
        /// Setting name
        name: String,
        /// Rejected value
        value: String,
    },
}

/// Caller-owned authentication context for access-controlled items.
///
/// Carried explicitly in [`StoreConfig`] and attached to every query the
/// store issues.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthenticationContext {
    /// Whether the platform may show authentication UI. When false,
    /// protected items fail with `InteractionNotAllowed` instead of prompting.
    pub interaction_allowed: bool,
}

impl AuthenticationContext {
    /// A context that lets the platform prompt the user.
    pub fn interactive() -> Self {
        Self {
            interaction_allowed: true,
        }
    }

    /// A context that never prompts, e.g. for background execution.
    pub fn non_interactive() -> Self {
        Self {
            interaction_allowed: false,
        }
    }
}

impl Default for AuthenticationContext {
    fn default() -> Self {
        Self::interactive()
    }
}

/// Immutable configuration of a [`crate::SecureStore`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Service namespace all entries are stored under.
    #[serde(default = "default_service")]
    pub service: String,

    /// Access group for sharing between applications. `None` disables sharing.
    #[serde(default)]
    pub access_group: Option<String>,

    /// Accessibility tier applied to written entries.
    #[serde(default)]
    pub accessibility: Accessibility,

    /// Gate entries behind a biometric/passcode challenge.
    #[serde(default)]
    pub use_access_control: bool,

    /// Credential demanded when access control is on.
    #[serde(default)]
    pub access_control_policy: AccessControlPolicy,

    /// Authentication context attached to every query.
    #[serde(default)]
    pub authentication: AuthenticationContext,
}

/// The application identifier used when no service is configured.
///
/// Taken from `KEYSTASH_SERVICE`, then the running executable's name.
pub fn default_service() -> String {
    if let Ok(service) = std::env::var("KEYSTASH_SERVICE") {
        if !service.trim().is_empty() {
            return service;
        }
    }
    std::env::current_exe()
        .ok()
        .and_then(|path| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| FALLBACK_SERVICE.to_string())
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new(default_service())
    }
}

impl StoreConfig {
    /// Create a configuration for the given service.
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            access_group: None,
            accessibility: Accessibility::default(),
            use_access_control: false,
            access_control_policy: AccessControlPolicy::default(),
            authentication: AuthenticationContext::default(),
        }
    }

    /// Defaults with `KEYSTASH_*` environment overrides applied.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(group) = std::env::var("KEYSTASH_ACCESS_GROUP") {
            if !group.trim().is_empty() {
                config.access_group = Some(group);
            }
        }
        if let Ok(tier) = std::env::var("KEYSTASH_ACCESSIBILITY") {
            config.accessibility = tier.parse()?;
        }
        if let Ok(flag) = std::env::var("KEYSTASH_ACCESS_CONTROL") {
            config.use_access_control = parse_bool("KEYSTASH_ACCESS_CONTROL", &flag)?;
        }
        if let Ok(flag) = std::env::var("KEYSTASH_INTERACTION") {
            config.authentication.interaction_allowed =
                parse_bool("KEYSTASH_INTERACTION", &flag)?;
        }

        Ok(config)
    }

    /// Set the access group.
    pub fn with_access_group(mut self, group: impl Into<String>) -> Self {
        self.access_group = Some(group.into());
        self
    }

    /// Set the accessibility tier.
    pub fn with_accessibility(mut self, accessibility: Accessibility) -> Self {
        self.accessibility = accessibility;
        self
    }

    /// Turn access control on or off.
    pub fn with_access_control(mut self, enabled: bool) -> Self {
        self.use_access_control = enabled;
        self
    }

    /// Set the credential demanded by access control.
    pub fn with_access_control_policy(mut self, policy: AccessControlPolicy) -> Self {
        self.access_control_policy = policy;
        self
    }

    /// Set the authentication context.
    pub fn with_authentication(mut self, context: AuthenticationContext) -> Self {
        self.authentication = context;
        self
    }

    /// Access-control requirement for new entries, if enabled.
    pub fn access_control(&self) -> Option<AccessControl> {
        self.use_access_control
            .then(|| AccessControl::new(self.accessibility, self.access_control_policy))
    }

    /// Check the construction constraints.
    pub fn validate(&self) -> KeychainResult<()> {
        if self.service.trim().is_empty() {
            return Err(KeychainError::wrong_parameter("service must not be empty"));
        }
        if matches!(&self.access_group, Some(group) if group.trim().is_empty()) {
            return Err(KeychainError::wrong_parameter(
                "access group must not be empty when provided",
            ));
        }
        Ok(())
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            name: name.to_string(),
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StoreConfig::new("com.example.app");
        assert_eq!(config.service, "com.example.app");
        assert_eq!(config.access_group, None);
        assert_eq!(config.accessibility, Accessibility::AfterFirstUnlock);
        assert!(!config.use_access_control);
        assert!(config.access_control().is_none());
        assert!(config.authentication.interaction_allowed);
    }

    #[test]
    fn test_builders() {
        let config = StoreConfig::new("svc")
            .with_access_group("group.shared")
            .with_accessibility(Accessibility::WhenPasscodeSetThisDeviceOnly)
            .with_access_control(true)
            .with_access_control_policy(AccessControlPolicy::BiometryAny)
            .with_authentication(AuthenticationContext::non_interactive());

        assert_eq!(config.access_group.as_deref(), Some("group.shared"));
        let control = config.access_control().unwrap();
        assert_eq!(
            control.accessibility,
            Accessibility::WhenPasscodeSetThisDeviceOnly
        );
        assert_eq!(control.policy, AccessControlPolicy::BiometryAny);
        assert!(!config.authentication.interaction_allowed);
    }

    #[test]
    fn test_validate() {
        assert!(StoreConfig::new("svc").validate().is_ok());
        assert!(StoreConfig::new("  ").validate().is_err());
        assert!(StoreConfig::new("svc")
            .with_access_group("")
            .validate()
            .is_err());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: StoreConfig = serde_json::from_str(
            r#"{"service": "com.example.app", "accessibility": "when-unlocked"}"#,
        )
        .unwrap();
        assert_eq!(config.service, "com.example.app");
        assert_eq!(config.accessibility, Accessibility::WhenUnlocked);
        assert_eq!(config.access_control_policy, AccessControlPolicy::UserPresence);
        assert!(config.authentication.interaction_allowed);
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("X", "Yes"), Ok(true));
        assert_eq!(parse_bool("X", "0"), Ok(false));
        assert!(matches!(
            parse_bool("X", "maybe"),
            Err(ConfigError::InvalidBool { .. })
        ));
    }

    #[test]
    fn test_default_service_is_not_empty() {
        assert!(!default_service().is_empty());
    }
}
