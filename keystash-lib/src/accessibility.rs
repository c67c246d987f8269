//! Accessibility tiers and access-control policies for stored items.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// When the platform permits access to a stored item.
///
/// Mirrors the native `kSecAttrAccessible*` values. The `ThisDeviceOnly`
/// variants are excluded from backups and never migrate to another device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Accessibility {
    /// Readable only while the device is unlocked.
    WhenUnlocked,
    /// Like `WhenUnlocked`, never leaves this device.
    WhenUnlockedThisDeviceOnly,
    /// Readable after the first unlock following a restart.
    #[default]
    AfterFirstUnlock,
    /// Like `AfterFirstUnlock`, never leaves this device.
    AfterFirstUnlockThisDeviceOnly,
    /// Always readable, regardless of lock state.
    Always,
    /// Like `Always`, never leaves this device.
    AlwaysThisDeviceOnly,
    /// Readable while unlocked, and only if a passcode is set.
    WhenPasscodeSetThisDeviceOnly,
}

impl Accessibility {
    /// Every tier, in declaration order.
    pub const ALL: [Accessibility; 7] = [
        Self::WhenUnlocked,
        Self::WhenUnlockedThisDeviceOnly,
        Self::AfterFirstUnlock,
        Self::AfterFirstUnlockThisDeviceOnly,
        Self::Always,
        Self::AlwaysThisDeviceOnly,
        Self::WhenPasscodeSetThisDeviceOnly,
    ];

    /// Value of the matching native `kSecAttrAccessible*` constant.
    pub fn native_value(&self) -> &'static str {
        match self {
            Self::WhenUnlocked => "ak",
            Self::WhenUnlockedThisDeviceOnly => "aku",
            Self::AfterFirstUnlock => "ck",
            Self::AfterFirstUnlockThisDeviceOnly => "cku",
            Self::Always => "dk",
            Self::AlwaysThisDeviceOnly => "dku",
            Self::WhenPasscodeSetThisDeviceOnly => "akpu",
        }
    }

    /// Map a native constant value back to a tier.
    ///
    /// Unrecognized values fall back to [`Accessibility::AfterFirstUnlock`].
    pub fn from_native_value(value: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|tier| tier.native_value() == value)
            .unwrap_or_default()
    }

    /// Name used in configuration and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WhenUnlocked => "when-unlocked",
            Self::WhenUnlockedThisDeviceOnly => "when-unlocked-this-device-only",
            Self::AfterFirstUnlock => "after-first-unlock",
            Self::AfterFirstUnlockThisDeviceOnly => "after-first-unlock-this-device-only",
            Self::Always => "always",
            Self::AlwaysThisDeviceOnly => "always-this-device-only",
            Self::WhenPasscodeSetThisDeviceOnly => "when-passcode-set-this-device-only",
        }
    }

    /// Whether the item is excluded from backup and device migration.
    pub fn is_this_device_only(&self) -> bool {
        matches!(
            self,
            Self::WhenUnlockedThisDeviceOnly
                | Self::AfterFirstUnlockThisDeviceOnly
                | Self::AlwaysThisDeviceOnly
                | Self::WhenPasscodeSetThisDeviceOnly
        )
    }

    /// Whether the item is readable given the device lock state.
    pub fn permits(&self, locked: bool, unlocked_since_boot: bool) -> bool {
        match self {
            Self::Always | Self::AlwaysThisDeviceOnly => true,
            Self::AfterFirstUnlock | Self::AfterFirstUnlockThisDeviceOnly => unlocked_since_boot,
            Self::WhenUnlocked
            | Self::WhenUnlockedThisDeviceOnly
            | Self::WhenPasscodeSetThisDeviceOnly => !locked,
        }
    }
}

impl fmt::Display for Accessibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Accessibility {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|tier| tier.as_str() == normalized)
            .ok_or_else(|| ConfigError::InvalidAccessibility(s.to_string()))
    }
}

/// Which device credential an access-controlled item demands.
///
/// Mirrors the native `SecAccessControlCreateFlags` bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessControlPolicy {
    /// Biometry or device passcode, whichever is available.
    #[default]
    UserPresence,
    /// Any enrolled biometry.
    BiometryAny,
    /// Biometry as enrolled when the item was written.
    BiometryCurrentSet,
    /// The device passcode only.
    DevicePasscode,
}

impl AccessControlPolicy {
    /// Native `SecAccessControlCreateFlags` value.
    pub fn flags(&self) -> u64 {
        match self {
            Self::UserPresence => 1 << 0,
            Self::BiometryAny => 1 << 1,
            Self::BiometryCurrentSet => 1 << 3,
            Self::DevicePasscode => 1 << 4,
        }
    }
}

/// Access-control requirement attached to an item: a tier plus a credential.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AccessControl {
    /// Tier the item is protected with.
    pub accessibility: Accessibility,
    /// Credential demanded before the item is released.
    pub policy: AccessControlPolicy,
}

impl AccessControl {
    /// Create an access-control requirement.
    pub fn new(accessibility: Accessibility, policy: AccessControlPolicy) -> Self {
        Self {
            accessibility,
            policy,
        }
    }
}
