//! Argument parsing and store construction.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use keystash_lib::backend::{platform_default, KeychainBackend, MemoryKeychain};
use keystash_lib::{Accessibility, RsaKeySize, SecureStore, StoreConfig};

#[derive(Parser, Debug)]
#[command(name = "keystash")]
#[command(about = "Keystash CLI - store secrets and RSA keys in the system keychain", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Service namespace (defaults to the executable name)
    #[arg(long, global = true, env = "KEYSTASH_SERVICE")]
    pub service: Option<String>,

    /// Access group to share entries through
    #[arg(long, global = true, env = "KEYSTASH_ACCESS_GROUP")]
    pub access_group: Option<String>,

    /// Accessibility tier for written entries (e.g. when-unlocked)
    #[arg(long, global = true, env = "KEYSTASH_ACCESSIBILITY")]
    pub accessibility: Option<Accessibility>,

    /// Gate written entries behind a biometric/passcode challenge
    #[arg(long, global = true)]
    pub access_control: bool,

    /// Message shown by authentication challenges
    #[arg(long, global = true)]
    pub prompt: Option<String>,

    /// Keychain backend to use
    #[arg(long, global = true, value_enum, default_value_t = BackendChoice::Native)]
    pub backend: BackendChoice,
}

/// Which keychain the CLI talks to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum BackendChoice {
    /// The host platform's keychain
    Native,
    /// A throwaway in-process keychain
    Memory,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Store a value
    Set {
        /// Entry key
        key: String,

        /// Value to store
        value: String,

        /// Treat the value as hex-encoded bytes
        #[arg(long)]
        hex: bool,
    },

    /// Print a stored value
    Get {
        /// Entry key
        key: String,

        /// Print the value hex-encoded
        #[arg(long)]
        hex: bool,
    },

    /// Check whether a key holds a value
    Has {
        /// Entry key
        key: String,
    },

    /// Delete a value
    Delete {
        /// Entry key
        key: String,
    },

    /// List every key in the service
    Keys,

    /// Delete every entry in the service
    Clear {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Generate an RSA key pair
    Keygen {
        /// Tag for the public key
        public_tag: String,

        /// Tag for the private key
        private_tag: String,

        /// Modulus size (512, 1024 or 2048)
        #[arg(long, default_value = "2048")]
        bits: RsaKeySize,
    },

    /// Print a key's exportable representation as hex
    KeyExport {
        /// Key tag
        tag: String,
    },

    /// Delete a key
    KeyDelete {
        /// Key tag
        tag: String,
    },

    /// Check whether a key exists
    KeyHas {
        /// Key tag
        tag: String,
    },
}

impl Cli {
    /// Store configuration from `KEYSTASH_*` variables and the flags.
    pub fn store_config(&self) -> Result<StoreConfig> {
        let mut config = StoreConfig::from_env().context("invalid KEYSTASH_* environment")?;

        if let Some(service) = &self.service {
            config.service = service.clone();
        }
        if let Some(group) = &self.access_group {
            config = config.with_access_group(group.clone());
        }
        if let Some(accessibility) = self.accessibility {
            config = config.with_accessibility(accessibility);
        }
        if self.access_control {
            config = config.with_access_control(true);
        }
        Ok(config)
    }

    /// Open the store the flags describe.
    pub fn open_store(&self) -> Result<SecureStore> {
        let backend: Arc<dyn KeychainBackend> = match self.backend {
            BackendChoice::Native => platform_default(),
            BackendChoice::Memory => Arc::new(MemoryKeychain::new()),
        };
        let config = self.store_config()?;
        tracing::debug!(service = %config.service, backend = backend.name(), "opening store");

        SecureStore::open_with_backend(config, backend).context("failed to open keychain store")
    }

    /// Prompt passed to challenges, if any.
    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref()
    }
}
