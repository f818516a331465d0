//! Configuration
//!
//! Loaded from an optional `.env` file and then the process environment.

use eyre::{eyre, Result, WrapErr};
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use url::Url;

use crate::evm::deposit::DEFAULT_DEPOSIT_WINDOW_SECS;
use crate::evm::multicall::DEFAULT_BATCH_SIZE;
use crate::evm::signer::DomainIdentity;
use crate::journal::DEFAULT_JOURNAL_PATH;
use crate::redact::Redacted;

/// Bridge client configuration
#[derive(Clone)]
pub struct BridgeConfig {
    /// Wallet key; only write operations need it
    pub private_key: Option<Redacted<String>>,
    pub registry_path: PathBuf,
    pub journal_path: PathBuf,
    pub history_url: Option<Url>,
    pub multicall_batch_size: usize,
    pub deposit_window_secs: u64,
    pub claim_domain: DomainIdentity,
    pub skip_unreadable_tokens: bool,
}

impl fmt::Debug for BridgeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeConfig")
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("registry_path", &self.registry_path)
            .field("journal_path", &self.journal_path)
            .field("history_url", &self.history_url)
            .field("multicall_batch_size", &self.multicall_batch_size)
            .field("deposit_window_secs", &self.deposit_window_secs)
            .field("claim_domain", &self.claim_domain)
            .field("skip_unreadable_tokens", &self.skip_unreadable_tokens)
            .finish()
    }
}

impl BridgeConfig {
    /// Load configuration from environment variables
    /// Loads .env file if present, then reads from environment
    pub fn load() -> Result<Self> {
        Self::load_from_file(".env")
    }

    /// Load from a specific .env file path
    pub fn load_from_file(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            dotenvy::from_filename(path)
                .wrap_err_with(|| format!("Failed to load .env file from {}", path))?;
        }
        Self::load_from_env()
    }

    /// Load configuration from environment variables
    pub fn load_from_env() -> Result<Self> {
        let private_key = env::var("BRIDGE_PRIVATE_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .map(Redacted);

        let registry_path = env::var("BRIDGE_REGISTRY_PATH")
            .map_err(|_| eyre!("BRIDGE_REGISTRY_PATH environment variable is required"))?
            .into();

        let journal_path = env::var("BRIDGE_JOURNAL_PATH")
            .unwrap_or_else(|_| DEFAULT_JOURNAL_PATH.to_string())
            .into();

        let history_url = match env::var("BRIDGE_HISTORY_URL") {
            Ok(raw) if !raw.trim().is_empty() => Some(
                Url::parse(raw.trim()).wrap_err("BRIDGE_HISTORY_URL must be a valid URL")?,
            ),
            _ => None,
        };

        let multicall_batch_size = env::var("MULTICALL_BATCH_SIZE")
            .ok()
            .map(|v| v.parse::<usize>())
            .transpose()
            .wrap_err("MULTICALL_BATCH_SIZE must be a valid integer")?
            .unwrap_or(DEFAULT_BATCH_SIZE);
        if multicall_batch_size == 0 {
            return Err(eyre!("MULTICALL_BATCH_SIZE must be greater than zero"));
        }

        let deposit_window_secs = env::var("DEPOSIT_WINDOW_SECS")
            .ok()
            .map(|v| v.parse::<u64>())
            .transpose()
            .wrap_err("DEPOSIT_WINDOW_SECS must be a valid u64")?
            .unwrap_or(DEFAULT_DEPOSIT_WINDOW_SECS);
        if deposit_window_secs == 0 {
            return Err(eyre!("DEPOSIT_WINDOW_SECS must be greater than zero"));
        }

        let defaults = DomainIdentity::default();
        let claim_domain = DomainIdentity::new(
            env::var("CLAIM_DOMAIN_NAME").unwrap_or(defaults.name),
            env::var("CLAIM_DOMAIN_VERSION").unwrap_or(defaults.version),
        );

        let skip_unreadable_tokens = env::var("SKIP_UNREADABLE_TOKENS")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        Ok(Self {
            private_key,
            registry_path,
            journal_path,
            history_url,
            multicall_batch_size,
            deposit_window_secs,
            claim_domain,
            skip_unreadable_tokens,
        })
    }

    /// Private key, or an error naming the variable to set
    pub fn require_private_key(&self) -> Result<&str> {
        self.private_key
            .as_ref()
            .map(|k| k.expose().as_str())
            .ok_or_else(|| eyre!("BRIDGE_PRIVATE_KEY environment variable is required"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "BRIDGE_PRIVATE_KEY",
        "BRIDGE_REGISTRY_PATH",
        "BRIDGE_JOURNAL_PATH",
        "BRIDGE_HISTORY_URL",
        "MULTICALL_BATCH_SIZE",
        "DEPOSIT_WINDOW_SECS",
        "CLAIM_DOMAIN_NAME",
        "CLAIM_DOMAIN_VERSION",
        "SKIP_UNREADABLE_TOKENS",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();
        env::set_var("BRIDGE_REGISTRY_PATH", "chains.json");

        let config = BridgeConfig::load_from_env().unwrap();
        assert_eq!(config.registry_path, PathBuf::from("chains.json"));
        assert_eq!(config.journal_path, PathBuf::from(DEFAULT_JOURNAL_PATH));
        assert_eq!(config.multicall_batch_size, 100);
        assert_eq!(config.deposit_window_secs, 3600);
        assert_eq!(config.claim_domain, DomainIdentity::new("Bridge", "1"));
        assert!(config.private_key.is_none());
        assert!(config.history_url.is_none());
        assert!(!config.skip_unreadable_tokens);
        assert!(config.require_private_key().is_err());

        clear_env();
    }

    #[test]
    #[serial]
    fn test_registry_path_required() {
        clear_env();
        assert!(BridgeConfig::load_from_env().is_err());
    }

    #[test]
    #[serial]
    fn test_zero_batch_size_rejected() {
        clear_env();
        env::set_var("BRIDGE_REGISTRY_PATH", "chains.json");
        env::set_var("MULTICALL_BATCH_SIZE", "0");
        assert!(BridgeConfig::load_from_env().is_err());

        env::set_var("MULTICALL_BATCH_SIZE", "many");
        assert!(BridgeConfig::load_from_env().is_err());
        clear_env();
    }

    #[test]
    #[serial]
    fn test_debug_redacts_private_key() {
        clear_env();
        env::set_var("BRIDGE_REGISTRY_PATH", "chains.json");
        env::set_var(
            "BRIDGE_PRIVATE_KEY",
            "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
        );

        let config = BridgeConfig::load_from_env().unwrap();
        let debug = format!("{:?}", config);
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("ac0974"));
        assert!(config.require_private_key().unwrap().starts_with("0xac09"));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_overrides() {
        clear_env();
        env::set_var("BRIDGE_REGISTRY_PATH", "chains.json");
        env::set_var("BRIDGE_HISTORY_URL", "https://history.example.org");
        env::set_var("DEPOSIT_WINDOW_SECS", "600");
        env::set_var("CLAIM_DOMAIN_NAME", "CL8Y Bridge");
        env::set_var("SKIP_UNREADABLE_TOKENS", "true");

        let config = BridgeConfig::load_from_env().unwrap();
        assert_eq!(config.deposit_window_secs, 600);
        assert_eq!(config.claim_domain.name, "CL8Y Bridge");
        assert_eq!(config.claim_domain.version, "1");
        assert!(config.skip_unreadable_tokens);
        assert_eq!(
            config.history_url.unwrap().as_str(),
            "https://history.example.org/"
        );
        clear_env();
    }
}
