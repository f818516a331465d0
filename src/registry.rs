//! Static chain registry
//!
//! Maps a chain id to its bridge contract, RPC endpoint and the set of
//! "original" tokens issued on that chain. Loaded once at start-up from JSON
//! and read-only afterwards.

use alloy::primitives::{address, Address};
use eyre::{eyre, Result, WrapErr};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use url::Url;

use crate::types::ChainId;

/// Canonical Multicall3 deployment, present at the same address on most EVM chains
pub const MULTICALL3_ADDRESS: Address = address!("cA11bde05977b3631167028862bE2a173976CA11");

/// Configuration of a single chain the bridge is deployed on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainEntry {
    pub chain_id: ChainId,
    /// Human-readable label (e.g., "Sepolia")
    pub label: String,
    pub rpc_url: Url,
    pub bridge_address: Address,
    pub multicall_address: Address,
    /// Original tokens in registry order
    pub original_tokens: Vec<Address>,
}

#[derive(Debug, Deserialize)]
struct RawRegistry {
    chains: Vec<RawChain>,
}

#[derive(Debug, Deserialize)]
struct RawChain {
    chain_id: u64,
    label: String,
    rpc_url: String,
    bridge_address: Address,
    #[serde(default)]
    multicall_address: Option<Address>,
    #[serde(default)]
    original_tokens: Vec<Address>,
}

/// Read-only registry of supported chains
#[derive(Debug, Clone, Default)]
pub struct ChainRegistry {
    chains: Vec<ChainEntry>,
    by_id: HashMap<ChainId, usize>,
}

impl ChainRegistry {
    /// Build a registry, rejecting duplicate ids and zero bridge addresses
    pub fn new(chains: Vec<ChainEntry>) -> Result<Self> {
        let mut by_id = HashMap::new();

        for (idx, chain) in chains.iter().enumerate() {
            if by_id.insert(chain.chain_id, idx).is_some() {
                return Err(eyre!("Duplicate chain ID: {}", chain.chain_id));
            }
            if chain.bridge_address == Address::ZERO {
                return Err(eyre!(
                    "Bridge address for chain {} ({}) is zero",
                    chain.chain_id,
                    chain.label
                ));
            }
            let mut seen = HashSet::new();
            for token in &chain.original_tokens {
                if !seen.insert(token) {
                    return Err(eyre!(
                        "Original token {} listed twice for chain {}",
                        token,
                        chain.chain_id
                    ));
                }
            }
        }

        Ok(Self { chains, by_id })
    }

    /// Parse the JSON registry format
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: RawRegistry = serde_json::from_str(json).wrap_err("Invalid chain registry JSON")?;

        let chains = raw
            .chains
            .into_iter()
            .map(|c| {
                let rpc_url = Url::parse(&c.rpc_url)
                    .wrap_err_with(|| format!("Invalid RPC URL for chain {}", c.chain_id))?;
                Ok(ChainEntry {
                    chain_id: ChainId(c.chain_id),
                    label: c.label,
                    rpc_url,
                    bridge_address: c.bridge_address,
                    multicall_address: c.multicall_address.unwrap_or(MULTICALL3_ADDRESS),
                    original_tokens: c.original_tokens,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Self::new(chains)
    }

    /// Load from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read chain registry {}", path.display()))?;
        Self::from_json_str(&json)
    }

    pub fn get(&self, chain_id: ChainId) -> Option<&ChainEntry> {
        self.by_id.get(&chain_id).map(|&idx| &self.chains[idx])
    }

    /// Original token addresses for a chain (empty for unknown chains)
    pub fn original_tokens(&self, chain_id: ChainId) -> &[Address] {
        self.get(chain_id)
            .map(|c| c.original_tokens.as_slice())
            .unwrap_or(&[])
    }

    pub fn chain_ids(&self) -> Vec<ChainId> {
        self.chains.iter().map(|c| c.chain_id).collect()
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}
