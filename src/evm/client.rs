//! Bridge contract handle
//!
//! A [`BridgeHandle`] binds one chain's bridge contract to the active wallet
//! signer. It is created once per (chain, signer) pair and discarded, never
//! mutated, when either changes.
//!
//! # Transaction Building
//!
//! Providers are built per operation with `with_recommended_fillers()` so nonce,
//! gas limit and EIP-1559 fees are populated before the wallet signs.

use alloy::{
    network::EthereumWallet,
    primitives::Address,
    providers::{Provider, ProviderBuilder},
    signers::local::PrivateKeySigner,
    transports::http::{Client, Http},
};
use eyre::{eyre, Result, WrapErr};
use tracing::info;
use url::Url;

use crate::registry::ChainEntry;
use crate::types::{ChainId, PartyRef};

/// Bridge contract on one chain, bound to the active signer
#[derive(Clone)]
pub struct BridgeHandle {
    chain_id: ChainId,
    label: String,
    rpc_url: Url,
    bridge_address: Address,
    multicall_address: Address,
    signer: PrivateKeySigner,
}

impl BridgeHandle {
    /// Bind a registry entry to a signer
    pub fn new(chain: &ChainEntry, signer: PrivateKeySigner) -> Self {
        info!(
            chain_id = %chain.chain_id,
            chain = %chain.label,
            bridge = %chain.bridge_address,
            signer = %signer.address(),
            "Bridge handle created"
        );

        Self {
            chain_id: chain.chain_id,
            label: chain.label.clone(),
            rpc_url: chain.rpc_url.clone(),
            bridge_address: chain.bridge_address,
            multicall_address: chain.multicall_address,
            signer,
        }
    }

    pub fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn bridge_address(&self) -> Address {
        self.bridge_address
    }

    pub fn multicall_address(&self) -> Address {
        self.multicall_address
    }

    /// Address of the connected wallet
    pub fn account(&self) -> Address {
        self.signer.address()
    }

    /// The connected wallet as a party on this chain
    pub fn party(&self) -> PartyRef {
        PartyRef::new(self.account(), self.chain_id)
    }

    /// Underlying signer (for typed-data signatures)
    pub fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }

    /// Whether this handle was built for the given chain and signer
    pub fn matches(&self, chain_id: ChainId, account: Address) -> bool {
        self.chain_id == chain_id && self.account() == account
    }

    /// Provider with wallet and recommended fillers, for reads and writes
    pub fn provider(&self) -> impl Provider<Http<Client>> + Clone {
        let wallet = EthereumWallet::from(self.signer.clone());
        ProviderBuilder::new()
            .with_recommended_fillers()
            .wallet(wallet)
            .on_http(self.rpc_url.clone())
    }
}

impl std::fmt::Debug for BridgeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeHandle")
            .field("chain_id", &self.chain_id)
            .field("label", &self.label)
            .field("bridge_address", &self.bridge_address)
            .field("account", &self.account())
            .field("signer", &"<redacted>")
            .finish()
    }
}

/// Read-only provider for a chain other than the active one
pub fn read_provider(rpc_url: &Url) -> impl Provider<Http<Client>> + Clone {
    ProviderBuilder::new().on_http(rpc_url.clone())
}

/// Parse a hex private key into a wallet signer
pub fn parse_signer(private_key: &str) -> Result<PrivateKeySigner> {
    let key = private_key.trim();
    if key.is_empty() {
        return Err(eyre!("Private key is empty"));
    }
    key.parse::<PrivateKeySigner>()
        .wrap_err("Invalid private key")
}
