//! Typed-data (EIP-712) signing
//!
//! The wallet signer produces two kinds of structured signatures:
//!
//! - the ERC-2612 `Permit` message, scoped to the token contract and source chain
//! - the claim authorization over a [`ClaimPayload`], scoped to the destination
//!   bridge and destination chain
//!
//! Both are returned in contract form (`v`, `r`, `s`).

use alloy::{
    primitives::{Address, B256, U256},
    signers::{local::PrivateKeySigner, SignerSync},
    sol_types::{eip712_domain, Eip712Domain, SolStruct},
};
use tracing::debug;

use crate::error::{BridgeError, Result};
use crate::evm::contracts::{ClaimPayload, Permit, Signature};
use crate::types::ChainId;

/// Name/version pair of an EIP-712 domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainIdentity {
    pub name: String,
    pub version: String,
}

impl DomainIdentity {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    /// Full domain bound to a chain and verifying contract
    pub fn bind(&self, chain_id: ChainId, verifying_contract: Address) -> Eip712Domain {
        eip712_domain! {
            name: self.name.clone(),
            version: self.version.clone(),
            chain_id: chain_id.to_u64(),
            verifying_contract: verifying_contract,
        }
    }
}

impl Default for DomainIdentity {
    fn default() -> Self {
        Self::new("Bridge", "1")
    }
}

/// Sign any EIP-712 struct under `domain`
pub fn sign_typed<S: SolStruct>(
    signer: &PrivateKeySigner,
    message: &S,
    domain: &Eip712Domain,
) -> Result<Signature> {
    let hash = message.eip712_signing_hash(domain);
    sign_prehash(signer, hash)
}

fn sign_prehash(signer: &PrivateKeySigner, hash: B256) -> Result<Signature> {
    let signature = signer
        .sign_hash_sync(&hash)
        .map_err(|e| BridgeError::Precondition(format!("wallet refused to sign: {}", e)))?;
    debug!(signer = %signer.address(), hash = %hash, "Signed typed data");
    Ok(Signature::from_rsv(&signature.as_bytes()))
}

/// ERC-2612 permit authorizing `spender` to move `value` of the token
pub fn sign_permit(
    signer: &PrivateKeySigner,
    token_domain: &Eip712Domain,
    spender: Address,
    value: U256,
    nonce: U256,
    deadline: U256,
) -> Result<Signature> {
    let permit = Permit {
        owner: signer.address(),
        spender,
        value,
        nonce,
        deadline,
    };
    sign_typed(signer, &permit, token_domain)
}

/// Claim authorization, scoped to the destination chain's bridge
pub fn sign_claim(
    signer: &PrivateKeySigner,
    identity: &DomainIdentity,
    destination_bridge: Address,
    payload: &ClaimPayload,
) -> Result<Signature> {
    let chain_id = payload.destination_chain().ok_or_else(|| {
        BridgeError::Precondition("claim destination chain id out of range".into())
    })?;
    let domain = identity.bind(chain_id, destination_bridge);
    sign_typed(signer, payload, &domain)
}
