//! EVM Chain Support Module
//!
//! Everything that talks to a chain: contract bindings, batched reads, the
//! permit/approve negotiation and the two write paths of a transfer.
//!
//! ## Submodules
//!
//! - `client` - Bridge handle (chain + signer) and provider construction
//! - `contracts` - Bridge, token and Multicall3 bindings using alloy sol! macro
//! - `multicall` - Batched reads through Multicall3
//! - `tokens` - Token catalog and ERC20 metadata helpers
//! - `permit` - Permit capability introspection and authorization
//! - `signer` - EIP-712 signing for permits and claims
//! - `tx` - Simulate / send / mine lifecycle
//! - `events` - Deposit event parsing
//! - `deposit` - Source-chain deposit orchestration
//! - `claim` - Destination-chain claim submission

pub mod claim;
pub mod client;
pub mod contracts;
pub mod deposit;
pub mod events;
pub mod multicall;
pub mod permit;
pub mod signer;
pub mod tokens;
pub mod tx;

// Re-export commonly used items
pub use claim::ClaimSubmitter;
pub use client::{parse_signer, BridgeHandle};
pub use contracts::{Bridge, ClaimPayload, DepositPayload, Multicall3, PermitToken, Signature};
pub use deposit::DepositOrchestrator;
pub use multicall::MulticallReader;
pub use permit::{Authorization, AuthorizationNegotiator, PermitCapability};
pub use signer::DomainIdentity;
pub use tokens::TokenCatalog;
