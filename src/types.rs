//! Common types for cross-chain transfers
//!
//! Plain Rust values shared by the read path (catalog), the deposit path and
//! the claim path. ABI-facing payloads live in [`crate::evm::contracts`].

use alloy::primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ============================================================================
// Chain ID
// ============================================================================

/// Numeric EVM chain identifier
///
/// Key into the [`crate::registry::ChainRegistry`] and into per-chain token
/// indices. Encoded as `uint256` in every contract payload.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ChainId(pub u64);

impl ChainId {
    /// Get the raw value
    pub fn to_u64(&self) -> u64 {
        self.0
    }

    /// Convert to the `uint256` form used in contract payloads
    pub fn to_u256(&self) -> U256 {
        U256::from(self.0)
    }

    /// Convert from a `uint256` event field
    ///
    /// Returns `None` if the value does not fit a u64 (never a valid EVM chain id).
    pub fn from_u256(value: U256) -> Option<Self> {
        u64::try_from(value).ok().map(ChainId)
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ChainId {
    fn from(id: u64) -> Self {
        ChainId(id)
    }
}

// ============================================================================
// Parties and tokens
// ============================================================================

/// A sender or recipient together with the chain it acts on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartyRef {
    pub address: Address,
    pub chain_id: ChainId,
}

impl PartyRef {
    pub fn new(address: Address, chain_id: ChainId) -> Self {
        Self { address, chain_id }
    }
}

/// Bridgeable token with the connected account's balance
///
/// Immutable snapshot produced by the catalog refresh. Balances are in the
/// token's smallest unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub name: String,
    pub symbol: String,
    pub address: Address,
    pub balance: U256,
}

impl Token {
    pub fn metadata(&self) -> TokenMetadata {
        TokenMetadata {
            name: self.name.clone(),
            symbol: self.symbol.clone(),
        }
    }
}

/// Name and symbol of a token, as recorded in a [`TokenIndex`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
}

impl TokenMetadata {
    pub fn new(name: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
        }
    }
}

/// Token metadata keyed by `(chain, address)`
///
/// Addresses are unique within a chain only, so the chain is part of the key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenIndex {
    entries: HashMap<(ChainId, Address), TokenMetadata>,
}

impl TokenIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, chain_id: ChainId, address: Address, metadata: TokenMetadata) {
        self.entries.insert((chain_id, address), metadata);
    }

    /// Add every token of a catalog snapshot taken on `chain_id`
    pub fn insert_catalog(&mut self, chain_id: ChainId, tokens: &[Token]) {
        for token in tokens {
            self.insert(chain_id, token.address, token.metadata());
        }
    }

    pub fn get(&self, chain_id: ChainId, address: Address) -> Option<&TokenMetadata> {
        self.entries.get(&(chain_id, address))
    }

    pub fn contains(&self, chain_id: ChainId, address: Address) -> bool {
        self.entries.contains_key(&(chain_id, address))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// Deposit event data
// ============================================================================

/// Position of the deposit event that a claim consumes
///
/// `(transaction_hash, block_hash, log_index)` uniquely identifies the event and
/// is the anti-replay key checked by the destination bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceTx {
    pub transaction_hash: B256,
    pub block_hash: B256,
    pub log_index: u64,
}

impl fmt::Display for SourceTx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.transaction_hash, self.log_index)
    }
}

/// Decoded `LockOriginalToken` event: an original token locked on its home chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockOriginal {
    pub source_chain_id: ChainId,
    pub locked_token_address: Address,
    pub sender: Address,
    pub recipient: Address,
    pub to_chain_id: ChainId,
    pub value: U256,
}

/// Decoded `BurnWrappedToken` event: a wrapped representation burned to move value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurnWrapped {
    pub source_chain_id: ChainId,
    pub burned_wrapped_token_address: Address,
    pub original_token_address: Address,
    pub original_token_chain_id: ChainId,
    pub sender: Address,
    pub recipient: Address,
    pub to_chain_id: ChainId,
    pub value: U256,
}

/// The two event shapes a deposit can emit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum DepositEvent {
    LockOriginalToken(LockOriginal),
    BurnWrappedToken(BurnWrapped),
}

impl DepositEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            DepositEvent::LockOriginalToken(_) => "LockOriginalToken",
            DepositEvent::BurnWrappedToken(_) => "BurnWrappedToken",
        }
    }

    pub fn source_chain_id(&self) -> ChainId {
        match self {
            DepositEvent::LockOriginalToken(e) => e.source_chain_id,
            DepositEvent::BurnWrappedToken(e) => e.source_chain_id,
        }
    }

    pub fn to_chain_id(&self) -> ChainId {
        match self {
            DepositEvent::LockOriginalToken(e) => e.to_chain_id,
            DepositEvent::BurnWrappedToken(e) => e.to_chain_id,
        }
    }

    pub fn recipient(&self) -> Address {
        match self {
            DepositEvent::LockOriginalToken(e) => e.recipient,
            DepositEvent::BurnWrappedToken(e) => e.recipient,
        }
    }

    /// Token the depositor handed to the source bridge
    pub fn source_token(&self) -> Address {
        match self {
            DepositEvent::LockOriginalToken(e) => e.locked_token_address,
            DepositEvent::BurnWrappedToken(e) => e.burned_wrapped_token_address,
        }
    }

    /// Index entry the claim reconstruction will look up
    pub fn required_metadata_key(&self) -> (ChainId, Address) {
        match self {
            DepositEvent::LockOriginalToken(e) => (e.source_chain_id, e.locked_token_address),
            DepositEvent::BurnWrappedToken(e) if e.original_token_chain_id == e.to_chain_id => {
                (e.original_token_chain_id, e.original_token_address)
            }
            DepositEvent::BurnWrappedToken(e) => {
                (e.source_chain_id, e.burned_wrapped_token_address)
            }
        }
    }
}

/// Phase-1 completion token: a mined deposit, ready to be claimed
///
/// Carries everything phase 2 needs so a claim can be resumed without
/// re-running the deposit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositRecord {
    pub event: DepositEvent,
    pub source: SourceTx,
    /// Metadata of the deposited token on the source chain, if it was known
    #[serde(default)]
    pub source_token_metadata: Option<TokenMetadata>,
}

impl DepositRecord {
    /// Seed a token index with the metadata snapshot carried by this record
    pub fn seed_index(&self, index: &mut TokenIndex) {
        if let Some(metadata) = &self.source_token_metadata {
            index.insert(
                self.event.source_chain_id(),
                self.event.source_token(),
                metadata.clone(),
            );
        }
    }
}

/// Receipt summary of a mined bridge transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinedTransaction {
    pub chain_id: ChainId,
    pub transaction_hash: B256,
    pub block_hash: Option<B256>,
    pub block_number: Option<u64>,
    pub gas_used: u128,
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    #[test]
    fn test_chain_id_u256_conversion() {
        let id = ChainId(11155111);
        assert_eq!(id.to_u256(), U256::from(11155111u64));
        assert_eq!(ChainId::from_u256(U256::from(11155111u64)), Some(id));
        assert_eq!(ChainId::from_u256(U256::MAX), None);
    }

    #[test]
    fn test_chain_id_display() {
        assert_eq!(ChainId(31337).to_string(), "31337");
    }

    #[test]
    fn test_chain_id_serde_transparent() {
        let json = serde_json::to_string(&ChainId(56)).unwrap();
        assert_eq!(json, "56");
    }

    #[test]
    fn test_token_index_is_chain_scoped() {
        let token = address!("00000000000000000000000000000000000000aa");
        let mut index = TokenIndex::new();
        index.insert(ChainId(1), token, TokenMetadata::new("Foo", "FOO"));

        assert!(index.contains(ChainId(1), token));
        assert!(!index.contains(ChainId(2), token));
        assert_eq!(index.get(ChainId(1), token).unwrap().symbol, "FOO");
    }

    #[test]
    fn test_required_metadata_key_burn_to_home_chain() {
        let original = address!("00000000000000000000000000000000000000aa");
        let wrapped = address!("00000000000000000000000000000000000000bb");
        let event = DepositEvent::BurnWrappedToken(BurnWrapped {
            source_chain_id: ChainId(2),
            burned_wrapped_token_address: wrapped,
            original_token_address: original,
            original_token_chain_id: ChainId(1),
            sender: Address::ZERO,
            recipient: Address::ZERO,
            to_chain_id: ChainId(1),
            value: U256::from(50),
        });
        assert_eq!(event.required_metadata_key(), (ChainId(1), original));

        let DepositEvent::BurnWrappedToken(mut inner) = event else {
            unreachable!()
        };
        inner.to_chain_id = ChainId(3);
        let event = DepositEvent::BurnWrappedToken(inner);
        assert_eq!(event.required_metadata_key(), (ChainId(2), wrapped));
    }

    #[test]
    fn test_deposit_event_serde_tagged() {
        let event = DepositEvent::LockOriginalToken(LockOriginal {
            source_chain_id: ChainId(1),
            locked_token_address: Address::ZERO,
            sender: Address::ZERO,
            recipient: Address::ZERO,
            to_chain_id: ChainId(2),
            value: U256::from(100),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "LockOriginalToken");
        let back: DepositEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
