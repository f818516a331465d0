//! Claim reconstruction
//!
//! Derives the destination-chain [`ClaimPayload`] from a mined deposit. This is
//! a pure function of the decoded event, its position and a token index; it
//! performs no I/O and returns identical payloads for identical inputs.
//!
//! | event | destination | target token | name / symbol source |
//! |---|---|---|---|
//! | `LockOriginalToken` | any | zero (mint wrapped) | locked token, prefixed `Wrapped ` / `W` |
//! | `BurnWrappedToken` | original's home chain | original address (release) | original token |
//! | `BurnWrappedToken` | other chain | zero (mint wrapped) | burned wrapped token |

use alloy::primitives::{Address, U256};

use crate::error::{BridgeError, Result};
use crate::evm::contracts::{ClaimPayload, ClaimToken, PartyRef};
use crate::types::{ChainId, DepositEvent, DepositRecord, TokenIndex, TokenMetadata};

/// Prefix added to an original token's name when it is wrapped
pub const WRAPPED_NAME_PREFIX: &str = "Wrapped ";

/// Prefix added to an original token's symbol when it is wrapped
pub const WRAPPED_SYMBOL_PREFIX: &str = "W";

fn lookup(index: &TokenIndex, chain_id: ChainId, address: Address) -> Result<&TokenMetadata> {
    index
        .get(chain_id, address)
        .ok_or(BridgeError::Lookup { chain_id, address })
}

fn party(address: Address, chain_id: ChainId) -> PartyRef {
    PartyRef {
        account: address,
        chainId: chain_id.to_u256(),
    }
}

/// Build the claim payload for a mined deposit
pub fn reconstruct(record: &DepositRecord, index: &TokenIndex) -> Result<ClaimPayload> {
    let (from, to, value, token, source_token, target, name, symbol) = match &record.event {
        DepositEvent::LockOriginalToken(e) => {
            let metadata = lookup(index, e.source_chain_id, e.locked_token_address)?;
            (
                party(e.sender, e.source_chain_id),
                party(e.recipient, e.to_chain_id),
                e.value,
                ClaimToken {
                    tokenAddress: e.locked_token_address,
                    originChainId: e.source_chain_id.to_u256(),
                },
                e.locked_token_address,
                Address::ZERO,
                format!("{}{}", WRAPPED_NAME_PREFIX, metadata.name),
                format!("{}{}", WRAPPED_SYMBOL_PREFIX, metadata.symbol),
            )
        }
        DepositEvent::BurnWrappedToken(e) => {
            let returning_home = e.original_token_chain_id == e.to_chain_id;
            let (target, metadata) = if returning_home {
                (
                    e.original_token_address,
                    lookup(index, e.original_token_chain_id, e.original_token_address)?,
                )
            } else {
                (
                    Address::ZERO,
                    lookup(index, e.source_chain_id, e.burned_wrapped_token_address)?,
                )
            };
            (
                party(e.sender, e.source_chain_id),
                party(e.recipient, e.to_chain_id),
                e.value,
                ClaimToken {
                    tokenAddress: e.original_token_address,
                    originChainId: e.original_token_chain_id.to_u256(),
                },
                e.burned_wrapped_token_address,
                target,
                metadata.name.clone(),
                metadata.symbol.clone(),
            )
        }
    };

    Ok(ClaimPayload {
        from,
        to,
        value,
        token,
        depositTxSourceToken: source_token,
        targetTokenAddress: target,
        targetTokenName: name,
        targetTokenSymbol: symbol,
        // claims never expire
        deadline: U256::MAX,
        sourceTxData: record.source.into(),
    })
}
