//! EVM Event Parsing
//!
//! Turns the bridge's deposit logs into [`DepositRecord`]s, the completion token
//! handed from the deposit phase to the claim phase.

use alloy::{
    primitives::{Address, B256},
    rpc::types::{Log, TransactionReceipt},
};
use tracing::warn;

use crate::error::{BridgeError, Result};
use crate::evm::contracts::Bridge;
use crate::types::{BurnWrapped, ChainId, DepositEvent, DepositRecord, LockOriginal, SourceTx};

fn chain_field(name: &str, value: alloy::primitives::U256) -> Result<ChainId> {
    ChainId::from_u256(value).ok_or_else(|| {
        BridgeError::Precondition(format!("{} {} is not a valid chain id", name, value))
    })
}

impl TryFrom<Bridge::LockOriginalToken> for LockOriginal {
    type Error = BridgeError;

    fn try_from(e: Bridge::LockOriginalToken) -> Result<Self> {
        Ok(Self {
            source_chain_id: chain_field("sourceChainId", e.sourceChainId)?,
            locked_token_address: e.lockedTokenAddress,
            sender: e.sender,
            recipient: e.recipient,
            to_chain_id: chain_field("toChainId", e.toChainId)?,
            value: e.value,
        })
    }
}

impl TryFrom<Bridge::BurnWrappedToken> for BurnWrapped {
    type Error = BridgeError;

    fn try_from(e: Bridge::BurnWrappedToken) -> Result<Self> {
        Ok(Self {
            source_chain_id: chain_field("sourceChainId", e.sourceChainId)?,
            burned_wrapped_token_address: e.burnedWrappedTokenAddress,
            original_token_address: e.originalTokenAddress,
            original_token_chain_id: chain_field("originalTokenChainId", e.originalTokenChainId)?,
            sender: e.sender,
            recipient: e.recipient,
            to_chain_id: chain_field("toChainId", e.toChainId)?,
            value: e.value,
        })
    }
}

/// Decode a single log as one of the two deposit events, if it is one
pub fn decode_deposit_log(log: &Log) -> Option<Result<DepositEvent>> {
    if let Ok(decoded) = log.log_decode::<Bridge::LockOriginalToken>() {
        return Some(LockOriginal::try_from(decoded.inner.data).map(DepositEvent::LockOriginalToken));
    }
    if let Ok(decoded) = log.log_decode::<Bridge::BurnWrappedToken>() {
        return Some(BurnWrapped::try_from(decoded.inner.data).map(DepositEvent::BurnWrappedToken));
    }
    None
}

/// Build a deposit record for every bridge deposit log, in log order
///
/// The event position is copied verbatim from the receipt; a receipt without a
/// block hash or log index is not a mined deposit and is rejected. A
/// transaction with no deposit log is an error.
pub fn deposit_records_from_logs(
    bridge: Address,
    transaction_hash: B256,
    block_hash: Option<B256>,
    logs: &[Log],
) -> Result<Vec<DepositRecord>> {
    let mut records = Vec::new();
    for log in logs.iter().filter(|l| l.address() == bridge) {
        let Some(event) = decode_deposit_log(log) else {
            continue;
        };
        let event = event?;

        let block_hash = log.block_hash.or(block_hash).ok_or_else(|| {
            BridgeError::Precondition(format!("deposit {} is not mined yet", transaction_hash))
        })?;
        let log_index = log.log_index.ok_or_else(|| {
            BridgeError::Precondition(format!("deposit {} log has no index", transaction_hash))
        })?;

        records.push(DepositRecord {
            event,
            source: SourceTx {
                transaction_hash,
                block_hash,
                log_index,
            },
            source_token_metadata: None,
        });
    }

    if records.is_empty() {
        warn!(tx_hash = %transaction_hash, bridge = %bridge, "No deposit event in transaction");
        return Err(BridgeError::Precondition(format!(
            "transaction {} emitted no bridge deposit event",
            transaction_hash
        )));
    }
    Ok(records)
}

/// Build the record of a transaction that made exactly one deposit
pub fn deposit_record_from_logs(
    bridge: Address,
    transaction_hash: B256,
    block_hash: Option<B256>,
    logs: &[Log],
) -> Result<DepositRecord> {
    let mut records = deposit_records_from_logs(bridge, transaction_hash, block_hash, logs)?;
    if records.len() > 1 {
        return Err(BridgeError::Precondition(format!(
            "transaction {} emitted {} deposits, expected one",
            transaction_hash,
            records.len()
        )));
    }
    Ok(records.swap_remove(0))
}

/// Build the deposit record of a single-deposit receipt
pub fn deposit_record_from_receipt(
    bridge: Address,
    receipt: &TransactionReceipt,
) -> Result<DepositRecord> {
    deposit_record_from_logs(
        bridge,
        receipt.transaction_hash,
        receipt.block_hash,
        receipt.inner.logs(),
    )
}

/// Build every deposit record of a receipt
pub fn deposit_records_from_receipt(
    bridge: Address,
    receipt: &TransactionReceipt,
) -> Result<Vec<DepositRecord>> {
    deposit_records_from_logs(
        bridge,
        receipt.transaction_hash,
        receipt.block_hash,
        receipt.inner.logs(),
    )
}
