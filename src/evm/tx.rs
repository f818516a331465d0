//! Transaction lifecycle: simulate, send, wait for mining
//!
//! Every write goes through [`simulate_and_submit`]: an `eth_call` of the exact
//! call first, then the signed transaction, then the receipt. A revert at any
//! stage is reported with the decoded revert reason when one is available.

use alloy::{
    contract::{CallBuilder, CallDecoder, Error as ContractError},
    providers::Provider,
    rpc::types::TransactionReceipt,
    sol_types::decode_revert_reason,
    transports::Transport,
};
use tracing::{debug, info, warn};

use crate::error::{BridgeError, Result};
use crate::types::{ChainId, MinedTransaction};

/// Human-readable revert reason, falling back to the raw error text
pub fn revert_reason(err: &ContractError) -> String {
    let data = match err {
        ContractError::TransportError(e) => e.as_error_resp().and_then(|p| p.as_revert_data()),
        _ => None,
    };
    data.and_then(|data| decode_revert_reason(&data[..]))
        .unwrap_or_else(|| err.to_string())
}

/// Dry-run `call`, then send it and wait for a successful receipt
///
/// No step is retried; the first failure aborts with a Simulation or
/// Submission error naming `operation`.
pub async fn simulate_and_submit<T, P, D>(
    operation: &str,
    chain_id: ChainId,
    call: CallBuilder<T, P, D>,
) -> Result<TransactionReceipt>
where
    T: Transport + Clone,
    P: Provider<T>,
    D: CallDecoder + Unpin,
{
    debug!(operation, chain_id = %chain_id, "Simulating");
    call.call().await.map_err(|e| {
        let reason = revert_reason(&e);
        warn!(operation, chain_id = %chain_id, reason = %reason, "Simulation failed");
        BridgeError::simulation(operation, reason)
    })?;

    let pending = call
        .send()
        .await
        .map_err(|e| BridgeError::submission(operation, revert_reason(&e)))?;

    let tx_hash = *pending.tx_hash();
    info!(operation, chain_id = %chain_id, tx_hash = %tx_hash, "Transaction sent, waiting for confirmation");

    let receipt = pending
        .get_receipt()
        .await
        .map_err(|e| BridgeError::submission(operation, e.to_string()))?;

    if !receipt.status() {
        warn!(operation, tx_hash = %tx_hash, "Transaction reverted");
        return Err(BridgeError::submission(
            operation,
            format!("transaction {} reverted", tx_hash),
        ));
    }

    info!(
        operation,
        chain_id = %chain_id,
        tx_hash = %tx_hash,
        block = ?receipt.block_number,
        "Transaction mined"
    );
    Ok(receipt)
}

/// Summarize a mined receipt
pub fn mined_transaction(chain_id: ChainId, receipt: &TransactionReceipt) -> MinedTransaction {
    MinedTransaction {
        chain_id,
        transaction_hash: receipt.transaction_hash,
        block_hash: receipt.block_hash,
        block_number: receipt.block_number,
        gas_used: u128::from(receipt.gas_used),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::rpc::json_rpc::ErrorPayload;
    use alloy::sol_types::{Revert, SolError};
    use alloy::transports::RpcError;

    fn rpc_revert(data: &str) -> ContractError {
        ContractError::TransportError(RpcError::ErrorResp(ErrorPayload {
            code: 3,
            message: "execution reverted".into(),
            data: Some(serde_json::value::to_raw_value(data).unwrap()),
        }))
    }

    #[test]
    fn test_revert_reason_decoded_from_rpc_payload() {
        let encoded = Revert {
            reason: "insufficient balance".into(),
        }
        .abi_encode();
        let err = rpc_revert(&alloy::hex::encode_prefixed(encoded));

        assert!(revert_reason(&err).contains("insufficient balance"));
    }

    #[test]
    fn test_revert_reason_falls_back_to_error_text() {
        let err = ContractError::UnknownFunction("depositAll".into());
        assert_eq!(revert_reason(&err), err.to_string());
    }
}
