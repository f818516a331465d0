//! Destination-chain claim (phase 2 of a transfer)

use alloy::primitives::Address;
use tracing::info;

use crate::error::{BridgeError, Result};
use crate::evm::client::BridgeHandle;
use crate::evm::contracts::{Bridge, ClaimPayload};
use crate::evm::signer::{sign_claim, DomainIdentity};
use crate::evm::tx::{mined_transaction, simulate_and_submit};
use crate::types::{ChainId, MinedTransaction};

/// Reject a payload that is not addressed to `chain_id`
pub fn check_destination(payload: &ClaimPayload, chain_id: ChainId) -> Result<()> {
    match payload.destination_chain() {
        Some(dest) if dest == chain_id => Ok(()),
        Some(dest) => Err(BridgeError::Precondition(format!(
            "claim is for chain {} but the active chain is {}",
            dest, chain_id
        ))),
        None => Err(BridgeError::Precondition(
            "claim destination chain id out of range".into(),
        )),
    }
}

/// Signs and submits claims on the handle's chain
pub struct ClaimSubmitter<'a> {
    handle: &'a BridgeHandle,
    identity: &'a DomainIdentity,
}

impl<'a> ClaimSubmitter<'a> {
    pub fn new(handle: &'a BridgeHandle, identity: &'a DomainIdentity) -> Self {
        Self { handle, identity }
    }

    /// Sign `payload` for this chain's bridge, simulate, submit and wait for mining
    pub async fn claim(&self, payload: &ClaimPayload) -> Result<MinedTransaction> {
        let chain_id = self.handle.chain_id();
        check_destination(payload, chain_id)?;

        let bridge_address: Address = self.handle.bridge_address();
        let signature = sign_claim(self.handle.signer(), self.identity, bridge_address, payload)?;

        info!(
            chain_id = %chain_id,
            source_tx = %payload.sourceTxData.transactionHash,
            target = %payload.targetTokenAddress,
            value = %payload.value,
            "Submitting claim"
        );

        let provider = self.handle.provider();
        let bridge = Bridge::new(bridge_address, &provider);
        let receipt =
            simulate_and_submit("claim", chain_id, bridge.claim(payload.clone(), signature))
                .await?;

        Ok(mined_transaction(chain_id, &receipt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evm::contracts::{ClaimToken, PartyRef, SourceTxData};
    use alloy::primitives::{B256, U256};

    fn payload_to(chain: U256) -> ClaimPayload {
        ClaimPayload {
            from: PartyRef {
                account: Address::repeat_byte(1),
                chainId: U256::from(1),
            },
            to: PartyRef {
                account: Address::repeat_byte(2),
                chainId: chain,
            },
            value: U256::from(1),
            token: ClaimToken {
                tokenAddress: Address::repeat_byte(0xa),
                originChainId: U256::from(1),
            },
            depositTxSourceToken: Address::repeat_byte(0xa),
            targetTokenAddress: Address::ZERO,
            targetTokenName: "Wrapped Foo".into(),
            targetTokenSymbol: "WFOO".into(),
            deadline: U256::MAX,
            sourceTxData: SourceTxData {
                transactionHash: B256::ZERO,
                blockHash: B256::ZERO,
                logIndex: U256::ZERO,
            },
        }
    }

    #[test]
    fn test_destination_must_match_active_chain() {
        assert!(check_destination(&payload_to(U256::from(2)), ChainId(2)).is_ok());

        let err = check_destination(&payload_to(U256::from(2)), ChainId(1)).unwrap_err();
        assert!(matches!(err, BridgeError::Precondition(_)));

        assert!(check_destination(&payload_to(U256::MAX), ChainId(1)).is_err());
    }
}
