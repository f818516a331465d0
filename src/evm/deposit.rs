//! Source-chain deposit (phase 1 of a transfer)
//!
//! The negotiated [`Authorization`] picks exactly one of two paths:
//!
//! - permit: `depositWithPermit` with the signature embedded in the payload
//! - approve: `approve(bridge, amount)`, mined, then `deposit` with a zero signature
//!
//! A failure on the permit path never falls back to approve. Neither path rolls
//! back an earlier mined step; re-running after a failed deposit only repeats a
//! harmless approve.

use alloy::primitives::{Address, U256};
use chrono::Utc;
use tracing::info;

use crate::error::{BridgeError, Result};
use crate::evm::client::BridgeHandle;
use crate::evm::contracts::{Bridge, DepositPayload, PermitToken, Signature};
use crate::evm::events::deposit_record_from_receipt;
use crate::evm::permit::{Authorization, AuthorizationNegotiator};
use crate::evm::tx::{mined_transaction, simulate_and_submit};
use crate::types::{DepositRecord, MinedTransaction, PartyRef};

/// Default validity window of a deposit, in seconds
pub const DEFAULT_DEPOSIT_WINDOW_SECS: u64 = 3600;

/// Unix-seconds deadline `window_secs` after `now`, always later than `now`
pub fn deposit_deadline(now: i64, window_secs: u64) -> Result<U256> {
    if window_secs == 0 {
        return Err(BridgeError::Precondition(
            "deposit window must be at least one second".into(),
        ));
    }
    let now = u64::try_from(now)
        .map_err(|_| BridgeError::Precondition(format!("clock before epoch: {}", now)))?;
    Ok(U256::from(now) + U256::from(window_secs))
}

/// Assemble the payload submitted to `deposit`/`depositWithPermit`
pub fn build_deposit_payload(
    from: PartyRef,
    to: PartyRef,
    spender: Address,
    token: Address,
    value: U256,
    deadline: U256,
    authorization: &Authorization,
) -> DepositPayload {
    let signature = match authorization {
        Authorization::Permit(sig) => sig.clone(),
        Authorization::Approve => Signature::zero(),
    };
    DepositPayload {
        from: from.into(),
        to: to.into(),
        spender,
        token,
        value,
        deadline,
        approveTokenTransferSig: signature,
    }
}

/// Runs phase 1 for the handle's chain and signer
pub struct DepositOrchestrator<'a> {
    handle: &'a BridgeHandle,
    window_secs: u64,
}

impl<'a> DepositOrchestrator<'a> {
    pub fn new(handle: &'a BridgeHandle, window_secs: u64) -> Self {
        Self {
            handle,
            window_secs,
        }
    }

    /// Deposit `amount` of `token` towards `destination` and wait for mining
    ///
    /// Returns the mined transaction together with the decoded deposit record
    /// that phase 2 consumes.
    pub async fn transfer(
        &self,
        token: Address,
        amount: U256,
        destination: PartyRef,
    ) -> Result<(MinedTransaction, DepositRecord)> {
        let chain_id = self.handle.chain_id();
        if amount.is_zero() {
            return Err(BridgeError::Precondition("amount must be greater than zero".into()));
        }
        if destination.chain_id == chain_id {
            return Err(BridgeError::Precondition(format!(
                "destination chain {} is the source chain",
                chain_id
            )));
        }

        let provider = self.handle.provider();
        let bridge_address = self.handle.bridge_address();
        let bridge = Bridge::new(bridge_address, &provider);

        let deadline = deposit_deadline(Utc::now().timestamp(), self.window_secs)?;
        let authorization = AuthorizationNegotiator::new(&provider, self.handle.signer(), chain_id)
            .negotiate(token, bridge_address, amount, deadline)
            .await?;

        let payload = build_deposit_payload(
            self.handle.party(),
            destination,
            bridge_address,
            token,
            amount,
            deadline,
            &authorization,
        );

        info!(
            chain_id = %chain_id,
            token = %token,
            amount = %amount,
            to_chain = %destination.chain_id,
            recipient = %destination.address,
            permit = authorization.is_permit(),
            "Starting deposit"
        );

        let receipt = match authorization {
            Authorization::Permit(_) => {
                simulate_and_submit(
                    "depositWithPermit",
                    chain_id,
                    bridge.depositWithPermit(payload),
                )
                .await?
            }
            Authorization::Approve => {
                let erc20 = PermitToken::new(token, &provider);
                simulate_and_submit("approve", chain_id, erc20.approve(bridge_address, amount))
                    .await?;
                simulate_and_submit("deposit", chain_id, bridge.deposit(payload)).await?
            }
        };

        let mined = mined_transaction(chain_id, &receipt);
        let record = deposit_record_from_receipt(bridge_address, &receipt)?;
        info!(
            tx_hash = %mined.transaction_hash,
            event = record.event.kind(),
            log_index = record.source.log_index,
            "Deposit mined"
        );
        Ok((mined, record))
    }
}
