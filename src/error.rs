//! Error taxonomy for bridge operations
//!
//! Every failure is caught at the operation boundary (refresh, transfer,
//! receive, claim) and turned into one user-facing message with
//! [`BridgeError::user_message`]. Nothing here is retried automatically.

use alloy::primitives::Address;
use thiserror::Error;

use crate::types::ChainId;

pub type Result<T, E = BridgeError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum BridgeError {
    /// RPC or multicall batch failure
    #[error("connectivity error: {0}")]
    Connectivity(String),

    /// Permit capability probe gave an ambiguous or failing answer
    #[error("permit capability probe failed for {token}: {reason}")]
    CapabilityProbe { token: Address, reason: String },

    /// Dry-run of a call reverted
    #[error("simulation of {operation} failed: {reason}")]
    Simulation { operation: String, reason: String },

    /// Transaction rejected before or during mining
    #[error("submission of {operation} failed: {reason}")]
    Submission { operation: String, reason: String },

    /// Token metadata missing from the index during claim reconstruction
    #[error("no token metadata for {address} on chain {chain_id}")]
    Lookup { chain_id: ChainId, address: Address },

    /// Operation invoked without a ready signer/contract pair or with bad input
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// Same operation already in flight for this signer and chain
    #[error("{operation} already in progress for {signer} on chain {chain_id}")]
    Busy {
        operation: String,
        signer: Address,
        chain_id: ChainId,
    },

    /// Saga journal could not be read or written
    #[error("journal error: {0}")]
    Journal(String),
}

impl BridgeError {
    pub fn connectivity(context: &str, err: impl std::fmt::Display) -> Self {
        BridgeError::Connectivity(format!("{}: {}", context, err))
    }

    pub fn simulation(operation: &str, reason: impl Into<String>) -> Self {
        BridgeError::Simulation {
            operation: operation.to_string(),
            reason: reason.into(),
        }
    }

    pub fn submission(operation: &str, reason: impl Into<String>) -> Self {
        BridgeError::Submission {
            operation: operation.to_string(),
            reason: reason.into(),
        }
    }

    pub fn probe(token: Address, reason: impl Into<String>) -> Self {
        BridgeError::CapabilityProbe {
            token,
            reason: reason.into(),
        }
    }

    /// Short message suitable for showing to the wallet owner
    pub fn user_message(&self) -> String {
        match self {
            BridgeError::Connectivity(_) => {
                "Could not reach the network. Check your connection and try again.".to_string()
            }
            BridgeError::CapabilityProbe { .. } => {
                "Could not determine how to authorize this token. Try again later.".to_string()
            }
            BridgeError::Simulation { operation, reason } => {
                format!("The {} would fail: {}", operation, reason)
            }
            BridgeError::Submission { operation, reason } => {
                format!("The {} transaction was not mined: {}", operation, reason)
            }
            BridgeError::Lookup { .. } => {
                "Token details for this transfer are unavailable.".to_string()
            }
            BridgeError::Precondition(msg) => msg.clone(),
            BridgeError::Busy { operation, .. } => {
                format!("A {} is already in progress. Wait for it to finish.", operation)
            }
            BridgeError::Journal(_) => "Could not save transfer progress.".to_string(),
        }
    }
}

impl From<std::io::Error> for BridgeError {
    fn from(err: std::io::Error) -> Self {
        BridgeError::Journal(err.to_string())
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::Journal(err.to_string())
    }
}
