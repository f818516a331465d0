//! In-flight guard
//!
//! At most one operation of each kind runs per (signer, chain). A second
//! invocation while the first is pending is rejected with [`BridgeError::Busy`]
//! instead of racing it on chain. Tickets release their slot when dropped, so a
//! failed or abandoned operation never leaves the slot held.

use alloy::primitives::Address;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use crate::error::{BridgeError, Result};
use crate::types::ChainId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Refresh,
    Transfer,
    Claim,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::Refresh => "refresh",
            OperationKind::Transfer => "transfer",
            OperationKind::Claim => "claim",
        };
        f.write_str(name)
    }
}

type Key = (Address, ChainId, OperationKind);

/// Set of operations currently in flight
#[derive(Debug, Clone, Default)]
pub struct InFlightGuard {
    active: Arc<Mutex<HashSet<Key>>>,
}

impl InFlightGuard {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashSet<Key>> {
        // the set stays consistent even if a holder panicked
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Claim the slot for `(signer, chain_id, kind)` or fail with `Busy`
    pub fn try_acquire(
        &self,
        signer: Address,
        chain_id: ChainId,
        kind: OperationKind,
    ) -> Result<InFlightTicket> {
        let key = (signer, chain_id, kind);
        if !self.slots().insert(key) {
            return Err(BridgeError::Busy {
                operation: kind.to_string(),
                signer,
                chain_id,
            });
        }
        debug!(signer = %signer, chain_id = %chain_id, operation = %kind, "Operation started");
        Ok(InFlightTicket {
            guard: self.clone(),
            key,
        })
    }

    pub fn is_active(&self, signer: Address, chain_id: ChainId, kind: OperationKind) -> bool {
        self.slots().contains(&(signer, chain_id, kind))
    }
}

/// Held for the duration of one operation
#[derive(Debug)]
pub struct InFlightTicket {
    guard: InFlightGuard,
    key: Key,
}

impl Drop for InFlightTicket {
    fn drop(&mut self) {
        self.guard.slots().remove(&self.key);
        debug!(operation = %self.key.2, chain_id = %self.key.1, "Operation finished");
    }
}
