//! Bridge Client: lock/mint/burn/claim cross-chain transfers between EVM chains
//!
//! A transfer moves a token from a source chain to a destination chain in two
//! phases:
//!
//! 1. **Deposit** on the source chain: an original token is locked, or a
//!    wrapped token is burned. The bridge is authorized either by an ERC-2612
//!    permit signature or by a prior `approve`.
//! 2. **Claim** on the destination chain: the claim payload is rebuilt from the
//!    deposit event, signed, and submitted to release the original or mint a
//!    wrapped token.
//!
//! ## Modules
//!
//! - **Registry** - Static table of supported chains and their original tokens
//! - **Types** - Chain ids, tokens, deposit events and records
//! - **EVM Module** - Contract bindings, multicall reads, permit negotiation, deposit and claim
//! - **Claim** - Pure reconstruction of claim payloads from deposit events
//! - **Session** - Active chain/signer state machine and the transfer saga
//! - **Journal** - Durable record of deposits awaiting their claim
//! - **Guard** - One in-flight operation per signer, chain and kind
//! - **History** - Read-only client of the transaction history service
//!
//! ## Example
//!
//! ```ignore
//! let registry = ChainRegistry::load("chains.json")?;
//! let journal = SagaJournal::open("bridge-journal.json")?;
//! let session = BridgeSession::new(registry, settings, journal);
//!
//! session.select(ChainId(1), signer.clone()).await?;
//! let (_, record) = session.transfer(token, amount, ChainId(56), None).await?;
//!
//! session.select(ChainId(56), signer).await?;
//! session.receive(&record).await?;
//! ```

pub mod claim;
pub mod config;
pub mod error;
pub mod evm;
pub mod guard;
pub mod history;
pub mod journal;
pub mod redact;
pub mod registry;
pub mod session;
pub mod types;

// Re-export commonly used items at the crate root
pub use claim::reconstruct;
pub use config::BridgeConfig;
pub use error::{BridgeError, Result};
pub use guard::{InFlightGuard, OperationKind};
pub use history::{HistoryClient, HistoryTransaction};
pub use journal::{JournalEntry, SagaJournal, SagaStatus};
pub use registry::{ChainEntry, ChainRegistry};
pub use session::{BridgeSession, Outcome, SessionSettings, SessionState};
pub use types::{
    ChainId, DepositEvent, DepositRecord, MinedTransaction, PartyRef, SourceTx, Token,
    TokenIndex, TokenMetadata,
};
