//! Bridge session
//!
//! Owns the shared state behind the user-facing operations:
//!
//! - the active contract handle, as a [`SessionState`] that is either
//!   `Uninitialized` or `Ready` for exactly one (chain, signer) pair
//! - the token catalog of the active chain
//! - the outcome of the last write operation
//!
//! Each value is replaced whole. A result computed for a (chain, signer) pair
//! that is no longer active is discarded instead of stored.
//!
//! Transfers run as a two-phase saga: [`BridgeSession::transfer`] journals the
//! mined deposit before returning, and [`BridgeSession::receive`] consumes a
//! deposit record on the destination chain and marks it claimed. Deposits left
//! unclaimed by a crash are listed by [`BridgeSession::pending_claims`] and
//! finished by [`BridgeSession::resume`].

use alloy::{
    primitives::{Address, B256, U256},
    providers::Provider,
    signers::local::PrivateKeySigner,
};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::claim::reconstruct;
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::evm::claim::ClaimSubmitter;
use crate::evm::client::{read_provider, BridgeHandle};
use crate::evm::deposit::DepositOrchestrator;
use crate::evm::events::deposit_records_from_receipt;
use crate::evm::signer::DomainIdentity;
use crate::evm::tokens::{token_metadata, TokenCatalog};
use crate::evm::tx::mined_transaction;
use crate::guard::{InFlightGuard, OperationKind};
use crate::journal::{JournalEntry, SagaJournal};
use crate::registry::ChainRegistry;
use crate::types::{
    ChainId, DepositRecord, MinedTransaction, PartyRef, SourceTx, Token, TokenIndex,
    TokenMetadata,
};

/// Active contract handle, or none
#[derive(Debug, Clone, Default)]
pub enum SessionState {
    #[default]
    Uninitialized,
    Ready(BridgeHandle),
}

impl SessionState {
    pub fn handle(&self) -> Option<&BridgeHandle> {
        match self {
            SessionState::Uninitialized => None,
            SessionState::Ready(handle) => Some(handle),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, SessionState::Ready(_))
    }
}

/// Result of the most recent write operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Mined(MinedTransaction),
    Failed(String),
}

/// Tunables taken from [`BridgeConfig`]
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub multicall_batch_size: usize,
    pub skip_unreadable_tokens: bool,
    pub deposit_window_secs: u64,
    pub claim_domain: DomainIdentity,
}

impl From<&BridgeConfig> for SessionSettings {
    fn from(config: &BridgeConfig) -> Self {
        Self {
            multicall_batch_size: config.multicall_batch_size,
            skip_unreadable_tokens: config.skip_unreadable_tokens,
            deposit_window_secs: config.deposit_window_secs,
            claim_domain: config.claim_domain.clone(),
        }
    }
}

/// Shared state and entry points of the bridge client
pub struct BridgeSession {
    registry: Arc<ChainRegistry>,
    settings: SessionSettings,
    state: RwLock<SessionState>,
    catalog: RwLock<Arc<Vec<Token>>>,
    index: RwLock<TokenIndex>,
    last_outcome: RwLock<Option<Arc<Outcome>>>,
    guard: InFlightGuard,
    journal: Mutex<SagaJournal>,
}

impl BridgeSession {
    pub fn new(registry: ChainRegistry, settings: SessionSettings, journal: SagaJournal) -> Self {
        Self {
            registry: Arc::new(registry),
            settings,
            state: RwLock::new(SessionState::Uninitialized),
            catalog: RwLock::new(Arc::new(Vec::new())),
            index: RwLock::new(TokenIndex::new()),
            last_outcome: RwLock::new(None),
            guard: InFlightGuard::new(),
            journal: Mutex::new(journal),
        }
    }

    pub fn registry(&self) -> &ChainRegistry {
        &self.registry
    }

    // ========================================================================
    // State machine
    // ========================================================================

    /// Make `chain_id` with `signer` the active pair
    ///
    /// Selecting the pair that is already active keeps the existing handle and
    /// catalog. Any other pair replaces the handle and empties the catalog.
    pub async fn select(&self, chain_id: ChainId, signer: PrivateKeySigner) -> Result<()> {
        let entry = self.registry.get(chain_id).ok_or_else(|| {
            BridgeError::Precondition(format!("chain {} is not supported", chain_id))
        })?;

        let mut state = self.state.write().await;
        if let Some(current) = state.handle() {
            if current.matches(chain_id, signer.address()) {
                return Ok(());
            }
        }

        let handle = BridgeHandle::new(entry, signer);
        info!(
            chain_id = %chain_id,
            chain = handle.label(),
            signer = %handle.account(),
            "Switching active chain/signer"
        );
        *state = SessionState::Ready(handle);
        *self.catalog.write().await = Arc::new(Vec::new());
        Ok(())
    }

    /// Drop the active handle
    pub async fn disconnect(&self) {
        *self.state.write().await = SessionState::Uninitialized;
        *self.catalog.write().await = Arc::new(Vec::new());
    }

    pub async fn state(&self) -> SessionState {
        self.state.read().await.clone()
    }

    /// Active handle, or a precondition error when none is selected
    pub async fn handle(&self) -> Result<BridgeHandle> {
        self.state
            .read()
            .await
            .handle()
            .cloned()
            .ok_or_else(|| BridgeError::Precondition("connect a wallet and select a chain first".into()))
    }

    async fn is_current(&self, handle: &BridgeHandle) -> bool {
        self.state
            .read()
            .await
            .handle()
            .map(|h| h.matches(handle.chain_id(), handle.account()))
            .unwrap_or(false)
    }

    pub async fn catalog(&self) -> Arc<Vec<Token>> {
        self.catalog.read().await.clone()
    }

    pub async fn last_outcome(&self) -> Option<Arc<Outcome>> {
        self.last_outcome.read().await.clone()
    }

    async fn record_outcome<T>(&self, result: &Result<T>, mined: impl FnOnce(&T) -> MinedTransaction) {
        let outcome = match result {
            Ok(value) => Outcome::Mined(mined(value)),
            Err(err) => Outcome::Failed(err.user_message()),
        };
        *self.last_outcome.write().await = Some(Arc::new(outcome));
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Rebuild the token catalog of the active chain
    pub async fn refresh_catalog(&self) -> Result<Arc<Vec<Token>>> {
        let handle = self.handle().await?;
        let _ticket =
            self.guard
                .try_acquire(handle.account(), handle.chain_id(), OperationKind::Refresh)?;

        let tokens = TokenCatalog::new(
            self.settings.multicall_batch_size,
            self.settings.skip_unreadable_tokens,
        )
        .refresh(&handle, &self.registry)
        .await?;

        self.index
            .write()
            .await
            .insert_catalog(handle.chain_id(), &tokens);

        let tokens = Arc::new(tokens);
        if self.is_current(&handle).await {
            *self.catalog.write().await = tokens.clone();
        } else {
            warn!(chain_id = %handle.chain_id(), "Active chain changed during refresh, discarding catalog");
        }
        Ok(tokens)
    }

    /// Phase 1: deposit `amount` of `token` towards `to_chain`
    ///
    /// The recipient defaults to the connected account. The mined deposit is
    /// journaled before this returns.
    pub async fn transfer(
        &self,
        token: Address,
        amount: U256,
        to_chain: ChainId,
        recipient: Option<Address>,
    ) -> Result<(MinedTransaction, DepositRecord)> {
        let result = self.transfer_inner(token, amount, to_chain, recipient).await;
        self.record_outcome(&result, |(mined, _)| mined.clone()).await;
        result
    }

    async fn transfer_inner(
        &self,
        token: Address,
        amount: U256,
        to_chain: ChainId,
        recipient: Option<Address>,
    ) -> Result<(MinedTransaction, DepositRecord)> {
        let handle = self.handle().await?;
        if self.registry.get(to_chain).is_none() {
            return Err(BridgeError::Precondition(format!(
                "destination chain {} is not supported",
                to_chain
            )));
        }
        let _ticket =
            self.guard
                .try_acquire(handle.account(), handle.chain_id(), OperationKind::Transfer)?;

        let destination = PartyRef::new(recipient.unwrap_or(handle.account()), to_chain);
        let (mined, mut record) =
            DepositOrchestrator::new(&handle, self.settings.deposit_window_secs)
                .transfer(token, amount, destination)
                .await?;

        record.source_token_metadata = self.known_metadata(handle.chain_id(), token).await;
        self.journal_deposit(&record, Some(mined.clone())).await;

        Ok((mined, record))
    }

    /// Phase 2: claim a mined deposit on the active (destination) chain
    pub async fn receive(&self, record: &DepositRecord) -> Result<MinedTransaction> {
        let result = self.receive_inner(record).await;
        self.record_outcome(&result, Clone::clone).await;
        result
    }

    async fn receive_inner(&self, record: &DepositRecord) -> Result<MinedTransaction> {
        let handle = self.handle().await?;
        let destination = record.event.to_chain_id();
        if handle.chain_id() != destination {
            return Err(BridgeError::Precondition(format!(
                "switch to chain {} to claim this transfer",
                destination
            )));
        }
        let _ticket =
            self.guard
                .try_acquire(handle.account(), handle.chain_id(), OperationKind::Claim)?;

        let index = self.claim_index(record).await?;
        let payload = reconstruct(record, &index)?;

        let mined = ClaimSubmitter::new(&handle, &self.settings.claim_domain)
            .claim(&payload)
            .await?;

        self.journal_claim(record, mined.transaction_hash).await;

        Ok(mined)
    }

    /// Rebuild the deposit records of a mined source-chain transaction
    ///
    /// Every deposit the transaction made is returned in log order and
    /// journaled, so it shows up in [`Self::pending_claims`] until claimed.
    pub async fn recover_deposits(
        &self,
        source_chain: ChainId,
        tx_hash: B256,
    ) -> Result<Vec<DepositRecord>> {
        let entry = self.registry.get(source_chain).ok_or_else(|| {
            BridgeError::Precondition(format!("chain {} is not supported", source_chain))
        })?;

        let provider = read_provider(&entry.rpc_url);
        let receipt = provider
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(|e| BridgeError::connectivity("eth_getTransactionReceipt", e))?
            .ok_or_else(|| {
                BridgeError::Precondition(format!(
                    "transaction {} is not mined on chain {}",
                    tx_hash, source_chain
                ))
            })?;
        if !receipt.status() {
            return Err(BridgeError::Precondition(format!(
                "transaction {} reverted",
                tx_hash
            )));
        }

        let mut records = deposit_records_from_receipt(entry.bridge_address, &receipt)?;
        let mined = mined_transaction(source_chain, &receipt);
        for record in records.iter_mut() {
            if record.event.source_chain_id() != source_chain {
                return Err(BridgeError::Precondition(format!(
                    "deposit {} reports source chain {}, expected {}",
                    tx_hash,
                    record.event.source_chain_id(),
                    source_chain
                )));
            }
            record.source_token_metadata = self
                .known_metadata(source_chain, record.event.source_token())
                .await;
        }

        for record in &records {
            self.journal_deposit(record, Some(mined.clone())).await;
            info!(source = %record.source, event = record.event.kind(), "Recovered deposit");
        }
        Ok(records)
    }

    /// Deposits that were mined but not yet claimed
    pub async fn pending_claims(&self) -> Vec<JournalEntry> {
        self.journal
            .lock()
            .await
            .pending()
            .into_iter()
            .cloned()
            .collect()
    }

    /// Claim every pending deposit addressed to the active chain
    ///
    /// Each deposit is attempted once; one failure does not stop the others.
    pub async fn resume(&self) -> Result<Vec<(SourceTx, Result<MinedTransaction>)>> {
        let handle = self.handle().await?;
        let pending: Vec<DepositRecord> = self
            .journal
            .lock()
            .await
            .pending_for(handle.chain_id())
            .into_iter()
            .map(|entry| entry.record.clone())
            .collect();

        info!(chain_id = %handle.chain_id(), pending = pending.len(), "Resuming pending claims");

        let mut results = Vec::with_capacity(pending.len());
        for record in pending {
            let result = self.receive(&record).await;
            if let Err(err) = &result {
                warn!(source = %record.source, error = %err, "Pending claim failed");
            }
            results.push((record.source, result));
        }
        Ok(results)
    }

    // ========================================================================
    // Journal
    // ========================================================================

    /// Journal a mined deposit
    ///
    /// The deposit is already on chain, so a write failure is logged and the
    /// caller still gets the mined transaction. The entry stays pending in
    /// memory for the rest of the session.
    async fn journal_deposit(&self, record: &DepositRecord, mined: Option<MinedTransaction>) {
        let tx_hash = mined.as_ref().map(|m| m.transaction_hash);
        if let Err(err) = self
            .journal
            .lock()
            .await
            .record_deposit(record.clone(), mined)
        {
            warn!(
                source = %record.source,
                tx_hash = ?tx_hash,
                error = %err,
                "Deposit is mined but could not be journaled"
            );
        }
    }

    /// Journal a mined claim; failures are logged, never returned
    async fn journal_claim(&self, record: &DepositRecord, claim_tx: B256) {
        let mut journal = self.journal.lock().await;
        if let Err(err) = journal.record_deposit(record.clone(), None) {
            warn!(source = %record.source, error = %err, "Could not journal claimed deposit");
        }
        if let Err(err) = journal.mark_claimed(&record.source, claim_tx) {
            warn!(
                source = %record.source,
                claim_tx = %claim_tx,
                error = %err,
                "Claim is mined but could not be journaled"
            );
        }
    }

    // ========================================================================
    // Token index
    // ========================================================================

    async fn known_metadata(&self, chain_id: ChainId, token: Address) -> Option<TokenMetadata> {
        self.index.read().await.get(chain_id, token).cloned()
    }

    /// Token index that holds the entry `record` needs, fetching it if absent
    async fn claim_index(&self, record: &DepositRecord) -> Result<TokenIndex> {
        let mut index = self.index.read().await.clone();
        record.seed_index(&mut index);

        let (chain_id, address) = record.event.required_metadata_key();
        if !index.contains(chain_id, address) {
            let entry = self
                .registry
                .get(chain_id)
                .ok_or(BridgeError::Lookup { chain_id, address })?;
            let metadata = token_metadata(&read_provider(&entry.rpc_url), address).await?;
            info!(chain_id = %chain_id, token = %address, symbol = %metadata.symbol, "Fetched token metadata for claim");

            self.index
                .write()
                .await
                .insert(chain_id, address, metadata.clone());
            index.insert(chain_id, address, metadata);
        }
        Ok(index)
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ChainEntry, MULTICALL3_ADDRESS};
    use crate::types::{DepositEvent, LockOriginal};
    use tempfile::TempDir;
    use url::Url;

    const KEY_0: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const KEY_1: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

    fn chain(id: u64) -> ChainEntry {
        ChainEntry {
            chain_id: ChainId(id),
            label: format!("chain-{}", id),
            rpc_url: Url::parse("http://localhost:8545").unwrap(),
            bridge_address: Address::repeat_byte(0x11),
            multicall_address: MULTICALL3_ADDRESS,
            original_tokens: vec![],
        }
    }

    fn settings() -> SessionSettings {
        SessionSettings {
            multicall_batch_size: 100,
            skip_unreadable_tokens: false,
            deposit_window_secs: 3600,
            claim_domain: DomainIdentity::default(),
        }
    }

    fn session(dir: &TempDir) -> BridgeSession {
        let registry = ChainRegistry::new(vec![chain(1), chain(2)]).unwrap();
        let journal = SagaJournal::open(dir.path().join("journal.json")).unwrap();
        BridgeSession::new(registry, settings(), journal)
    }

    fn signer(key: &str) -> PrivateKeySigner {
        key.parse().unwrap()
    }

    fn record(to_chain: u64) -> DepositRecord {
        DepositRecord {
            event: DepositEvent::LockOriginalToken(LockOriginal {
                source_chain_id: ChainId(1),
                locked_token_address: Address::repeat_byte(0xa),
                sender: Address::repeat_byte(5),
                recipient: Address::repeat_byte(6),
                to_chain_id: ChainId(to_chain),
                value: U256::from(100),
            }),
            source: SourceTx {
                transaction_hash: B256::repeat_byte(1),
                block_hash: B256::repeat_byte(2),
                log_index: 0,
            },
            source_token_metadata: Some(TokenMetadata::new("Foo", "FOO")),
        }
    }

    #[tokio::test]
    async fn test_starts_uninitialized() {
        let dir = TempDir::new().unwrap();
        let session = session(&dir);

        assert!(!session.state().await.is_ready());
        assert!(session.catalog().await.is_empty());
        assert!(session.last_outcome().await.is_none());
        assert!(matches!(
            session.handle().await.unwrap_err(),
            BridgeError::Precondition(_)
        ));
    }

    #[tokio::test]
    async fn test_operations_require_ready_state() {
        let dir = TempDir::new().unwrap();
        let session = session(&dir);

        assert!(matches!(
            session.refresh_catalog().await.unwrap_err(),
            BridgeError::Precondition(_)
        ));
        assert!(matches!(
            session
                .transfer(Address::repeat_byte(0xa), U256::from(1), ChainId(2), None)
                .await
                .unwrap_err(),
            BridgeError::Precondition(_)
        ));
        assert!(matches!(
            session.receive(&record(2)).await.unwrap_err(),
            BridgeError::Precondition(_)
        ));
        assert!(matches!(
            session.last_outcome().await.as_deref(),
            Some(Outcome::Failed(_))
        ));
    }

    #[tokio::test]
    async fn test_select_unknown_chain_rejected() {
        let dir = TempDir::new().unwrap();
        let session = session(&dir);
        assert!(session.select(ChainId(99), signer(KEY_0)).await.is_err());
        assert!(!session.state().await.is_ready());
    }

    #[tokio::test]
    async fn test_select_replaces_handle_and_clears_catalog() {
        let dir = TempDir::new().unwrap();
        let session = session(&dir);

        session.select(ChainId(1), signer(KEY_0)).await.unwrap();
        let first = session.handle().await.unwrap();
        assert_eq!(first.chain_id(), ChainId(1));

        *session.catalog.write().await = Arc::new(vec![Token {
            name: "Foo".into(),
            symbol: "FOO".into(),
            address: Address::repeat_byte(0xa),
            balance: U256::from(1),
        }]);

        // same pair: nothing changes
        session.select(ChainId(1), signer(KEY_0)).await.unwrap();
        assert_eq!(session.catalog().await.len(), 1);

        // new signer: whole state replaced
        session.select(ChainId(1), signer(KEY_1)).await.unwrap();
        let second = session.handle().await.unwrap();
        assert_ne!(first.account(), second.account());
        assert!(session.catalog().await.is_empty());

        session.select(ChainId(2), signer(KEY_1)).await.unwrap();
        assert_eq!(session.handle().await.unwrap().chain_id(), ChainId(2));

        session.disconnect().await;
        assert!(!session.state().await.is_ready());
    }

    #[tokio::test]
    async fn test_receive_on_wrong_chain_rejected() {
        let dir = TempDir::new().unwrap();
        let session = session(&dir);
        session.select(ChainId(1), signer(KEY_0)).await.unwrap();

        let err = session.receive(&record(2)).await.unwrap_err();
        assert!(matches!(err, BridgeError::Precondition(_)));
        assert!(err.user_message().contains("chain 2"));
    }

    #[tokio::test]
    async fn test_transfer_to_unknown_chain_rejected() {
        let dir = TempDir::new().unwrap();
        let session = session(&dir);
        session.select(ChainId(1), signer(KEY_0)).await.unwrap();

        let err = session
            .transfer(Address::repeat_byte(0xa), U256::from(1), ChainId(7), None)
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Precondition(_)));
    }

    #[tokio::test]
    async fn test_pending_claims_come_from_journal() {
        let dir = TempDir::new().unwrap();
        {
            let mut journal = SagaJournal::open(dir.path().join("journal.json")).unwrap();
            journal.record_deposit(record(2), None).unwrap();
        }

        let session = session(&dir);
        let pending = session.pending_claims().await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].record, record(2));
    }

    fn unwritable_session(dir: &TempDir) -> BridgeSession {
        let registry = ChainRegistry::new(vec![chain(1), chain(2)]).unwrap();
        // parent directory does not exist, so every flush fails
        let journal = SagaJournal::open(dir.path().join("missing").join("journal.json")).unwrap();
        BridgeSession::new(registry, settings(), journal)
    }

    fn mined(tag: u8) -> MinedTransaction {
        MinedTransaction {
            chain_id: ChainId(1),
            transaction_hash: B256::repeat_byte(tag),
            block_hash: Some(B256::repeat_byte(0xbb)),
            block_number: Some(10),
            gas_used: 21_000,
        }
    }

    #[tokio::test]
    async fn test_mined_deposit_survives_journal_write_failure() {
        let dir = TempDir::new().unwrap();
        let session = unwritable_session(&dir);

        session.journal_deposit(&record(2), Some(mined(1))).await;

        let pending = session.pending_claims().await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].record, record(2));
        assert_eq!(pending[0].deposit_tx, Some(mined(1)));
        assert!(!dir.path().join("missing").exists());
    }

    #[tokio::test]
    async fn test_mined_claim_survives_journal_write_failure() {
        let dir = TempDir::new().unwrap();
        let session = unwritable_session(&dir);

        session.journal_claim(&record(2), B256::repeat_byte(0xcc)).await;

        // marked claimed in memory, so resume will not replay it
        assert!(session.pending_claims().await.is_empty());
    }

    #[tokio::test]
    async fn test_claim_index_uses_record_snapshot() {
        let dir = TempDir::new().unwrap();
        let session = session(&dir);

        let index = session.claim_index(&record(2)).await.unwrap();
        assert_eq!(
            index.get(ChainId(1), Address::repeat_byte(0xa)).unwrap().name,
            "Foo"
        );
    }
}
