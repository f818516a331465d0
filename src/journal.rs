//! Saga journal
//!
//! Durable store of phase-1 completion tokens. A deposit is written here as
//! soon as it is mined, before `transfer` returns, and marked claimed once its
//! claim is mined. Anything still `Deposited` after a crash can be claimed
//! again without repeating the deposit.
//!
//! The journal is a single JSON file, rewritten through a temporary file and
//! a rename so a crash mid-write leaves the previous version intact.

use alloy::primitives::B256;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{BridgeError, Result};
use crate::types::{ChainId, DepositRecord, MinedTransaction, SourceTx};

/// Default journal file name
pub const DEFAULT_JOURNAL_PATH: &str = "bridge-journal.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SagaStatus {
    Deposited,
    Claimed {
        claim_tx: B256,
        claimed_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub record: DepositRecord,
    pub deposit_tx: Option<MinedTransaction>,
    pub recorded_at: DateTime<Utc>,
    pub status: SagaStatus,
}

impl JournalEntry {
    pub fn is_pending(&self) -> bool {
        self.status == SagaStatus::Deposited
    }

    pub fn destination(&self) -> ChainId {
        self.record.event.to_chain_id()
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct JournalFile {
    entries: Vec<JournalEntry>,
}

/// File-backed saga journal
#[derive(Debug)]
pub struct SagaJournal {
    path: PathBuf,
    entries: Vec<JournalEntry>,
}

impl SagaJournal {
    /// Open the journal at `path`, starting empty if the file does not exist
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            let file: JournalFile = serde_json::from_str(&raw).map_err(|e| {
                BridgeError::Journal(format!("{} is not a valid journal: {}", path.display(), e))
            })?;
            file.entries
        } else {
            Vec::new()
        };

        debug!(path = %path.display(), entries = entries.len(), "Opened saga journal");
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist a mined deposit; recording the same deposit twice is a no-op
    pub fn record_deposit(
        &mut self,
        record: DepositRecord,
        deposit_tx: Option<MinedTransaction>,
    ) -> Result<()> {
        if self.get(&record.source).is_some() {
            debug!(source = %record.source, "Deposit already journaled");
            return Ok(());
        }

        info!(source = %record.source, to_chain = %record.event.to_chain_id(), "Journaling deposit");
        self.entries.push(JournalEntry {
            record,
            deposit_tx,
            recorded_at: Utc::now(),
            status: SagaStatus::Deposited,
        });
        self.flush()
    }

    /// Mark the deposit at `source` as claimed by `claim_tx`
    pub fn mark_claimed(&mut self, source: &SourceTx, claim_tx: B256) -> Result<()> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| &e.record.source == source)
            .ok_or_else(|| BridgeError::Journal(format!("deposit {} is not journaled", source)))?;

        entry.status = SagaStatus::Claimed {
            claim_tx,
            claimed_at: Utc::now(),
        };
        info!(source = %source, claim_tx = %claim_tx, "Deposit claimed");
        self.flush()
    }

    pub fn get(&self, source: &SourceTx) -> Option<&JournalEntry> {
        self.entries.iter().find(|e| &e.record.source == source)
    }

    /// Deposits not yet claimed, oldest first
    pub fn pending(&self) -> Vec<&JournalEntry> {
        self.entries.iter().filter(|e| e.is_pending()).collect()
    }

    /// Deposits not yet claimed that are addressed to `chain_id`
    pub fn pending_for(&self, chain_id: ChainId) -> Vec<&JournalEntry> {
        self.entries
            .iter()
            .filter(|e| e.is_pending() && e.destination() == chain_id)
            .collect()
    }

    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    fn flush(&self) -> Result<()> {
        let file = JournalFile {
            entries: self.entries.clone(),
        };
        let json = serde_json::to_string_pretty(&file)?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DepositEvent, LockOriginal, TokenMetadata};
    use alloy::primitives::{Address, U256};
    use tempfile::TempDir;

    fn record(tag: u8, to_chain: u64) -> DepositRecord {
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
                transaction_hash: B256::repeat_byte(tag),
                block_hash: B256::repeat_byte(0xbb),
                log_index: 0,
            },
            source_token_metadata: Some(TokenMetadata::new("Foo", "FOO")),
        }
    }

    #[test]
    fn test_missing_file_opens_empty() {
        let dir = TempDir::new().unwrap();
        let journal = SagaJournal::open(dir.path().join("journal.json")).unwrap();
        assert!(journal.entries().is_empty());
        assert!(journal.pending().is_empty());
    }

    #[test]
    fn test_deposit_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("journal.json");

        let mut journal = SagaJournal::open(&path).unwrap();
        journal.record_deposit(record(1, 2), None).unwrap();
        drop(journal);

        let reopened = SagaJournal::open(&path).unwrap();
        assert_eq!(reopened.pending().len(), 1);
        assert_eq!(reopened.pending()[0].record, record(1, 2));
        assert!(!dir.path().join("journal.json.tmp").exists());
    }

    #[test]
    fn test_record_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let mut journal = SagaJournal::open(dir.path().join("j.json")).unwrap();
        journal.record_deposit(record(1, 2), None).unwrap();
        journal.record_deposit(record(1, 2), None).unwrap();
        assert_eq!(journal.entries().len(), 1);
    }

    #[test]
    fn test_mark_claimed_removes_from_pending() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("j.json");
        let mut journal = SagaJournal::open(&path).unwrap();
        journal.record_deposit(record(1, 2), None).unwrap();
        journal.record_deposit(record(2, 3), None).unwrap();

        journal
            .mark_claimed(&record(1, 2).source, B256::repeat_byte(0xcc))
            .unwrap();

        let reopened = SagaJournal::open(&path).unwrap();
        let pending = reopened.pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].record.source, record(2, 3).source);
        assert!(matches!(
            reopened.get(&record(1, 2).source).unwrap().status,
            SagaStatus::Claimed { claim_tx, .. } if claim_tx == B256::repeat_byte(0xcc)
        ));
    }

    #[test]
    fn test_pending_for_filters_destination() {
        let dir = TempDir::new().unwrap();
        let mut journal = SagaJournal::open(dir.path().join("j.json")).unwrap();
        journal.record_deposit(record(1, 2), None).unwrap();
        journal.record_deposit(record(2, 3), None).unwrap();

        assert_eq!(journal.pending_for(ChainId(2)).len(), 1);
        assert_eq!(journal.pending_for(ChainId(3)).len(), 1);
        assert!(journal.pending_for(ChainId(4)).is_empty());
    }

    #[test]
    fn test_mark_unknown_deposit_fails() {
        let dir = TempDir::new().unwrap();
        let mut journal = SagaJournal::open(dir.path().join("j.json")).unwrap();
        let err = journal
            .mark_claimed(&record(9, 2).source, B256::ZERO)
            .unwrap_err();
        assert!(matches!(err, BridgeError::Journal(_)));
    }

    #[test]
    fn test_corrupt_file_is_journal_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("j.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            SagaJournal::open(&path).unwrap_err(),
            BridgeError::Journal(_)
        ));
    }
}
