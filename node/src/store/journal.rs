// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Store Journal - committed versions vs. the pending transaction
//!
//! - **committed** = record versions every reader sees
//! - **buffer** = versions of the transaction being recorded, not yet visible
//!
//! # Flow
//! 1. stage_consumption() / append_buffered() - build the pending transaction
//! 2. observers run against the staged events
//! 3. commit_buffer() - promote to committed
//! 4. rollback_buffer() - discard on any observer failure

use std::collections::HashSet;

use cosign_kernel::types::{CorrelationId, RecordId, TxId};
use cosign_kernel::Record;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VersionStatus {
    Unconsumed,
    Consumed,
}

/// One committed record version.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredVersion {
    /// Store-assigned sequence index, dense from 0.
    pub index: u64,
    pub tx_id: TxId,
    pub record: Record,
    pub status: VersionStatus,
    pub recorded_by: CorrelationId,
}

#[derive(Debug, Default)]
pub struct StoreJournal {
    committed: Vec<StoredVersion>,
    recorded_txs: HashSet<TxId>,

    buffer: Vec<StoredVersion>,
    pending_consumed: Vec<u64>,
    pending_tx: Option<TxId>,
}

impl StoreJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains_tx(&self, tx_id: &TxId) -> bool {
        self.recorded_txs.contains(tx_id)
    }

    /// Indices of committed, unconsumed versions of `id`.
    pub fn unconsumed_of(&self, id: &RecordId) -> Vec<u64> {
        self.committed
            .iter()
            .filter(|v| v.record.id == *id && v.status == VersionStatus::Unconsumed)
            .map(|v| v.index)
            .collect()
    }

    pub fn version(&self, index: u64) -> Option<&StoredVersion> {
        self.committed.get(index as usize)
    }

    /// Mark a committed version as consumed once the buffer commits.
    pub fn stage_consumption(&mut self, index: u64) {
        if !self.pending_consumed.contains(&index) {
            self.pending_consumed.push(index);
        }
    }

    /// Stage a new version. Returns its index.
    pub fn append_buffered(
        &mut self,
        tx_id: TxId,
        record: Record,
        recorded_by: CorrelationId,
    ) -> u64 {
        let index = (self.committed.len() + self.buffer.len()) as u64;
        self.pending_tx = Some(tx_id);
        self.buffer.push(StoredVersion {
            index,
            tx_id,
            record,
            status: VersionStatus::Unconsumed,
            recorded_by,
        });
        index
    }

    pub fn commit_buffer(&mut self) {
        for index in self.pending_consumed.drain(..) {
            if let Some(v) = self.committed.get_mut(index as usize) {
                v.status = VersionStatus::Consumed;
            }
        }
        self.committed.append(&mut self.buffer);
        if let Some(tx_id) = self.pending_tx.take() {
            self.recorded_txs.insert(tx_id);
        }
    }

    pub fn rollback_buffer(&mut self) {
        self.buffer.clear();
        self.pending_consumed.clear();
        self.pending_tx = None;
    }

    pub fn committed(&self) -> &[StoredVersion] {
        &self.committed
    }

    pub fn committed_height(&self) -> u64 {
        self.committed.len() as u64
    }

    #[cfg(test)]
    fn has_pending_buffer(&self) -> bool {
        !self.buffer.is_empty() || !self.pending_consumed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosign_kernel::types::{Action, PartyKeys};

    fn record(id: RecordId, payload: &str) -> Record {
        let a = PartyKeys::from_seed("PartyA", [1; 32]);
        let b = PartyKeys::from_seed("PartyB", [2; 32]);
        Record::new(id, payload, a.party().clone(), b.party().clone(), Action::Nothing)
    }

    #[test]
    fn test_journal_buffer_commit() {
        let mut journal = StoreJournal::new();
        let id = RecordId::new();

        let index = journal.append_buffered(TxId([1; 32]), record(id, "v1"), CorrelationId::new());
        assert_eq!(index, 0);
        assert!(journal.has_pending_buffer());
        assert_eq!(journal.committed_height(), 0);
        assert!(journal.unconsumed_of(&id).is_empty());

        journal.commit_buffer();
        assert!(!journal.has_pending_buffer());
        assert_eq!(journal.committed_height(), 1);
        assert!(journal.contains_tx(&TxId([1; 32])));
        assert_eq!(journal.unconsumed_of(&id), vec![0]);
    }

    #[test]
    fn test_journal_rollback_keeps_committed() {
        let mut journal = StoreJournal::new();
        let id = RecordId::new();
        journal.append_buffered(TxId([1; 32]), record(id, "v1"), CorrelationId::new());
        journal.commit_buffer();

        journal.stage_consumption(0);
        journal.append_buffered(TxId([2; 32]), record(id, "v2"), CorrelationId::new());
        journal.rollback_buffer();

        assert_eq!(journal.committed_height(), 1);
        assert!(!journal.contains_tx(&TxId([2; 32])));
        assert_eq!(journal.version(0).map(|v| v.status), Some(VersionStatus::Unconsumed));
    }

    #[test]
    fn test_new_version_consumes_previous() {
        let mut journal = StoreJournal::new();
        let id = RecordId::new();
        journal.append_buffered(TxId([1; 32]), record(id, "v1"), CorrelationId::new());
        journal.commit_buffer();

        journal.stage_consumption(0);
        let index = journal.append_buffered(TxId([2; 32]), record(id, "v2"), CorrelationId::new());
        journal.commit_buffer();

        assert_eq!(index, 1);
        assert_eq!(journal.version(0).map(|v| v.status), Some(VersionStatus::Consumed));
        assert_eq!(journal.unconsumed_of(&id), vec![1]);
    }
}
