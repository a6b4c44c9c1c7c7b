// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Local Store - the node's committed record versions
//!
//! Recording a notarised transaction is the only way to mutate the store.
//!
//! # Protocol
//! ```text
//! NotarisedTransaction
//! ↓
//! 1. Verify signatures (participants + notary)
//! ↓
//! 2. Stage: Consumed for superseded versions, Produced for each output
//! ↓
//! 3. Notify observers, in staging order, synchronously
//! ↓
//! 4. Commit boundary (versions become visible)
//! ```
//!
//! Any observer error → rollback buffer, store unchanged, error to the recorder.
//!
//! # Invariants
//! - No partial commits
//! - Sequence indices are dense and never reused
//! - Recording the same transaction twice is a no-op

pub mod journal;

use std::sync::{Arc, Mutex, RwLock};

use cosign_kernel::event::CommitEvent;
use cosign_kernel::transaction::NotarisedTransaction;
use cosign_kernel::types::{CorrelationId, RecordId, StatusFilter, UpdateType};
use cosign_kernel::KernelError;
use thiserror::Error;

pub use journal::{StoreJournal, StoredVersion, VersionStatus};

#[derive(Error, Debug)]
pub enum ObserverError {
    #[error("fault injection quarantine for record {record_id} on flow {correlation_id}")]
    Quarantine {
        correlation_id: CorrelationId,
        record_id: RecordId,
    },
    #[error("observer failed: {0}")]
    Failed(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Transaction failed verification: {0}")]
    Invalid(#[from] KernelError),
    #[error("Commit rolled back: {0}")]
    Observer(ObserverError),
    #[error("Store lock poisoned")]
    Poisoned,
}

/// Receives every commit event before the commit becomes visible.
///
/// Observers run while the store is locked and must not call back into it.
pub trait CommitObserver: Send + Sync {
    fn on_commit(&self, event: &CommitEvent) -> Result<(), ObserverError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitResult {
    Committed { versions: usize },
    AlreadyRecorded,
}

#[derive(Default)]
pub struct LocalStore {
    journal: Mutex<StoreJournal>,
    observers: RwLock<Vec<Arc<dyn CommitObserver>>>,
}

impl LocalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, observer: Arc<dyn CommitObserver>) -> Result<(), StoreError> {
        self.observers
            .write()
            .map_err(|_| StoreError::Poisoned)?
            .push(observer);
        Ok(())
    }

    pub fn record(
        &self,
        ntx: &NotarisedTransaction,
        correlation_id: CorrelationId,
    ) -> Result<CommitResult, StoreError> {
        ntx.verify()?;

        let observers: Vec<Arc<dyn CommitObserver>> = self
            .observers
            .read()
            .map_err(|_| StoreError::Poisoned)?
            .clone();

        let mut journal = self.journal.lock().map_err(|_| StoreError::Poisoned)?;
        if journal.contains_tx(&ntx.id()) {
            tracing::debug!("Transaction {} already recorded, skipping", ntx.id());
            return Ok(CommitResult::AlreadyRecorded);
        }

        // 1. Stage
        let tx_id = ntx.id();
        let mut events = Vec::new();
        for record in ntx.outputs() {
            for index in journal.unconsumed_of(&record.id) {
                if let Some(previous) = journal.version(index) {
                    events.push(CommitEvent {
                        correlation_id,
                        tx_id,
                        index,
                        update_type: UpdateType::Consumed,
                        record: previous.record.clone(),
                    });
                }
                journal.stage_consumption(index);
            }
            let index = journal.append_buffered(tx_id, record.clone(), correlation_id);
            events.push(CommitEvent {
                correlation_id,
                tx_id,
                index,
                update_type: UpdateType::Produced,
                record: record.clone(),
            });
        }

        // 2. Notify
        for event in &events {
            for observer in &observers {
                if let Err(e) = observer.on_commit(event) {
                    journal.rollback_buffer();
                    tracing::warn!("Rolled back transaction {}: {}", tx_id, e);
                    return Err(StoreError::Observer(e));
                }
            }
        }

        // 3. Commit boundary
        journal.commit_buffer();
        let versions = ntx.outputs().len();
        tracing::debug!(
            "Recorded transaction {} ({} versions, height {})",
            tx_id,
            versions,
            journal.committed_height()
        );
        Ok(CommitResult::Committed { versions })
    }

    /// Versions of `id` matching `filter`, by sequence index ascending.
    pub fn query_by_id(
        &self,
        id: &RecordId,
        filter: StatusFilter,
    ) -> Result<Vec<StoredVersion>, StoreError> {
        let journal = self.journal.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(journal
            .committed()
            .iter()
            .filter(|v| v.record.id == *id)
            .filter(|v| match filter {
                StatusFilter::All => true,
                StatusFilter::Unconsumed => v.status == VersionStatus::Unconsumed,
                StatusFilter::Consumed => v.status == VersionStatus::Consumed,
            })
            .cloned()
            .collect())
    }

    pub fn committed_height(&self) -> Result<u64, StoreError> {
        Ok(self
            .journal
            .lock()
            .map_err(|_| StoreError::Poisoned)?
            .committed_height())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosign_kernel::transaction::{CommitTransaction, SignedTransaction};
    use cosign_kernel::types::{Action, PartyKeys};
    use cosign_kernel::Record;

    struct Keys {
        a: PartyKeys,
        b: PartyKeys,
        notary: PartyKeys,
    }

    fn keys() -> Keys {
        Keys {
            a: PartyKeys::from_seed("PartyA", [1; 32]),
            b: PartyKeys::from_seed("PartyB", [2; 32]),
            notary: PartyKeys::from_seed("Notary", [9; 32]),
        }
    }

    fn notarised(keys: &Keys, id: RecordId, payload: &str, action: Action) -> NotarisedTransaction {
        let record = Record::new(id, payload, keys.a.party().clone(), keys.b.party().clone(), action);
        let tx = CommitTransaction::new(vec![record], keys.notary.party().clone()).unwrap();
        let stx = SignedTransaction::new(tx.clone())
            .with_signature(tx.sign(&keys.a))
            .with_signature(tx.sign(&keys.b));
        NotarisedTransaction {
            notary_signature: tx.sign(&keys.notary),
            stx,
        }
    }

    struct Recorder(Mutex<Vec<(UpdateType, u64)>>);

    impl CommitObserver for Recorder {
        fn on_commit(&self, event: &CommitEvent) -> Result<(), ObserverError> {
            self.0.lock().unwrap().push((event.update_type, event.index));
            Ok(())
        }
    }

    struct Refuser;

    impl CommitObserver for Refuser {
        fn on_commit(&self, event: &CommitEvent) -> Result<(), ObserverError> {
            Err(ObserverError::Quarantine {
                correlation_id: event.correlation_id,
                record_id: event.record.id,
            })
        }
    }

    #[test]
    fn test_record_then_query() {
        let keys = keys();
        let store = LocalStore::new();
        let id = RecordId::new();

        let result = store.record(&notarised(&keys, id, "hello", Action::Nothing), CorrelationId::new()).unwrap();
        assert_eq!(result, CommitResult::Committed { versions: 1 });

        let versions = store.query_by_id(&id, StatusFilter::All).unwrap();
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].record.payload, "hello");
        assert!(store.query_by_id(&RecordId::new(), StatusFilter::All).unwrap().is_empty());
    }

    #[test]
    fn test_recording_twice_is_noop() {
        let keys = keys();
        let store = LocalStore::new();
        let ntx = notarised(&keys, RecordId::new(), "hello", Action::Nothing);

        store.record(&ntx, CorrelationId::new()).unwrap();
        assert_eq!(store.record(&ntx, CorrelationId::new()).unwrap(), CommitResult::AlreadyRecorded);
        assert_eq!(store.committed_height().unwrap(), 1);
    }

    #[test]
    fn test_second_version_consumes_first() {
        let keys = keys();
        let store = LocalStore::new();
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        store.subscribe(recorder.clone()).unwrap();
        let id = RecordId::new();

        store.record(&notarised(&keys, id, "v1", Action::Nothing), CorrelationId::new()).unwrap();
        store.record(&notarised(&keys, id, "v2", Action::Nothing), CorrelationId::new()).unwrap();

        let all = store.query_by_id(&id, StatusFilter::All).unwrap();
        assert_eq!(all.iter().map(|v| v.index).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(all[0].status, VersionStatus::Consumed);

        let live = store.query_by_id(&id, StatusFilter::Unconsumed).unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].record.payload, "v2");

        let seen = recorder.0.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                (UpdateType::Produced, 0),
                (UpdateType::Consumed, 0),
                (UpdateType::Produced, 1),
            ]
        );
    }

    #[test]
    fn test_observer_error_rolls_back() {
        let keys = keys();
        let store = LocalStore::new();
        store.subscribe(Arc::new(Refuser)).unwrap();
        let id = RecordId::new();

        let err = store
            .record(&notarised(&keys, id, "hello", Action::ThrowQuarantine), CorrelationId::new())
            .unwrap_err();
        assert!(matches!(err, StoreError::Observer(ObserverError::Quarantine { .. })));
        assert!(store.query_by_id(&id, StatusFilter::All).unwrap().is_empty());
        assert_eq!(store.committed_height().unwrap(), 0);
    }

    #[test]
    fn test_unsigned_transaction_rejected() {
        let keys = keys();
        let store = LocalStore::new();
        let mut ntx = notarised(&keys, RecordId::new(), "hello", Action::Nothing);
        ntx.stx.signatures.pop();

        assert!(matches!(
            store.record(&ntx, CorrelationId::new()),
            Err(StoreError::Invalid(_))
        ));
    }
}
