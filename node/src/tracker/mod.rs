// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Record tracker.
//!
//! Observes every commit on its node. A produced version whose action selects
//! a fault policy matching this node fires that fault once per flow; otherwise
//! the version is appended to the track log.

pub mod quarantine;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use cosign_kernel::event::CommitEvent;
use cosign_kernel::fault::FaultPolicy;
use cosign_kernel::types::{CorrelationId, Party, RecordId};
use cosign_persistence::{PersistenceError, TrackEntry, TrackLog};
use thiserror::Error;

use crate::config::NodeConfig;
use crate::store::{CommitObserver, LocalStore, ObserverError, StoreError};
use crate::telemetry;
pub use quarantine::{FireOutcome, QuarantineHandler};

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Fault injection quarantine for record {record_id} on flow {correlation_id}")]
    Quarantine {
        correlation_id: CorrelationId,
        record_id: RecordId,
    },
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
    #[error("Tracker already subscribed")]
    AlreadySubscribed,
    #[error("Subscription failed: {0}")]
    Subscribe(#[from] StoreError),
    #[error("Tracker state poisoned")]
    Poisoned,
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

pub struct RecordTracker {
    local: Party,
    track_log: Mutex<TrackLog>,
    quarantine: QuarantineHandler,
    subscribed: AtomicBool,
}

impl RecordTracker {
    /// Open the track log and replay the dedup ledger. Does not subscribe.
    pub fn open(local: Party, config: &NodeConfig) -> Result<Self, TrackerError> {
        Ok(Self {
            local,
            track_log: Mutex::new(TrackLog::open(&config.track_log_path)?),
            quarantine: QuarantineHandler::open(&config.dedup_ledger_path, &config.error_log_path)?,
            subscribed: AtomicBool::new(false),
        })
    }

    /// Subscribe to `store`. Only the first call per tracker succeeds.
    pub fn start(self: &Arc<Self>, store: &LocalStore) -> Result<(), TrackerError> {
        if self.subscribed.swap(true, Ordering::SeqCst) {
            return Err(TrackerError::AlreadySubscribed);
        }
        if let Err(e) = store.subscribe(self.clone()) {
            self.subscribed.store(false, Ordering::SeqCst);
            return Err(e.into());
        }
        tracing::info!(
            "Tracker for {} subscribed, {} faults already fired",
            self.local,
            self.quarantine.fired_count()
        );
        Ok(())
    }

    pub fn quarantine(&self) -> &QuarantineHandler {
        &self.quarantine
    }

    pub fn handle(&self, event: &CommitEvent) -> Result<(), TrackerError> {
        if !event.is_produced() {
            tracing::debug!("Version {} of {} consumed", event.index, event.record.id);
            return Ok(());
        }

        if let Some(policy) = FaultPolicy::triggered(&self.local, &event.record) {
            if self.quarantine.fire(policy, event)? == FireOutcome::Fired {
                return Err(TrackerError::Quarantine {
                    correlation_id: event.correlation_id,
                    record_id: event.record.id,
                });
            }
        }

        let record = &event.record;
        let entry = TrackEntry {
            correlation_id: event.correlation_id,
            record_id: record.id,
            payload: record.payload.clone(),
            party_a_name: record.party_a.name.clone(),
            party_b_name: record.party_b.name.clone(),
            timestamp_millis: now_millis(),
            update_type: Some(event.update_type),
        };
        if let Err(e) = self
            .track_log
            .lock()
            .map_err(|_| TrackerError::Poisoned)?
            .append(&entry)
        {
            tracing::error!("Failed to append record {} to the track log: {}", record.id, e);
            return Err(e.into());
        }

        metrics::counter!(telemetry::TRACKED_RECORDS_TOTAL, 1);
        tracing::info!(
            "Tracked record {} ({}) between {} and {} on flow {}",
            record.id,
            event.update_type,
            record.party_a,
            record.party_b,
            event.correlation_id
        );
        Ok(())
    }
}

impl CommitObserver for RecordTracker {
    fn on_commit(&self, event: &CommitEvent) -> Result<(), ObserverError> {
        self.handle(event).map_err(|e| match e {
            TrackerError::Quarantine {
                correlation_id,
                record_id,
            } => ObserverError::Quarantine {
                correlation_id,
                record_id,
            },
            other => ObserverError::Failed(other.to_string()),
        })
    }
}
