// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! One-time fault injection.
//!
//! A fault fires at most once per correlation id, across restarts. The id is
//! made durable in the dedup ledger before the error log line is written and
//! before the fault is raised, so a crash in between can only lose the log
//! line, never fire twice.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;

use cosign_kernel::event::CommitEvent;
use cosign_kernel::fault::FaultPolicy;
use cosign_kernel::types::CorrelationId;
use cosign_persistence::{DedupLedger, LineWriter};

use super::{now_millis, TrackerError};
use crate::telemetry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireOutcome {
    Fired,
    AlreadyFired,
}

struct Seen {
    ids: HashSet<CorrelationId>,
    ledger: DedupLedger,
}

pub struct QuarantineHandler {
    seen: Mutex<Seen>,
    error_log: Mutex<LineWriter>,
}

impl QuarantineHandler {
    /// Open both files and replay the ledger.
    pub fn open(ledger_path: impl AsRef<Path>, error_log_path: impl AsRef<Path>) -> Result<Self, TrackerError> {
        let ledger = DedupLedger::open(ledger_path)?;
        let ids = ledger.load()?;
        if !ids.is_empty() {
            tracing::info!("Loaded {} fired faults from {:?}", ids.len(), ledger.path());
        }
        Ok(Self {
            seen: Mutex::new(Seen { ids, ledger }),
            error_log: Mutex::new(LineWriter::open(error_log_path)?),
        })
    }

    #[cfg(test)]
    fn already_fired(&self, id: &CorrelationId) -> bool {
        self.seen
            .lock()
            .map(|s| s.ids.contains(id))
            .unwrap_or(true)
    }

    pub fn fired_count(&self) -> usize {
        self.seen.lock().map(|s| s.ids.len()).unwrap_or(0)
    }

    /// Fire `policy` for `event` unless its correlation id already fired.
    pub fn fire(&self, policy: FaultPolicy, event: &CommitEvent) -> Result<FireOutcome, TrackerError> {
        {
            let mut seen = self.seen.lock().map_err(|_| TrackerError::Poisoned)?;
            if !seen.ids.insert(event.correlation_id) {
                return Ok(FireOutcome::AlreadyFired);
            }
            if let Err(e) = seen.ledger.append(&event.correlation_id) {
                tracing::error!("Failed to persist fired fault {}: {}", event.correlation_id, e);
                seen.ids.remove(&event.correlation_id);
                return Err(e.into());
            }
        }

        let line = format!(
            "{},{},{},{}",
            event.correlation_id,
            event.record.id,
            now_millis(),
            policy
        );
        // The id is already durable, so the fault is raised even without its log line.
        if let Err(e) = self
            .error_log
            .lock()
            .map_err(|_| TrackerError::Poisoned)?
            .append_line(&line)
        {
            tracing::error!(
                "Failed to write error log line for flow {}, raising {} anyway: {}",
                event.correlation_id,
                policy,
                e
            );
        }

        metrics::counter!(telemetry::QUARANTINES_TOTAL, 1, "policy" => policy.to_string());
        tracing::warn!(
            "Injected {} for record {} on flow {}",
            policy,
            event.record.id,
            event.correlation_id
        );
        Ok(FireOutcome::Fired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosign_kernel::types::{Action, PartyKeys, RecordId, TxId, UpdateType};
    use cosign_kernel::Record;
    use cosign_persistence::dedup::load_ids;
    use cosign_persistence::lines::read_lines;
    use tempfile::tempdir;

    fn event(correlation_id: CorrelationId) -> CommitEvent {
        let a = PartyKeys::from_seed("PartyA", [1; 32]);
        let b = PartyKeys::from_seed("PartyB", [2; 32]);
        CommitEvent {
            correlation_id,
            tx_id: TxId([0; 32]),
            index: 0,
            update_type: UpdateType::Produced,
            record: Record::new(RecordId::new(), "x", a.party().clone(), b.party().clone(), Action::ThrowQuarantine),
        }
    }

    #[test]
    fn test_fires_once_per_correlation_id() {
        let dir = tempdir().unwrap();
        let handler = QuarantineHandler::open(dir.path().join("seen.txt"), dir.path().join("errors.txt")).unwrap();
        let ev = event(CorrelationId::new());

        assert_eq!(handler.fire(FaultPolicy::Unconditional, &ev).unwrap(), FireOutcome::Fired);
        assert_eq!(handler.fire(FaultPolicy::Unconditional, &ev).unwrap(), FireOutcome::AlreadyFired);
        assert!(handler.already_fired(&ev.correlation_id));

        let errors = read_lines(dir.path().join("errors.txt")).unwrap().lines;
        assert_eq!(errors.len(), 1);
        let cols: Vec<&str> = errors[0].1.split(',').collect();
        assert_eq!(cols[0], ev.correlation_id.to_string());
        assert_eq!(cols[1], ev.record.id.to_string());
        assert_eq!(cols[3], "ThrowQuarantine");
    }

    #[test]
    fn test_reopen_remembers_fired_ids() {
        let dir = tempdir().unwrap();
        let ledger = dir.path().join("seen.txt");
        let errors = dir.path().join("errors.txt");
        let ev = event(CorrelationId::new());

        {
            let handler = QuarantineHandler::open(&ledger, &errors).unwrap();
            handler.fire(FaultPolicy::PartyAOnly, &ev).unwrap();
        }

        let handler = QuarantineHandler::open(&ledger, &errors).unwrap();
        assert_eq!(handler.fired_count(), 1);
        assert_eq!(handler.fire(FaultPolicy::PartyAOnly, &ev).unwrap(), FireOutcome::AlreadyFired);
        assert_eq!(read_lines(&errors).unwrap().lines.len(), 1);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_error_log_failure_still_raises() {
        let dir = tempdir().unwrap();
        let ledger = dir.path().join("seen.txt");
        // Every write to /dev/full fails with ENOSPC.
        let handler = QuarantineHandler::open(&ledger, "/dev/full").unwrap();
        let ev = event(CorrelationId::new());

        assert_eq!(handler.fire(FaultPolicy::Unconditional, &ev).unwrap(), FireOutcome::Fired);
        assert!(handler.already_fired(&ev.correlation_id));
        assert!(load_ids(&ledger).unwrap().contains(&ev.correlation_id));
    }

    #[test]
    fn test_corrupt_ledger_refuses_to_open() {
        let dir = tempdir().unwrap();
        let ledger = dir.path().join("seen.txt");
        std::fs::write(&ledger, "not-an-id\n").unwrap();

        assert!(QuarantineHandler::open(&ledger, dir.path().join("errors.txt")).is_err());
    }
}
