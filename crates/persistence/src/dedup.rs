//! Dedup ledger: correlation ids whose one-time fault already fired.
//!
//! # Guarantees
//! - append-only, one id per line, fsync'd per append
//! - duplicates are tolerated and collapsed on load
//! - a torn final line is dropped (the fault it belonged to was never raised)
//! - any other unparsable line fails the load: losing an id could re-fire its fault

use crate::error::{PersistenceError, Result};
use crate::lines::{read_lines, LineWriter};
use cosign_kernel::types::CorrelationId;
use std::collections::HashSet;
use std::path::Path;

pub struct DedupLedger {
    writer: LineWriter,
}

impl DedupLedger {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            writer: LineWriter::open(path)?,
        })
    }

    pub fn append(&mut self, id: &CorrelationId) -> Result<()> {
        self.writer.append_line(&id.to_string())
    }

    /// Replay the whole ledger.
    pub fn load(&self) -> Result<HashSet<CorrelationId>> {
        load_ids(self.writer.path())
    }

    pub fn path(&self) -> &Path {
        self.writer.path()
    }
}

pub fn load_ids(path: impl AsRef<Path>) -> Result<HashSet<CorrelationId>> {
    let mut ids = HashSet::new();
    for (line_no, line) in read_lines(path)?.lines {
        let id = line
            .parse::<CorrelationId>()
            .map_err(|e| PersistenceError::InvalidFormat {
                line: line_no,
                reason: e.to_string(),
            })?;
        ids.insert(id);
    }
    Ok(ids)
}
