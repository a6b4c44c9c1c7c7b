//! Track log: one line per record version observed by the tracker.
//!
//! # Line Format
//! ```text
//! correlationId,recordId,payload,partyAName,partyBName,timestampMillis[,updateType]
//! ```
//! The trailing update type is optional; lines written by older nodes omit it.

use crate::error::{PersistenceError, Result};
use crate::lines::{read_lines, LineWriter};
use cosign_kernel::types::{CorrelationId, RecordId, UpdateType};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackEntry {
    pub correlation_id: CorrelationId,
    pub record_id: RecordId,
    pub payload: String,
    pub party_a_name: String,
    pub party_b_name: String,
    pub timestamp_millis: u64,
    pub update_type: Option<UpdateType>,
}

impl TrackEntry {
    pub fn to_line(&self) -> String {
        let mut line = format!(
            "{},{},{},{},{},{}",
            self.correlation_id,
            self.record_id,
            self.payload,
            self.party_a_name,
            self.party_b_name,
            self.timestamp_millis
        );
        if let Some(update_type) = self.update_type {
            line.push(',');
            line.push_str(update_type.as_str());
        }
        line
    }

    pub fn parse_line(line_no: usize, line: &str) -> Result<Self> {
        let invalid = |reason: String| PersistenceError::InvalidFormat {
            line: line_no,
            reason,
        };

        let parts: Vec<&str> = line.split(',').map(str::trim).collect();
        if parts.len() != 6 && parts.len() != 7 {
            return Err(invalid(format!("expected 6 or 7 columns, found {}", parts.len())));
        }

        let correlation_id = parts[0]
            .parse::<CorrelationId>()
            .map_err(|e| invalid(format!("correlation id: {}", e)))?;
        let record_id = parts[1]
            .parse::<RecordId>()
            .map_err(|e| invalid(format!("record id: {}", e)))?;
        let timestamp_millis = parts[5]
            .parse::<u64>()
            .map_err(|e| invalid(format!("timestamp: {}", e)))?;
        let update_type = match parts.get(6) {
            Some(raw) => Some(
                raw.parse::<UpdateType>()
                    .map_err(|e| invalid(e.to_string()))?,
            ),
            None => None,
        };

        Ok(Self {
            correlation_id,
            record_id,
            payload: parts[2].to_string(),
            party_a_name: parts[3].to_string(),
            party_b_name: parts[4].to_string(),
            timestamp_millis,
            update_type,
        })
    }
}

/// Append side of the track log.
pub struct TrackLog {
    writer: LineWriter,
}

impl TrackLog {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            writer: LineWriter::open(path)?,
        })
    }

    pub fn append(&mut self, entry: &TrackEntry) -> Result<()> {
        self.writer.append_line(&entry.to_line())
    }

    pub fn path(&self) -> &Path {
        self.writer.path()
    }
}

/// Every complete entry in the log, in file order. A missing file reads as empty.
pub fn read_entries(path: impl AsRef<Path>) -> Result<Vec<TrackEntry>> {
    read_lines(path)?
        .lines
        .iter()
        .map(|(line_no, line)| TrackEntry::parse_line(*line_no, line))
        .collect()
}

/// Entries for one record id, in file order.
pub fn entries_for(path: impl AsRef<Path>, id: &RecordId) -> Result<Vec<TrackEntry>> {
    Ok(read_entries(path)?
        .into_iter()
        .filter(|e| e.record_id == *id)
        .collect())
}
