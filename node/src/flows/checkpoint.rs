// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Flow checkpoints.
//!
//! The last state a flow reached, bincode-encoded and keyed by correlation id.
//! Each entry carries the BLAKE3 digest of its bytes; a mismatch on load fails
//! the flow instead of resuming from a damaged state.

use std::collections::HashMap;
use std::sync::Mutex;

use cosign_kernel::types::CorrelationId;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("Checkpoint codec error: {0}")]
    Codec(String),
    #[error("Checkpoint for flow {0} is corrupted")]
    Corrupted(CorrelationId),
    #[error("No checkpoint for flow {0}")]
    Missing(CorrelationId),
    #[error("Checkpoint store poisoned")]
    Poisoned,
}

struct Checkpoint {
    bytes: Vec<u8>,
    digest: [u8; 32],
    sequence: u64,
}

#[derive(Default)]
pub struct CheckpointStore {
    entries: Mutex<HashMap<CorrelationId, Checkpoint>>,
}

impl CheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the checkpoint of `id`. Returns how many times it has been saved.
    pub fn save<S: Serialize>(&self, id: CorrelationId, state: &S) -> Result<u64, CheckpointError> {
        let bytes = bincode::serde::encode_to_vec(state, bincode::config::standard())
            .map_err(|e| CheckpointError::Codec(e.to_string()))?;
        let digest = *blake3::hash(&bytes).as_bytes();

        let mut entries = self.entries.lock().map_err(|_| CheckpointError::Poisoned)?;
        let sequence = entries.get(&id).map(|c| c.sequence + 1).unwrap_or(1);
        entries.insert(
            id,
            Checkpoint {
                bytes,
                digest,
                sequence,
            },
        );
        Ok(sequence)
    }

    pub fn load<S: DeserializeOwned>(&self, id: CorrelationId) -> Result<S, CheckpointError> {
        let entries = self.entries.lock().map_err(|_| CheckpointError::Poisoned)?;
        let checkpoint = entries.get(&id).ok_or(CheckpointError::Missing(id))?;
        if *blake3::hash(&checkpoint.bytes).as_bytes() != checkpoint.digest {
            return Err(CheckpointError::Corrupted(id));
        }
        let (state, _) =
            bincode::serde::decode_from_slice(&checkpoint.bytes, bincode::config::standard())
                .map_err(|e| CheckpointError::Codec(e.to_string()))?;
        Ok(state)
    }

    pub fn remove(&self, id: &CorrelationId) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(id);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    fn damage(&self, id: &CorrelationId) {
        if let Some(c) = self.entries.lock().unwrap().get_mut(id) {
            if let Some(b) = c.bytes.first_mut() {
                *b ^= 0xff;
            }
        }
    }
}
