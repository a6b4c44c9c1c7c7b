// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! The jointly authored record.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::types::{Action, Party, RecordId};

/// Characters that would break the comma separated track log.
const RESERVED: [char; 3] = [',', '\n', '\r'];

/// One version of a record. Immutable once committed; a later version with the
/// same id supersedes it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub payload: String,
    pub party_a: Party,
    pub party_b: Party,
    pub action: Action,
}

impl Record {
    pub fn new(
        id: RecordId,
        payload: impl Into<String>,
        party_a: Party,
        party_b: Party,
        action: Action,
    ) -> Self {
        Self {
            id,
            payload: payload.into(),
            party_a,
            party_b,
            action,
        }
    }

    /// Both endpoints, initiator first.
    pub fn participants(&self) -> [&Party; 2] {
        [&self.party_a, &self.party_b]
    }

    /// Structural checks that must pass before a record is proposed or counter-signed.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.payload.is_empty() {
            return Err(ValidationError::EmptyPayload);
        }
        if let Some(c) = self.payload.chars().find(|c| RESERVED.contains(c)) {
            return Err(ValidationError::ReservedCharacter(c));
        }
        // Track log columns are read back trimmed.
        if self.payload.trim() != self.payload {
            return Err(ValidationError::PaddedPayload);
        }
        if self.party_a == self.party_b {
            return Err(ValidationError::SameParty(self.party_a.name.clone()));
        }
        Ok(())
    }

    /// Same record ignoring the action tag, which the track log does not keep.
    pub fn same_content(&self, other: &Record) -> bool {
        self.id == other.id
            && self.payload == other.payload
            && self.party_a == other.party_a
            && self.party_b == other.party_b
    }
}
