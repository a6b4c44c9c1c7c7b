// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use serde::{Deserialize, Serialize};

use crate::record::Record;

/// What one node knows about a record id.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordView {
    /// Committed versions in the local store, by sequence index ascending.
    pub in_store: Vec<Record>,
    /// Versions reconstructed from the track log, in log order.
    pub from_log: Vec<Record>,
}

impl RecordView {
    pub fn is_empty(&self) -> bool {
        self.in_store.is_empty() && self.from_log.is_empty()
    }
}
