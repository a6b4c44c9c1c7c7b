// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Commit notifications.
//!
//! The local store emits one [`CommitEvent`] per record version that becomes
//! durable (`Produced`) or is superseded (`Consumed`), in commit order.

use serde::{Deserialize, Serialize};

use crate::record::Record;
use crate::types::{CorrelationId, TxId, UpdateType};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitEvent {
    /// Workflow instance on this node that recorded the transaction.
    pub correlation_id: CorrelationId,
    pub tx_id: TxId,
    /// Store-assigned sequence index of the version.
    pub index: u64,
    pub update_type: UpdateType,
    pub record: Record,
}

impl CommitEvent {
    pub fn is_produced(&self) -> bool {
        self.update_type == UpdateType::Produced
    }
}
