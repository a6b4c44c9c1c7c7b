// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use cosign_kernel::types::{CorrelationId, RecordId};
use cosign_kernel::view::RecordView;
use cosign_kernel::Record;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
pub struct StartCommitRequest {
    /// Fresh id when omitted.
    pub id: Option<RecordId>,
    pub payload: String,
    /// Display name of the counterparty.
    pub counterparty: String,
    #[serde(default = "default_action")]
    pub action: String,
}

fn default_action() -> String {
    "Nothing".to_string()
}

#[derive(Serialize, Deserialize)]
pub struct StartCommitResponse {
    pub tx_id: String,
    pub record_id: RecordId,
    pub correlation_id: CorrelationId,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct RecordDto {
    pub id: RecordId,
    pub payload: String,
    pub party_a: String,
    pub party_b: String,
    pub action: String,
}

impl From<&Record> for RecordDto {
    fn from(r: &Record) -> Self {
        Self {
            id: r.id,
            payload: r.payload.clone(),
            party_a: r.party_a.name.clone(),
            party_b: r.party_b.name.clone(),
            action: r.action.as_str().to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct RecordViewDto {
    pub in_store: Vec<RecordDto>,
    pub from_log: Vec<RecordDto>,
}

impl From<&RecordView> for RecordViewDto {
    fn from(v: &RecordView) -> Self {
        Self {
            in_store: v.in_store.iter().map(RecordDto::from).collect(),
            from_log: v.from_log.iter().map(RecordDto::from).collect(),
        }
    }
}

#[derive(Deserialize)]
pub struct NetworkQueryRequest {
    pub parties: Vec<String>,
}

/// Views keyed by party name, the queried node first.
#[derive(Serialize, Deserialize)]
pub struct NetworkQueryResponse {
    pub results: IndexMap<String, RecordViewDto>,
}
