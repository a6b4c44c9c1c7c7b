// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use cosign_kernel::error::{KernelError, ValidationError};
use cosign_kernel::types::{CorrelationId, RecordId};
use cosign_persistence::PersistenceError;

use crate::flows::checkpoint::CheckpointError;
use crate::network::directory::DirectoryError;
use crate::network::session::SessionError;
use crate::notary::NotaryError;
use crate::store::{ObserverError, StoreError};
use crate::tracker::TrackerError;

/// Where in the commitment protocol a bounded wait expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    GatheringSignatures,
    Finalizing,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Stage::GatheringSignatures => "gathering signatures",
            Stage::Finalizing => "finalizing",
        })
    }
}

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("{party} rejected the proposal: {reason}")]
    CounterpartyRejected { party: String, reason: String },
    #[error("{party} broke the protocol: {reason}")]
    ProtocolViolation { party: String, reason: String },
    #[error("Timed out waiting for {party} while {stage}")]
    CommitTimeout { party: String, stage: Stage },
    #[error("Cannot resolve party {name:?}")]
    UnresolvedCounterparty { name: String },
    #[error("Aggregated query failed at {party}: {reason}")]
    AggregatedQueryFailure { party: String, reason: String },
    #[error("Fault injection quarantine for record {record_id} on flow {correlation_id}")]
    FaultInjectionQuarantine {
        correlation_id: CorrelationId,
        record_id: RecordId,
    },
    #[error("Unknown node {0:?}")]
    UnknownNode(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Session error: {0}")]
    Session(#[from] SessionError),
    #[error("Store error: {0}")]
    Store(StoreError),
    #[error("Notary error: {0}")]
    Notary(#[from] NotaryError),
    #[error("Tracker error: {0}")]
    Tracker(TrackerError),
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),
    #[error("Kernel error: {0}")]
    Kernel(KernelError),
}

impl FlowError {
    /// Quarantines are the only failures the hospital re-runs.
    pub fn is_quarantine(&self) -> bool {
        matches!(self, FlowError::FaultInjectionQuarantine { .. })
    }

    fn status(&self) -> StatusCode {
        match self {
            FlowError::Validation(_) | FlowError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            FlowError::CounterpartyRejected { .. } => StatusCode::CONFLICT,
            FlowError::ProtocolViolation { .. } => StatusCode::BAD_GATEWAY,
            FlowError::CommitTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            FlowError::UnresolvedCounterparty { .. } => StatusCode::NOT_FOUND,
            FlowError::AggregatedQueryFailure { .. } => StatusCode::BAD_GATEWAY,
            FlowError::FaultInjectionQuarantine { .. } => StatusCode::SERVICE_UNAVAILABLE,
            FlowError::UnknownNode(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for FlowError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

impl From<KernelError> for FlowError {
    fn from(e: KernelError) -> Self {
        match e {
            KernelError::Validation(v) => FlowError::Validation(v),
            other => FlowError::Kernel(other),
        }
    }
}

impl From<DirectoryError> for FlowError {
    fn from(e: DirectoryError) -> Self {
        tracing::debug!("Directory lookup failed: {}", e);
        FlowError::UnresolvedCounterparty {
            name: e.name().to_string(),
        }
    }
}

impl From<StoreError> for FlowError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Observer(ObserverError::Quarantine {
                correlation_id,
                record_id,
            }) => FlowError::FaultInjectionQuarantine {
                correlation_id,
                record_id,
            },
            other => FlowError::Store(other),
        }
    }
}

impl From<TrackerError> for FlowError {
    fn from(e: TrackerError) -> Self {
        match e {
            TrackerError::Quarantine {
                correlation_id,
                record_id,
            } => FlowError::FaultInjectionQuarantine {
                correlation_id,
                record_id,
            },
            other => FlowError::Tracker(other),
        }
    }
}
