// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Flows - resumable, multi-step workflows
//!
//! A flow is an explicit state machine. The [`FlowRunner`] drives it one step
//! at a time and checkpoints every state it reaches.
//!
//! # Hospital
//! A step that fails with a fault injection quarantine does not end the flow.
//! The runner waits `hospital_backoff`, reloads the last checkpoint and runs
//! the step again, at most `hospital_max_retries` times. Every other error is
//! terminal.

pub mod checkpoint;
pub mod commit;
pub mod query;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use cosign_kernel::types::CorrelationId;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::errors::FlowError;
use crate::telemetry;
use checkpoint::{CheckpointError, CheckpointStore};

pub enum Step<S, T> {
    Next(S),
    Done(T),
}

pub trait FlowState: Serialize + DeserializeOwned + Send {
    /// Stage name for logs.
    fn stage(&self) -> &'static str;
}

pub trait FlowLogic: Send {
    type State: FlowState;
    type Output: Send;

    fn name(&self) -> &'static str;

    fn step(
        &mut self,
        state: Self::State,
    ) -> impl Future<Output = Result<Step<Self::State, Self::Output>, FlowError>> + Send;

    /// Called once when the flow ends in error, to tell the counterparty.
    fn abort(&mut self, _error: &FlowError) {}
}

#[derive(Clone)]
pub struct FlowRunner {
    checkpoints: Arc<CheckpointStore>,
    max_retries: u32,
    backoff: Duration,
}

impl FlowRunner {
    pub fn new(checkpoints: Arc<CheckpointStore>, max_retries: u32, backoff: Duration) -> Self {
        Self {
            checkpoints,
            max_retries,
            backoff,
        }
    }

    pub fn checkpoints(&self) -> &CheckpointStore {
        &self.checkpoints
    }

    pub async fn run<F: FlowLogic>(
        &self,
        correlation_id: CorrelationId,
        flow: &mut F,
        initial: F::State,
    ) -> Result<F::Output, FlowError> {
        let result = self.drive(correlation_id, flow, initial).await;
        self.checkpoints.remove(&correlation_id);

        if let Err(e) = &result {
            tracing::warn!("{} flow {} failed: {}", flow.name(), correlation_id, e);
            metrics::counter!(telemetry::FLOW_FAILURES_TOTAL, 1, "flow" => flow.name());
            flow.abort(e);
        }
        result
    }

    async fn drive<F: FlowLogic>(
        &self,
        correlation_id: CorrelationId,
        flow: &mut F,
        initial: F::State,
    ) -> Result<F::Output, FlowError> {
        self.checkpoints.save(correlation_id, &initial)?;
        let mut state = initial;
        let mut admissions = 0u32;

        loop {
            let stage = state.stage();
            tracing::debug!("{} flow {} entering {}", flow.name(), correlation_id, stage);

            match flow.step(state).await {
                Ok(Step::Next(next)) => {
                    self.checkpoints.save(correlation_id, &next)?;
                    state = next;
                }
                Ok(Step::Done(output)) => return Ok(output),
                Err(e) if e.is_quarantine() && admissions < self.max_retries => {
                    admissions += 1;
                    tracing::warn!(
                        "{} flow {} quarantined in {} ({}), retry {}/{} from checkpoint",
                        flow.name(),
                        correlation_id,
                        stage,
                        e,
                        admissions,
                        self.max_retries
                    );
                    metrics::counter!(telemetry::HOSPITAL_ADMISSIONS_TOTAL, 1, "flow" => flow.name());
                    tokio::time::sleep(self.backoff).await;
                    state = self.reload(correlation_id)?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn reload<S: FlowState>(&self, correlation_id: CorrelationId) -> Result<S, CheckpointError> {
        self.checkpoints.load(correlation_id)
    }
}
