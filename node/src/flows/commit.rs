// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Two-party commit.
//!
//! # Initiator
//! ```text
//! Generating → Signing → GatheringSignatures → Finalizing → done
//! ```
//! Finalizing runs twice: first notarise and record locally, then hand the
//! notarised transaction to the counterparty and wait for its ack.
//!
//! # Responder
//! ```text
//! AwaitingProposal → CheckingProposal → AwaitingFinality → Recording → done
//! ```
//! A proposal that fails checking is answered with `Reject` and nothing is
//! recorded.

use std::sync::Arc;

use cosign_kernel::message::FlowMessage;
use cosign_kernel::transaction::{
    CommitTransaction, NotarisedTransaction, SignatureStatus, SignedTransaction,
};
use cosign_kernel::types::{Action, CorrelationId, Party, RecordId, TxId};
use cosign_kernel::Record;
use serde::{Deserialize, Serialize};

use super::{FlowLogic, FlowState, Step};
use crate::errors::{FlowError, Stage};
use crate::network::{FlowKind, Session, SessionError};
use crate::node::NodeServices;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitRequest {
    pub id: RecordId,
    pub payload: String,
    pub counterparty: Party,
    /// Action name, parsed during generation.
    pub action: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum InitiatorState {
    Generating(CommitRequest),
    Signing {
        record: Record,
    },
    GatheringSignatures {
        stx: SignedTransaction,
    },
    Finalizing {
        stx: SignedTransaction,
        notarised: Option<NotarisedTransaction>,
    },
}

impl FlowState for InitiatorState {
    fn stage(&self) -> &'static str {
        match self {
            InitiatorState::Generating(_) => "Generating",
            InitiatorState::Signing { .. } => "Signing",
            InitiatorState::GatheringSignatures { .. } => "GatheringSignatures",
            InitiatorState::Finalizing { .. } => "Finalizing",
        }
    }
}

pub struct CommitInitiator {
    services: Arc<NodeServices>,
    correlation_id: CorrelationId,
    session: Option<Session>,
}

impl CommitInitiator {
    pub fn new(services: Arc<NodeServices>, correlation_id: CorrelationId) -> Self {
        Self {
            services,
            correlation_id,
            session: None,
        }
    }

    fn generate(&self, request: CommitRequest) -> Result<Record, FlowError> {
        let action: Action = request.action.parse()?;
        let record = Record::new(
            request.id,
            request.payload,
            self.services.me().clone(),
            request.counterparty,
            action,
        );
        record.validate()?;
        Ok(record)
    }

    fn sign(&self, record: Record) -> Result<SignedTransaction, FlowError> {
        let tx = CommitTransaction::new(vec![record], self.services.notary.identity().clone())?;
        let signature = tx.sign(&self.services.keys);
        Ok(SignedTransaction::new(tx).with_signature(signature))
    }

    async fn gather(&mut self, mut stx: SignedTransaction) -> Result<SignedTransaction, FlowError> {
        let counterparty = stx.tx.single_output()?.party_b.clone();
        let timeout = self.services.config.session_timeout;

        self.session = None;
        let mut session =
            self.services
                .network
                .open(self.services.me(), &counterparty, FlowKind::Commit)?;
        session.send(&FlowMessage::Propose(stx.clone()))?;

        let reply = session.receive(timeout).await;
        self.session = Some(session);
        match reply {
            Ok(FlowMessage::Signature(signature)) => {
                if signature.by != counterparty.key {
                    self.session = None;
                    return Err(FlowError::CounterpartyRejected {
                        party: counterparty.name,
                        reason: "signature from an unexpected key".into(),
                    });
                }
                stx.add_signature(signature);
                if stx.verify_signature_of(&counterparty).is_err() {
                    self.session = None;
                    return Err(FlowError::CounterpartyRejected {
                        party: counterparty.name,
                        reason: "counter-signature does not verify".into(),
                    });
                }
                if stx.status() != SignatureStatus::FullySigned {
                    self.session = None;
                    return Err(FlowError::CounterpartyRejected {
                        party: counterparty.name,
                        reason: format!("{} signers still missing", stx.missing_signers().len()),
                    });
                }
                tracing::debug!("{} counter-signed {}", counterparty, stx.id());
                Ok(stx)
            }
            Ok(FlowMessage::Reject { reason }) => {
                self.session = None;
                Err(FlowError::CounterpartyRejected {
                    party: counterparty.name,
                    reason,
                })
            }
            Ok(other) => Err(FlowError::ProtocolViolation {
                party: counterparty.name,
                reason: format!("expected Signature, got {}", other.kind()),
            }),
            Err(SessionError::Timeout { .. }) => Err(FlowError::CommitTimeout {
                party: counterparty.name,
                stage: Stage::GatheringSignatures,
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn notarise_and_record(&self, stx: &SignedTransaction) -> Result<NotarisedTransaction, FlowError> {
        let ntx = self.services.notary.notarise(stx)?;
        self.services.store.record(&ntx, self.correlation_id)?;
        Ok(ntx)
    }

    async fn distribute(&mut self, ntx: &NotarisedTransaction) -> Result<(), FlowError> {
        let timeout = self.services.config.finality_timeout;
        let session = self.session.as_mut().ok_or_else(|| {
            FlowError::Session(SessionError::Closed {
                party: "counterparty".into(),
            })
        })?;
        let party = session.counterparty().name.clone();
        session.send(&FlowMessage::Finalized(ntx.clone()))?;

        match session.receive(timeout).await {
            Ok(FlowMessage::FinalityAck { tx_id }) if tx_id == ntx.id() => Ok(()),
            Ok(FlowMessage::Reject { reason }) => Err(FlowError::CounterpartyRejected { party, reason }),
            Ok(other) => Err(FlowError::ProtocolViolation {
                party,
                reason: format!("expected FinalityAck for {}, got {}", ntx.id(), other.kind()),
            }),
            Err(SessionError::Timeout { .. }) => Err(FlowError::CommitTimeout {
                party,
                stage: Stage::Finalizing,
            }),
            Err(e) => Err(e.into()),
        }
    }
}

impl FlowLogic for CommitInitiator {
    type State = InitiatorState;
    type Output = NotarisedTransaction;

    fn name(&self) -> &'static str {
        "CommitInitiator"
    }

    async fn step(
        &mut self,
        state: InitiatorState,
    ) -> Result<Step<InitiatorState, NotarisedTransaction>, FlowError> {
        match state {
            InitiatorState::Generating(request) => {
                let record = self.generate(request)?;
                Ok(Step::Next(InitiatorState::Signing { record }))
            }
            InitiatorState::Signing { record } => {
                let stx = self.sign(record)?;
                Ok(Step::Next(InitiatorState::GatheringSignatures { stx }))
            }
            InitiatorState::GatheringSignatures { stx } => {
                let stx = self.gather(stx).await?;
                Ok(Step::Next(InitiatorState::Finalizing {
                    stx,
                    notarised: None,
                }))
            }
            InitiatorState::Finalizing {
                stx,
                notarised: None,
            } => {
                let ntx = self.notarise_and_record(&stx)?;
                Ok(Step::Next(InitiatorState::Finalizing {
                    stx,
                    notarised: Some(ntx),
                }))
            }
            InitiatorState::Finalizing {
                notarised: Some(ntx),
                ..
            } => {
                self.distribute(&ntx).await?;
                if let Some(session) = self.session.take() {
                    session.close();
                }
                Ok(Step::Done(ntx))
            }
        }
    }

    fn abort(&mut self, error: &FlowError) {
        if let Some(session) = self.session.take() {
            let _ = session.send(&FlowMessage::Reject {
                reason: error.to_string(),
            });
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ResponderState {
    AwaitingProposal,
    CheckingProposal { stx: SignedTransaction },
    AwaitingFinality { tx_id: TxId },
    Recording { ntx: NotarisedTransaction },
}

impl FlowState for ResponderState {
    fn stage(&self) -> &'static str {
        match self {
            ResponderState::AwaitingProposal => "AwaitingProposal",
            ResponderState::CheckingProposal { .. } => "CheckingProposal",
            ResponderState::AwaitingFinality { .. } => "AwaitingFinality",
            ResponderState::Recording { .. } => "Recording",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponderOutcome {
    Recorded(TxId),
    Rejected { reason: String },
}

pub struct CommitResponder {
    services: Arc<NodeServices>,
    correlation_id: CorrelationId,
    session: Session,
    replied: bool,
}

impl CommitResponder {
    pub fn new(services: Arc<NodeServices>, correlation_id: CorrelationId, session: Session) -> Self {
        Self {
            services,
            correlation_id,
            session,
            replied: false,
        }
    }

    fn counterparty_name(&self) -> String {
        self.session.counterparty().name.clone()
    }

    fn check_proposal(&self, stx: &SignedTransaction) -> Result<(), String> {
        stx.tx.verify_id().map_err(|e| e.to_string())?;
        let record = stx.tx.single_output().map_err(|e| e.to_string())?;
        record.validate().map_err(|e| e.to_string())?;

        let me = self.services.me();
        if record.party_b != *me {
            return Err(format!("party B is {}, not {}", record.party_b, me));
        }
        if record.party_a != *self.session.counterparty() {
            return Err(format!(
                "party A is {}, but the proposal came from {}",
                record.party_a,
                self.session.counterparty()
            ));
        }
        if stx.tx.notary != *self.services.notary.identity() {
            return Err(format!("unknown notary {}", stx.tx.notary));
        }
        stx.verify_signature_of(&record.party_a)
            .map_err(|_| "initiator signature does not verify".to_string())
    }

    fn reject(&mut self, reason: String) -> Step<ResponderState, ResponderOutcome> {
        tracing::info!(
            "Rejecting commit from {} on flow {}: {}",
            self.session.counterparty(),
            self.correlation_id,
            reason
        );
        self.replied = true;
        let _ = self.session.send(&FlowMessage::Reject {
            reason: reason.clone(),
        });
        Step::Done(ResponderOutcome::Rejected { reason })
    }
}

impl FlowLogic for CommitResponder {
    type State = ResponderState;
    type Output = ResponderOutcome;

    fn name(&self) -> &'static str {
        "CommitResponder"
    }

    async fn step(
        &mut self,
        state: ResponderState,
    ) -> Result<Step<ResponderState, ResponderOutcome>, FlowError> {
        match state {
            ResponderState::AwaitingProposal => {
                let timeout = self.services.config.session_timeout;
                match self.session.receive(timeout).await? {
                    FlowMessage::Propose(stx) => Ok(Step::Next(ResponderState::CheckingProposal { stx })),
                    other => Ok(self.reject(format!("expected Propose, got {}", other.kind()))),
                }
            }
            ResponderState::CheckingProposal { stx } => {
                if let Err(reason) = self.check_proposal(&stx) {
                    return Ok(self.reject(reason));
                }
                let signature = stx.tx.sign(&self.services.keys);
                self.session.send(&FlowMessage::Signature(signature))?;
                Ok(Step::Next(ResponderState::AwaitingFinality { tx_id: stx.id() }))
            }
            ResponderState::AwaitingFinality { tx_id } => {
                let timeout = self.services.config.finality_timeout;
                match self.session.receive(timeout).await {
                    Ok(FlowMessage::Finalized(ntx)) => {
                        if ntx.id() != tx_id {
                            return Ok(self.reject(format!("finalized {} but signed {}", ntx.id(), tx_id)));
                        }
                        if let Err(e) = ntx.verify() {
                            return Ok(self.reject(format!("notarised transaction invalid: {}", e)));
                        }
                        Ok(Step::Next(ResponderState::Recording { ntx }))
                    }
                    Ok(FlowMessage::Reject { reason }) => {
                        self.replied = true;
                        Ok(Step::Done(ResponderOutcome::Rejected { reason }))
                    }
                    Ok(other) => Ok(self.reject(format!("expected Finalized, got {}", other.kind()))),
                    Err(SessionError::Timeout { .. }) => Err(FlowError::CommitTimeout {
                        party: self.counterparty_name(),
                        stage: Stage::Finalizing,
                    }),
                    Err(e) => Err(e.into()),
                }
            }
            ResponderState::Recording { ntx } => {
                self.services.store.record(&ntx, self.correlation_id)?;
                self.session.send(&FlowMessage::FinalityAck { tx_id: ntx.id() })?;
                Ok(Step::Done(ResponderOutcome::Recorded(ntx.id())))
            }
        }
    }

    fn abort(&mut self, error: &FlowError) {
        if !self.replied {
            let _ = self.session.send(&FlowMessage::Reject {
                reason: error.to_string(),
            });
        }
    }
}

/// Serve one inbound commit session to completion.
pub async fn respond(services: Arc<NodeServices>, session: Session) {
    let correlation_id = CorrelationId::new();
    let counterparty = session.counterparty().clone();
    let runner = services.runner.clone();
    let mut flow = CommitResponder::new(services, correlation_id, session);

    match runner
        .run(correlation_id, &mut flow, ResponderState::AwaitingProposal)
        .await
    {
        Ok(ResponderOutcome::Recorded(tx_id)) => {
            tracing::info!("Recorded {} from {} on flow {}", tx_id, counterparty, correlation_id)
        }
        Ok(ResponderOutcome::Rejected { reason }) => {
            tracing::info!("Commit from {} ended without recording: {}", counterparty, reason)
        }
        Err(e) => tracing::warn!("Commit from {} failed: {}", counterparty, e),
    }
}
