// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Record queries.
//!
//! A local query reads the store (every status, by sequence index) and the
//! track log (in file order). The network query asks each remote party for its
//! local view, one at a time, and fails as a whole if any of them fails.

use std::collections::HashMap;
use std::sync::Arc;

use cosign_kernel::message::FlowMessage;
use cosign_kernel::types::{Action, CorrelationId, Party, RecordId, StatusFilter};
use cosign_kernel::view::RecordView;
use cosign_kernel::Record;
use cosign_persistence::track_log;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::{FlowLogic, FlowState, Step};
use crate::errors::FlowError;
use crate::network::{Directory, FlowKind, Session};
use crate::node::NodeServices;

pub fn find_local(services: &NodeServices, id: &RecordId) -> Result<RecordView, FlowError> {
    let in_store = services
        .store
        .query_by_id(id, StatusFilter::All)?
        .into_iter()
        .map(|v| v.record)
        .collect();

    let entries = track_log::entries_for(&services.config.track_log_path, id)?;
    let mut resolved: HashMap<String, Party> = HashMap::new();
    let mut from_log = Vec::with_capacity(entries.len());
    for entry in entries {
        let party_a = resolve(services.directory.as_ref(), &mut resolved, &entry.party_a_name)?;
        let party_b = resolve(services.directory.as_ref(), &mut resolved, &entry.party_b_name)?;
        // The log does not keep the action.
        from_log.push(Record::new(
            entry.record_id,
            entry.payload,
            party_a,
            party_b,
            Action::Nothing,
        ));
    }

    let view = RecordView { in_store, from_log };
    if view.is_empty() {
        tracing::debug!("No versions of {} known to {}", id, services.me());
    }
    Ok(view)
}

fn resolve(
    directory: &dyn Directory,
    cache: &mut HashMap<String, Party>,
    name: &str,
) -> Result<Party, FlowError> {
    if let Some(party) = cache.get(name) {
        return Ok(party.clone());
    }
    let party = directory.resolve_by_display_name(name)?;
    cache.insert(name.to_string(), party.clone());
    Ok(party)
}

pub type NetworkView = IndexMap<String, RecordView>;

#[derive(Debug, Serialize, Deserialize)]
pub enum NetworkQueryState {
    QueryingLocal,
    QueryingRemote { next: usize, results: NetworkView },
}

impl FlowState for NetworkQueryState {
    fn stage(&self) -> &'static str {
        match self {
            NetworkQueryState::QueryingLocal => "QueryingLocal",
            NetworkQueryState::QueryingRemote { .. } => "QueryingRemote",
        }
    }
}

pub struct NetworkQuery {
    services: Arc<NodeServices>,
    id: RecordId,
    remotes: Vec<Party>,
}

impl NetworkQuery {
    /// Remotes equal to the local party are skipped; the local view always comes first.
    pub fn new(services: Arc<NodeServices>, id: RecordId, remotes: Vec<Party>) -> Self {
        let me = services.me().clone();
        Self {
            services,
            id,
            remotes: remotes.into_iter().filter(|p| *p != me).collect(),
        }
    }

    async fn ask(&self, party: &Party) -> Result<RecordView, FlowError> {
        let failure = |reason: String| FlowError::AggregatedQueryFailure {
            party: party.name.clone(),
            reason,
        };

        let mut session = self
            .services
            .network
            .open(self.services.me(), party, FlowKind::Query)
            .map_err(|e| failure(e.to_string()))?;
        session
            .send(&FlowMessage::QueryRequest { id: self.id })
            .map_err(|e| failure(e.to_string()))?;

        let reply = session.receive(self.services.config.session_timeout).await;
        session.close();
        match reply {
            Ok(FlowMessage::QueryResponse(view)) => Ok(view),
            Ok(FlowMessage::Reject { reason }) => Err(failure(reason)),
            Ok(other) => Err(failure(format!("expected QueryResponse, got {}", other.kind()))),
            Err(e) => Err(failure(e.to_string())),
        }
    }
}

impl FlowLogic for NetworkQuery {
    type State = NetworkQueryState;
    type Output = NetworkView;

    fn name(&self) -> &'static str {
        "NetworkQuery"
    }

    async fn step(
        &mut self,
        state: NetworkQueryState,
    ) -> Result<Step<NetworkQueryState, NetworkView>, FlowError> {
        match state {
            NetworkQueryState::QueryingLocal => {
                let mut results = NetworkView::new();
                results.insert(self.services.me().name.clone(), find_local(&self.services, &self.id)?);
                Ok(Step::Next(NetworkQueryState::QueryingRemote { next: 0, results }))
            }
            NetworkQueryState::QueryingRemote { next, mut results } => {
                let Some(party) = self.remotes.get(next).cloned() else {
                    return Ok(Step::Done(results));
                };
                let view = self.ask(&party).await?;
                results.insert(party.name.clone(), view);
                Ok(Step::Next(NetworkQueryState::QueryingRemote {
                    next: next + 1,
                    results,
                }))
            }
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub enum QueryResponderState {
    AwaitingRequest,
    Answering { id: RecordId },
}

impl FlowState for QueryResponderState {
    fn stage(&self) -> &'static str {
        match self {
            QueryResponderState::AwaitingRequest => "AwaitingRequest",
            QueryResponderState::Answering { .. } => "Answering",
        }
    }
}

pub struct QueryResponder {
    services: Arc<NodeServices>,
    session: Session,
}

impl QueryResponder {
    pub fn new(services: Arc<NodeServices>, session: Session) -> Self {
        Self { services, session }
    }
}

impl FlowLogic for QueryResponder {
    type State = QueryResponderState;
    type Output = ();

    fn name(&self) -> &'static str {
        "QueryResponder"
    }

    async fn step(
        &mut self,
        state: QueryResponderState,
    ) -> Result<Step<QueryResponderState, ()>, FlowError> {
        match state {
            QueryResponderState::AwaitingRequest => {
                let timeout = self.services.config.session_timeout;
                match self.session.receive(timeout).await? {
                    FlowMessage::QueryRequest { id } => {
                        Ok(Step::Next(QueryResponderState::Answering { id }))
                    }
                    other => {
                        self.session.send(&FlowMessage::Reject {
                            reason: format!("expected QueryRequest, got {}", other.kind()),
                        })?;
                        Ok(Step::Done(()))
                    }
                }
            }
            QueryResponderState::Answering { id } => {
                let reply = match find_local(&self.services, &id) {
                    Ok(view) => FlowMessage::QueryResponse(view),
                    Err(e) => {
                        tracing::warn!("Local query for {} failed: {}", id, e);
                        FlowMessage::Reject {
                            reason: e.to_string(),
                        }
                    }
                };
                self.session.send(&reply)?;
                Ok(Step::Done(()))
            }
        }
    }
}

/// Serve one inbound query session to completion.
pub async fn respond(services: Arc<NodeServices>, session: Session) {
    let correlation_id = CorrelationId::new();
    let counterparty = session.counterparty().clone();
    let runner = services.runner.clone();
    let mut flow = QueryResponder::new(services, session);

    if let Err(e) = runner
        .run(correlation_id, &mut flow, QueryResponderState::AwaitingRequest)
        .await
    {
        tracing::warn!("Query from {} failed: {}", counterparty, e);
    }
}
