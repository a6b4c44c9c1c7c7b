// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::sync::{Arc, Mutex};
use std::time::Instant;

use cosign_kernel::transaction::NotarisedTransaction;
use cosign_kernel::types::{CorrelationId, Party, PartyKeys, RecordId};
use cosign_kernel::view::RecordView;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::NodeConfig;
use crate::errors::FlowError;
use crate::flows::checkpoint::CheckpointStore;
use crate::flows::commit::{self, CommitInitiator, CommitRequest, InitiatorState};
use crate::flows::query::{self, NetworkQuery, NetworkQueryState, NetworkView};
use crate::flows::FlowRunner;
use crate::network::{Directory, FlowKind, InMemoryNetwork, InboundSession};
use crate::notary::Notary;
use crate::store::LocalStore;
use crate::telemetry;
use crate::tracker::RecordTracker;

/// Everything a flow running on this node may touch.
pub struct NodeServices {
    pub keys: PartyKeys,
    pub config: NodeConfig,
    pub store: Arc<LocalStore>,
    pub network: Arc<InMemoryNetwork>,
    pub directory: Arc<dyn Directory>,
    pub notary: Arc<dyn Notary>,
    pub runner: FlowRunner,
}

impl NodeServices {
    pub fn me(&self) -> &Party {
        self.keys.party()
    }
}

#[derive(Debug, Clone)]
pub struct CommitOutcome {
    pub correlation_id: CorrelationId,
    pub tx: NotarisedTransaction,
}

pub struct Node {
    services: Arc<NodeServices>,
    tracker: Arc<RecordTracker>,
    serve_task: Mutex<Option<JoinHandle<()>>>,
}

impl Node {
    /// Open the node's files, subscribe its tracker and start serving inbound
    /// sessions. Must be called inside a Tokio runtime.
    pub fn start(
        keys: PartyKeys,
        config: NodeConfig,
        network: Arc<InMemoryNetwork>,
        notary: Arc<dyn Notary>,
    ) -> Result<Arc<Node>, FlowError> {
        let store = Arc::new(LocalStore::new());
        let tracker = Arc::new(RecordTracker::open(keys.party().clone(), &config)?);
        tracker.start(&store)?;

        let runner = FlowRunner::new(
            Arc::new(CheckpointStore::new()),
            config.hospital_max_retries,
            config.hospital_backoff,
        );
        let inbox = network.register(keys.party().clone());
        let services = Arc::new(NodeServices {
            directory: network.directory(),
            keys,
            config,
            store,
            network,
            notary,
            runner,
        });

        let task = tokio::spawn(serve(services.clone(), inbox));
        tracing::info!("Node {} started", services.me());

        Ok(Arc::new(Node {
            services,
            tracker,
            serve_task: Mutex::new(Some(task)),
        }))
    }

    pub fn party(&self) -> &Party {
        self.services.me()
    }

    pub fn services(&self) -> &Arc<NodeServices> {
        &self.services
    }

    pub fn store(&self) -> &LocalStore {
        &self.services.store
    }

    pub fn tracker(&self) -> &RecordTracker {
        &self.tracker
    }

    /// Resolve a display name through this node's directory.
    pub fn resolve(&self, name: &str) -> Result<Party, FlowError> {
        Ok(self.services.directory.resolve_by_display_name(name)?)
    }

    /// Agree `payload` under `id` with `counterparty`. Returns once the
    /// transaction is durable at both parties.
    pub async fn start_commit(
        &self,
        id: RecordId,
        payload: impl Into<String>,
        counterparty: Party,
        action: impl Into<String>,
    ) -> Result<CommitOutcome, FlowError> {
        let correlation_id = CorrelationId::new();
        let request = CommitRequest {
            id,
            payload: payload.into(),
            counterparty,
            action: action.into(),
        };
        tracing::info!(
            "Starting commit {} of record {} with {}",
            correlation_id,
            request.id,
            request.counterparty
        );

        let started = Instant::now();
        let mut flow = CommitInitiator::new(self.services.clone(), correlation_id);
        let tx = self
            .services
            .runner
            .run(correlation_id, &mut flow, InitiatorState::Generating(request))
            .await?;

        metrics::counter!(telemetry::COMMITS_TOTAL, 1);
        metrics::histogram!(telemetry::COMMIT_DURATION_SECONDS, started.elapsed().as_secs_f64());
        tracing::info!("Commit {} finalized as {}", correlation_id, tx.id());
        Ok(CommitOutcome { correlation_id, tx })
    }

    pub fn find_record(&self, id: &RecordId) -> Result<RecordView, FlowError> {
        query::find_local(&self.services, id)
    }

    /// This node's view first, then each remote's, in the order given.
    pub async fn find_across_network(
        &self,
        id: RecordId,
        remotes: Vec<Party>,
    ) -> Result<NetworkView, FlowError> {
        let correlation_id = CorrelationId::new();
        let mut flow = NetworkQuery::new(self.services.clone(), id, remotes);
        self.services
            .runner
            .run(correlation_id, &mut flow, NetworkQueryState::QueryingLocal)
            .await
    }

    /// Stop accepting sessions. In-flight responders run to completion.
    pub fn shutdown(&self) {
        self.services.network.disconnect(self.party());
        if let Ok(mut task) = self.serve_task.lock() {
            if let Some(task) = task.take() {
                task.abort();
            }
        }
        tracing::info!("Node {} stopped", self.party());
    }
}

async fn serve(services: Arc<NodeServices>, mut inbox: mpsc::UnboundedReceiver<InboundSession>) {
    while let Some(inbound) = inbox.recv().await {
        let services = services.clone();
        match inbound.kind {
            FlowKind::Commit => {
                tokio::spawn(commit::respond(services, inbound.session));
            }
            FlowKind::Query => {
                tokio::spawn(query::respond(services, inbound.session));
            }
        }
    }
}
