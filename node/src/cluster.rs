// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::sync::Arc;

use cosign_kernel::types::PartyKeys;
use indexmap::IndexMap;

use crate::config::{NetworkConfig, NodeConfig};
use crate::errors::FlowError;
use crate::network::InMemoryNetwork;
use crate::node::Node;
use crate::notary::{Notary, SimpleNotary};

/// Nodes sharing one in-process network and one notary.
pub struct Cluster {
    network: Arc<InMemoryNetwork>,
    notary: Arc<SimpleNotary>,
    nodes: IndexMap<String, Arc<Node>>,
}

impl Cluster {
    /// One node per configured name, each with a fresh key pair.
    pub fn start(config: &NetworkConfig) -> Result<Self, FlowError> {
        let nodes = config
            .nodes
            .iter()
            .map(|name| (PartyKeys::generate(name.clone()), config.node_config(name)))
            .collect();
        Self::start_with(nodes, PartyKeys::generate(config.notary_name.clone()))
    }

    pub fn start_with(
        nodes: Vec<(PartyKeys, NodeConfig)>,
        notary_keys: PartyKeys,
    ) -> Result<Self, FlowError> {
        let network = InMemoryNetwork::new();
        let notary = Arc::new(SimpleNotary::new(notary_keys));
        network.directory().register(notary.identity().clone());

        let mut started = IndexMap::new();
        for (keys, config) in nodes {
            let name = config.name.clone();
            let node = Node::start(keys, config, network.clone(), notary.clone())?;
            started.insert(name, node);
        }
        tracing::info!(
            "Cluster up: {} nodes, notary {}",
            started.len(),
            notary.identity()
        );

        Ok(Self {
            network,
            notary,
            nodes: started,
        })
    }

    pub fn node(&self, name: &str) -> Result<&Arc<Node>, FlowError> {
        self.nodes
            .get(name)
            .ok_or_else(|| FlowError::UnknownNode(name.to_string()))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Arc<Node>> {
        self.nodes.values()
    }

    pub fn network(&self) -> &Arc<InMemoryNetwork> {
        &self.network
    }

    pub fn notary(&self) -> &SimpleNotary {
        &self.notary
    }

    pub fn shutdown(&self) {
        for node in self.nodes.values() {
            node.shutdown();
        }
    }
}
