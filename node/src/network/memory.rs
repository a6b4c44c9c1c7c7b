// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use cosign_kernel::types::{Party, PartyKey};
use tokio::sync::mpsc;

use super::directory::NetworkDirectory;
use super::session::{Session, SessionError};
use super::{FlowKind, InboundSession};

/// In-process transport. Each registered party gets an inbox of sessions
/// other parties open towards it.
#[derive(Debug, Default)]
pub struct InMemoryNetwork {
    inboxes: RwLock<HashMap<PartyKey, mpsc::UnboundedSender<InboundSession>>>,
    directory: Arc<NetworkDirectory>,
    next_session: AtomicU64,
}

impl InMemoryNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn directory(&self) -> Arc<NetworkDirectory> {
        self.directory.clone()
    }

    /// Join the network. The returned receiver yields inbound sessions.
    pub fn register(&self, party: Party) -> mpsc::UnboundedReceiver<InboundSession> {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut inboxes) = self.inboxes.write() {
            inboxes.insert(party.key, tx);
        }
        self.directory.register(party);
        rx
    }

    /// Stop delivering sessions to `party`. It stays in the directory.
    pub fn disconnect(&self, party: &Party) {
        if let Ok(mut inboxes) = self.inboxes.write() {
            inboxes.remove(&party.key);
        }
    }

    pub fn open(&self, from: &Party, to: &Party, kind: FlowKind) -> Result<Session, SessionError> {
        let inboxes = self
            .inboxes
            .read()
            .map_err(|_| SessionError::Unreachable(to.name.clone()))?;
        let inbox = inboxes
            .get(&to.key)
            .ok_or_else(|| SessionError::Unreachable(to.name.clone()))?;

        let id = self.next_session.fetch_add(1, Ordering::Relaxed);
        let (local, remote) = Session::pair(id, from.clone(), to.clone());
        inbox
            .send(InboundSession {
                kind,
                session: remote,
            })
            .map_err(|_| SessionError::Unreachable(to.name.clone()))?;

        tracing::debug!("Opened {:?} session {} from {} to {}", kind, id, from, to);
        Ok(local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosign_kernel::message::FlowMessage;
    use cosign_kernel::types::{PartyKeys, RecordId};
    use crate::network::directory::Directory;
    use std::time::Duration;

    #[tokio::test]
    async fn test_open_delivers_session_to_inbox() {
        let net = InMemoryNetwork::new();
        let a = PartyKeys::from_seed("PartyA", [1; 32]).party().clone();
        let b = PartyKeys::from_seed("PartyB", [2; 32]).party().clone();
        let _a_inbox = net.register(a.clone());
        let mut b_inbox = net.register(b.clone());

        let mut session = net.open(&a, &b, FlowKind::Query).unwrap();
        let id = RecordId::new();
        session.send(&FlowMessage::QueryRequest { id }).unwrap();

        let mut inbound = b_inbox.recv().await.unwrap();
        assert_eq!(inbound.kind, FlowKind::Query);
        assert_eq!(inbound.session.counterparty(), &a);
        assert_eq!(
            inbound.session.receive(Duration::from_secs(1)).await.unwrap(),
            FlowMessage::QueryRequest { id }
        );

        inbound
            .session
            .send(&FlowMessage::Reject { reason: "no".into() })
            .unwrap();
        assert!(matches!(
            session.receive(Duration::from_secs(1)).await.unwrap(),
            FlowMessage::Reject { .. }
        ));
        assert_eq!(net.directory().resolve_by_display_name("PartyB").unwrap(), b);
    }

    #[test]
    fn test_unregistered_party_unreachable() {
        let net = InMemoryNetwork::new();
        let a = PartyKeys::from_seed("PartyA", [1; 32]).party().clone();
        let c = PartyKeys::from_seed("PartyC", [3; 32]).party().clone();

        assert!(matches!(
            net.open(&a, &c, FlowKind::Commit),
            Err(SessionError::Unreachable(name)) if name == "PartyC"
        ));
    }

    #[test]
    fn test_disconnected_party_unreachable() {
        let net = InMemoryNetwork::new();
        let a = PartyKeys::from_seed("PartyA", [1; 32]).party().clone();
        let b = PartyKeys::from_seed("PartyB", [2; 32]).party().clone();
        let _inbox = net.register(b.clone());
        net.disconnect(&b);

        assert!(net.open(&a, &b, FlowKind::Commit).is_err());
    }
}
