// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::time::Duration;

use cosign_kernel::message::FlowMessage;
use cosign_kernel::types::Party;
use cosign_kernel::KernelError;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("No message from {party} within {after:?}")]
    Timeout { party: String, after: Duration },
    #[error("Session with {party} closed")]
    Closed { party: String },
    #[error("{0} is not reachable on this network")]
    Unreachable(String),
    #[error("Bad message: {0}")]
    Codec(#[from] KernelError),
}

/// One end of a bidirectional, ordered channel between two parties.
///
/// Messages travel as bincode frames. Dropping either end closes the session
/// for the other.
#[derive(Debug)]
pub struct Session {
    id: u64,
    local: Party,
    counterparty: Party,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    inbound: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl Session {
    /// Two connected ends: the first belongs to `a`, the second to `b`.
    pub fn pair(id: u64, a: Party, b: Party) -> (Session, Session) {
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();
        (
            Session {
                id,
                local: a.clone(),
                counterparty: b.clone(),
                outbound: a_tx,
                inbound: a_rx,
            },
            Session {
                id,
                local: b,
                counterparty: a,
                outbound: b_tx,
                inbound: b_rx,
            },
        )
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn local(&self) -> &Party {
        &self.local
    }

    pub fn counterparty(&self) -> &Party {
        &self.counterparty
    }

    pub fn send(&self, message: &FlowMessage) -> Result<(), SessionError> {
        let frame = message.encode()?;
        tracing::trace!(
            "session {} {} -> {}: {}",
            self.id,
            self.local,
            self.counterparty,
            message.kind()
        );
        self.outbound.send(frame).map_err(|_| SessionError::Closed {
            party: self.counterparty.name.clone(),
        })
    }

    /// Wait at most `timeout` for the next message.
    pub async fn receive(&mut self, timeout: Duration) -> Result<FlowMessage, SessionError> {
        match tokio::time::timeout(timeout, self.inbound.recv()).await {
            Err(_) => Err(SessionError::Timeout {
                party: self.counterparty.name.clone(),
                after: timeout,
            }),
            Ok(None) => Err(SessionError::Closed {
                party: self.counterparty.name.clone(),
            }),
            Ok(Some(frame)) => Ok(FlowMessage::decode(&frame)?),
        }
    }

    /// End the session. The counterparty's next receive fails with `Closed`
    /// once it has drained what was already sent.
    pub fn close(self) {
        tracing::trace!("session {} closed by {}", self.id, self.local);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosign_kernel::types::{PartyKeys, RecordId};

    fn parties() -> (Party, Party) {
        (
            PartyKeys::from_seed("PartyA", [1; 32]).party().clone(),
            PartyKeys::from_seed("PartyB", [2; 32]).party().clone(),
        )
    }

    #[tokio::test]
    async fn test_messages_arrive_in_order() {
        let (a, b) = parties();
        let (left, mut right) = Session::pair(7, a.clone(), b);
        let first = RecordId::new();
        let second = RecordId::new();

        left.send(&FlowMessage::QueryRequest { id: first }).unwrap();
        left.send(&FlowMessage::QueryRequest { id: second }).unwrap();

        assert_eq!(right.counterparty(), &a);
        assert_eq!(
            right.receive(Duration::from_secs(1)).await.unwrap(),
            FlowMessage::QueryRequest { id: first }
        );
        assert_eq!(
            right.receive(Duration::from_secs(1)).await.unwrap(),
            FlowMessage::QueryRequest { id: second }
        );
    }

    #[tokio::test]
    async fn test_silent_counterparty_times_out() {
        let (a, b) = parties();
        let (mut left, _right) = Session::pair(1, a, b);

        match left.receive(Duration::from_millis(20)).await {
            Err(SessionError::Timeout { party, .. }) => assert_eq!(party, "PartyB"),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_dropped_end_closes_session() {
        let (a, b) = parties();
        let (mut left, right) = Session::pair(1, a, b);
        drop(right);

        assert!(matches!(
            left.receive(Duration::from_secs(1)).await,
            Err(SessionError::Closed { .. })
        ));
        assert!(matches!(
            left.send(&FlowMessage::Reject { reason: "x".into() }),
            Err(SessionError::Closed { .. })
        ));
    }
}
