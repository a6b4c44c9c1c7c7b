// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Session wire messages.
//!
//! Every message exchanged over a session is one [`FlowMessage`], encoded with
//! bincode's standard config.

use serde::{Deserialize, Serialize};

use crate::error::{KernelError, KernelResult};
use crate::transaction::{NotarisedTransaction, SignedTransaction, TransactionSignature};
use crate::types::{RecordId, TxId};
use crate::view::RecordView;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowMessage {
    /// Initiator → responder: transaction signed by the initiator.
    Propose(SignedTransaction),
    /// Responder → initiator: counter-signature over the proposed id.
    Signature(TransactionSignature),
    /// Either side: explicit refusal, ends the exchange.
    Reject { reason: String },
    /// Initiator → responder: the notarised transaction to record.
    Finalized(NotarisedTransaction),
    /// Responder → initiator: the transaction is durable at the responder.
    FinalityAck { tx_id: TxId },
    QueryRequest { id: RecordId },
    QueryResponse(RecordView),
}

impl FlowMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            FlowMessage::Propose(_) => "Propose",
            FlowMessage::Signature(_) => "Signature",
            FlowMessage::Reject { .. } => "Reject",
            FlowMessage::Finalized(_) => "Finalized",
            FlowMessage::FinalityAck { .. } => "FinalityAck",
            FlowMessage::QueryRequest { .. } => "QueryRequest",
            FlowMessage::QueryResponse(_) => "QueryResponse",
        }
    }

    pub fn encode(&self) -> KernelResult<Vec<u8>> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| KernelError::Codec(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> KernelResult<Self> {
        let (msg, read) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| KernelError::Codec(e.to_string()))?;
        if read != bytes.len() {
            return Err(KernelError::Codec(format!(
                "trailing bytes: read {} of {}",
                read,
                bytes.len()
            )));
        }
        Ok(msg)
    }
}
