// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Transactions and their signatures.
//!
//! A [`CommitTransaction`] wraps the proposed record(s) and names the notary.
//! Its [`TxId`] is the BLAKE3 digest of the bincode encoding of everything else,
//! so every signature covers the full content.
//!
//! # Signature states
//! - no signatures → proposed
//! - some participants → partially signed
//! - every participant → fully signed
//! - fully signed + notary → notarised, ready to record

use ed25519_dalek::Signature;
use serde::{Deserialize, Serialize};

use crate::error::{KernelError, KernelResult, ValidationError};
use crate::record::Record;
use crate::types::{Party, PartyKey, PartyKeys, TxId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitTransaction {
    pub id: TxId,
    pub outputs: Vec<Record>,
    pub notary: Party,
    salt: [u8; 16],
}

impl CommitTransaction {
    pub fn new(outputs: Vec<Record>, notary: Party) -> KernelResult<Self> {
        let salt = *uuid::Uuid::new_v4().as_bytes();
        let id = Self::compute_id(&outputs, &notary, &salt)?;
        Ok(Self {
            id,
            outputs,
            notary,
            salt,
        })
    }

    fn compute_id(outputs: &[Record], notary: &Party, salt: &[u8; 16]) -> KernelResult<TxId> {
        let bytes = bincode::serde::encode_to_vec(
            (outputs, notary, salt),
            bincode::config::standard(),
        )
        .map_err(|e| KernelError::Codec(e.to_string()))?;
        Ok(TxId(*blake3::hash(&bytes).as_bytes()))
    }

    /// Recompute the digest and compare it with the carried id.
    pub fn verify_id(&self) -> KernelResult<()> {
        if Self::compute_id(&self.outputs, &self.notary, &self.salt)? != self.id {
            return Err(KernelError::BadSignature);
        }
        Ok(())
    }

    /// The proposal's record when the transaction has exactly one output.
    pub fn single_output(&self) -> Result<&Record, ValidationError> {
        match self.outputs.as_slice() {
            [record] => Ok(record),
            other => Err(ValidationError::OutputCount(other.len())),
        }
    }

    /// Every participant of every output, in first-seen order.
    pub fn required_signers(&self) -> Vec<&Party> {
        let mut signers: Vec<&Party> = Vec::new();
        for record in &self.outputs {
            for party in record.participants() {
                if !signers.contains(&party) {
                    signers.push(party);
                }
            }
        }
        signers
    }

    pub fn sign(&self, keys: &PartyKeys) -> TransactionSignature {
        TransactionSignature {
            by: keys.party().key,
            signature: keys.sign(self.id.as_bytes()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSignature {
    pub by: PartyKey,
    pub signature: Signature,
}

impl TransactionSignature {
    pub fn verify(&self, id: &TxId) -> KernelResult<()> {
        self.by.verify(id.as_bytes(), &self.signature)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureStatus {
    Proposed,
    PartiallySigned,
    FullySigned,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub tx: CommitTransaction,
    pub signatures: Vec<TransactionSignature>,
}

impl SignedTransaction {
    pub fn new(tx: CommitTransaction) -> Self {
        Self {
            tx,
            signatures: Vec::new(),
        }
    }

    pub fn id(&self) -> TxId {
        self.tx.id
    }

    /// Add a signature, replacing any earlier one from the same key.
    pub fn add_signature(&mut self, signature: TransactionSignature) {
        self.signatures.retain(|s| s.by != signature.by);
        self.signatures.push(signature);
    }

    pub fn with_signature(mut self, signature: TransactionSignature) -> Self {
        self.add_signature(signature);
        self
    }

    fn signature_of(&self, key: &PartyKey) -> Option<&TransactionSignature> {
        self.signatures.iter().find(|s| s.by == *key)
    }

    pub fn missing_signers(&self) -> Vec<&Party> {
        self.tx
            .required_signers()
            .into_iter()
            .filter(|p| self.signature_of(&p.key).is_none())
            .collect()
    }

    pub fn status(&self) -> SignatureStatus {
        let required = self.tx.required_signers().len();
        let missing = self.missing_signers().len();
        if missing == 0 && required > 0 {
            SignatureStatus::FullySigned
        } else if missing < required {
            SignatureStatus::PartiallySigned
        } else {
            SignatureStatus::Proposed
        }
    }

    /// Check that `party` signed this transaction and that the signature holds.
    pub fn verify_signature_of(&self, party: &Party) -> KernelResult<()> {
        self.signature_of(&party.key)
            .ok_or(KernelError::BadSignature)?
            .verify(&self.tx.id)
    }

    /// Check the id digest and that every required signer signed.
    pub fn verify_required(&self) -> KernelResult<()> {
        self.tx.verify_id()?;
        for party in self.tx.required_signers() {
            self.verify_signature_of(party)?;
        }
        Ok(())
    }
}

/// A fully signed transaction with the notary's signature over the same id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotarisedTransaction {
    pub stx: SignedTransaction,
    pub notary_signature: TransactionSignature,
}

impl NotarisedTransaction {
    pub fn id(&self) -> TxId {
        self.stx.id()
    }

    pub fn outputs(&self) -> &[Record] {
        &self.stx.tx.outputs
    }

    pub fn verify(&self) -> KernelResult<()> {
        self.stx.verify_required()?;
        if self.notary_signature.by != self.stx.tx.notary.key {
            return Err(KernelError::BadSignature);
        }
        self.notary_signature.verify(&self.stx.tx.id)
    }
}
