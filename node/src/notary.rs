// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::collections::HashMap;
use std::sync::Mutex;

use cosign_kernel::transaction::{NotarisedTransaction, SignedTransaction, TransactionSignature};
use cosign_kernel::types::{Party, PartyKeys, TxId};
use cosign_kernel::KernelError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotaryError {
    #[error("Transaction names notary {named}, not {actual}")]
    WrongNotary { named: String, actual: String },
    #[error("Transaction is not fully signed: {0}")]
    NotFullySigned(KernelError),
    #[error("Notary state poisoned")]
    Poisoned,
}

/// Finality service shared by both participants.
pub trait Notary: Send + Sync {
    fn identity(&self) -> &Party;

    fn notarise(&self, stx: &SignedTransaction) -> Result<NotarisedTransaction, NotaryError>;
}

/// Single-node notary: signs any fully signed transaction that names it.
/// Notarising the same transaction again returns the same signature.
pub struct SimpleNotary {
    keys: PartyKeys,
    signed: Mutex<HashMap<TxId, TransactionSignature>>,
}

impl SimpleNotary {
    pub fn new(keys: PartyKeys) -> Self {
        Self {
            keys,
            signed: Mutex::new(HashMap::new()),
        }
    }

    pub fn notarised_count(&self) -> usize {
        self.signed.lock().map(|s| s.len()).unwrap_or(0)
    }
}

impl Notary for SimpleNotary {
    fn identity(&self) -> &Party {
        self.keys.party()
    }

    fn notarise(&self, stx: &SignedTransaction) -> Result<NotarisedTransaction, NotaryError> {
        if stx.tx.notary != *self.identity() {
            return Err(NotaryError::WrongNotary {
                named: stx.tx.notary.name.clone(),
                actual: self.identity().name.clone(),
            });
        }
        stx.verify_required().map_err(NotaryError::NotFullySigned)?;

        let mut signed = self.signed.lock().map_err(|_| NotaryError::Poisoned)?;
        let signature = signed
            .entry(stx.id())
            .or_insert_with(|| {
                tracing::info!("Notarised transaction {}", stx.id());
                stx.tx.sign(&self.keys)
            })
            .clone();

        Ok(NotarisedTransaction {
            stx: stx.clone(),
            notary_signature: signature,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosign_kernel::transaction::CommitTransaction;
    use cosign_kernel::types::{Action, RecordId};
    use cosign_kernel::Record;

    fn proposal(notary: &Party) -> (PartyKeys, PartyKeys, SignedTransaction) {
        let a = PartyKeys::from_seed("PartyA", [1; 32]);
        let b = PartyKeys::from_seed("PartyB", [2; 32]);
        let record = Record::new(RecordId::new(), "data", a.party().clone(), b.party().clone(), Action::Nothing);
        let tx = CommitTransaction::new(vec![record], notary.clone()).unwrap();
        let stx = SignedTransaction::new(tx);
        (a, b, stx)
    }

    #[test]
    fn test_notarise_fully_signed() {
        let notary = SimpleNotary::new(PartyKeys::from_seed("Notary", [9; 32]));
        let (a, b, stx) = proposal(notary.identity());
        let (sig_a, sig_b) = (stx.tx.sign(&a), stx.tx.sign(&b));
        let stx = stx.with_signature(sig_a).with_signature(sig_b);

        let ntx = notary.notarise(&stx).unwrap();
        ntx.verify().unwrap();

        let again = notary.notarise(&stx).unwrap();
        assert_eq!(again.notary_signature, ntx.notary_signature);
        assert_eq!(notary.notarised_count(), 1);
    }

    #[test]
    fn test_partially_signed_refused() {
        let notary = SimpleNotary::new(PartyKeys::from_seed("Notary", [9; 32]));
        let (a, _b, stx) = proposal(notary.identity());
        let sig_a = stx.tx.sign(&a);
        let stx = stx.with_signature(sig_a);

        assert!(matches!(notary.notarise(&stx), Err(NotaryError::NotFullySigned(_))));
        assert_eq!(notary.notarised_count(), 0);
    }

    #[test]
    fn test_other_notary_refused() {
        let notary = SimpleNotary::new(PartyKeys::from_seed("Notary", [9; 32]));
        let other = PartyKeys::from_seed("Other", [8; 32]);
        let (a, b, stx) = proposal(other.party());
        let (sig_a, sig_b) = (stx.tx.sign(&a), stx.tx.sign(&b));
        let stx = stx.with_signature(sig_a).with_signature(sig_b);

        assert!(matches!(notary.notarise(&stx), Err(NotaryError::WrongNotary { .. })));
    }
}
