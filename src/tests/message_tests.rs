// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use super::{keys, sample_record};
use crate::message::FlowMessage;
use crate::transaction::{CommitTransaction, SignedTransaction};
use crate::types::{Action, RecordId};
use crate::view::RecordView;

#[test]
fn test_encoding_is_deterministic() {
    let msg = FlowMessage::QueryRequest { id: RecordId::new() };
    let bytes1 = msg.encode().unwrap();
    let bytes2 = msg.encode().unwrap();
    assert_eq!(bytes1, bytes2, "Message encoding must be deterministic");
}

#[test]
fn test_proposal_survives_the_wire() {
    let a = keys("PartyA", 1);
    let b = keys("PartyB", 2);
    let notary = keys("Notary", 3);
    let tx = CommitTransaction::new(vec![sample_record(&a, &b, Action::PartyBThrowQuarantine)], notary.party().clone()).unwrap();
    let stx = SignedTransaction::new(tx.clone()).with_signature(tx.sign(&a));

    let decoded = FlowMessage::decode(&FlowMessage::Propose(stx.clone()).encode().unwrap()).unwrap();
    match decoded {
        FlowMessage::Propose(received) => {
            assert_eq!(received, stx);
            assert!(received.verify_signature_of(a.party()).is_ok());
            assert!(received.tx.verify_id().is_ok());
        }
        other => panic!("unexpected message {}", other.kind()),
    }
}

#[test]
fn test_query_response_keeps_order() {
    let a = keys("PartyA", 1);
    let b = keys("PartyB", 2);
    let first = sample_record(&a, &b, Action::Nothing);
    let mut second = first.clone();
    second.payload = "second version".into();

    let view = RecordView {
        in_store: vec![first.clone(), second.clone()],
        from_log: vec![first],
    };
    let decoded = FlowMessage::decode(&FlowMessage::QueryResponse(view.clone()).encode().unwrap()).unwrap();
    assert_eq!(decoded, FlowMessage::QueryResponse(view));
}

#[test]
fn test_garbage_fails_to_decode() {
    assert!(FlowMessage::decode(&[0xff, 0xff, 0xff]).is_err());
}
