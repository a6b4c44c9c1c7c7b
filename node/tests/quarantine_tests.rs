use cosign_kernel::event::CommitEvent;
use cosign_kernel::types::{Action, PartyKeys, RecordId, TxId, UpdateType};
use cosign_kernel::Record;
use cosign_node::cluster::Cluster;
use cosign_node::config::NodeConfig;
use cosign_node::errors::FlowError;
use cosign_persistence::dedup::load_ids;
use cosign_persistence::lines::read_lines;
use cosign_persistence::track_log::read_entries;
use std::path::Path;
use std::time::Duration;
use tempfile::tempdir;

fn cluster(dir: &Path, retries: u32) -> Cluster {
    let nodes = ["PartyA", "PartyB"]
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let cfg = NodeConfig {
                session_timeout: Duration::from_secs(5),
                finality_timeout: Duration::from_secs(5),
                hospital_max_retries: retries,
                hospital_backoff: Duration::from_millis(10),
                ..NodeConfig::for_node(*name, dir)
            };
            (PartyKeys::from_seed(*name, [i as u8 + 1; 32]), cfg)
        })
        .collect();
    Cluster::start_with(nodes, PartyKeys::from_seed("Notary", [99; 32])).unwrap()
}

fn error_lines(dir: &Path, node: &str) -> Vec<String> {
    let cfg = NodeConfig::for_node(node, dir);
    read_lines(cfg.error_log_path)
        .unwrap()
        .lines
        .into_iter()
        .map(|(_, l)| l)
        .collect()
}

fn ledger_len(dir: &Path, node: &str) -> usize {
    load_ids(NodeConfig::for_node(node, dir).dedup_ledger_path).unwrap().len()
}

fn tracked(dir: &Path, node: &str) -> usize {
    read_entries(NodeConfig::for_node(node, dir).track_log_path).unwrap().len()
}

#[tokio::test]
async fn test_unconditional_fault_recovers_at_both_nodes() {
    let dir = tempdir().unwrap();
    let cluster = cluster(dir.path(), 3);
    let a = cluster.node("PartyA").unwrap();
    let b = cluster.node("PartyB").unwrap();
    let id = RecordId::new();

    a.start_commit(id, "data", b.party().clone(), "ThrowQuarantine")
        .await
        .unwrap();

    for node in ["PartyA", "PartyB"] {
        let errors = error_lines(dir.path(), node);
        assert_eq!(errors.len(), 1, "error log at {}", node);
        let cols: Vec<&str> = errors[0].split(',').collect();
        assert_eq!(cols.len(), 4);
        assert_eq!(cols[1], id.to_string());
        assert_eq!(cols[3], "ThrowQuarantine");

        assert_eq!(ledger_len(dir.path(), node), 1, "ledger at {}", node);
        assert_eq!(tracked(dir.path(), node), 1, "track log at {}", node);
    }
    assert_eq!(a.find_record(&id).unwrap().in_store.len(), 1);
    assert_eq!(b.find_record(&id).unwrap().in_store.len(), 1);
}

#[tokio::test]
async fn test_party_a_fault_only_fires_at_party_a() {
    let dir = tempdir().unwrap();
    let cluster = cluster(dir.path(), 3);
    let a = cluster.node("PartyA").unwrap();
    let b = cluster.node("PartyB").unwrap();

    a.start_commit(RecordId::new(), "data", b.party().clone(), "PartyAThrowQuarantine")
        .await
        .unwrap();

    assert_eq!(error_lines(dir.path(), "PartyA").len(), 1);
    assert!(error_lines(dir.path(), "PartyB").is_empty());
    assert_eq!(ledger_len(dir.path(), "PartyB"), 0);
    assert_eq!(tracked(dir.path(), "PartyA"), 1);
    assert_eq!(tracked(dir.path(), "PartyB"), 1);
}

#[tokio::test]
async fn test_party_b_fault_only_fires_at_party_b() {
    let dir = tempdir().unwrap();
    let cluster = cluster(dir.path(), 3);
    let a = cluster.node("PartyA").unwrap();
    let b = cluster.node("PartyB").unwrap();

    a.start_commit(RecordId::new(), "data", b.party().clone(), "PartyBThrowQuarantine")
        .await
        .unwrap();

    assert!(error_lines(dir.path(), "PartyA").is_empty());
    assert_eq!(error_lines(dir.path(), "PartyB").len(), 1);
    assert_eq!(error_lines(dir.path(), "PartyB")[0].split(',').nth(3), Some("PartyBThrowQuarantine"));
    assert_eq!(tracked(dir.path(), "PartyA"), 1);
    assert_eq!(tracked(dir.path(), "PartyB"), 1);
}

#[tokio::test]
async fn test_without_hospital_quarantine_is_terminal() {
    let dir = tempdir().unwrap();
    let cluster = cluster(dir.path(), 0);
    let a = cluster.node("PartyA").unwrap();
    let b = cluster.node("PartyB").unwrap();
    let id = RecordId::new();

    let err = a
        .start_commit(id, "data", b.party().clone(), "ThrowQuarantine")
        .await
        .unwrap_err();
    match err {
        FlowError::FaultInjectionQuarantine { record_id, .. } => assert_eq!(record_id, id),
        other => panic!("expected quarantine, got {}", other),
    }

    assert!(a.find_record(&id).unwrap().is_empty());
    assert!(b.find_record(&id).unwrap().is_empty());
    assert_eq!(error_lines(dir.path(), "PartyA").len(), 1);
    assert_eq!(ledger_len(dir.path(), "PartyA"), 1);
}

#[tokio::test]
async fn test_restart_does_not_refire_recorded_fault() {
    let dir = tempdir().unwrap();
    let id = RecordId::new();

    {
        let cluster = cluster(dir.path(), 0);
        let a = cluster.node("PartyA").unwrap();
        let b = cluster.node("PartyB").unwrap();
        assert!(a
            .start_commit(id, "data", b.party().clone(), "PartyAThrowQuarantine")
            .await
            .is_err());
        cluster.shutdown();
    }

    let fired = load_ids(NodeConfig::for_node("PartyA", dir.path()).dedup_ledger_path).unwrap();
    assert_eq!(fired.len(), 1);
    let correlation_id = *fired.iter().next().unwrap();

    // Same identities, fresh process state.
    let cluster = cluster(dir.path(), 0);
    let a = cluster.node("PartyA").unwrap();
    let b = cluster.node("PartyB").unwrap();
    let replayed = CommitEvent {
        correlation_id,
        tx_id: TxId([7; 32]),
        index: 0,
        update_type: UpdateType::Produced,
        record: Record::new(id, "data", a.party().clone(), b.party().clone(), Action::PartyAThrowQuarantine),
    };

    a.tracker().handle(&replayed).unwrap();
    a.tracker().handle(&replayed).unwrap();

    assert_eq!(error_lines(dir.path(), "PartyA").len(), 1);
    assert_eq!(tracked(dir.path(), "PartyA"), 2);
}
