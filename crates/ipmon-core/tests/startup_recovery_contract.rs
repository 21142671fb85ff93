//! Contract Test: Startup Recovery
//!
//! The remote document is the only persistent state. A restarted monitor
//! must pick up where the previous run left off.
//!
//! Constraints verified:
//! - An existing document seeds the last address and history
//! - A restart with an unchanged address does not republish
//! - A missing, malformed or unreadable document means a first run

mod common;

use common::*;
use ipmon_core::{
    ChangeType, CycleOutcome, HistoryEntry, MemoryRemoteStore, MonitorState, Phase,
    ReconcilerState,
};
use std::net::Ipv4Addr;
use tokio_test::assert_ok;

fn existing_document() -> MonitorState {
    let mut doc = MonitorState {
        local_ip: Some(Ipv4Addr::new(10, 0, 0, 2)),
        network_interface: Some("eth0".to_string()),
        last_update: Some(ts("2025-01-09 12:00:00")),
        history: Vec::new(),
    };
    doc.record_change(HistoryEntry::new(
        ts("2025-01-08 09:00:00"),
        Ipv4Addr::new(10, 0, 0, 1),
        ChangeType::New,
    ));
    doc.record_change(HistoryEntry::new(
        ts("2025-01-09 12:00:00"),
        Ipv4Addr::new(10, 0, 0, 2),
        ChangeType::Updated,
    ));
    doc
}

#[tokio::test]
async fn load_seeds_state_from_existing_document() {
    let store = MemoryRemoteStore::new();
    store
        .put(DATA_FILE, existing_document().to_json().unwrap())
        .await;

    let source = StaticInterfaceSource::new(vec![up("eth0", [10, 0, 0, 2])]);
    let clock = ManualClock::new(ts("2025-01-09 12:00:30"));
    let mut reconciler = reconciler(&source, store.clone(), &clock);

    reconciler.load().await;
    assert_eq!(reconciler.phase(), Phase::Idle);
    assert_eq!(reconciler.state().last_ip, Some(Ipv4Addr::new(10, 0, 0, 2)));
    assert_eq!(reconciler.state().network_interface.as_deref(), Some("eth0"));
    assert_eq!(reconciler.state().history.len(), 2);
    assert!(reconciler.state().version.is_some());

    let outcome = assert_ok!(reconciler.tick().await);
    assert!(matches!(outcome, CycleOutcome::Unchanged { .. }));
    assert_eq!(store.write_count(), 0);
}

#[tokio::test]
async fn restart_does_not_republish_unchanged_address() {
    let store = MemoryRemoteStore::new();
    let source = StaticInterfaceSource::new(vec![up("eth0", [10, 0, 0, 2])]);
    let clock = ManualClock::new(ts("2025-01-09 12:00:00"));

    {
        let mut first = reconciler(&source, store.clone(), &clock);
        assert!(first.run_cycle().await);
    }
    assert_eq!(store.write_count(), 1);

    clock.advance(120);
    let mut second = reconciler(&source, store.clone(), &clock);
    assert!(second.run_cycle().await);
    assert_eq!(store.write_count(), 1, "Restart must not republish");
}

#[tokio::test]
async fn change_after_restart_extends_loaded_history() {
    let store = MemoryRemoteStore::new();
    store
        .put(DATA_FILE, existing_document().to_json().unwrap())
        .await;

    let source = StaticInterfaceSource::new(vec![up("eth0", [10, 0, 0, 7])]);
    let clock = ManualClock::new(ts("2025-01-10 08:00:00"));
    let mut reconciler = reconciler(&source, store.clone(), &clock);

    let outcome = assert_ok!(reconciler.tick().await);
    assert!(matches!(
        outcome,
        CycleOutcome::Published {
            change: ChangeType::Updated,
            ..
        }
    ));

    let doc = MonitorState::from_json(&store.content(DATA_FILE).await.unwrap()).unwrap();
    let ips: Vec<_> = doc.history.iter().map(|e| e.ip.to_string()).collect();
    assert_eq!(ips, ["10.0.0.1", "10.0.0.2", "10.0.0.7"]);
}

#[tokio::test]
async fn malformed_document_is_replaced_on_first_publish() {
    let store = MemoryRemoteStore::new();
    store.put(DATA_FILE, "{ this is not json").await;

    let source = StaticInterfaceSource::new(vec![up("eth0", [10, 0, 0, 2])]);
    let clock = ManualClock::new(ts("2025-01-09 12:00:00"));
    let mut reconciler = reconciler(&source, store.clone(), &clock);

    reconciler.load().await;
    assert!(reconciler.state().last_ip.is_none());
    assert!(reconciler.state().version.is_some());

    let outcome = assert_ok!(reconciler.tick().await);
    assert!(matches!(
        outcome,
        CycleOutcome::Published {
            change: ChangeType::New,
            ..
        }
    ));
    let doc = MonitorState::from_json(&store.content(DATA_FILE).await.unwrap()).unwrap();
    assert_eq!(doc.history.len(), 1);
}

#[tokio::test]
async fn unreadable_store_at_startup_means_first_run() {
    let inner = MemoryRemoteStore::new();
    inner
        .put(DATA_FILE, existing_document().to_json().unwrap())
        .await;
    let store = FlakyStore::new(inner.clone());

    let source = StaticInterfaceSource::new(vec![up("eth0", [10, 0, 0, 2])]);
    let clock = ManualClock::new(ts("2025-01-09 12:00:30"));
    let mut reconciler = reconciler(&source, store.clone(), &clock);

    store.set_fail_reads(true);
    reconciler.load().await;
    assert_eq!(reconciler.phase(), Phase::Idle);
    assert_eq!(reconciler.state(), &ReconcilerState::default());

    // Reads recover: the address is "new" to us and the refreshed
    // version lets the write replace the document
    store.set_fail_reads(false);
    let outcome = assert_ok!(reconciler.tick().await);
    assert!(matches!(
        outcome,
        CycleOutcome::Published {
            change: ChangeType::New,
            ..
        }
    ));
    assert_eq!(inner.write_count(), 1);
}
