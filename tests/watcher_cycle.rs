// tests/watcher_cycle.rs
//! End-to-end watcher cycle behavior over stub feeds: baseline pass,
//! exactly-once alerting per rising edge, and error recovery.

mod common;

use std::sync::atomic::Ordering;

use common::{listing, meta, rig};
use listing_watcher::types::AlertReason;
use listing_watcher::ResourceStore;

#[tokio::test]
async fn cold_store_records_baselines_and_dispatches_nothing() {
    let t = rig(&[]).await;
    t.counter.set(&[(1, 10), (2, 0), (3, 3)]);
    t.lookup.answer_ok(1, 10, meta("A", "apartment", true));
    t.lookup.answer_ok(3, 3, meta("C", "apartment", true));

    let out = t.watcher.run_cycle().await.unwrap();
    assert!(out.baseline);
    assert_eq!(out.resources, 3);
    assert!(t.notifier.sent().is_empty());
    assert_eq!(t.lookup.calls.load(Ordering::SeqCst), 0);

    assert_eq!(t.store.get(1).await.unwrap().available_count, Some(10));
    assert_eq!(t.store.get(2).await.unwrap().available_count, Some(0));
    assert_eq!(t.store.get(3).await.unwrap().available_count, Some(3));
    assert!(t.store.is_primed().await);
}

#[tokio::test]
async fn alerts_exactly_once_per_rising_edge() {
    let t = rig(&[]).await;
    t.lookup.answer_ok(7, 5, meta("Quay 7", "apartment", true));

    // Baseline: resource 7 not in the feed yet.
    t.counter.set(&[]);
    assert!(t.watcher.run_cycle().await.unwrap().baseline);

    // Counter snapshots for resource 7: [absent, 5, 5, 0, 5].
    t.counter.set(&[(7, 5)]);
    let out = t.watcher.run_cycle().await.unwrap();
    assert_eq!(out.confirmed, 1);
    assert_eq!(out.dispatched, 1);

    t.counter.set(&[(7, 5)]);
    let out = t.watcher.run_cycle().await.unwrap();
    assert_eq!(out.transitions, 0);

    t.counter.set(&[(7, 0)]);
    let out = t.watcher.run_cycle().await.unwrap();
    assert_eq!(out.transitions, 0);

    t.counter.set(&[(7, 5)]);
    let out = t.watcher.run_cycle().await.unwrap();
    assert_eq!(out.confirmed, 1);

    let sent = t.notifier.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].reason, AlertReason::NewListing);
    assert_eq!(sent[1].reason, AlertReason::Restocked);
}

#[tokio::test]
async fn refuted_transition_persists_count_and_stays_quiet() {
    let t = rig(&[]).await;
    t.counter.set(&[(9, 0)]);
    t.watcher.run_cycle().await.unwrap();

    // Lookup explicitly reports not-bookable: a false positive.
    t.lookup.answer_ok(9, 4, meta("Ghost 9", "apartment", false));
    t.counter.set(&[(9, 4)]);
    let out = t.watcher.run_cycle().await.unwrap();
    assert_eq!(out.rejected, 1);
    assert_eq!(out.dispatched, 0);
    assert_eq!(t.store.get(9).await.unwrap().available_count, Some(4));

    // Same plateau next cycle: no transition, no second lookup storm.
    let out = t.watcher.run_cycle().await.unwrap();
    assert_eq!(out.transitions, 0);
    assert!(t.notifier.sent().is_empty());
}

#[tokio::test]
async fn failed_dispatch_is_not_retried_on_later_cycles() {
    let t = rig(&[]).await;
    t.counter.set(&[(4, 0)]);
    t.watcher.run_cycle().await.unwrap();

    t.lookup.answer_ok(4, 2, meta("Pier 4", "apartment", true));
    t.notifier.set_fail(true);
    t.counter.set(&[(4, 2)]);
    let out = t.watcher.run_cycle().await.unwrap();
    assert_eq!(out.confirmed, 1);
    assert_eq!(out.dispatch_errors, 1);
    assert_eq!(out.dispatched, 0);

    // Count was persisted before dispatch, so the next cycle is quiet.
    t.notifier.set_fail(false);
    let out = t.watcher.run_cycle().await.unwrap();
    assert_eq!(out.transitions, 0);
    assert_eq!(t.notifier.sent().len(), 1);
}

#[tokio::test]
async fn type_filter_suppresses_alert_but_still_persists_count() {
    let t = rig(&["apartment"]).await;
    t.metadata.set(vec![listing(5, meta("Tower 5", "office", true))]);
    t.counter.set(&[(5, 0)]);
    t.watcher.run_cycle().await.unwrap();

    t.counter.set(&[(5, 6)]);
    let out = t.watcher.run_cycle().await.unwrap();
    assert_eq!(out.transitions, 1);
    assert_eq!(out.filtered, 1);
    assert_eq!(out.confirmed, 0);
    assert!(t.notifier.sent().is_empty());
    // Filtered transitions never reach the validation lookup.
    assert_eq!(t.lookup.calls.load(Ordering::SeqCst), 0);
    assert_eq!(t.store.get(5).await.unwrap().available_count, Some(6));
}

#[tokio::test]
async fn counter_feed_failure_aborts_cycle_with_store_untouched() {
    let t = rig(&[]).await;
    t.counter.set(&[(2, 1)]);
    t.lookup.answer_ok(2, 1, meta("B", "apartment", true));
    t.watcher.run_cycle().await.unwrap();
    let before = t.store.get(2).await.unwrap();

    t.counter.set(&[(2, 8)]);
    t.counter.set_fail(true);
    assert!(t.watcher.run_cycle().await.is_err());
    assert_eq!(t.store.get(2).await.unwrap(), before);

    // Next fire retries normally.
    t.counter.set_fail(false);
    let out = t.watcher.run_cycle().await.unwrap();
    assert_eq!(out.resources, 1);
    assert_eq!(t.store.get(2).await.unwrap().available_count, Some(8));
}

#[tokio::test]
async fn confirmed_transition_persists_enriched_metadata() {
    let t = rig(&[]).await;
    t.counter.set(&[(11, 0)]);
    t.watcher.run_cycle().await.unwrap();

    let mut m = meta("Marina 11", "villa", true);
    m.price = 420_000.0;
    t.lookup.answer_ok(11, 3, m);
    t.counter.set(&[(11, 3)]);
    t.watcher.run_cycle().await.unwrap();

    let rec = t.store.get(11).await.unwrap();
    assert_eq!(rec.available_count, Some(3));
    let stored = rec.metadata.expect("enrichment persisted");
    assert_eq!(stored.name, "Marina 11");
    assert_eq!(stored.price, 420_000.0);
}
