//! Integration tests for the completion-history ledger: counter
//! conservation under toggles, range fetches and the client-side cache.
//!
//! Verification command: `cargo test --test history_ledger`

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use tandem_core::config::TrackerConfig;
use tandem_core::history::CompletionLedger;
use tandem_core::store::{DocumentStore, MemoryStore};
use tandem_core::tasks::TaskService;
use tandem_types::{DayKey, Group, ResetInterval, UserId};

fn setup() -> (
    Arc<MemoryStore>,
    Arc<CompletionLedger<MemoryStore>>,
    TaskService<MemoryStore>,
) {
    let store = Arc::new(MemoryStore::new());
    let ledger = Arc::new(CompletionLedger::new(Arc::clone(&store)));
    let service = TaskService::new(Arc::clone(&store), Arc::clone(&ledger));
    (store, ledger, service)
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 8, 30, 12, 0, 0).unwrap()
}

#[tokio::test]
async fn done_undone_done_nets_exactly_one() {
    let (_, ledger, service) = setup();
    let alice = UserId::from("alice");
    let task = service
        .create_personal_task("Stretch", ResetInterval::Daily, &alice, now())
        .await
        .unwrap();

    let t1 = service.toggle_completion(&task, &alice, None, now()).await.unwrap();
    let t2 = service.toggle_completion(&t1, &alice, None, now()).await.unwrap();
    service.toggle_completion(&t2, &alice, None, now()).await.unwrap();

    let config = TrackerConfig::default();
    let range = ledger
        .fetch_range(&alice, config.history_months_back, now())
        .await
        .unwrap();
    assert_eq!(range.get(&DayKey::from_datetime(now())), Some(&1));
}

#[tokio::test]
async fn group_toggles_count_per_acting_user() {
    let (_, ledger, service) = setup();
    let alice = UserId::from("alice");
    let bob = UserId::from("bob");
    let mut group = Group::new("Flat", "1234", alice.clone(), now());
    group.member_ids.insert(bob.clone());
    let today = DayKey::from_datetime(now());

    let task = service
        .create_group_task("Dishes", ResetInterval::Daily, &alice, &group, now())
        .await
        .unwrap();
    let task = service
        .toggle_completion(&task, &alice, Some(&group), now())
        .await
        .unwrap();
    service
        .toggle_completion(&task, &bob, Some(&group), now())
        .await
        .unwrap();

    let alice_range = ledger.fetch_range(&alice, 1, now()).await.unwrap();
    let bob_range = ledger.fetch_range(&bob, 1, now()).await.unwrap();
    assert_eq!(alice_range.get(&today), Some(&1));
    assert_eq!(bob_range.get(&today), Some(&1));
}

#[tokio::test]
async fn counters_accumulate_across_tasks_per_day() {
    let (_, ledger, service) = setup();
    let alice = UserId::from("alice");

    for title in ["One", "Two", "Three"] {
        let task = service
            .create_personal_task(title, ResetInterval::Daily, &alice, now())
            .await
            .unwrap();
        service.toggle_completion(&task, &alice, None, now()).await.unwrap();
    }

    assert_eq!(
        ledger.cached(&alice).get(&DayKey::from_datetime(now())),
        Some(&3)
    );
}

#[tokio::test]
async fn range_fetch_honors_the_month_window() {
    let (_, ledger, _) = setup();
    let alice = UserId::from("alice");
    let in_window = DayKey::from_datetime(Utc.with_ymd_and_hms(2026, 5, 10, 8, 0, 0).unwrap());
    let out_of_window = DayKey::from_datetime(Utc.with_ymd_and_hms(2025, 11, 2, 8, 0, 0).unwrap());

    ledger.increment(&alice, in_window).await.unwrap();
    ledger.increment(&alice, out_of_window).await.unwrap();

    let range = ledger.fetch_range(&alice, 6, now()).await.unwrap();
    assert!(range.contains_key(&in_window));
    assert!(!range.contains_key(&out_of_window));

    // Widening the window brings the older day in.
    let range = ledger.fetch_range(&alice, 12, now()).await.unwrap();
    assert!(range.contains_key(&out_of_window));
}

#[tokio::test]
async fn cache_converges_with_concurrent_writers() {
    let (store, ledger, _) = setup();
    let alice = UserId::from("alice");
    let today = DayKey::from_datetime(now());

    // Local toggle plus a remote device writing straight to the store.
    ledger.increment(&alice, today).await.unwrap();
    store
        .atomic_increment("completionHistory", "alice:2026-08-30", "count", 5)
        .await
        .unwrap();

    assert_eq!(ledger.cached(&alice).get(&today), Some(&1));
    ledger.fetch_range(&alice, 1, now()).await.unwrap();
    assert_eq!(ledger.cached(&alice).get(&today), Some(&6));
}
