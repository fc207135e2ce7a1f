//! Integration tests for the group-completion alert: grace-period
//! debounce, cancellation on un-completion, fire-time re-check.
//!
//! All tests run on paused virtual time.
//!
//! Verification command: `cargo test --test notify_debounce`

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;

use tandem_core::config::TrackerConfig;
use tandem_core::history::CompletionLedger;
use tandem_core::notify::{GroupCompletionWatcher, Notifier};
use tandem_core::store::MemoryStore;
use tandem_core::tasks::TaskService;
use tandem_types::{Group, GroupId, ResetInterval, UserId};

#[derive(Default)]
struct RecordingNotifier {
    fired: AtomicUsize,
    names: Mutex<Vec<String>>,
}

impl Notifier for RecordingNotifier {
    fn notify_group_complete(&self, _group_id: GroupId, group_name: &str) {
        self.fired.fetch_add(1, Ordering::SeqCst);
        self.names.lock().push(group_name.to_string());
    }
}

fn setup() -> (
    TaskService<MemoryStore>,
    Arc<RecordingNotifier>,
    GroupCompletionWatcher,
) {
    let store = Arc::new(MemoryStore::new());
    let ledger = Arc::new(CompletionLedger::new(Arc::clone(&store)));
    let service = TaskService::new(store, ledger);
    let notifier = Arc::new(RecordingNotifier::default());
    let watcher = GroupCompletionWatcher::new(
        Arc::clone(&notifier) as Arc<dyn Notifier>,
        TrackerConfig::default().notify_grace(),
    );
    (service, notifier, watcher)
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 8, 30, 12, 0, 0).unwrap()
}

#[tokio::test(start_paused = true)]
async fn alert_fires_once_after_the_grace_period() {
    let (service, notifier, watcher) = setup();
    let alice = UserId::from("alice");
    let group = Group::new("Flat", "1234", alice.clone(), now());

    let task = service
        .create_group_task("Dishes", ResetInterval::Daily, &alice, &group, now())
        .await
        .unwrap();
    service
        .toggle_completion(&task, &alice, Some(&group), now())
        .await
        .unwrap();

    let tasks = service.fetch_group_tasks(group.id, now()).await.unwrap();
    watcher.observe(&group, &tasks);

    tokio::time::sleep(Duration::from_secs(11)).await;
    assert_eq!(notifier.fired.load(Ordering::SeqCst), 1);
    assert_eq!(notifier.names.lock().as_slice(), ["Flat"]);

    // A later observation of a still-complete state arms a fresh timer.
    watcher.observe(&group, &tasks);
    tokio::time::sleep(Duration::from_secs(11)).await;
    assert_eq!(notifier.fired.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn uncompleting_inside_the_window_suppresses_the_alert() {
    let (service, notifier, watcher) = setup();
    let alice = UserId::from("alice");
    let bob = UserId::from("bob");
    let mut group = Group::new("Flat", "1234", alice.clone(), now());
    group.member_ids.insert(bob.clone());

    let task = service
        .create_group_task("Dishes", ResetInterval::Daily, &alice, &group, now())
        .await
        .unwrap();
    let done = service
        .toggle_completion(&task, &bob, Some(&group), now())
        .await
        .unwrap();

    watcher.observe(&group, &service.fetch_group_tasks(group.id, now()).await.unwrap());
    assert!(watcher.pending(group.id));

    // Five seconds in, Bob changes his mind.
    tokio::time::sleep(Duration::from_secs(5)).await;
    service
        .toggle_completion(&done, &bob, Some(&group), now())
        .await
        .unwrap();
    watcher.observe(&group, &service.fetch_group_tasks(group.id, now()).await.unwrap());

    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(notifier.fired.load(Ordering::SeqCst), 0);
    assert!(!watcher.pending(group.id));
}

#[tokio::test(start_paused = true)]
async fn partially_completed_groups_never_arm() {
    let (service, notifier, watcher) = setup();
    let alice = UserId::from("alice");
    let group = Group::new("Flat", "1234", alice.clone(), now());

    let first = service
        .create_group_task("Dishes", ResetInterval::Daily, &alice, &group, now())
        .await
        .unwrap();
    service
        .create_group_task("Trash", ResetInterval::Daily, &alice, &group, now())
        .await
        .unwrap();
    service
        .toggle_completion(&first, &alice, Some(&group), now())
        .await
        .unwrap();

    watcher.observe(&group, &service.fetch_group_tasks(group.id, now()).await.unwrap());
    assert!(!watcher.pending(group.id));

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(notifier.fired.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn groups_debounce_independently() {
    let (service, notifier, watcher) = setup();
    let alice = UserId::from("alice");
    let flat = Group::new("Flat", "1234", alice.clone(), now());
    let gym = Group::new("Gym", "5678", alice.clone(), now());

    for group in [&flat, &gym] {
        let task = service
            .create_group_task("Shared", ResetInterval::Daily, &alice, group, now())
            .await
            .unwrap();
        service
            .toggle_completion(&task, &alice, Some(group), now())
            .await
            .unwrap();
    }

    watcher.observe(&flat, &service.fetch_group_tasks(flat.id, now()).await.unwrap());
    tokio::time::sleep(Duration::from_secs(5)).await;
    watcher.observe(&gym, &service.fetch_group_tasks(gym.id, now()).await.unwrap());

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(notifier.fired.load(Ordering::SeqCst), 1); // flat only
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(notifier.fired.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn configured_grace_period_is_respected() {
    let (service, _, _) = setup();
    let config = TrackerConfig::from_toml_str(
        r"
[tracker]
notify_grace_secs = 60
",
    )
    .unwrap();
    let notifier = Arc::new(RecordingNotifier::default());
    let watcher = GroupCompletionWatcher::new(
        Arc::clone(&notifier) as Arc<dyn Notifier>,
        config.notify_grace(),
    );

    let alice = UserId::from("alice");
    let group = Group::new("Flat", "1234", alice.clone(), now());
    let task = service
        .create_group_task("Dishes", ResetInterval::Daily, &alice, &group, now())
        .await
        .unwrap();
    service
        .toggle_completion(&task, &alice, Some(&group), now())
        .await
        .unwrap();
    watcher.observe(&group, &service.fetch_group_tasks(group.id, now()).await.unwrap());

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(notifier.fired.load(Ordering::SeqCst), 0);
    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(notifier.fired.load(Ordering::SeqCst), 1);
}
