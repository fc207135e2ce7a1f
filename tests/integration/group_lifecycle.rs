//! Integration tests for the group registry: creation, password joins,
//! membership changes, ownership transfer and the delete cascade.
//!
//! Verification command: `cargo test --test group_lifecycle`

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use tandem_core::Error;
use tandem_core::groups::GroupService;
use tandem_core::history::CompletionLedger;
use tandem_core::store::MemoryStore;
use tandem_core::tasks::TaskService;
use tandem_types::{ResetInterval, UserId};

fn setup() -> (
    Arc<MemoryStore>,
    GroupService<MemoryStore>,
    TaskService<MemoryStore>,
) {
    let store = Arc::new(MemoryStore::new());
    let ledger = Arc::new(CompletionLedger::new(Arc::clone(&store)));
    let groups = GroupService::new(Arc::clone(&store));
    let tasks = TaskService::new(Arc::clone(&store), ledger);
    (store, groups, tasks)
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 8, 30, 12, 0, 0).unwrap()
}

#[tokio::test]
async fn join_then_leave_round_trip() {
    let (_, groups, _) = setup();
    let alice = UserId::from("alice");
    let bob = UserId::from("bob");

    let group = groups.create_group("Flat", "1234", &alice, now()).await.unwrap();
    groups.join_group(group.id, "1234", &bob).await.unwrap();

    let fetched = groups.fetch_group(group.id).await.unwrap();
    assert!(fetched.is_member(&bob));

    groups.leave_group(group.id, &bob).await.unwrap();
    let fetched = groups.fetch_group(group.id).await.unwrap();
    assert!(!fetched.is_member(&bob));
    // Membership listings follow.
    assert!(groups.groups_for_user(&bob).await.unwrap().is_empty());
    assert_eq!(groups.groups_for_user(&alice).await.unwrap().len(), 1);
}

#[tokio::test]
async fn ownership_transfer_end_to_end() {
    let (_, groups, tasks) = setup();
    let alice = UserId::from("alice");
    let bob = UserId::from("bob");

    let group = groups.create_group("Flat", "1234", &alice, now()).await.unwrap();
    groups.join_group(group.id, "1234", &bob).await.unwrap();
    groups.transfer_ownership(group.id, &alice, &bob).await.unwrap();

    let group = groups.fetch_group(group.id).await.unwrap();
    assert!(group.is_owner(&bob));
    assert!(group.is_member(&alice));

    // Owner-only powers moved with the transfer.
    let err = tasks
        .create_group_task("Dishes", ResetInterval::Daily, &alice, &group, now())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)));
    tasks
        .create_group_task("Dishes", ResetInterval::Daily, &bob, &group, now())
        .await
        .unwrap();

    // And the old owner can now leave.
    groups.leave_group(group.id, &alice).await.unwrap();
    let group = groups.fetch_group(group.id).await.unwrap();
    assert!(!group.is_member(&alice));
}

#[tokio::test]
async fn delete_cascades_to_group_tasks() {
    let (_, groups, tasks) = setup();
    let alice = UserId::from("alice");

    let group = groups.create_group("Flat", "1234", &alice, now()).await.unwrap();
    for title in ["Dishes", "Trash", "Plants"] {
        tasks
            .create_group_task(title, ResetInterval::Daily, &alice, &group, now())
            .await
            .unwrap();
    }
    let personal = tasks
        .create_personal_task("Mine", ResetInterval::Daily, &alice, now())
        .await
        .unwrap();

    groups.delete_group(group.id, &alice).await.unwrap();

    assert!(tasks.fetch_group_tasks(group.id, now()).await.unwrap().is_empty());
    let err = groups.fetch_group(group.id).await.unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
    // Personal tasks are untouched by the cascade.
    let remaining = tasks.fetch_personal_tasks(&alice, now()).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, personal.id);
}

#[tokio::test]
async fn cascade_task_failures_do_not_block_group_delete() {
    let (store, groups, tasks) = setup();
    let alice = UserId::from("alice");

    let group = groups.create_group("Flat", "1234", &alice, now()).await.unwrap();
    tasks
        .create_group_task("Dishes", ResetInterval::Daily, &alice, &group, now())
        .await
        .unwrap();

    // With writes failing, the cascade is a best-effort walk but the
    // final group delete fails and reports the error.
    store.set_write_fault(true);
    let err = groups.delete_group(group.id, &alice).await.unwrap_err();
    assert!(matches!(err, Error::Store(_)));

    store.set_write_fault(false);
    groups.delete_group(group.id, &alice).await.unwrap();
    assert!(store.is_empty("groups"));
    assert!(store.is_empty("tasks"));
}

#[tokio::test]
async fn two_groups_with_the_same_name_stay_distinct() {
    let (_, groups, tasks) = setup();
    let alice = UserId::from("alice");
    let bob = UserId::from("bob");

    let first = groups.create_group("Home", "1234", &alice, now()).await.unwrap();
    let second = groups.create_group("Home", "5678", &bob, now()).await.unwrap();
    assert_ne!(first.id, second.id);

    tasks
        .create_group_task("Ours", ResetInterval::Daily, &alice, &first, now())
        .await
        .unwrap();

    assert_eq!(tasks.fetch_group_tasks(first.id, now()).await.unwrap().len(), 1);
    assert!(tasks.fetch_group_tasks(second.id, now()).await.unwrap().is_empty());
}

#[tokio::test]
async fn membership_rules_enforced() {
    let (_, groups, _) = setup();
    let alice = UserId::from("alice");
    let bob = UserId::from("bob");
    let carol = UserId::from("carol");

    let group = groups.create_group("Flat", "1234", &alice, now()).await.unwrap();
    groups.join_group(group.id, "1234", &bob).await.unwrap();

    // Non-owners cannot remove members or delete the group.
    assert!(matches!(
        groups.remove_member(group.id, &bob, &alice).await.unwrap_err(),
        Error::Forbidden(_)
    ));
    assert!(matches!(
        groups.delete_group(group.id, &bob).await.unwrap_err(),
        Error::Forbidden(_)
    ));
    // Ownership cannot go to a stranger.
    assert!(matches!(
        groups.transfer_ownership(group.id, &alice, &carol).await.unwrap_err(),
        Error::Validation(_)
    ));
    // The owner cannot walk away without transferring.
    assert!(matches!(
        groups.leave_group(group.id, &alice).await.unwrap_err(),
        Error::Forbidden(_)
    ));
}
