//! Task service: fetching, creating, toggling, updating and watching
//! tasks.
//!
//! Every read path (one-shot fetch or live-feed delivery) runs a
//! recurrence sweep before tasks are exposed, so callers never observe
//! stale completion state. Toggles write the task document first, then
//! the history ledger, then reflect the new state into the returned copy;
//! a failed document write performs no ledger update. Toggles and resets
//! are not atomic with each other, the store's per-field merge decides
//! races.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tandem_types::{
    DayKey, Group, GroupId, MAX_TASK_TITLE_LENGTH, ResetInterval, Task, UserId,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::Error;
use crate::history::CompletionLedger;
use crate::recurrence;
use crate::store::{
    Document, DocumentStore, Fields, Filter, OrderBy, StoreError, SubscriptionId, collections,
    from_document, to_fields,
};

/// Service for task lifecycle operations, generic over the store backend.
pub struct TaskService<S> {
    store: Arc<S>,
    ledger: Arc<CompletionLedger<S>>,
}

impl<S> Clone for TaskService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            ledger: Arc::clone(&self.ledger),
        }
    }
}

fn validated_title(title: &str) -> Result<String, Error> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(Error::validation("task title is empty"));
    }
    if trimmed.chars().count() > MAX_TASK_TITLE_LENGTH {
        return Err(Error::validation("task title too long"));
    }
    Ok(trimmed.to_string())
}

fn encode<T: Serialize>(value: &T) -> Result<Value, Error> {
    serde_json::to_value(value)
        .map_err(|e| Error::Store(StoreError::Codec(e.to_string())))
}

fn decode_tasks(docs: &[Document]) -> Vec<Task> {
    docs.iter()
        .filter_map(|doc| match from_document::<Task>(doc) {
            Ok(task) => Some(task),
            Err(e) => {
                warn!(doc = %doc.id, error = %e, "skipping undecodable task document");
                None
            }
        })
        .collect()
}

fn sort_newest_first(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

impl<S: DocumentStore> TaskService<S> {
    /// Creates a task service sharing the given store and ledger.
    pub fn new(store: Arc<S>, ledger: Arc<CompletionLedger<S>>) -> Self {
        Self { store, ledger }
    }

    /// The user's personal tasks (no group), newest first, swept.
    ///
    /// The explicit null filter keeps group tasks out of the personal
    /// list even though they carry the same owner.
    ///
    /// # Errors
    ///
    /// Propagates store query failures.
    pub async fn fetch_personal_tasks(
        &self,
        owner: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<Task>, Error> {
        let docs = self
            .store
            .query(
                collections::TASKS,
                &[
                    Filter::eq("ownerId", owner.as_str()),
                    Filter::eq("groupId", Value::Null),
                ],
                Some(&OrderBy::desc("createdAt")),
            )
            .await?;
        let mut tasks = recurrence::sweep(self.store.as_ref(), decode_tasks(&docs), now).await;
        sort_newest_first(&mut tasks);
        Ok(tasks)
    }

    /// A group's shared tasks, newest first, swept.
    ///
    /// # Errors
    ///
    /// Propagates store query failures.
    pub async fn fetch_group_tasks(
        &self,
        group_id: GroupId,
        now: DateTime<Utc>,
    ) -> Result<Vec<Task>, Error> {
        let docs = self
            .store
            .query(
                collections::TASKS,
                &[Filter::eq("groupId", group_id.to_string())],
                Some(&OrderBy::desc("createdAt")),
            )
            .await?;
        let mut tasks = recurrence::sweep(self.store.as_ref(), decode_tasks(&docs), now).await;
        sort_newest_first(&mut tasks);
        Ok(tasks)
    }

    /// Creates a personal task for the owner.
    ///
    /// # Errors
    ///
    /// `Validation` on an empty or over-long title; store failures
    /// propagate.
    pub async fn create_personal_task(
        &self,
        title: &str,
        interval: ResetInterval,
        owner: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Task, Error> {
        let title = validated_title(title)?;
        let task = Task::new(title, owner.clone(), None, interval, now);
        self.persist_new(&task).await?;
        Ok(task)
    }

    /// Creates a task shared with a group. Only the group owner may add
    /// group tasks.
    ///
    /// # Errors
    ///
    /// `Validation` on a bad title, `Forbidden` when the creator does not
    /// own the group; store failures propagate.
    pub async fn create_group_task(
        &self,
        title: &str,
        interval: ResetInterval,
        creator: &UserId,
        group: &Group,
        now: DateTime<Utc>,
    ) -> Result<Task, Error> {
        let title = validated_title(title)?;
        if !group.is_owner(creator) {
            return Err(Error::forbidden("only the group owner can add group tasks"));
        }
        let task = Task::new(title, creator.clone(), Some(group.id), interval, now);
        self.persist_new(&task).await?;
        Ok(task)
    }

    async fn persist_new(&self, task: &Task) -> Result<(), Error> {
        let fields = to_fields(task)?;
        self.store
            .set(collections::TASKS, &task.id.to_string(), fields)
            .await?;
        debug!(task = %task.id, group = ?task.group_id, "created task");
        Ok(())
    }

    /// Flips the acting user's completion of the task's current
    /// occurrence and returns the updated task.
    ///
    /// Personal tasks flip `is_done`; group tasks toggle the acting
    /// user's membership in `completed_by` and require the matching
    /// group. Completing appends today to the completion-day history and
    /// increments the acting user's ledger counter; un-completing removes
    /// one occurrence of today and decrements.
    ///
    /// # Errors
    ///
    /// `Validation` when a group task is toggled without its group or by
    /// a non-member; store failures propagate (and skip the ledger
    /// write).
    pub async fn toggle_completion(
        &self,
        task: &Task,
        acting: &UserId,
        group: Option<&Group>,
        now: DateTime<Utc>,
    ) -> Result<Task, Error> {
        let today = DayKey::from_datetime(now);
        let mut updated = task.clone();
        let mut fields = Fields::new();

        let completing = if task.is_group_task() {
            let group = group
                .filter(|g| Some(g.id) == task.group_id)
                .ok_or_else(|| Error::validation("group task toggled without its group"))?;
            if !group.is_member(acting) {
                return Err(Error::validation("only group members can complete group tasks"));
            }
            let completing = !updated.completed_by.remove(acting);
            if completing {
                updated.completed_by.insert(acting.clone());
            }
            fields.insert("completedBy".to_string(), encode(&updated.completed_by)?);
            completing
        } else {
            updated.is_done = !updated.is_done;
            fields.insert("isDone".to_string(), Value::Bool(updated.is_done));
            updated.is_done
        };

        if completing {
            updated.completion_dates.push(today);
        } else if let Some(pos) = updated.completion_dates.iter().position(|d| *d == today) {
            updated.completion_dates.remove(pos);
        }
        fields.insert(
            "completionDates".to_string(),
            encode(&updated.completion_dates)?,
        );

        self.store
            .update(collections::TASKS, &task.id.to_string(), fields)
            .await?;

        if completing {
            self.ledger.increment(acting, today).await?;
        } else {
            self.ledger.decrement(acting, today).await?;
        }
        debug!(task = %task.id, user = %acting, completing, "toggled completion");
        Ok(updated)
    }

    /// Rewrites a task's title and interval, leaving completion state and
    /// timestamps untouched.
    ///
    /// # Errors
    ///
    /// Same title validation as creation; store failures propagate.
    pub async fn update_task(
        &self,
        task: &Task,
        new_title: &str,
        new_interval: ResetInterval,
    ) -> Result<Task, Error> {
        let title = validated_title(new_title)?;
        let mut fields = Fields::new();
        fields.insert("title".to_string(), Value::from(title.clone()));
        fields.insert("resetInterval".to_string(), encode(&new_interval)?);
        self.store
            .update(collections::TASKS, &task.id.to_string(), fields)
            .await?;

        let mut updated = task.clone();
        updated.title = title;
        updated.reset_interval = new_interval;
        Ok(updated)
    }

    /// Deletes the task document.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn delete_task(&self, task: &Task) -> Result<(), Error> {
        self.store
            .delete(collections::TASKS, &task.id.to_string())
            .await?;
        debug!(task = %task.id, "deleted task");
        Ok(())
    }

    /// Creates a personal daily starter task, but only when the owner has
    /// no tasks at all yet.
    ///
    /// # Errors
    ///
    /// Propagates store failures and title validation.
    pub async fn seed_default_task(
        &self,
        owner: &UserId,
        title: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Task>, Error> {
        let existing = self
            .store
            .query(
                collections::TASKS,
                &[Filter::eq("ownerId", owner.as_str())],
                None,
            )
            .await?;
        if !existing.is_empty() {
            return Ok(None);
        }
        self.create_personal_task(title, ResetInterval::Daily, owner, now)
            .await
            .map(Some)
    }

    /// Opens a live feed over the owner's personal tasks and the tasks of
    /// each listed group.
    ///
    /// One store subscription per source; a pump task per source decodes
    /// deliveries (skipping undecodable documents), runs the recurrence
    /// sweep, and publishes merged [`TaskSnapshot`]s through a watch
    /// channel. Close the feed to unsubscribe and stop the pumps.
    pub async fn subscribe(&self, owner: &UserId, group_ids: &[GroupId]) -> TaskFeed<S> {
        let (tx, rx) = watch::channel(TaskSnapshot::default());
        let tx = Arc::new(tx);
        let mut sub_ids = Vec::new();
        let mut pumps = Vec::new();

        let personal = self
            .store
            .subscribe(
                collections::TASKS,
                vec![
                    Filter::eq("ownerId", owner.as_str()),
                    Filter::eq("groupId", Value::Null),
                ],
            )
            .await;
        sub_ids.push(personal.id);
        pumps.push(self.spawn_pump(FeedSlot::Personal, personal.rx, Arc::clone(&tx)));

        for &group_id in group_ids {
            let sub = self
                .store
                .subscribe(
                    collections::TASKS,
                    vec![Filter::eq("groupId", group_id.to_string())],
                )
                .await;
            sub_ids.push(sub.id);
            pumps.push(self.spawn_pump(FeedSlot::Group(group_id), sub.rx, Arc::clone(&tx)));
        }

        TaskFeed {
            store: Arc::clone(&self.store),
            rx,
            sub_ids,
            pumps,
        }
    }

    fn spawn_pump(
        &self,
        slot: FeedSlot,
        mut deliveries: tokio::sync::mpsc::UnboundedReceiver<Vec<Document>>,
        tx: Arc<watch::Sender<TaskSnapshot>>,
    ) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            while let Some(docs) = deliveries.recv().await {
                let mut tasks =
                    recurrence::sweep(store.as_ref(), decode_tasks(&docs), Utc::now()).await;
                sort_newest_first(&mut tasks);
                tx.send_modify(|snapshot| match slot {
                    FeedSlot::Personal => snapshot.personal = tasks,
                    FeedSlot::Group(id) => {
                        snapshot.groups.insert(id, tasks);
                    }
                });
            }
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum FeedSlot {
    Personal,
    Group(GroupId),
}

/// Merged view of every source a feed watches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskSnapshot {
    /// The owner's personal tasks, newest first.
    pub personal: Vec<Task>,
    /// Shared tasks per watched group, newest first.
    pub groups: BTreeMap<GroupId, Vec<Task>>,
}

/// Handle over a live task feed; see [`TaskService::subscribe`].
///
/// Dropping the handle stops the pumps; the store prunes the orphaned
/// subscriptions on its next delivery attempt. Prefer [`close`] for
/// prompt disposal.
///
/// [`close`]: TaskFeed::close
pub struct TaskFeed<S: DocumentStore> {
    store: Arc<S>,
    rx: watch::Receiver<TaskSnapshot>,
    sub_ids: Vec<SubscriptionId>,
    pumps: Vec<JoinHandle<()>>,
}

impl<S: DocumentStore> TaskFeed<S> {
    /// The latest published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> TaskSnapshot {
        self.rx.borrow().clone()
    }

    /// Waits for the next snapshot change. Returns `false` once the feed
    /// can no longer deliver.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// Unsubscribes from the store and stops the pump tasks.
    pub async fn close(mut self) {
        for pump in self.pumps.drain(..) {
            pump.abort();
        }
        for id in std::mem::take(&mut self.sub_ids) {
            self.store.unsubscribe(id).await;
        }
    }
}

impl<S: DocumentStore> Drop for TaskFeed<S> {
    fn drop(&mut self) {
        for pump in &self.pumps {
            pump.abort();
        }
    }
}
