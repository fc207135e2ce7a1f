//! Group-completion alerts with per-group debounce.
//!
//! When every task of a group has at least one completer, the watcher
//! arms a grace timer; if the state still holds when the timer fires, the
//! notifier is called once. Any task falling back to incomplete inside
//! the window disarms the timer. Delivery transport is out of scope, the
//! [`Notifier`] trait is the seam embedders implement.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tandem_types::{Group, GroupId, Task};
use tokio::task::JoinHandle;
use tracing::debug;

/// Sink for one-shot "group fully completed" alerts.
pub trait Notifier: Send + Sync {
    /// Fired once per completed occurrence of a group's task set, after
    /// the grace period elapsed with the state intact.
    fn notify_group_complete(&self, group_id: GroupId, group_name: &str);
}

struct Timer {
    generation: u64,
    handle: JoinHandle<()>,
}

/// Per-key fire-once timers over tokio tasks.
///
/// Scheduling a key that already has a pending timer replaces it; the
/// old timer never fires. Generations guard the entry map so a firing
/// timer only cleans up its own registration.
pub struct KeyedDebounce<K> {
    timers: Arc<Mutex<HashMap<K, Timer>>>,
    next_generation: AtomicU64,
}

impl<K> Default for KeyedDebounce<K> {
    fn default() -> Self {
        Self {
            timers: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(0),
        }
    }
}

impl<K: Eq + Hash + Clone + Send + 'static> KeyedDebounce<K> {
    /// Creates an empty timer set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms (or re-arms) the key's timer: after `delay`, `action` runs
    /// once and the timer disarms itself.
    pub fn schedule(&self, key: K, delay: Duration, action: impl FnOnce() + Send + 'static) {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
        let timers = Arc::clone(&self.timers);
        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            action();
            let mut timers = timers.lock();
            if timers.get(&task_key).is_some_and(|t| t.generation == generation) {
                timers.remove(&task_key);
            }
        });
        if let Some(old) = self
            .timers
            .lock()
            .insert(key, Timer { generation, handle })
        {
            old.handle.abort();
        }
    }

    /// Disarms the key's pending timer, if any.
    pub fn cancel(&self, key: &K) {
        if let Some(timer) = self.timers.lock().remove(key) {
            timer.handle.abort();
        }
    }

    /// Whether a timer is currently armed for the key.
    #[must_use]
    pub fn pending(&self, key: &K) -> bool {
        self.timers.lock().contains_key(key)
    }

    /// Disarms every pending timer.
    pub fn cancel_all(&self) {
        for (_, timer) in self.timers.lock().drain() {
            timer.handle.abort();
        }
    }
}

impl<K> Drop for KeyedDebounce<K> {
    fn drop(&mut self) {
        for timer in self.timers.lock().values() {
            timer.handle.abort();
        }
    }
}

/// Watches observed group task states and drives the grace-period alert.
pub struct GroupCompletionWatcher {
    notifier: Arc<dyn Notifier>,
    grace: Duration,
    debounce: KeyedDebounce<GroupId>,
    latest: Arc<Mutex<HashMap<GroupId, bool>>>,
}

impl GroupCompletionWatcher {
    /// Creates a watcher firing into `notifier` after `grace`.
    pub fn new(notifier: Arc<dyn Notifier>, grace: Duration) -> Self {
        Self {
            notifier,
            grace,
            debounce: KeyedDebounce::new(),
            latest: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Feeds the watcher the latest observed state of a group's tasks.
    ///
    /// Call on every fetch or live delivery. A fully-completed non-empty
    /// task set arms the group's timer (an already-armed timer keeps its
    /// deadline); anything else disarms it. The completion condition is
    /// re-checked against the most recently observed state when the timer
    /// fires, so a cancellation racing the deadline still suppresses the
    /// alert.
    pub fn observe(&self, group: &Group, tasks: &[Task]) {
        let complete = !tasks.is_empty() && tasks.iter().all(|t| !t.completed_by.is_empty());
        self.latest.lock().insert(group.id, complete);

        if !complete {
            self.debounce.cancel(&group.id);
            return;
        }
        if self.debounce.pending(&group.id) {
            return;
        }
        debug!(group = %group.id, "group fully completed, arming alert timer");
        let notifier = Arc::clone(&self.notifier);
        let latest = Arc::clone(&self.latest);
        let group_id = group.id;
        let group_name = group.name.clone();
        self.debounce.schedule(group_id, self.grace, move || {
            if latest.lock().get(&group_id).copied().unwrap_or(false) {
                notifier.notify_group_complete(group_id, &group_name);
            }
        });
    }

    /// Whether an alert timer is currently armed for the group.
    #[must_use]
    pub fn pending(&self, group_id: GroupId) -> bool {
        self.debounce.pending(&group_id)
    }
}
