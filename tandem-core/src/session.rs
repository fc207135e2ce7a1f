//! Per-viewer session state: the current task snapshots and their
//! derived rates.
//!
//! The session is a plain owned container, mutated by whoever drives the
//! fetches. Overlapping fetches are serialized by generation: each fetch
//! takes a tag from [`begin_fetch`] and results applied with an older tag
//! than the slot's last applied one are dropped, so a slow early fetch
//! can never clobber a newer result.
//!
//! [`begin_fetch`]: Session::begin_fetch

use std::collections::{BTreeMap, HashMap};

use tandem_types::{GroupId, Task, TaskId, UserId};
use tracing::debug;

use crate::stats::{self, CompletionStats};

/// Snapshot state for one signed-in viewer.
pub struct Session {
    viewer: UserId,
    generation: u64,
    personal: Vec<Task>,
    personal_applied: u64,
    groups: BTreeMap<GroupId, Vec<Task>>,
    group_applied: HashMap<GroupId, u64>,
}

impl Session {
    /// Creates an empty session for the viewer.
    #[must_use]
    pub fn new(viewer: UserId) -> Self {
        Self {
            viewer,
            generation: 0,
            personal: Vec::new(),
            personal_applied: 0,
            groups: BTreeMap::new(),
            group_applied: HashMap::new(),
        }
    }

    /// The session's viewer.
    #[must_use]
    pub fn viewer(&self) -> &UserId {
        &self.viewer
    }

    /// Tags the start of a fetch; pass the tag to the matching `apply_*`.
    pub fn begin_fetch(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    /// Applies a personal-task fetch result. Returns `false` when the
    /// result was stale and dropped.
    pub fn apply_personal(&mut self, generation: u64, tasks: Vec<Task>) -> bool {
        if generation < self.personal_applied {
            debug!(generation, latest = self.personal_applied, "dropping stale personal fetch");
            return false;
        }
        self.personal_applied = generation;
        self.personal = tasks;
        true
    }

    /// Applies a group-task fetch result for one group. Returns `false`
    /// when the result was stale and dropped.
    pub fn apply_group(&mut self, generation: u64, group_id: GroupId, tasks: Vec<Task>) -> bool {
        let applied = self.group_applied.entry(group_id).or_insert(0);
        if generation < *applied {
            debug!(generation, latest = *applied, group = %group_id, "dropping stale group fetch");
            return false;
        }
        *applied = generation;
        self.groups.insert(group_id, tasks);
        true
    }

    /// Drops a group's snapshot, e.g. after leaving or deleting it.
    pub fn forget_group(&mut self, group_id: GroupId) {
        self.groups.remove(&group_id);
        self.group_applied.remove(&group_id);
    }

    /// Removes a deleted task from every snapshot it appears in.
    pub fn remove_task(&mut self, task_id: TaskId) {
        self.personal.retain(|t| t.id != task_id);
        for tasks in self.groups.values_mut() {
            tasks.retain(|t| t.id != task_id);
        }
    }

    /// The current personal snapshot.
    #[must_use]
    pub fn personal_tasks(&self) -> Vec<Task> {
        self.personal.clone()
    }

    /// The current snapshot for one group, empty if none was applied.
    #[must_use]
    pub fn group_tasks(&self, group_id: GroupId) -> Vec<Task> {
        self.groups.get(&group_id).cloned().unwrap_or_default()
    }

    /// Ids of every group with an applied snapshot.
    #[must_use]
    pub fn group_ids(&self) -> Vec<GroupId> {
        self.groups.keys().copied().collect()
    }

    /// Viewer's completion rate over personal tasks.
    #[must_use]
    pub fn personal_stats(&self) -> CompletionStats {
        stats::completion_stats(&self.personal, &self.viewer)
    }

    /// Viewer's completion rate over one group's tasks.
    #[must_use]
    pub fn group_stats(&self, group_id: GroupId) -> CompletionStats {
        stats::completion_stats(
            self.groups.get(&group_id).map_or(&[][..], Vec::as_slice),
            &self.viewer,
        )
    }

    /// Viewer's completion rate over everything in the session.
    #[must_use]
    pub fn overall_stats(&self) -> CompletionStats {
        stats::overall(
            &self.personal,
            self.groups.values().map(Vec::as_slice),
            &self.viewer,
        )
    }
}
