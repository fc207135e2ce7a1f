//! Task entity and recurrence interval.
//!
//! A task is either *personal* (`group_id == None`, completion tracked by
//! the single `is_done` flag) or *group-shared* (`group_id == Some(..)`,
//! completion tracked per member via the `completed_by` set). Exactly one
//! of the two completion channels is authoritative, decided by `group_id`.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::day::DayKey;
use crate::ids::{GroupId, TaskId, UserId};

/// Maximum allowed task title length in characters.
pub const MAX_TASK_TITLE_LENGTH: usize = 256;

/// How often a task's completion state resets to pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResetInterval {
    /// Resets when a new UTC calendar day begins.
    Daily,
    /// Resets when a new Monday-anchored week begins.
    Weekly,
    /// Resets when a new calendar month begins.
    Monthly,
}

impl ResetInterval {
    /// All intervals, in display order.
    pub const ALL: [Self; 3] = [Self::Daily, Self::Weekly, Self::Monthly];
}

impl std::fmt::Display for ResetInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Daily => write!(f, "daily"),
            Self::Weekly => write!(f, "weekly"),
            Self::Monthly => write!(f, "monthly"),
        }
    }
}

/// A tracked task, personal or group-shared.
///
/// Field names serialize in the stored document format (`ownerId`,
/// `isDone`, `completedBy`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique task identifier (UUID v7, time-ordered).
    pub id: TaskId,
    /// Task title; non-empty after trimming.
    pub title: String,
    /// User who created the task. Always set, also for group tasks.
    pub owner_id: UserId,
    /// Owning group; `None` marks a personal task.
    pub group_id: Option<GroupId>,
    /// Completion flag, authoritative for personal tasks only.
    pub is_done: bool,
    /// Members who completed the current occurrence; authoritative for
    /// group tasks only. Always a subset of the group's member set.
    pub completed_by: BTreeSet<UserId>,
    /// Calendar days on which a completion event occurred, in toggle
    /// order. May hold duplicates across toggles; consumers reconcile
    /// per day.
    pub completion_dates: Vec<DayKey>,
    /// Recurrence interval governing automatic resets.
    pub reset_interval: ResetInterval,
    /// Immutable creation timestamp.
    pub created_at: DateTime<Utc>,
    /// When the last recurrence boundary was crossed. Monotonically
    /// non-decreasing; only the recurrence engine advances it.
    pub last_reset_at: DateTime<Utc>,
}

impl Task {
    /// Creates a pending task with creation-time invariants established:
    /// not done, nobody has completed it, `last_reset_at == created_at`.
    #[must_use]
    pub fn new(
        title: impl Into<String>,
        owner_id: UserId,
        group_id: Option<GroupId>,
        reset_interval: ResetInterval,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TaskId::new(),
            title: title.into(),
            owner_id,
            group_id,
            is_done: false,
            completed_by: BTreeSet::new(),
            completion_dates: Vec::new(),
            reset_interval,
            created_at,
            last_reset_at: created_at,
        }
    }

    /// Whether this task is scoped to a group.
    #[must_use]
    pub const fn is_group_task(&self) -> bool {
        self.group_id.is_some()
    }

    /// Whether the given viewer considers the current occurrence done.
    ///
    /// Personal tasks use `is_done`; group tasks use the viewer's
    /// membership in `completed_by`.
    #[must_use]
    pub fn is_done_for(&self, viewer: &UserId) -> bool {
        if self.is_group_task() {
            self.completed_by.contains(viewer)
        } else {
            self.is_done
        }
    }
}
