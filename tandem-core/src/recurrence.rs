//! Recurrence engine: decides when a task's completion state goes stale
//! and clears it.
//!
//! Resets are lazy and pull-based: there is no background scheduler.
//! Every fetch and every live-subscription delivery runs [`sweep`] over
//! the tasks it is about to expose, so stale completion state never
//! reaches a caller. Boundary math uses [`DayKey`]'s continuous period
//! indices, all in fixed UTC.

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde_json::Value;
use tandem_types::{DayKey, ResetInterval, Task};
use tracing::{debug, warn};

use crate::store::{DocumentStore, Fields, StoreError, collections};

/// Whether a task last reset before the current period began.
///
/// Daily compares continuous day indices, weekly the Monday-anchored
/// continuous week index, monthly `year * 12 + month`. A task last reset
/// nine days ago is due under every interval whose period boundary has
/// passed since, however many boundaries that is.
#[must_use]
pub fn reset_due(
    interval: ResetInterval,
    last_reset_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> bool {
    let last = DayKey::from_datetime(last_reset_at);
    let current = DayKey::from_datetime(now);
    match interval {
        ResetInterval::Daily => current.day_index() > last.day_index(),
        ResetInterval::Weekly => current.week_index() > last.week_index(),
        ResetInterval::Monthly => current.month_index() > last.month_index(),
    }
}

/// A cleared copy of the task: pending again, nobody has completed the
/// new occurrence, reset stamp advanced to `now`.
///
/// `completion_dates` is deliberately untouched: the history of past
/// occurrences survives resets.
#[must_use]
pub fn apply_reset(task: &Task, now: DateTime<Utc>) -> Task {
    let mut cleared = task.clone();
    cleared.is_done = false;
    cleared.completed_by.clear();
    cleared.last_reset_at = now;
    cleared
}

fn reset_fields(now: DateTime<Utc>) -> Result<Fields, StoreError> {
    let mut fields = Fields::new();
    fields.insert("isDone".to_string(), Value::Bool(false));
    fields.insert("completedBy".to_string(), Value::Array(Vec::new()));
    fields.insert(
        "lastResetAt".to_string(),
        serde_json::to_value(now).map_err(|e| StoreError::Codec(e.to_string()))?,
    );
    Ok(fields)
}

/// Resets every due task in the batch, write-first.
///
/// Each task is evaluated independently and the due ones are persisted
/// concurrently. The cleared state is reflected into the returned copy
/// only after its store write succeeded; a failed write leaves that
/// task's copy unchanged (it will be retried by the next sweep) and never
/// fails the batch. Running the same sweep twice with the same `now` is a
/// no-op the second time.
pub async fn sweep<S: DocumentStore>(store: &S, tasks: Vec<Task>, now: DateTime<Utc>) -> Vec<Task> {
    join_all(tasks.into_iter().map(|task| async move {
        if !reset_due(task.reset_interval, task.last_reset_at, now) {
            return task;
        }
        let fields = match reset_fields(now) {
            Ok(fields) => fields,
            Err(e) => {
                warn!(task = %task.id, error = %e, "skipping reset, could not encode fields");
                return task;
            }
        };
        match store
            .update(collections::TASKS, &task.id.to_string(), fields)
            .await
        {
            Ok(()) => {
                debug!(task = %task.id, interval = %task.reset_interval, "reset recurring task");
                apply_reset(&task, now)
            }
            Err(e) => {
                warn!(task = %task.id, error = %e, "reset write failed, keeping stale state");
                task
            }
        }
    }))
    .await
}
