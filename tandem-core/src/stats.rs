//! Completion-rate aggregation over task slices.
//!
//! Rates are always computed per viewer: a group task counts as done
//! only when the viewer completed it, regardless of what the rest of the
//! group did.

use tandem_types::{Task, UserId};

/// Done/total counts and the derived completion rate.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CompletionStats {
    /// Tasks the viewer has completed.
    pub done: usize,
    /// Tasks considered.
    pub total: usize,
    /// `done / total`, `0.0` when there are no tasks.
    pub rate: f64,
}

/// Stats for one slice of tasks, as seen by the viewer.
pub fn completion_stats<'a, I>(tasks: I, viewer: &UserId) -> CompletionStats
where
    I: IntoIterator<Item = &'a Task>,
{
    let mut done = 0;
    let mut total = 0;
    for task in tasks {
        total += 1;
        if task.is_done_for(viewer) {
            done += 1;
        }
    }
    #[allow(clippy::cast_precision_loss)]
    let rate = if total == 0 {
        0.0
    } else {
        done as f64 / total as f64
    };
    CompletionStats { done, total, rate }
}

/// Combined stats over the personal list and every group list.
pub fn overall<'a, G>(personal: &'a [Task], groups: G, viewer: &UserId) -> CompletionStats
where
    G: IntoIterator<Item = &'a [Task]>,
{
    completion_stats(
        personal.iter().chain(groups.into_iter().flatten()),
        viewer,
    )
}
