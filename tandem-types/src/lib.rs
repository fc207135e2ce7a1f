//! Core data model for the Tandem task tracker.
//!
//! Pure types shared by the engine and its callers: identifiers, the
//! [`Task`](task::Task) and [`Group`](group::Group) entities, the recurrence
//! interval enum, and UTC calendar-day keys with continuous day/week/month
//! indices for boundary math.

pub mod day;
pub mod group;
pub mod ids;
pub mod task;

pub use day::DayKey;
pub use group::{Group, MIN_GROUP_PASSWORD_LENGTH};
pub use ids::{GroupId, TaskId, UserId};
pub use task::{MAX_TASK_TITLE_LENGTH, ResetInterval, Task};
