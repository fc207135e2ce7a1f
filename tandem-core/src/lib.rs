//! Tandem core — task lifecycle and recurrence engine.
//!
//! Owns the rules for how tasks move between done and pending, how
//! group-shared tasks track per-member completion, how recurring tasks
//! reset at daily/weekly/monthly boundaries, and how the per-user
//! completion-history ledger stays consistent under concurrent toggles.
//! Persistence and change notification are delegated to a
//! [`store::DocumentStore`] collaborator.

pub mod config;
pub mod error;
pub mod groups;
pub mod history;
pub mod notify;
pub mod recurrence;
pub mod session;
pub mod stats;
pub mod store;
pub mod tasks;

pub use error::Error;
