//! Durable task scheduling.
//!
//! Tasks are persisted through the [`PersistenceStore`] seam, armed with
//! tokio timers, and survive restarts via [`TaskScheduler::recover`]. The
//! status transition in the store is the single source of truth, so timer
//! fires and cancellations can never both win the same task.
//!
//! [`PersistenceStore`]: webpilot_surface::PersistenceStore

mod errors;
mod scheduler;
mod store;

pub use errors::SchedulerError;
pub use scheduler::{TaskEvent, TaskEventKind, TaskRunner, TaskScheduler};
pub use store::TaskStore;
