use thiserror::Error;
use webpilot_core_types::TaskId;
use webpilot_surface::StoreError;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("task {0} not found")]
    NotFound(TaskId),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("task collection is corrupt: {0}")]
    Corrupt(String),
}
