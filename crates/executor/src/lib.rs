//! Action execution against a browser surface.
//!
//! [`ActionExecutor`] runs single commands as page-context scripts;
//! [`WorkflowRunner`] adds retries, settle delays, and the critical-step
//! abort semantics for multi-step commands.

mod actions;
mod errors;
mod scripts;
mod search;
mod workflow;

pub use actions::{ActionExecutor, ExecutionRecord};
pub use errors::ExecutorError;
pub use search::{site_for_host, SiteSearch};
pub use workflow::WorkflowRunner;
