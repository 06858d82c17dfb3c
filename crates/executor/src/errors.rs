use thiserror::Error;
use webpilot_core_types::FailurePhase;
use webpilot_locator::LocatorError;
use webpilot_surface::SurfaceError;

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("element resolution failed: {0}")]
    Resolution(#[from] LocatorError),

    #[error("surface error: {0}")]
    Surface(#[from] SurfaceError),

    #[error("{what} timed out after {seconds}s")]
    Timeout { what: &'static str, seconds: u64 },

    #[error("action failed: {0}")]
    Action(String),
}

impl ExecutorError {
    pub fn phase(&self) -> FailurePhase {
        match self {
            ExecutorError::Resolution(_) => FailurePhase::Resolution,
            ExecutorError::Surface(_) => FailurePhase::Surface,
            ExecutorError::Timeout { .. } => FailurePhase::Timeout,
            ExecutorError::Action(_) => FailurePhase::Action,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            ExecutorError::Resolution(e) => e.is_retryable(),
            ExecutorError::Surface(e) => e.is_retryable(),
            ExecutorError::Timeout { .. } => true,
            ExecutorError::Action(_) => true,
        }
    }
}
