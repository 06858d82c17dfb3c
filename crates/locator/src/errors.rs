use thiserror::Error;
use webpilot_surface::{ServiceError, SurfaceError};

#[derive(Error, Debug)]
pub enum LocatorError {
    /// No strategy produced a candidate above the confidence threshold.
    #[error("no element matched '{description}'")]
    NotFound {
        description: String,
        /// Texts of nearby interactive elements, at most ten.
        suggestions: Vec<String>,
    },

    /// The page changed between resolution and use.
    #[error("page generation changed during resolution (was {was}, now {now})")]
    StaleGeneration { was: u64, now: u64 },

    #[error("surface error: {0}")]
    Surface(#[from] SurfaceError),

    #[error("model service error: {0}")]
    Service(#[from] ServiceError),

    #[error("malformed probe result: {0}")]
    MalformedProbe(String),
}

impl LocatorError {
    /// Whether retrying the same resolution could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            LocatorError::NotFound { .. } => true,
            LocatorError::StaleGeneration { .. } => true,
            LocatorError::Surface(e) => e.is_retryable(),
            LocatorError::Service(_) => true,
            LocatorError::MalformedProbe(_) => false,
        }
    }
}
