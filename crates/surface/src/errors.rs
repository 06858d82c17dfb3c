//! Error types for the collaborator interfaces.

use thiserror::Error;

/// Browser surface failures.
#[derive(Debug, Error, Clone)]
pub enum SurfaceError {
    /// Navigation failed; carries the underlying description from the host.
    #[error("navigation to {url} failed: {reason}")]
    NavigationFailed { url: String, reason: String },

    /// The rendering surface crashed and must be recreated by the host.
    #[error("surface crashed")]
    Crashed,

    /// Injected script raised or returned something non-serializable.
    #[error("script execution failed: {0}")]
    ScriptFailed(String),

    /// Screenshot capture failed.
    #[error("capture failed: {0}")]
    CaptureFailed(String),

    #[error("surface operation timed out: {0}")]
    Timeout(String),
}

impl SurfaceError {
    /// Crashed surfaces are surfaced as-is; retrying them is pointless.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SurfaceError::Timeout(_) | SurfaceError::ScriptFailed(_)
        )
    }
}

/// Language model service failures.
#[derive(Debug, Error, Clone)]
pub enum ServiceError {
    #[error("model service unreachable: {0}")]
    Unreachable(String),

    #[error("model returned an unusable response: {0}")]
    Malformed(String),

    #[error("model round trip timed out after {0}s")]
    Timeout(u64),
}

/// Persistence store failures. The store is last-write-wins key-value
/// storage; there are no transactional errors to distinguish.
#[derive(Debug, Error, Clone)]
#[error("persistence error: {0}")]
pub struct StoreError(pub String);
