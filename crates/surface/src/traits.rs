use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use webpilot_core_types::SurfaceId;

use crate::{ServiceError, StoreError, SurfaceError};

/// Reference to a captured page image. The codec is the host's business;
/// the engine only hashes the bytes and forwards them to the model service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    pub id: String,
    pub bytes: Vec<u8>,
}

impl ImageRef {
    pub fn new(id: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            bytes,
        }
    }
}

/// Navigation lifecycle as reported by the host surface.
#[derive(Clone, Debug, PartialEq)]
pub enum NavigationEvent {
    Started { url: String },
    Finished { url: String },
    Failed { url: String, reason: String },
    Crashed,
}

/// The hosted, scriptable rendering surface.
///
/// Every interaction is one asynchronous round trip: a script injected into
/// the remote page context, its JSON result delivered back. Scripts must
/// return structurally serializable data only — no functions, DOM nodes, or
/// cycles.
#[async_trait]
pub trait BrowserSurface: Send + Sync {
    fn id(&self) -> &SurfaceId;

    /// Monotonic page-load generation. Bumps on every navigation; element
    /// resolutions are only valid within the generation they were made in.
    fn generation(&self) -> u64;

    /// Run a script in the page context and return its JSON result.
    async fn execute_script(&self, js: &str) -> Result<Value, SurfaceError>;

    /// Load a URL, resolving once the load lifecycle finishes or fails.
    async fn navigate(&self, url: &str) -> Result<(), SurfaceError>;

    /// Capture the current page as an image.
    async fn capture_page(&self) -> Result<ImageRef, SurfaceError>;

    /// Subscribe to navigation lifecycle events.
    fn navigation_events(&self) -> broadcast::Receiver<NavigationEvent>;
}

/// Text/vision model provider.
///
/// Callers must tolerate malformed responses: the engine degrades to
/// defaults rather than failing a whole resolution on model garbage.
#[async_trait]
pub trait LanguageModelService: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        image: Option<&ImageRef>,
    ) -> Result<String, ServiceError>;
}

/// Durable key-value storage for the task collection. Last-write-wins,
/// no transactions assumed.
#[async_trait]
pub trait PersistenceStore: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn save(&self, key: &str, value: &str) -> Result<(), StoreError>;
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}
