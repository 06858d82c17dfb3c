//! In-memory and file-backed implementations of the collaborator traits.
//!
//! `StaticSurface` and `StaticModel` are deterministic stand-ins used by
//! tests and offline development; `FileStore` is the default durable store
//! for the CLI.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::debug;
use webpilot_core_types::SurfaceId;

use crate::{
    BrowserSurface, ImageRef, LanguageModelService, NavigationEvent, PersistenceStore,
    ServiceError, StoreError, SurfaceError,
};

type ScriptHandler = dyn Fn(&str) -> Result<Value, SurfaceError> + Send + Sync;

/// Deterministic browser surface. Scripts are answered by a configurable
/// handler; navigations succeed (bumping the generation) unless a failure
/// has been injected.
pub struct StaticSurface {
    id: SurfaceId,
    generation: AtomicU64,
    handler: RwLock<Arc<ScriptHandler>>,
    screenshot: RwLock<Vec<u8>>,
    navigation_failure: RwLock<Option<String>>,
    visited: RwLock<Vec<String>>,
    events: broadcast::Sender<NavigationEvent>,
}

impl StaticSurface {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            id: SurfaceId::new(),
            generation: AtomicU64::new(1),
            handler: RwLock::new(Arc::new(|_js: &str| Ok(Value::Null))),
            screenshot: RwLock::new(vec![0u8; 16]),
            navigation_failure: RwLock::new(None),
            visited: RwLock::new(Vec::new()),
            events,
        }
    }

    /// Replace the script handler. The handler sees the raw script text and
    /// returns whatever the page context would have.
    pub fn with_script_handler(
        self,
        handler: impl Fn(&str) -> Result<Value, SurfaceError> + Send + Sync + 'static,
    ) -> Self {
        *self.handler.write() = Arc::new(handler);
        self
    }

    pub fn set_script_handler(
        &self,
        handler: impl Fn(&str) -> Result<Value, SurfaceError> + Send + Sync + 'static,
    ) {
        *self.handler.write() = Arc::new(handler);
    }

    pub fn with_screenshot(self, bytes: Vec<u8>) -> Self {
        *self.screenshot.write() = bytes;
        self
    }

    /// Make every subsequent navigation fail with this reason.
    pub fn fail_navigation(&self, reason: impl Into<String>) {
        *self.navigation_failure.write() = Some(reason.into());
    }

    pub fn clear_navigation_failure(&self) {
        *self.navigation_failure.write() = None;
    }

    /// URLs navigated to so far, in order.
    pub fn visited(&self) -> Vec<String> {
        self.visited.read().clone()
    }
}

impl Default for StaticSurface {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrowserSurface for StaticSurface {
    fn id(&self) -> &SurfaceId {
        &self.id
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    async fn execute_script(&self, js: &str) -> Result<Value, SurfaceError> {
        let handler = self.handler.read().clone();
        handler(js)
    }

    async fn navigate(&self, url: &str) -> Result<(), SurfaceError> {
        let _ = self.events.send(NavigationEvent::Started {
            url: url.to_string(),
        });

        if let Some(reason) = self.navigation_failure.read().clone() {
            let _ = self.events.send(NavigationEvent::Failed {
                url: url.to_string(),
                reason: reason.clone(),
            });
            return Err(SurfaceError::NavigationFailed {
                url: url.to_string(),
                reason,
            });
        }

        self.generation.fetch_add(1, Ordering::SeqCst);
        self.visited.write().push(url.to_string());
        debug!(url, generation = self.generation(), "static surface navigated");

        let _ = self.events.send(NavigationEvent::Finished {
            url: url.to_string(),
        });
        Ok(())
    }

    async fn capture_page(&self) -> Result<ImageRef, SurfaceError> {
        let bytes = self.screenshot.read().clone();
        Ok(ImageRef::new(
            format!("shot-{}-{}", self.id.0, self.generation()),
            bytes,
        ))
    }

    fn navigation_events(&self) -> broadcast::Receiver<NavigationEvent> {
        self.events.subscribe()
    }
}

/// Model service that replays queued responses, then a fixed fallback.
/// Prompts are recorded for assertions.
pub struct StaticModel {
    responses: Mutex<VecDeque<String>>,
    fallback: String,
    prompts: Mutex<Vec<String>>,
}

impl StaticModel {
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            fallback: fallback.into(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn push_response(&self, response: impl Into<String>) {
        self.responses.lock().push_back(response.into());
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl LanguageModelService for StaticModel {
    async fn complete(
        &self,
        prompt: &str,
        _image: Option<&ImageRef>,
    ) -> Result<String, ServiceError> {
        self.prompts.lock().push(prompt.to_string());
        Ok(self
            .responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone()))
    }
}

/// Model service that always fails, for degradation tests.
pub struct FailingModel;

#[async_trait]
impl LanguageModelService for FailingModel {
    async fn complete(
        &self,
        _prompt: &str,
        _image: Option<&ImageRef>,
    ) -> Result<String, ServiceError> {
        Err(ServiceError::Unreachable("model offline".to_string()))
    }
}

/// Volatile key-value store.
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl PersistenceStore for MemoryStore {
    async fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).map(|v| v.clone()))
    }

    async fn save(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Durable store writing one file per key under a directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let sanitized: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{sanitized}.json"))
    }
}

#[async_trait]
impl PersistenceStore for FileStore {
    async fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError(e.to_string())),
        }
    }

    async fn save(&self, key: &str, value: &str) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StoreError(e.to_string()))?;
        tokio::fs::write(self.path_for(key), value)
            .await
            .map_err(|e| StoreError(e.to_string()))
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn navigation_bumps_generation_and_records_url() {
        let surface = StaticSurface::new();
        let start = surface.generation();

        surface.navigate("https://www.example.com").await.unwrap();

        assert_eq!(surface.generation(), start + 1);
        assert_eq!(surface.visited(), vec!["https://www.example.com"]);
    }

    #[tokio::test]
    async fn injected_navigation_failure_surfaces_the_reason() {
        let surface = StaticSurface::new();
        surface.fail_navigation("ERR_NAME_NOT_RESOLVED");

        let err = surface.navigate("https://nope.invalid").await.unwrap_err();
        match err {
            SurfaceError::NavigationFailed { reason, .. } => {
                assert_eq!(reason, "ERR_NAME_NOT_RESOLVED")
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // Generation must not advance on a failed load.
        assert!(surface.visited().is_empty());
    }

    #[tokio::test]
    async fn static_model_replays_queue_then_fallback() {
        let model = StaticModel::new("fallback");
        model.push_response("first");

        assert_eq!(model.complete("p1", None).await.unwrap(), "first");
        assert_eq!(model.complete("p2", None).await.unwrap(), "fallback");
        assert_eq!(model.prompts(), vec!["p1", "p2"]);
    }

    #[tokio::test]
    async fn file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        assert_eq!(store.load("tasks").await.unwrap(), None);
        store.save("tasks", "[]").await.unwrap();
        assert_eq!(store.load("tasks").await.unwrap().as_deref(), Some("[]"));
        store.remove("tasks").await.unwrap();
        assert_eq!(store.load("tasks").await.unwrap(), None);
    }
}
