//! Durable task collection.
//!
//! The whole collection is one JSON document under a single key, mirrored in
//! memory. Every mutation happens under one async lock and is written back
//! before it returns, so status transitions are atomic with respect to each
//! other: a timer firing and a cancel racing the same task serialize here,
//! and exactly one of them wins.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Local};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use webpilot_core_types::{ActionResult, FailurePhase, Task, TaskId, TaskStatus};
use webpilot_surface::PersistenceStore;

use crate::errors::SchedulerError;

const COLLECTION_KEY: &str = "webpilot.tasks";

pub struct TaskStore {
    backend: Arc<dyn PersistenceStore>,
    tasks: Mutex<HashMap<TaskId, Task>>,
}

impl TaskStore {
    /// Open the store and load whatever the backend has. A corrupt document
    /// is an error; an absent one is an empty collection.
    pub async fn open(backend: Arc<dyn PersistenceStore>) -> Result<Self, SchedulerError> {
        let tasks = match backend.load(COLLECTION_KEY).await? {
            Some(raw) => {
                let list: Vec<Task> = serde_json::from_str(&raw)
                    .map_err(|e| SchedulerError::Corrupt(e.to_string()))?;
                info!(count = list.len(), "loaded task collection");
                list.into_iter().map(|t| (t.id.clone(), t)).collect()
            }
            None => HashMap::new(),
        };
        Ok(Self {
            backend,
            tasks: Mutex::new(tasks),
        })
    }

    async fn persist(&self, tasks: &HashMap<TaskId, Task>) -> Result<(), SchedulerError> {
        let mut list: Vec<&Task> = tasks.values().collect();
        list.sort_by_key(|t| t.created_at);
        let raw = serde_json::to_string(&list)
            .map_err(|e| SchedulerError::Corrupt(e.to_string()))?;
        self.backend.save(COLLECTION_KEY, &raw).await?;
        Ok(())
    }

    pub async fn insert(&self, task: Task) -> Result<(), SchedulerError> {
        let mut tasks = self.tasks.lock().await;
        debug!(id = %task.id, status = task.status.name(), "task stored");
        tasks.insert(task.id.clone(), task);
        self.persist(&tasks).await
    }

    pub async fn get(&self, id: &TaskId) -> Option<Task> {
        self.tasks.lock().await.get(id).cloned()
    }

    /// All tasks, newest first.
    pub async fn list(&self) -> Vec<Task> {
        let tasks = self.tasks.lock().await;
        let mut list: Vec<Task> = tasks.values().cloned().collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        list
    }

    pub async fn pending(&self) -> Vec<Task> {
        self.tasks
            .lock()
            .await
            .values()
            .filter(|t| t.status == TaskStatus::Pending)
            .cloned()
            .collect()
    }

    /// Atomically move a pending task to running. `Ok(false)` means someone
    /// else got there first (typically a cancel); the caller must not run it.
    pub async fn claim_running(&self, id: &TaskId) -> Result<bool, SchedulerError> {
        self.transition(id, TaskStatus::Running, |task| {
            task.executed_at = Some(Local::now());
        })
        .await
    }

    /// Atomically cancel a pending task. `Ok(false)` when the task already
    /// started or finished.
    pub async fn cancel(&self, id: &TaskId) -> Result<bool, SchedulerError> {
        self.transition(id, TaskStatus::Cancelled, |_| {}).await
    }

    pub async fn complete(
        &self,
        id: &TaskId,
        result: ActionResult,
    ) -> Result<(), SchedulerError> {
        let status = if result.success {
            TaskStatus::Completed
        } else {
            TaskStatus::Failed
        };
        let claimed = self
            .transition(id, status, |task| {
                task.error = result.error.clone();
                task.result = Some(result.clone());
            })
            .await?;
        if !claimed {
            warn!(id = %id, "completion for a task that was not running");
        }
        Ok(())
    }

    /// Mark a task failed outside the normal run path (e.g. found `Running`
    /// after a restart).
    pub async fn fail(&self, id: &TaskId, error: impl Into<String>) -> Result<(), SchedulerError> {
        let error = error.into();
        self.transition(id, TaskStatus::Failed, |task| {
            task.error = Some(error.clone());
            task.result = Some(ActionResult::failed(FailurePhase::Service, error.clone()));
        })
        .await?;
        Ok(())
    }

    async fn transition(
        &self,
        id: &TaskId,
        next: TaskStatus,
        apply: impl FnOnce(&mut Task),
    ) -> Result<bool, SchedulerError> {
        let mut tasks = self.tasks.lock().await;
        let task = tasks
            .get_mut(id)
            .ok_or_else(|| SchedulerError::NotFound(id.clone()))?;
        if !task.status.can_transition_to(next) {
            debug!(
                id = %id,
                from = task.status.name(),
                to = next.name(),
                "transition refused"
            );
            return Ok(false);
        }
        task.status = next;
        apply(task);
        self.persist(&tasks).await?;
        Ok(true)
    }

    /// Drop terminal tasks older than `age`. Pending and running tasks are
    /// never purged.
    pub async fn purge_older_than(&self, age: Duration) -> Result<usize, SchedulerError> {
        let cutoff = Local::now() - age;
        let mut tasks = self.tasks.lock().await;
        let before = tasks.len();
        tasks.retain(|_, t| {
            !t.is_terminal() || t.executed_at.unwrap_or(t.created_at) > cutoff
        });
        let removed = before - tasks.len();
        if removed > 0 {
            info!(removed, "purged expired tasks");
            self.persist(&tasks).await?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use webpilot_core_types::{Command, CommandKind};
    use webpilot_surface::MemoryStore;

    fn task() -> Task {
        Task::new(
            Command::new(CommandKind::Screenshot, "take a screenshot"),
            Local::now() + Duration::minutes(5),
        )
    }

    async fn open_store(backend: Arc<MemoryStore>) -> TaskStore {
        TaskStore::open(backend).await.unwrap()
    }

    #[tokio::test]
    async fn tasks_survive_a_reopen() {
        let backend = Arc::new(MemoryStore::new());
        let task = task();
        let id = task.id.clone();
        {
            let store = open_store(backend.clone()).await;
            store.insert(task).await.unwrap();
        }
        let store = open_store(backend).await;
        let loaded = store.get(&id).await.unwrap();
        assert_eq!(loaded.status, TaskStatus::Pending);
        assert_eq!(loaded.raw_text, "take a screenshot");
    }

    #[tokio::test]
    async fn claim_and_cancel_are_mutually_exclusive() {
        let store = open_store(Arc::new(MemoryStore::new())).await;
        let task = task();
        let id = task.id.clone();
        store.insert(task).await.unwrap();

        assert!(store.claim_running(&id).await.unwrap());
        // The claim won; the cancel must lose.
        assert!(!store.cancel(&id).await.unwrap());
        assert_eq!(store.get(&id).await.unwrap().status, TaskStatus::Running);
    }

    #[tokio::test]
    async fn cancelled_task_cannot_be_claimed() {
        let store = open_store(Arc::new(MemoryStore::new())).await;
        let task = task();
        let id = task.id.clone();
        store.insert(task).await.unwrap();

        assert!(store.cancel(&id).await.unwrap());
        assert!(!store.claim_running(&id).await.unwrap());
        assert_eq!(store.get(&id).await.unwrap().status, TaskStatus::Cancelled);
    }

    #[tokio::test]
    async fn completion_records_the_result() {
        let store = open_store(Arc::new(MemoryStore::new())).await;
        let task = task();
        let id = task.id.clone();
        store.insert(task).await.unwrap();
        store.claim_running(&id).await.unwrap();
        store
            .complete(&id, ActionResult::ok("captured page"))
            .await
            .unwrap();

        let done = store.get(&id).await.unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
        assert_eq!(done.result.unwrap().message, "captured page");
    }

    #[tokio::test]
    async fn purge_spares_pending_tasks() {
        let store = open_store(Arc::new(MemoryStore::new())).await;
        let pending = task();
        let mut old = task();
        old.status = TaskStatus::Completed;
        old.executed_at = Some(Local::now() - Duration::hours(48));
        store.insert(pending.clone()).await.unwrap();
        store.insert(old).await.unwrap();

        let removed = store.purge_older_than(Duration::hours(24)).await.unwrap();
        assert_eq!(removed, 1);
        assert!(store.get(&pending.id).await.is_some());
    }

    #[tokio::test]
    async fn unknown_task_is_an_error() {
        let store = open_store(Arc::new(MemoryStore::new())).await;
        let missing = TaskId::new();
        assert!(matches!(
            store.claim_running(&missing).await,
            Err(SchedulerError::NotFound(_))
        ));
    }
}
