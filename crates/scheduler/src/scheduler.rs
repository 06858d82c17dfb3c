//! Timer management and task execution.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Local};
use dashmap::DashMap;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use webpilot_core_types::{
    ActionResult, Command, ScheduleMode, Task, TaskId, TaskStatus, TimeSpec,
};

use crate::errors::SchedulerError;
use crate::store::TaskStore;

/// Terminal tasks older than this are dropped by the purge sweep.
const RETENTION: i64 = 24;

/// Executes a task's command when its timer fires. The engine plugs its
/// workflow runner in here.
#[async_trait::async_trait]
pub trait TaskRunner: Send + Sync {
    async fn run(&self, command: &Command) -> ActionResult;
}

/// Lifecycle notifications, best-effort: a full event channel drops events
/// rather than blocking the scheduler.
#[derive(Clone, Debug)]
pub struct TaskEvent {
    pub task_id: TaskId,
    pub kind: TaskEventKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskEventKind {
    Created,
    Started,
    Completed,
    Failed,
    Cancelled,
}

/// Durable task scheduler.
///
/// Scheduled tasks are persisted pending and armed with a timer; immediate
/// commands run synchronously and only their terminal record is stored.
/// Execution is serialized through one lock because all tasks share the
/// engine's browser surface.
pub struct TaskScheduler {
    store: Arc<TaskStore>,
    runner: Arc<dyn TaskRunner>,
    timers: DashMap<TaskId, JoinHandle<()>>,
    events: broadcast::Sender<TaskEvent>,
    surface_lock: Arc<Mutex<()>>,
}

impl TaskScheduler {
    pub fn new(store: Arc<TaskStore>, runner: Arc<dyn TaskRunner>) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            store,
            runner,
            timers: DashMap::new(),
            events,
            surface_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Abort every armed timer. Pending tasks stay persisted and are
    /// re-armed by [`recover`](Self::recover) on the next start.
    pub fn shutdown(&self) {
        for entry in self.timers.iter() {
            entry.value().abort();
        }
        self.timers.clear();
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.events.subscribe()
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    fn emit(&self, task_id: &TaskId, kind: TaskEventKind) {
        let _ = self.events.send(TaskEvent {
            task_id: task_id.clone(),
            kind,
        });
    }

    /// Submit an interpreted command. Immediate commands run to completion
    /// before this returns; scheduled ones come back pending with a timer
    /// armed.
    pub async fn submit(
        self: &Arc<Self>,
        command: Command,
        spec: &TimeSpec,
    ) -> Result<Task, SchedulerError> {
        self.store.purge_older_than(Duration::hours(RETENTION)).await?;

        match spec.mode {
            ScheduleMode::Immediate => self.run_immediate(command).await,
            ScheduleMode::Scheduled(at) => {
                let task = Task::new(command, at);
                self.store.insert(task.clone()).await?;
                self.emit(&task.id, TaskEventKind::Created);
                self.arm(&task);
                info!(id = %task.id, at = %at, "task scheduled");
                Ok(task)
            }
        }
    }

    /// Run now, recording only the finished task.
    async fn run_immediate(self: &Arc<Self>, command: Command) -> Result<Task, SchedulerError> {
        let mut task = Task::new(command, Local::now());
        task.status = TaskStatus::Running;
        task.executed_at = Some(Local::now());
        self.emit(&task.id, TaskEventKind::Started);

        let result = {
            let _guard = self.surface_lock.lock().await;
            self.runner.run(&task.command).await
        };

        task.status = if result.success {
            TaskStatus::Completed
        } else {
            TaskStatus::Failed
        };
        task.error = result.error.clone();
        task.result = Some(result);
        self.emit(
            &task.id,
            if task.status == TaskStatus::Completed {
                TaskEventKind::Completed
            } else {
                TaskEventKind::Failed
            },
        );
        self.store.insert(task.clone()).await?;
        Ok(task)
    }

    /// Cancel a pending task. The store transition is the authority; the
    /// timer abort is cleanup only, so a cancel racing the timer can never
    /// cancel a task that already started.
    pub async fn cancel(&self, id: &TaskId) -> Result<bool, SchedulerError> {
        let cancelled = self.store.cancel(id).await?;
        if cancelled {
            if let Some((_, handle)) = self.timers.remove(id) {
                handle.abort();
            }
            self.emit(id, TaskEventKind::Cancelled);
            info!(id = %id, "task cancelled");
        } else {
            debug!(id = %id, "cancel refused, task not pending");
        }
        Ok(cancelled)
    }

    pub async fn list(&self) -> Vec<Task> {
        self.store.list().await
    }

    /// Re-arm timers after a restart. Tasks found running were interrupted
    /// mid-flight and are marked failed; past-due pending tasks fire
    /// immediately.
    pub async fn recover(self: &Arc<Self>) -> Result<usize, SchedulerError> {
        for task in self.store.list().await {
            if task.status == TaskStatus::Running {
                warn!(id = %task.id, "task interrupted by restart");
                self.store.fail(&task.id, "interrupted by restart").await?;
                self.emit(&task.id, TaskEventKind::Failed);
            }
        }
        let pending = self.store.pending().await;
        let count = pending.len();
        for task in &pending {
            self.arm(task);
        }
        if count > 0 {
            info!(count, "re-armed pending tasks");
        }
        self.store.purge_older_than(Duration::hours(RETENTION)).await?;
        Ok(count)
    }

    /// Arm the timer for one pending task. Past-due delays clamp to zero so
    /// the task fires on the next tick.
    fn arm(self: &Arc<Self>, task: &Task) {
        let delay = (task.scheduled_at - Local::now())
            .to_std()
            .unwrap_or(StdDuration::ZERO);
        let scheduler = self.clone();
        let id = task.id.clone();
        debug!(id = %id, delay_ms = delay.as_millis() as u64, "timer armed");
        let handle = tokio::spawn({
            let id = id.clone();
            async move {
                tokio::time::sleep(delay).await;
                scheduler.fire(&id).await;
            }
        });
        if let Some(stale) = self.timers.insert(id, handle) {
            stale.abort();
        }
    }

    /// Timer expiry: claim the task, then run it. Losing the claim means a
    /// cancel (or a duplicate timer) got there first.
    async fn fire(self: &Arc<Self>, id: &TaskId) {
        self.timers.remove(id);
        let claimed = match self.store.claim_running(id).await {
            Ok(claimed) => claimed,
            Err(err) => {
                warn!(id = %id, error = %err, "claim failed");
                return;
            }
        };
        if !claimed {
            debug!(id = %id, "timer fired for a task no longer pending");
            return;
        }
        self.emit(id, TaskEventKind::Started);

        let Some(task) = self.store.get(id).await else {
            return;
        };
        info!(id = %id, action = task.command.kind.name(), "running scheduled task");

        let result = {
            let _guard = self.surface_lock.lock().await;
            self.runner.run(&task.command).await
        };

        let kind = if result.success {
            TaskEventKind::Completed
        } else {
            TaskEventKind::Failed
        };
        if let Err(err) = self.store.complete(id, result).await {
            warn!(id = %id, error = %err, "failed to record task result");
        }
        self.emit(id, kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use webpilot_core_types::CommandKind;
    use webpilot_surface::MemoryStore;

    struct CountingRunner {
        runs: AtomicUsize,
    }

    impl CountingRunner {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                runs: AtomicUsize::new(0),
            })
        }

        fn runs(&self) -> usize {
            self.runs.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl TaskRunner for CountingRunner {
        async fn run(&self, _command: &Command) -> ActionResult {
            self.runs.fetch_add(1, Ordering::SeqCst);
            ActionResult::ok("done")
        }
    }

    async fn scheduler_with(
        runner: Arc<CountingRunner>,
    ) -> (Arc<TaskScheduler>, Arc<MemoryStore>) {
        let backend = Arc::new(MemoryStore::new());
        let store = Arc::new(TaskStore::open(backend.clone()).await.unwrap());
        (TaskScheduler::new(store, runner), backend)
    }

    fn command() -> Command {
        Command::new(CommandKind::Screenshot, "take a screenshot")
    }

    #[tokio::test]
    async fn immediate_commands_run_synchronously() {
        let runner = CountingRunner::new();
        let (scheduler, _) = scheduler_with(runner.clone()).await;
        let task = scheduler
            .submit(command(), &TimeSpec::immediate("now"))
            .await
            .unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(runner.runs(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn scheduled_task_fires_at_its_time() {
        let runner = CountingRunner::new();
        let (scheduler, _) = scheduler_with(runner.clone()).await;
        let spec = TimeSpec::scheduled(Local::now() + Duration::milliseconds(200), "soon");
        let task = scheduler.submit(command(), &spec).await.unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(runner.runs(), 0);

        tokio::time::sleep(StdDuration::from_millis(300)).await;
        assert_eq!(runner.runs(), 1);
        assert_eq!(
            scheduler.store().get(&task.id).await.unwrap().status,
            TaskStatus::Completed
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_task_never_runs() {
        let runner = CountingRunner::new();
        let (scheduler, _) = scheduler_with(runner.clone()).await;
        let spec = TimeSpec::scheduled(Local::now() + Duration::milliseconds(500), "soon");
        let task = scheduler.submit(command(), &spec).await.unwrap();

        assert!(scheduler.cancel(&task.id).await.unwrap());
        tokio::time::sleep(StdDuration::from_millis(700)).await;
        assert_eq!(runner.runs(), 0);
        assert_eq!(
            scheduler.store().get(&task.id).await.unwrap().status,
            TaskStatus::Cancelled
        );
    }

    #[tokio::test]
    async fn cancel_after_completion_is_refused() {
        let runner = CountingRunner::new();
        let (scheduler, _) = scheduler_with(runner).await;
        let task = scheduler
            .submit(command(), &TimeSpec::immediate("now"))
            .await
            .unwrap();
        assert!(!scheduler.cancel(&task.id).await.unwrap());
        assert_eq!(
            scheduler.store().get(&task.id).await.unwrap().status,
            TaskStatus::Completed
        );
    }

    struct OverlapRunner {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        runs: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl TaskRunner for OverlapRunner {
        async fn run(&self, _command: &Command) -> ActionResult {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(StdDuration::from_millis(50)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.runs.fetch_add(1, Ordering::SeqCst);
            ActionResult::ok("done")
        }
    }

    #[tokio::test(start_paused = true)]
    async fn coincident_tasks_never_overlap_on_the_surface() {
        let runner = Arc::new(OverlapRunner {
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            runs: AtomicUsize::new(0),
        });
        let backend = Arc::new(MemoryStore::new());
        let store = Arc::new(TaskStore::open(backend).await.unwrap());
        let scheduler = TaskScheduler::new(store, runner.clone());

        // Two timers due at the same instant; their runs must serialize.
        let spec = TimeSpec::scheduled(Local::now() + Duration::milliseconds(100), "soon");
        scheduler.submit(command(), &spec).await.unwrap();
        scheduler.submit(command(), &spec).await.unwrap();

        tokio::time::sleep(StdDuration::from_millis(500)).await;
        assert_eq!(runner.runs.load(Ordering::SeqCst), 2);
        assert_eq!(runner.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn recovery_rearms_persisted_tasks() {
        let runner = CountingRunner::new();
        let backend = Arc::new(MemoryStore::new());
        {
            let store = Arc::new(TaskStore::open(backend.clone()).await.unwrap());
            let scheduler = TaskScheduler::new(store, runner.clone());
            let spec =
                TimeSpec::scheduled(Local::now() + Duration::milliseconds(100), "soon");
            scheduler.submit(command(), &spec).await.unwrap();
            // Shut down before the timer fires, as in a process restart.
            scheduler.shutdown();
        }
        assert_eq!(runner.runs(), 0);

        let store = Arc::new(TaskStore::open(backend).await.unwrap());
        let scheduler = TaskScheduler::new(store, runner.clone());
        assert_eq!(scheduler.recover().await.unwrap(), 1);
        tokio::time::sleep(StdDuration::from_millis(200)).await;
        assert_eq!(runner.runs(), 1);
    }

    #[tokio::test]
    async fn interrupted_running_tasks_fail_on_recovery() {
        let runner = CountingRunner::new();
        let backend = Arc::new(MemoryStore::new());
        let store = Arc::new(TaskStore::open(backend.clone()).await.unwrap());
        let mut task = Task::new(command(), Local::now());
        task.status = TaskStatus::Running;
        store.insert(task.clone()).await.unwrap();

        let scheduler = TaskScheduler::new(store, runner);
        scheduler.recover().await.unwrap();
        let recovered = scheduler.store().get(&task.id).await.unwrap();
        assert_eq!(recovered.status, TaskStatus::Failed);
        assert_eq!(recovered.error.as_deref(), Some("interrupted by restart"));
    }

    #[tokio::test(start_paused = true)]
    async fn events_follow_the_lifecycle() {
        let runner = CountingRunner::new();
        let (scheduler, _) = scheduler_with(runner).await;
        let mut events = scheduler.subscribe();
        let spec = TimeSpec::scheduled(Local::now() + Duration::milliseconds(100), "soon");
        let task = scheduler.submit(command(), &spec).await.unwrap();
        tokio::time::sleep(StdDuration::from_millis(200)).await;

        let mut kinds = Vec::new();
        while let Ok(event) = events.try_recv() {
            assert_eq!(event.task_id, task.id);
            kinds.push(event.kind);
        }
        assert_eq!(
            kinds,
            vec![
                TaskEventKind::Created,
                TaskEventKind::Started,
                TaskEventKind::Completed
            ]
        );
    }
}
