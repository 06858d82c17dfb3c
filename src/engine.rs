//! Engine assembly: one surface, one resolver, one scheduler.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;
use webpilot_core_types::{ActionResult, Command, Task, TaskId, TimeSpec};
use webpilot_executor::{ActionExecutor, ExecutionRecord, WorkflowRunner};
use webpilot_interpreter::CommandInterpreter;
use webpilot_locator::{
    HybridResolver, LocatorError, ResolvedElement, ScriptProbe,
};
use webpilot_scheduler::{
    SchedulerError, TaskEvent, TaskRunner, TaskScheduler, TaskStore,
};
use webpilot_surface::{BrowserSurface, LanguageModelService, PersistenceStore};

use crate::engine_config::EngineConfig;

/// Bridges the scheduler's runner seam onto the workflow runner.
struct EngineRunner {
    workflows: Arc<WorkflowRunner>,
}

#[async_trait]
impl TaskRunner for EngineRunner {
    async fn run(&self, command: &Command) -> ActionResult {
        self.workflows.run(command).await
    }
}

/// The assembled automation engine.
///
/// Hosts construct it with their own surface, model service, and store
/// implementations; the CLI wires in the offline in-memory ones.
pub struct AutomationEngine {
    interpreter: CommandInterpreter,
    resolver: Arc<HybridResolver>,
    executor: Arc<ActionExecutor>,
    workflows: Arc<WorkflowRunner>,
    probe: ScriptProbe,
    scheduler: Arc<TaskScheduler>,
}

impl AutomationEngine {
    pub async fn new(
        surface: Arc<dyn BrowserSurface>,
        model: Option<Arc<dyn LanguageModelService>>,
        store: Arc<dyn PersistenceStore>,
        config: &EngineConfig,
    ) -> Result<Self, SchedulerError> {
        let interpreter = match &model {
            Some(model) => CommandInterpreter::with_model(model.clone()),
            None => CommandInterpreter::new(),
        };
        let resolver = Arc::new(match &model {
            Some(model) => HybridResolver::with_model(config.policy, model.clone()),
            None => HybridResolver::new(config.policy),
        });
        let executor = Arc::new(ActionExecutor::new(surface.clone(), resolver.clone()));
        let workflows = Arc::new(
            WorkflowRunner::new(executor.clone())
                .with_retries(config.retries)
                .with_step_delay(Duration::from_millis(config.step_delay_ms)),
        );
        let task_store = Arc::new(TaskStore::open(store).await?);
        let scheduler = TaskScheduler::new(
            task_store,
            Arc::new(EngineRunner {
                workflows: workflows.clone(),
            }),
        );
        scheduler.recover().await?;
        info!(policy = config.policy.name(), "engine ready");

        Ok(Self {
            interpreter,
            resolver,
            executor,
            workflows,
            probe: ScriptProbe::new(surface),
            scheduler,
        })
    }

    /// Interpret without executing.
    pub async fn interpret(&self, text: &str) -> (Command, TimeSpec) {
        self.interpreter.interpret(text).await
    }

    /// Interpret and run (or schedule) one instruction. Immediate commands
    /// complete before this returns; scheduled ones come back pending.
    pub async fn run(&self, text: &str) -> Result<Task, SchedulerError> {
        let (command, spec) = self.interpreter.interpret(text).await;
        self.scheduler.submit(command, &spec).await
    }

    /// Run an already-interpreted command on the surface, bypassing the
    /// scheduler. Workflows get retries and step pacing like any other run.
    pub async fn execute(&self, command: &Command) -> ActionResult {
        self.workflows.run(command).await
    }

    /// Submit an already-interpreted command to the scheduler. Immediate
    /// specs run to completion; scheduled ones come back pending.
    pub async fn create_task(
        &self,
        command: Command,
        spec: &TimeSpec,
    ) -> Result<Task, SchedulerError> {
        self.scheduler.submit(command, spec).await
    }

    /// Resolve an element description against the current page.
    pub async fn resolve_element(
        &self,
        description: &str,
    ) -> Result<ResolvedElement, LocatorError> {
        self.resolver.resolve(description, &self.probe).await
    }

    pub async fn cancel_task(&self, id: &TaskId) -> Result<bool, SchedulerError> {
        self.scheduler.cancel(id).await
    }

    pub async fn list_tasks(&self) -> Vec<Task> {
        self.scheduler.list().await
    }

    pub fn task_events(&self) -> tokio::sync::broadcast::Receiver<TaskEvent> {
        self.scheduler.subscribe()
    }

    /// Recent actions, oldest first.
    pub fn action_history(&self) -> Vec<ExecutionRecord> {
        self.executor.history()
    }

    pub fn shutdown(&self) {
        self.scheduler.shutdown();
    }
}
