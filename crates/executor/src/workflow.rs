//! Multi-step execution with retries.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::time::sleep;
use tracing::{info, warn};
use webpilot_core_types::{ActionResult, Command, CommandKind, FailurePhase, WorkflowStep};

use crate::actions::ActionExecutor;

const DEFAULT_RETRIES: u32 = 3;
const DEFAULT_STEP_DELAY: Duration = Duration::from_millis(1000);

/// Drives commands through the executor: leaf commands directly, workflows
/// step by step with retries, settle delays, and critical-failure aborts.
pub struct WorkflowRunner {
    executor: Arc<ActionExecutor>,
    retries: u32,
    step_delay: Duration,
}

impl WorkflowRunner {
    pub fn new(executor: Arc<ActionExecutor>) -> Self {
        Self {
            executor,
            retries: DEFAULT_RETRIES,
            step_delay: DEFAULT_STEP_DELAY,
        }
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    /// Run any command to completion.
    pub async fn run(&self, command: &Command) -> ActionResult {
        match &command.kind {
            CommandKind::Workflow { steps } => self.run_steps(steps).await,
            kind => self.run_with_retries(kind).await,
        }
    }

    /// Steps run in order with a settle delay between them. A failing
    /// critical step aborts the remainder; non-critical failures are
    /// recorded and skipped.
    async fn run_steps(&self, steps: &[WorkflowStep]) -> ActionResult {
        let mut outcomes = Vec::with_capacity(steps.len());
        let mut failed = 0usize;

        for (index, step) in steps.iter().enumerate() {
            if index > 0 {
                sleep(self.step_delay).await;
            }
            let result = self.run_with_retries(&step.command.kind).await;
            info!(
                step = index + 1,
                action = step.command.kind.name(),
                success = result.success,
                "workflow step finished"
            );
            let aborting = !result.success && step.critical;
            if !result.success {
                failed += 1;
            }
            outcomes.push(json!({
                "step": index + 1,
                "action": step.command.kind.name(),
                "success": result.success,
                "message": result.message,
                "error": result.error,
            }));
            if aborting {
                warn!(step = index + 1, "critical step failed, aborting workflow");
                return ActionResult::failed_with_data(
                    FailurePhase::Action,
                    format!(
                        "workflow aborted at step {} of {}: {}",
                        index + 1,
                        steps.len(),
                        result.message
                    ),
                    json!({ "steps": outcomes }),
                );
            }
        }

        let completed = steps.len() - failed;
        let summary = format!("workflow finished: {completed} of {} steps succeeded", steps.len());
        if completed == 0 && !steps.is_empty() {
            ActionResult::failed_with_data(FailurePhase::Action, summary, json!({ "steps": outcomes }))
        } else {
            ActionResult::ok_with_data(summary, json!({ "steps": outcomes }))
        }
    }

    /// Retry failed attempts with a linearly growing pause. Parse failures
    /// are final; retrying cannot make an unknown command understood.
    async fn run_with_retries(&self, kind: &CommandKind) -> ActionResult {
        let mut last = self.executor.execute(kind).await;
        if last.success || matches!(kind, CommandKind::Unknown { .. }) {
            return last;
        }
        for attempt in 1..self.retries {
            sleep(self.step_delay * attempt).await;
            warn!(
                action = kind.name(),
                attempt = attempt + 1,
                "retrying failed action"
            );
            last = self.executor.execute(kind).await;
            if last.success {
                return last;
            }
        }
        last
    }
}
