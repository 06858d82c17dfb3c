//! The command interpretation cascade.
//!
//! Order: explicit workflow markers, connective splitting, the rule table,
//! the model fallback, and finally `Unknown` with suggestions. Each stage
//! only runs when the previous one produced nothing.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};
use webpilot_core_types::{Command, CommandKind, TimeSpec, WorkflowStep};
use webpilot_surface::LanguageModelService;

use crate::llm::parse_with_model;
use crate::rules::match_rules;
use crate::suggest::command_suggestions;
use crate::time::TimeResolver;

/// Numbered-list steps: "1. open baidu 2. search rust".
static NUMBERED_STEP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)\d+[.)、]\s*").expect("numbered step regex"));

/// Connectives that join steps in a single sentence.
static CONNECTIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*(?:,\s*then\s+|;\s*|\bthen\b|\band then\b|然后)\s*").expect("connective regex"));

/// Explicit workflow phrasing: everything after the marker is steps.
static WORKFLOW_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:build|create|make|run)\s+a\s+workflow\s*[:,]?\s*")
        .expect("workflow marker regex")
});

/// Turns free-form instructions into structured [`Command`]s.
///
/// The model service is optional at construction: without one the cascade
/// simply skips the fallback stage.
pub struct CommandInterpreter {
    model: Option<Arc<dyn LanguageModelService>>,
}

impl CommandInterpreter {
    pub fn new() -> Self {
        Self { model: None }
    }

    pub fn with_model(model: Arc<dyn LanguageModelService>) -> Self {
        Self { model: Some(model) }
    }

    /// Interpret one instruction, also resolving any schedule phrase in it.
    pub async fn interpret(&self, text: &str) -> (Command, TimeSpec) {
        let spec = TimeResolver::resolve(text);
        (self.interpret_command(text).await, spec)
    }

    /// Interpret the action part only. Never fails: the worst case is an
    /// `Unknown` command carrying suggestions.
    pub async fn interpret_command(&self, text: &str) -> Command {
        let text = text.trim();
        if text.is_empty() {
            return Command::unknown(text, command_suggestions(text));
        }

        if let Some(m) = WORKFLOW_MARKER.find(text) {
            let rest = text[m.end()..].trim();
            if !rest.is_empty() {
                let steps = self.forced_workflow(rest).await;
                info!(steps = steps.len(), "interpreted explicit workflow");
                return Command::new(CommandKind::Workflow { steps }, text);
            }
        }

        if let Some(steps) = self.numbered_workflow(text).await {
            info!(steps = steps.len(), "interpreted numbered workflow");
            return Command::new(CommandKind::Workflow { steps }, text);
        }

        if let Some(steps) = self.connective_workflow(text).await {
            info!(steps = steps.len(), "interpreted connective workflow");
            return Command::new(CommandKind::Workflow { steps }, text);
        }

        if let Some((rule, kind)) = match_rules(text) {
            debug!(rule, "rule matched");
            return Command::new(kind, text);
        }

        if let Some(model) = &self.model {
            if let Some(command) = parse_with_model(model.as_ref(), text).await {
                return command;
            }
        }

        Command::unknown(text, command_suggestions(text))
    }

    /// After an explicit marker, split however the text allows and take the
    /// result even when it is a single step.
    async fn forced_workflow(&self, rest: &str) -> Vec<WorkflowStep> {
        let splitter = if NUMBERED_STEP.find_iter(rest).count() >= 2 {
            &*NUMBERED_STEP
        } else {
            &*CONNECTIVE
        };
        let parts: Vec<&str> = splitter
            .split(rest)
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        self.parse_steps(&parts).await
    }

    /// Split "1. foo 2. bar" into steps. Requires at least two items so a
    /// stray leading number does not turn a single command into a workflow.
    async fn numbered_workflow(&self, text: &str) -> Option<Vec<WorkflowStep>> {
        if NUMBERED_STEP.find_iter(text).count() < 2 {
            return None;
        }
        let parts: Vec<&str> = NUMBERED_STEP
            .split(text)
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        if parts.len() < 2 {
            return None;
        }
        Some(self.parse_steps(&parts).await)
    }

    /// Split on connectives, but only commit to a workflow when at least two
    /// fragments parse by rule. A sentence like "wait until then" must not be
    /// shredded by its own vocabulary.
    async fn connective_workflow(&self, text: &str) -> Option<Vec<WorkflowStep>> {
        let parts: Vec<&str> = CONNECTIVE
            .split(text)
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        if parts.len() < 2 {
            return None;
        }
        let parsed = parts.iter().filter(|p| match_rules(p).is_some()).count();
        if parsed < 2 {
            return None;
        }
        Some(self.parse_steps(&parts).await)
    }

    /// Parse each fragment through the single-command cascade. Fragments
    /// nothing understands become non-critical unknown steps so the rest of
    /// the workflow still runs.
    async fn parse_steps(&self, parts: &[&str]) -> Vec<WorkflowStep> {
        let mut steps = Vec::with_capacity(parts.len());
        for part in parts {
            let command = match match_rules(part) {
                Some((_, kind)) => Command::new(kind, *part),
                None => match &self.model {
                    Some(model) => match parse_with_model(model.as_ref(), part).await {
                        Some(command) => command,
                        None => Command::unknown(*part, Vec::new()),
                    },
                    None => Command::unknown(*part, Vec::new()),
                },
            };
            let step = if command.is_unknown() {
                WorkflowStep::optional(command)
            } else {
                WorkflowStep::new(command)
            };
            steps.push(step);
        }
        steps
    }
}

impl Default for CommandInterpreter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use webpilot_core_types::WaitCondition;
    use webpilot_surface::StaticModel;

    fn steps_of(command: Command) -> Vec<WorkflowStep> {
        match command.kind {
            CommandKind::Workflow { steps } => steps,
            other => panic!("expected workflow, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn compound_search_parses_as_one_command() {
        let interpreter = CommandInterpreter::new();
        let command = interpreter
            .interpret_command("open baidu and search for rust books")
            .await;
        assert_eq!(
            command.kind,
            CommandKind::NavigateSearch {
                site: "baidu".into(),
                url: "https://www.baidu.com".into(),
                query: "rust books".into(),
            }
        );
    }

    #[tokio::test]
    async fn numbered_list_becomes_a_workflow() {
        let interpreter = CommandInterpreter::new();
        let command = interpreter
            .interpret_command("1. open zhihu 2. wait 2 seconds 3. take a screenshot")
            .await;
        let steps = steps_of(command);
        assert_eq!(steps.len(), 3);
        assert_eq!(
            steps[0].command.kind,
            CommandKind::Navigate {
                url: "https://www.zhihu.com".into()
            }
        );
        assert_eq!(
            steps[1].command.kind,
            CommandKind::Wait {
                condition: WaitCondition::Duration { ms: 2000 }
            }
        );
        assert_eq!(steps[2].command.kind, CommandKind::Screenshot);
    }

    #[tokio::test]
    async fn explicit_workflow_phrasing_forces_steps() {
        let interpreter = CommandInterpreter::new();
        let command = interpreter
            .interpret_command("build a workflow: open baidu then take a screenshot")
            .await;
        let steps = steps_of(command);
        assert_eq!(steps.len(), 2);
        assert_eq!(
            steps[0].command.kind,
            CommandKind::Navigate {
                url: "https://www.baidu.com".into()
            }
        );
    }

    #[tokio::test]
    async fn then_splits_when_both_sides_parse() {
        let interpreter = CommandInterpreter::new();
        let command = interpreter
            .interpret_command("open baidu then take a screenshot")
            .await;
        let steps = steps_of(command);
        assert_eq!(steps.len(), 2);
        assert!(steps.iter().all(|s| s.critical));
    }

    #[tokio::test]
    async fn then_does_not_split_a_single_command() {
        let interpreter = CommandInterpreter::new();
        let command = interpreter
            .interpret_command("click the now and then button")
            .await;
        // One rule match only, so the connective splitter stands down.
        assert!(matches!(command.kind, CommandKind::Click { .. }));
    }

    #[tokio::test]
    async fn model_fallback_runs_after_rules() {
        let model = StaticModel::new(r#"{"action": "search", "query": "weather in tokyo"}"#);
        let interpreter = CommandInterpreter::with_model(Arc::new(model));
        let command = interpreter
            .interpret_command("what's the weather like in tokyo?")
            .await;
        assert_eq!(
            command.kind,
            CommandKind::Search {
                query: "weather in tokyo".into()
            }
        );
    }

    #[tokio::test]
    async fn unparseable_text_yields_suggestions() {
        let interpreter = CommandInterpreter::new();
        let command = interpreter.interpret_command("florble the wurble").await;
        match command.kind {
            CommandKind::Unknown { suggestions } => assert!(!suggestions.is_empty()),
            other => panic!("expected unknown, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn schedule_phrase_rides_along() {
        let interpreter = CommandInterpreter::new();
        let (command, spec) = interpreter.interpret("tomorrow 9am search weather").await;
        assert_eq!(
            command.kind,
            CommandKind::Search {
                query: "weather".into()
            }
        );
        assert!(!spec.is_immediate());
    }
}
