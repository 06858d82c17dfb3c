//! Structured commands produced by the interpreter.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A parsed instruction: what to do, carrying the original text for
/// diagnostics and task records.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub kind: CommandKind,
    /// The free-form text this command was interpreted from.
    pub raw_text: String,
}

impl Command {
    pub fn new(kind: CommandKind, raw_text: impl Into<String>) -> Self {
        Self {
            kind,
            raw_text: raw_text.into(),
        }
    }

    /// Unknown command with actionable suggestions for the user.
    pub fn unknown(raw_text: impl Into<String>, suggestions: Vec<String>) -> Self {
        Self::new(CommandKind::Unknown { suggestions }, raw_text)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self.kind, CommandKind::Unknown { .. })
    }

    pub fn is_workflow(&self) -> bool {
        matches!(self.kind, CommandKind::Workflow { .. })
    }
}

/// Closed set of actions the engine knows how to execute.
///
/// Every variant has exactly one handler in the executor; adding a variant
/// forces the match there to be updated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandKind {
    /// Load a URL and wait for the navigation lifecycle to settle.
    Navigate { url: String },
    /// Compound: open a site, then run a search on it.
    NavigateSearch {
        site: String,
        url: String,
        query: String,
    },
    /// Search on the current page.
    Search { query: String },
    /// Extract data from the current page (tables, links, or generic text).
    Extract { target: String },
    /// Click the element matching a natural-language description.
    Click { target: String },
    /// Type a value into a described field, or into the best input when no
    /// target was given.
    Input {
        target: Option<String>,
        value: String,
    },
    /// Fill several form fields independently.
    FormFill { fields: BTreeMap<String, String> },
    Wait { condition: WaitCondition },
    Screenshot,
    Download { target: String },
    /// Scroll the page by a fixed viewport step.
    Scroll,
    /// An ordered sequence of steps executed as one logical task.
    Workflow { steps: Vec<WorkflowStep> },
    /// Nothing matched; `suggestions` tells the user what would have.
    Unknown { suggestions: Vec<String> },
}

impl CommandKind {
    /// Stable name used in logs and task records.
    pub fn name(&self) -> &'static str {
        match self {
            CommandKind::Navigate { .. } => "navigate",
            CommandKind::NavigateSearch { .. } => "navigate_search",
            CommandKind::Search { .. } => "search",
            CommandKind::Extract { .. } => "extract",
            CommandKind::Click { .. } => "click",
            CommandKind::Input { .. } => "input",
            CommandKind::FormFill { .. } => "form_fill",
            CommandKind::Wait { .. } => "wait",
            CommandKind::Screenshot => "screenshot",
            CommandKind::Download { .. } => "download",
            CommandKind::Scroll => "scroll",
            CommandKind::Workflow { .. } => "workflow",
            CommandKind::Unknown { .. } => "unknown",
        }
    }
}

/// What a `wait` step is waiting for.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitCondition {
    /// Fixed pause.
    Duration { ms: u64 },
    /// Poll until an element matching the description appears.
    Element { description: String },
}

/// One step of a workflow. Steps are critical by default: a critical failure
/// aborts the remaining steps, a non-critical one is recorded and skipped.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub command: Command,
    #[serde(default = "default_critical")]
    pub critical: bool,
}

fn default_critical() -> bool {
    true
}

impl WorkflowStep {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            critical: true,
        }
    }

    pub fn optional(command: Command) -> Self {
        Self {
            command,
            critical: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workflow_steps_are_critical_by_default() {
        let step = WorkflowStep::new(Command::new(CommandKind::Screenshot, "screenshot"));
        assert!(step.critical);

        // Missing `critical` in persisted data defaults to true.
        let parsed: WorkflowStep = serde_json::from_str(
            r#"{"command":{"kind":{"type":"screenshot"},"raw_text":"screenshot"}}"#,
        )
        .unwrap();
        assert!(parsed.critical);
    }

    #[test]
    fn command_kind_names_are_stable() {
        assert_eq!(
            CommandKind::Navigate {
                url: "https://example.com".into()
            }
            .name(),
            "navigate"
        );
        assert_eq!(CommandKind::Screenshot.name(), "screenshot");
    }
}
