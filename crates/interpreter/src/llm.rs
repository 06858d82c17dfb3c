//! Model-backed fallback parser for commands the rule table rejects.

use std::collections::BTreeMap;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};
use webpilot_core_types::{Command, CommandKind, WaitCondition, WorkflowStep};
use webpilot_surface::LanguageModelService;

use crate::sites::canonical_site_url;

/// Models wrap JSON in prose; pull the widest brace-delimited span.
static JSON_SPAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("json span regex"));

const PARSE_PROMPT: &str = r#"You convert a browser automation instruction into JSON.
Respond with a single JSON object and nothing else. Schema:
  {"action": "<one of: navigate, search, navigate_search, extract, click, input, form_fill, wait, screenshot, download, scroll, workflow, unknown>",
   "url": "...", "site": "...", "query": "...", "target": "...", "value": "...",
   "fields": {"name": "value"}, "wait_ms": 1000,
   "steps": [{"action": "...", ...}]}
Include only the keys the action needs. Use "unknown" if the instruction is
not a browser action.

Instruction: "#;

/// Ceiling on one model round trip; a stuck service must not stall the
/// interpret path.
const MODEL_TIMEOUT: Duration = Duration::from_secs(60);

/// Ask the model to structure the instruction. `None` when the service is
/// unreachable or its answer is unusable; the caller falls back to
/// suggestions.
pub(crate) async fn parse_with_model(
    service: &dyn LanguageModelService,
    text: &str,
) -> Option<Command> {
    let prompt = format!("{PARSE_PROMPT}{text}");
    let raw = match tokio::time::timeout(MODEL_TIMEOUT, service.complete(&prompt, None)).await {
        Ok(Ok(raw)) => raw,
        Ok(Err(err)) => {
            warn!(error = %err, "model parse unavailable");
            return None;
        }
        Err(_) => {
            warn!("model parse timed out");
            return None;
        }
    };
    let span = JSON_SPAN.find(&raw)?.as_str();
    let value: Value = match serde_json::from_str(span) {
        Ok(value) => value,
        Err(err) => {
            warn!(error = %err, "model returned malformed json");
            return None;
        }
    };
    let kind = kind_from_value(&value)?;
    debug!(action = kind.name(), "model parsed command");
    Some(Command::new(kind, text))
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Map the model's object onto the closed command set. Unknown actions and
/// objects missing their required keys are rejected, not guessed at.
fn kind_from_value(value: &Value) -> Option<CommandKind> {
    let action = value.get("action").and_then(Value::as_str)?;
    match action {
        "navigate" => {
            let target = str_field(value, "url").or_else(|| str_field(value, "site"))?;
            Some(CommandKind::Navigate {
                url: canonical_site_url(&target),
            })
        }
        "navigate_search" => {
            let site = str_field(value, "site")?;
            let query = str_field(value, "query")?;
            let url = str_field(value, "url").unwrap_or_else(|| canonical_site_url(&site));
            Some(CommandKind::NavigateSearch { site, url, query })
        }
        "search" => Some(CommandKind::Search {
            query: str_field(value, "query")?,
        }),
        "extract" => Some(CommandKind::Extract {
            target: str_field(value, "target").unwrap_or_else(|| "content".to_string()),
        }),
        "click" => Some(CommandKind::Click {
            target: str_field(value, "target")?,
        }),
        "input" => Some(CommandKind::Input {
            target: str_field(value, "target"),
            value: str_field(value, "value")?,
        }),
        "form_fill" => {
            let mut fields = BTreeMap::new();
            for (key, val) in value.get("fields")?.as_object()? {
                if let Some(val) = val.as_str() {
                    fields.insert(key.clone(), val.to_string());
                }
            }
            if fields.is_empty() {
                return None;
            }
            Some(CommandKind::FormFill { fields })
        }
        "wait" => {
            if let Some(ms) = value.get("wait_ms").and_then(Value::as_u64) {
                Some(CommandKind::Wait {
                    condition: WaitCondition::Duration { ms },
                })
            } else {
                Some(CommandKind::Wait {
                    condition: WaitCondition::Element {
                        description: str_field(value, "target")?,
                    },
                })
            }
        }
        "screenshot" => Some(CommandKind::Screenshot),
        "download" => Some(CommandKind::Download {
            target: str_field(value, "target")?,
        }),
        "scroll" => Some(CommandKind::Scroll),
        "workflow" => {
            let steps = value.get("steps")?.as_array()?;
            let mut parsed = Vec::with_capacity(steps.len());
            for step in steps {
                let kind = kind_from_value(step)?;
                let raw = str_field(step, "raw").unwrap_or_else(|| kind.name().to_string());
                parsed.push(WorkflowStep::new(Command::new(kind, raw)));
            }
            if parsed.is_empty() {
                return None;
            }
            Some(CommandKind::Workflow { steps: parsed })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use webpilot_surface::{FailingModel, StaticModel};

    #[tokio::test]
    async fn structured_answer_becomes_a_command() {
        let model = StaticModel::new(r#"Sure! {"action": "search", "query": "rust books"}"#);
        let parsed = parse_with_model(&model, "find me something about rust books")
            .await
            .unwrap();
        assert_eq!(
            parsed.kind,
            CommandKind::Search {
                query: "rust books".into()
            }
        );
    }

    #[tokio::test]
    async fn workflow_answer_produces_steps() {
        let model = StaticModel::new(
            r#"{"action": "workflow", "steps": [
                {"action": "navigate", "url": "https://www.baidu.com"},
                {"action": "screenshot"}
            ]}"#,
        );
        let parsed = parse_with_model(&model, "open baidu then snap it").await.unwrap();
        match parsed.kind {
            CommandKind::Workflow { steps } => {
                assert_eq!(steps.len(), 2);
                assert!(steps.iter().all(|s| s.critical));
            }
            other => panic!("expected workflow, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_action_is_rejected() {
        let model = StaticModel::new(r#"{"action": "levitate"}"#);
        assert!(parse_with_model(&model, "levitate the page").await.is_none());
    }

    #[tokio::test]
    async fn unreachable_service_is_tolerated() {
        let model = FailingModel;
        assert!(parse_with_model(&model, "anything").await.is_none());
    }

    #[tokio::test]
    async fn prose_without_json_is_rejected() {
        let model = StaticModel::new("I cannot help with that.");
        assert!(parse_with_model(&model, "do a thing").await.is_none());
    }
}
