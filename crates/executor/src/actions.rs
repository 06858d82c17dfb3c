//! Single-action execution against a browser surface.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};
use webpilot_core_types::{ActionResult, CommandKind, FailurePhase, WaitCondition};
use webpilot_locator::{HybridResolver, PageProbe, ResolvedElement, ScriptProbe, StrategyKind};
use webpilot_surface::BrowserSurface;

use crate::errors::ExecutorError;
use crate::scripts;
use crate::search::{site_for_host, GENERIC_SEARCH_INPUTS, GENERIC_SEARCH_SUBMITS};

const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(15);
const ELEMENT_WAIT_TIMEOUT: Duration = Duration::from_secs(10);
const ELEMENT_POLL_INTERVAL: Duration = Duration::from_millis(500);
const EXTRACT_LIMIT: usize = 100;
const HISTORY_CAP: usize = 100;

/// One completed action, kept for diagnostics.
#[derive(Clone, Debug)]
pub struct ExecutionRecord {
    pub action: &'static str,
    pub success: bool,
    pub message: String,
}

/// Executes leaf commands. Workflows are driven by the
/// [`WorkflowRunner`](crate::WorkflowRunner), which calls back in here per
/// step.
pub struct ActionExecutor {
    surface: Arc<dyn BrowserSurface>,
    resolver: Arc<HybridResolver>,
    probe: ScriptProbe,
    history: Mutex<VecDeque<ExecutionRecord>>,
}

impl ActionExecutor {
    pub fn new(surface: Arc<dyn BrowserSurface>, resolver: Arc<HybridResolver>) -> Self {
        Self {
            probe: ScriptProbe::new(surface.clone()),
            surface,
            resolver,
            history: Mutex::new(VecDeque::new()),
        }
    }

    /// Execute one leaf action. Failures come back as unsuccessful results,
    /// not errors; the caller decides about retries.
    pub async fn execute(&self, kind: &CommandKind) -> ActionResult {
        debug!(action = kind.name(), "executing action");
        let result = match kind {
            CommandKind::Navigate { url } => self.navigate(url).await,
            CommandKind::NavigateSearch { url, query, .. } => {
                self.navigate_search(url, query).await
            }
            CommandKind::Search { query } => self.search(query).await,
            CommandKind::Extract { target } => self.extract(target).await,
            CommandKind::Click { target } => self.click(target).await,
            CommandKind::Input { target, value } => self.input(target.as_deref(), value).await,
            CommandKind::FormFill { fields } => {
                self.form_fill(fields.iter().map(|(k, v)| (k.as_str(), v.as_str())))
                    .await
            }
            CommandKind::Wait { condition } => self.wait(condition).await,
            CommandKind::Screenshot => self.screenshot().await,
            CommandKind::Download { target } => self.download(target).await,
            CommandKind::Scroll => self.scroll().await,
            CommandKind::Workflow { .. } => Err(ExecutorError::Action(
                "workflows must be run step by step".to_string(),
            )),
            CommandKind::Unknown { suggestions } => {
                let result = ActionResult::failed_with_data(
                    FailurePhase::Parse,
                    "command not understood",
                    json!({ "suggestions": suggestions }),
                );
                self.record(kind.name(), &result);
                return result;
            }
        };

        let result = match result {
            Ok(result) => result,
            Err(err) => {
                warn!(action = kind.name(), error = %err, "action failed");
                ActionResult::failed(err.phase(), err.to_string())
            }
        };
        self.record(kind.name(), &result);
        result
    }

    pub fn history(&self) -> Vec<ExecutionRecord> {
        self.history.lock().iter().cloned().collect()
    }

    fn record(&self, action: &'static str, result: &ActionResult) {
        let mut history = self.history.lock();
        if history.len() >= HISTORY_CAP {
            history.pop_front();
        }
        history.push_back(ExecutionRecord {
            action,
            success: result.success,
            message: result.message.clone(),
        });
    }

    async fn resolve(&self, description: &str) -> Result<ResolvedElement, ExecutorError> {
        Ok(self.resolver.resolve(description, &self.probe).await?)
    }

    /// Run a script expected to answer `{ ok: bool, error?: string }`.
    async fn run_ok_script(&self, js: &str) -> Result<(), ExecutorError> {
        let value = self.surface.execute_script(js).await?;
        let ok = value.get("ok").and_then(Value::as_bool).unwrap_or(false);
        if ok {
            Ok(())
        } else {
            let error = value
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("script reported failure");
            Err(ExecutorError::Action(error.to_string()))
        }
    }

    async fn click_resolved(&self, element: &ResolvedElement) -> Result<(), ExecutorError> {
        if element.source == StrategyKind::Vision {
            if let Some(bb) = &element.bounding_box {
                let (x, y) = bb.center();
                return self.run_ok_script(&scripts::click_at_percent(x, y)).await;
            }
        }
        self.run_ok_script(&scripts::click(&element.locator)).await
    }

    async fn navigate(&self, url: &str) -> Result<ActionResult, ExecutorError> {
        info!(url, "navigating");
        timeout(NAVIGATION_TIMEOUT, self.surface.navigate(url))
            .await
            .map_err(|_| ExecutorError::Timeout {
                what: "navigation",
                seconds: NAVIGATION_TIMEOUT.as_secs(),
            })??;
        Ok(ActionResult::ok(format!("opened {url}")))
    }

    async fn navigate_search(
        &self,
        url: &str,
        query: &str,
    ) -> Result<ActionResult, ExecutorError> {
        self.navigate(url).await?;
        self.search(query).await
    }

    /// Search on the current page: known sites by exact selectors, unknown
    /// ones by the generic input list. Submission is Enter first, then any
    /// submit button as backup.
    async fn search(&self, query: &str) -> Result<ActionResult, ExecutorError> {
        let host = self
            .surface
            .execute_script(&scripts::page_host())
            .await
            .ok()
            .and_then(|v| v.as_str().map(String::from))
            .unwrap_or_default();

        let site = site_for_host(&host);
        let mut inputs: Vec<&str> = Vec::new();
        if let Some(site) = site {
            inputs.push(site.input);
        }
        inputs.extend_from_slice(GENERIC_SEARCH_INPUTS);

        let mut input_selector = None;
        for selector in inputs {
            let found = self.surface.execute_script(&scripts::exists(selector)).await?;
            if found.as_bool().unwrap_or(false) {
                input_selector = Some(selector);
                break;
            }
        }
        let Some(input_selector) = input_selector else {
            // Last resort: ask the resolver, which can fall back to vision.
            let element = self.resolve("the search box").await?;
            self.run_ok_script(&scripts::set_value(&element.locator, query))
                .await?;
            self.run_ok_script(&scripts::press_enter(&element.locator))
                .await?;
            return Ok(ActionResult::ok(format!("searched for '{query}'")));
        };

        debug!(host = %host, selector = input_selector, "search input found");
        self.run_ok_script(&scripts::set_value(input_selector, query))
            .await?;
        self.run_ok_script(&scripts::press_enter(input_selector))
            .await?;

        // Some pages ignore synthetic Enter; clicking the button is harmless
        // when the submit already went through.
        let mut submits: Vec<&str> = Vec::new();
        if let Some(site) = site {
            submits.push(site.submit);
        }
        submits.extend_from_slice(GENERIC_SEARCH_SUBMITS);
        for selector in submits {
            let found = self.surface.execute_script(&scripts::exists(selector)).await?;
            if found.as_bool().unwrap_or(false) {
                let _ = self.run_ok_script(&scripts::click(selector)).await;
                break;
            }
        }

        Ok(ActionResult::ok(format!("searched for '{query}'")))
    }

    async fn extract(&self, target: &str) -> Result<ActionResult, ExecutorError> {
        let lower = target.to_lowercase();
        let (what, script) = if lower.contains("link") {
            ("links", scripts::extract_links(EXTRACT_LIMIT))
        } else if lower.contains("table") {
            ("tables", scripts::extract_tables(EXTRACT_LIMIT))
        } else {
            ("text blocks", scripts::extract_text(EXTRACT_LIMIT))
        };
        let data = self.surface.execute_script(&script).await?;
        let count = data.as_array().map(Vec::len).unwrap_or(0);
        Ok(ActionResult::ok_with_data(
            format!("extracted {count} {what}"),
            data,
        ))
    }

    async fn click(&self, target: &str) -> Result<ActionResult, ExecutorError> {
        let element = self.resolve(target).await?;
        self.click_resolved(&element).await?;
        Ok(ActionResult::ok(format!("clicked {target}")))
    }

    async fn input(
        &self,
        target: Option<&str>,
        value: &str,
    ) -> Result<ActionResult, ExecutorError> {
        let selector = match target {
            Some(target) => self.resolve(target).await?.locator,
            None => {
                // No target names the field; take the first visible input.
                let hits = self
                    .probe
                    .query_selector("input[type=text], input[type=search], input:not([type]), textarea")
                    .await
                    .map_err(ExecutorError::Resolution)?;
                hits.into_iter()
                    .next()
                    .map(|el| el.selector)
                    .ok_or_else(|| ExecutorError::Action("no input field on page".to_string()))?
            }
        };
        self.run_ok_script(&scripts::set_value(&selector, value))
            .await?;
        Ok(ActionResult::ok(format!("typed '{value}'")))
    }

    /// Fields are independent: one bad field does not void the rest, and the
    /// fill succeeds when at least one landed.
    async fn form_fill(
        &self,
        fields: impl Iterator<Item = (&str, &str)>,
    ) -> Result<ActionResult, ExecutorError> {
        let mut filled = Vec::new();
        let mut failed = Vec::new();
        for (field, value) in fields {
            let outcome = match self.resolve(field).await {
                Ok(element) => {
                    self.run_ok_script(&scripts::set_value(&element.locator, value))
                        .await
                }
                Err(err) => Err(err),
            };
            match outcome {
                Ok(()) => filled.push(field.to_string()),
                Err(err) => {
                    warn!(field, error = %err, "form field failed");
                    failed.push(field.to_string());
                }
            }
        }
        let data = json!({ "filled": filled, "failed": failed });
        if filled.is_empty() {
            Ok(ActionResult::failed_with_data(
                FailurePhase::Action,
                "no form field could be filled",
                data,
            ))
        } else {
            Ok(ActionResult::ok_with_data(
                format!("filled {} of {} fields", filled.len(), filled.len() + failed.len()),
                data,
            ))
        }
    }

    async fn wait(&self, condition: &WaitCondition) -> Result<ActionResult, ExecutorError> {
        match condition {
            WaitCondition::Duration { ms } => {
                sleep(Duration::from_millis(*ms)).await;
                Ok(ActionResult::ok(format!("waited {ms}ms")))
            }
            WaitCondition::Element { description } => {
                let deadline = tokio::time::Instant::now() + ELEMENT_WAIT_TIMEOUT;
                loop {
                    match self.resolver.resolve(description, &self.probe).await {
                        Ok(element) => {
                            return Ok(ActionResult::ok(format!(
                                "'{description}' appeared ({})",
                                element.locator
                            )));
                        }
                        Err(err) if !err.is_retryable() => {
                            return Err(ExecutorError::Resolution(err))
                        }
                        Err(_) => {}
                    }
                    if tokio::time::Instant::now() >= deadline {
                        return Err(ExecutorError::Timeout {
                            what: "element wait",
                            seconds: ELEMENT_WAIT_TIMEOUT.as_secs(),
                        });
                    }
                    sleep(ELEMENT_POLL_INTERVAL).await;
                }
            }
        }
    }

    async fn screenshot(&self) -> Result<ActionResult, ExecutorError> {
        let image = self.surface.capture_page().await?;
        Ok(ActionResult::ok_with_data(
            "captured page",
            json!({ "image_id": image.id, "bytes": image.bytes.len() }),
        ))
    }

    async fn download(&self, target: &str) -> Result<ActionResult, ExecutorError> {
        let element = self.resolve(target).await?;
        self.click_resolved(&element).await?;
        Ok(ActionResult::ok(format!("triggered download of {target}")))
    }

    async fn scroll(&self) -> Result<ActionResult, ExecutorError> {
        self.run_ok_script(&scripts::scroll_by_viewport()).await?;
        Ok(ActionResult::ok("scrolled"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use webpilot_locator::ResolvePolicy;
    use webpilot_surface::StaticSurface;

    fn executor_with(surface: Arc<StaticSurface>) -> ActionExecutor {
        let resolver = Arc::new(HybridResolver::new(ResolvePolicy::HtmlFirst));
        ActionExecutor::new(surface, resolver)
    }

    #[tokio::test]
    async fn navigate_reports_the_url() {
        let surface = Arc::new(StaticSurface::new());
        let executor = executor_with(surface.clone());
        let result = executor
            .execute(&CommandKind::Navigate {
                url: "https://www.baidu.com".into(),
            })
            .await;
        assert!(result.success);
        assert_eq!(surface.visited(), vec!["https://www.baidu.com".to_string()]);
    }

    #[tokio::test]
    async fn navigation_failure_carries_the_surface_phase() {
        let surface = Arc::new(StaticSurface::new());
        surface.fail_navigation("dns error");
        let executor = executor_with(surface);
        let result = executor
            .execute(&CommandKind::Navigate {
                url: "https://unreachable.example".into(),
            })
            .await;
        assert!(!result.success);
        assert!(result.error.as_deref().unwrap_or("").contains("[surface]"));
    }

    #[tokio::test]
    async fn unknown_command_fails_in_the_parse_phase() {
        let executor = executor_with(Arc::new(StaticSurface::new()));
        let result = executor
            .execute(&CommandKind::Unknown {
                suggestions: vec!["open baidu".into()],
            })
            .await;
        assert!(!result.success);
        assert!(result.error.as_deref().unwrap_or("").contains("[parse]"));
        assert!(result.data.is_some());
    }

    #[tokio::test]
    async fn extract_counts_returned_links() {
        let surface = Arc::new(StaticSurface::new());
        surface.set_script_handler(|_js| {
            Ok(json!([
                { "text": "First", "href": "https://a.example" },
                { "text": "Second", "href": "https://b.example" },
            ]))
        });
        let executor = executor_with(surface);
        let result = executor
            .execute(&CommandKind::Extract {
                target: "all links".into(),
            })
            .await;
        assert!(result.success);
        assert!(result.message.contains("2 links"));
        assert_eq!(result.data.unwrap().as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn wait_duration_resolves() {
        let executor = executor_with(Arc::new(StaticSurface::new()));
        let result = executor
            .execute(&CommandKind::Wait {
                condition: WaitCondition::Duration { ms: 5 },
            })
            .await;
        assert!(result.success);
    }

    #[tokio::test]
    async fn history_records_every_action() {
        let executor = executor_with(Arc::new(StaticSurface::new()));
        executor
            .execute(&CommandKind::Navigate {
                url: "https://www.baidu.com".into(),
            })
            .await;
        executor.execute(&CommandKind::Scroll).await;
        let history = executor.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].action, "navigate");
        assert_eq!(history[1].action, "scroll");
    }
}
