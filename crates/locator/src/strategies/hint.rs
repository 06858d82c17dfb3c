//! Explicit selector hints embedded in the description.
//!
//! Users (and upstream tooling) sometimes know exactly what they want:
//! "click #submit", "the input with name=q". Those hints beat every
//! heuristic, so this strategy reports the highest confidence of the DOM
//! strategies when its selector actually matches.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::probe::PageProbe;
use crate::types::{ResolvedElement, StrategyKind};
use crate::LocatorError;

use super::LocateStrategy;

static ID_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"#[A-Za-z][\w-]*").expect("id token regex"));
static CLASS_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.[A-Za-z][\w-]*").expect("class token regex"));
static KV_HINT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\b(id|class|name|type|placeholder)\s*=\s*"?([\w-]+)"?"#)
        .expect("key=value hint regex")
});

/// Selectors extracted from the description, most specific first.
fn extract_hints(description: &str) -> Vec<String> {
    let mut hints = Vec::new();
    for m in ID_TOKEN.find_iter(description) {
        hints.push(m.as_str().to_string());
    }
    for caps in KV_HINT.captures_iter(description) {
        let key = caps[1].to_lowercase();
        let value = &caps[2];
        match key.as_str() {
            "id" => hints.push(format!("#{value}")),
            "class" => hints.push(format!(".{value}")),
            _ => hints.push(format!("[{key}={value}]")),
        }
    }
    for m in CLASS_TOKEN.find_iter(description) {
        hints.push(m.as_str().to_string());
    }
    hints.dedup();
    hints
}

pub struct HintStrategy;

#[async_trait]
impl LocateStrategy for HintStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Hint
    }

    async fn locate(
        &self,
        description: &str,
        probe: &dyn PageProbe,
    ) -> Result<Option<ResolvedElement>, LocatorError> {
        for hint in extract_hints(description) {
            let hits = probe.query_selector(&hint).await?;
            if let Some(hit) = hits.into_iter().next() {
                debug!(hint = %hint, "selector hint hit");
                return Ok(Some(ResolvedElement {
                    locator: hit.selector.clone(),
                    source: StrategyKind::Hint,
                    confidence: 0.95,
                    bounding_box: hit.bounding_box,
                    text: (!hit.text.is_empty()).then(|| hit.text.clone()),
                    generation: probe.generation(),
                }));
            }
        }
        Ok(None)
    }
}
