//! Lexical match against visible element text.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::probe::PageProbe;
use crate::types::{ResolvedElement, StrategyKind};
use crate::LocatorError;

use super::{lexical_score, LocateStrategy};

/// Quoted fragments name the element text verbatim.
static QUOTED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""([^"]+)"|'([^']+)'"#).expect("quoted text regex"));

/// Filler that describes the interaction, not the element.
const STOPWORDS: &[&str] = &[
    "the", "a", "an", "click", "press", "tap", "on", "button", "link", "element", "field",
];

fn search_needle(description: &str) -> String {
    if let Some(caps) = QUOTED.captures(description) {
        if let Some(m) = caps.get(1).or_else(|| caps.get(2)) {
            return m.as_str().to_string();
        }
    }
    description
        .split_whitespace()
        .filter(|w| !STOPWORDS.contains(&w.to_lowercase().as_str()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Scans interactive elements and scores their text against the description.
pub struct TextStrategy {
    /// Candidates below this score are not worth reporting.
    floor: f32,
}

impl TextStrategy {
    pub fn new() -> Self {
        Self { floor: 0.4 }
    }
}

impl Default for TextStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LocateStrategy for TextStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Text
    }

    async fn locate(
        &self,
        description: &str,
        probe: &dyn PageProbe,
    ) -> Result<Option<ResolvedElement>, LocatorError> {
        let needle = search_needle(description);
        if needle.is_empty() {
            return Ok(None);
        }
        let elements = probe.interactive_elements().await?;
        let best = elements
            .iter()
            .map(|el| (el, lexical_score(&needle, &el.text)))
            .max_by(|a, b| a.1.total_cmp(&b.1));
        match best {
            Some((el, score)) if score >= self.floor => {
                debug!(score, text = %el.text, "text match");
                Ok(Some(ResolvedElement {
                    locator: el.selector.clone(),
                    source: StrategyKind::Text,
                    // Exact text matches score 1.0 but DOM text is volatile,
                    // so cap below the hint strategy.
                    confidence: (0.85 * score).min(0.85),
                    bounding_box: el.bounding_box,
                    text: Some(el.text.clone()),
                    generation: probe.generation(),
                }))
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{ElementSnapshot, StaticProbe};

    fn login_page() -> StaticProbe {
        StaticProbe::new(vec![
            ElementSnapshot::interactive("button:nth-of-type(1)", "button", "Login"),
            ElementSnapshot::interactive("button:nth-of-type(2)", "button", "Register"),
            ElementSnapshot::interactive("a:nth-of-type(1)", "a", "Forgot password?"),
        ])
    }

    #[tokio::test]
    async fn exact_text_wins_over_partial() {
        let hit = TextStrategy::new()
            .locate("click the Login button", &login_page())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.locator, "button:nth-of-type(1)");
        assert_eq!(hit.text.as_deref(), Some("Login"));
    }

    #[tokio::test]
    async fn quoted_text_is_matched_verbatim() {
        let hit = TextStrategy::new()
            .locate(r#"click "Forgot password?""#, &login_page())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.locator, "a:nth-of-type(1)");
    }

    #[tokio::test]
    async fn weak_matches_are_suppressed() {
        assert!(TextStrategy::new()
            .locate("click the frobnicator", &login_page())
            .await
            .unwrap()
            .is_none());
    }
}
