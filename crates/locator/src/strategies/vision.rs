//! Model-based screenshot analysis.
//!
//! The model is asked to enumerate interactive elements with percentage
//! bounding boxes. Analyses are cached briefly, keyed by screenshot content,
//! because consecutive resolutions within one page interaction see the same
//! pixels.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};
use webpilot_surface::LanguageModelService;

use crate::probe::PageProbe;
use crate::types::{BoundingBox, ResolvedElement, StrategyKind};
use crate::LocatorError;

use super::{lexical_score, LocateStrategy};

pub const DEFAULT_VISION_TTL: Duration = Duration::from_secs(30);

/// Ceiling on one model round trip; a stuck service falls back to the
/// default layout instead of stalling resolution.
const MODEL_TIMEOUT: Duration = Duration::from_secs(60);

static JSON_ARRAY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\[.*\]").expect("json array regex"));

const ANALYZE_PROMPT: &str = r#"List the interactive elements visible in this page screenshot.
Respond with a JSON array only. Each entry:
  {"label": "<visible text or purpose>",
   "kind": "<button|input|link|select|other>",
   "confidence": <0.0-1.0>,
   "box": {"x": <percent>, "y": <percent>, "width": <percent>, "height": <percent>}}
Coordinates are percentages of the full image. List at most 20 elements."#;

#[derive(Clone, Debug, Deserialize)]
struct VisionElement {
    label: String,
    #[serde(default)]
    kind: String,
    #[serde(default = "default_confidence")]
    confidence: f32,
    #[serde(rename = "box")]
    bounding_box: BoundingBox,
}

fn default_confidence() -> f32 {
    0.5
}

/// When the model is down or returns garbage, assume a conventional page
/// layout instead of failing the whole resolution.
fn default_elements() -> Vec<VisionElement> {
    let entry = |label: &str, kind: &str, x: f32, y: f32, w: f32, h: f32| VisionElement {
        label: label.to_string(),
        kind: kind.to_string(),
        confidence: 0.3,
        bounding_box: BoundingBox {
            x,
            y,
            width: w,
            height: h,
        },
    };
    vec![
        entry("search box", "input", 30.0, 8.0, 40.0, 5.0),
        entry("search button", "button", 72.0, 8.0, 8.0, 5.0),
        entry("login button", "button", 88.0, 3.0, 8.0, 4.0),
        entry("submit button", "button", 45.0, 70.0, 10.0, 5.0),
        entry("main content", "other", 10.0, 20.0, 80.0, 60.0),
    ]
}

struct CacheEntry {
    at: Instant,
    elements: Vec<VisionElement>,
}

pub struct VisionStrategy {
    model: Arc<dyn LanguageModelService>,
    cache: DashMap<String, CacheEntry>,
    ttl: Duration,
}

impl VisionStrategy {
    pub fn new(model: Arc<dyn LanguageModelService>) -> Self {
        Self::with_ttl(model, DEFAULT_VISION_TTL)
    }

    pub fn with_ttl(model: Arc<dyn LanguageModelService>, ttl: Duration) -> Self {
        Self {
            model,
            cache: DashMap::new(),
            ttl,
        }
    }

    async fn analyze(&self, probe: &dyn PageProbe) -> Result<Vec<VisionElement>, LocatorError> {
        let image = probe.capture().await?;
        let key = blake3::hash(&image.bytes).to_hex().to_string();

        if let Some(entry) = self.cache.get(&key) {
            if entry.at.elapsed() < self.ttl {
                debug!("vision cache hit");
                return Ok(entry.elements.clone());
            }
        }

        let answer =
            tokio::time::timeout(MODEL_TIMEOUT, self.model.complete(ANALYZE_PROMPT, Some(&image)))
                .await;
        let elements = match answer {
            Ok(Ok(raw)) => Self::parse_elements(&raw).unwrap_or_else(|| {
                warn!("vision response had no usable element list, using defaults");
                default_elements()
            }),
            Ok(Err(err)) => {
                warn!(error = %err, "vision analysis unavailable, using defaults");
                default_elements()
            }
            Err(_) => {
                warn!("vision analysis timed out, using defaults");
                default_elements()
            }
        };

        self.cache.retain(|_, v| v.at.elapsed() < self.ttl);
        self.cache.insert(
            key,
            CacheEntry {
                at: Instant::now(),
                elements: elements.clone(),
            },
        );
        Ok(elements)
    }

    fn parse_elements(raw: &str) -> Option<Vec<VisionElement>> {
        let span = JSON_ARRAY.find(raw)?.as_str();
        let parsed: Vec<VisionElement> = serde_json::from_str(span).ok()?;
        let valid: Vec<VisionElement> = parsed
            .into_iter()
            .filter(|e| {
                !e.label.trim().is_empty()
                    && e.bounding_box.x >= 0.0
                    && e.bounding_box.y >= 0.0
                    && e.bounding_box.x + e.bounding_box.width <= 100.0
                    && e.bounding_box.y + e.bounding_box.height <= 100.0
            })
            .collect();
        (!valid.is_empty()).then_some(valid)
    }

    /// Lexical match weighted by the model's own confidence; the kind word
    /// ("button", "input") nudges ties toward the right element class.
    fn score(description: &str, element: &VisionElement) -> f32 {
        let mut score = lexical_score(description, &element.label);
        if !element.kind.is_empty() && description.to_lowercase().contains(&element.kind) {
            score = (score + 0.1).min(1.0);
        }
        score * element.confidence.clamp(0.0, 1.0)
    }
}

#[async_trait]
impl LocateStrategy for VisionStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Vision
    }

    async fn locate(
        &self,
        description: &str,
        probe: &dyn PageProbe,
    ) -> Result<Option<ResolvedElement>, LocatorError> {
        let elements = self.analyze(probe).await?;
        let best = elements
            .iter()
            .map(|el| (el, Self::score(description, el)))
            .max_by(|a, b| a.1.total_cmp(&b.1));
        match best {
            Some((el, score)) if score >= 0.25 => {
                let (cx, cy) = el.bounding_box.center();
                debug!(score, label = %el.label, "vision match");
                Ok(Some(ResolvedElement {
                    locator: format!("point({cx:.1}%, {cy:.1}%)"),
                    source: StrategyKind::Vision,
                    confidence: score.min(1.0),
                    bounding_box: Some(el.bounding_box),
                    text: Some(el.label.clone()),
                    generation: probe.generation(),
                }))
            }
            _ => Ok(None),
        }
    }
}
