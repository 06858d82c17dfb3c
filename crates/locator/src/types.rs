//! Resolution results and tuning knobs.

use serde::{Deserialize, Serialize};

/// Which strategy produced a candidate. Also the key for telemetry counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Predefined selector tables keyed by element category.
    Selector,
    /// Explicit selector hints embedded in the description.
    Hint,
    /// Lexical match against visible element text.
    Text,
    /// Model-based screenshot analysis.
    Vision,
}

impl StrategyKind {
    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::Selector => "selector",
            StrategyKind::Hint => "hint",
            StrategyKind::Text => "text",
            StrategyKind::Vision => "vision",
        }
    }
}

/// Box in percentages of the viewport, so it survives window resizes between
/// capture and use.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Whether two boxes plausibly describe the same element: their centers
    /// fall inside each other, or they overlap at all.
    pub fn corroborates(&self, other: &BoundingBox) -> bool {
        let (cx, cy) = other.center();
        let center_inside = cx >= self.x
            && cx <= self.x + self.width
            && cy >= self.y
            && cy <= self.y + self.height;
        let overlap = self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height;
        center_inside || overlap
    }
}

/// A located element, good for exactly one page generation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResolvedElement {
    /// CSS selector, or for pure vision hits a synthetic point locator.
    pub locator: String,
    pub source: StrategyKind,
    /// In `[0.0, 1.0]`; corroboration may boost but never past 1.0.
    pub confidence: f32,
    pub bounding_box: Option<BoundingBox>,
    pub text: Option<String>,
    /// Page generation the resolution was made in.
    pub generation: u64,
}

impl ResolvedElement {
    /// Apply the corroboration boost, saturating at 1.0.
    pub fn boost(&mut self, amount: f32) {
        self.confidence = (self.confidence + amount).min(1.0);
    }
}

/// How DOM and vision evidence are combined.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolvePolicy {
    /// DOM strategies first; vision only consulted when the best DOM
    /// candidate is weak.
    #[default]
    HtmlFirst,
    /// Vision first, DOM as backup. For visually-driven pages.
    VisionFirst,
    /// DOM and vision concurrently; agreement boosts confidence.
    Fusion,
    /// Each strategy in fixed order, first acceptable hit wins.
    FallbackChain,
}

impl ResolvePolicy {
    pub fn name(&self) -> &'static str {
        match self {
            ResolvePolicy::HtmlFirst => "html_first",
            ResolvePolicy::VisionFirst => "vision_first",
            ResolvePolicy::Fusion => "fusion",
            ResolvePolicy::FallbackChain => "fallback_chain",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boost_saturates_at_one() {
        let mut element = ResolvedElement {
            locator: "#search".into(),
            source: StrategyKind::Selector,
            confidence: 0.95,
            bounding_box: None,
            text: None,
            generation: 1,
        };
        element.boost(0.2);
        assert_eq!(element.confidence, 1.0);
    }

    #[test]
    fn overlapping_boxes_corroborate() {
        let a = BoundingBox {
            x: 10.0,
            y: 10.0,
            width: 20.0,
            height: 10.0,
        };
        let b = BoundingBox {
            x: 15.0,
            y: 12.0,
            width: 20.0,
            height: 10.0,
        };
        let far = BoundingBox {
            x: 80.0,
            y: 80.0,
            width: 10.0,
            height: 5.0,
        };
        assert!(a.corroborates(&b));
        assert!(!a.corroborates(&far));
    }
}
