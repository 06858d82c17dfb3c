//! Individual location strategies.
//!
//! Each strategy is independent and fallible; the resolver decides how to
//! combine them. A strategy returning `Ok(None)` simply has no candidate,
//! which is not an error.

use async_trait::async_trait;

use crate::probe::PageProbe;
use crate::types::{ResolvedElement, StrategyKind};
use crate::LocatorError;

mod hint;
mod selector;
mod text;
mod vision;

pub use hint::HintStrategy;
pub use selector::SelectorStrategy;
pub use text::TextStrategy;
pub use vision::{VisionStrategy, DEFAULT_VISION_TTL};

#[async_trait]
pub trait LocateStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Best candidate for the description, or `None` when the strategy has
    /// nothing to offer for this page.
    async fn locate(
        &self,
        description: &str,
        probe: &dyn PageProbe,
    ) -> Result<Option<ResolvedElement>, LocatorError>;
}

/// Word-overlap score between a description and an element label, in
/// `[0.0, 1.0]`. Exact and substring matches dominate; otherwise the score
/// is the fraction of description words the label covers.
pub(crate) fn lexical_score(description: &str, label: &str) -> f32 {
    let desc = description.trim().to_lowercase();
    let label = label.trim().to_lowercase();
    if desc.is_empty() || label.is_empty() {
        return 0.0;
    }
    if desc == label {
        return 1.0;
    }
    if label.contains(&desc) || desc.contains(&label) {
        return 0.85;
    }
    let desc_words: Vec<&str> = desc.split_whitespace().collect();
    if desc_words.is_empty() {
        return 0.0;
    }
    let hits = desc_words
        .iter()
        .filter(|w| w.len() > 1 && label.contains(*w))
        .count();
    0.7 * hits as f32 / desc_words.len() as f32
}
