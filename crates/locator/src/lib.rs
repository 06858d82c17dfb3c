//! Natural-language element resolution.
//!
//! Descriptions like "the login button" are resolved against the live page
//! by several independent strategies; [`HybridResolver`] combines their
//! evidence under a configurable policy.

mod errors;
mod probe;
mod resolver;
mod strategies;
mod types;

pub use errors::LocatorError;
pub use probe::{ElementSnapshot, PageProbe, ScriptProbe, StaticProbe};
pub use resolver::{HybridResolver, ResolveRecord, StrategyStats};
pub use strategies::{
    HintStrategy, LocateStrategy, SelectorStrategy, TextStrategy, VisionStrategy,
    DEFAULT_VISION_TTL,
};
pub use types::{BoundingBox, ResolvePolicy, ResolvedElement, StrategyKind};
