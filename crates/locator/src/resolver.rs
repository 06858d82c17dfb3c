//! Combining DOM and vision evidence into one answer.

use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info, warn};
use webpilot_surface::LanguageModelService;

use crate::probe::PageProbe;
use crate::strategies::{
    HintStrategy, LocateStrategy, SelectorStrategy, TextStrategy, VisionStrategy,
};
use crate::types::{ResolvePolicy, ResolvedElement, StrategyKind};
use crate::LocatorError;

/// Candidates below this are not trusted enough to act on.
const ACCEPT_THRESHOLD: f32 = 0.7;
/// A DOM candidate this strong makes consulting vision pointless.
const SHORT_CIRCUIT_THRESHOLD: f32 = 0.8;
/// Added when vision corroborates a DOM candidate.
const CORROBORATION_BOOST: f32 = 0.2;

const HISTORY_CAP: usize = 100;
const MAX_SUGGESTIONS: usize = 10;

/// One past resolution, kept for diagnostics.
#[derive(Clone, Debug)]
pub struct ResolveRecord {
    pub description: String,
    pub outcome: Option<StrategyKind>,
    pub confidence: f32,
    pub at: Instant,
}

/// Per-strategy hit/miss counters.
#[derive(Clone, Copy, Debug, Default)]
pub struct StrategyStats {
    pub hits: u64,
    pub misses: u64,
}

/// Multi-strategy element resolver.
///
/// DOM strategies run in fixed order (hints beat tables beat text); the
/// vision strategy is optional and only present when a model service was
/// supplied.
pub struct HybridResolver {
    dom: Vec<Box<dyn LocateStrategy>>,
    vision: Option<VisionStrategy>,
    policy: ResolvePolicy,
    history: Mutex<Vec<ResolveRecord>>,
    stats: DashMap<StrategyKind, StrategyStats>,
}

impl HybridResolver {
    pub fn new(policy: ResolvePolicy) -> Self {
        Self {
            dom: vec![
                Box::new(HintStrategy),
                Box::new(SelectorStrategy),
                Box::new(TextStrategy::new()),
            ],
            vision: None,
            policy,
            history: Mutex::new(Vec::new()),
            stats: DashMap::new(),
        }
    }

    pub fn with_model(policy: ResolvePolicy, model: Arc<dyn LanguageModelService>) -> Self {
        let mut resolver = Self::new(policy);
        resolver.vision = Some(VisionStrategy::new(model));
        resolver
    }

    pub fn policy(&self) -> ResolvePolicy {
        self.policy
    }

    /// Resolve a description to an element. Errors carry suggestions drawn
    /// from what is actually on the page.
    pub async fn resolve(
        &self,
        description: &str,
        probe: &dyn PageProbe,
    ) -> Result<ResolvedElement, LocatorError> {
        let generation = probe.generation();
        let outcome = match self.policy {
            ResolvePolicy::HtmlFirst => self.resolve_html_first(description, probe).await?,
            ResolvePolicy::VisionFirst => self.resolve_vision_first(description, probe).await?,
            ResolvePolicy::Fusion => self.resolve_fusion(description, probe).await?,
            ResolvePolicy::FallbackChain => self.resolve_chain(description, probe).await?,
        };

        let outcome = outcome.filter(|el| el.confidence >= ACCEPT_THRESHOLD);
        self.record(description, outcome.as_ref());

        match outcome {
            Some(el) => {
                if probe.generation() != generation {
                    warn!(description, "page changed mid-resolution");
                    return Err(LocatorError::StaleGeneration {
                        was: generation,
                        now: probe.generation(),
                    });
                }
                info!(
                    description,
                    strategy = el.source.name(),
                    confidence = el.confidence,
                    "element resolved"
                );
                Ok(el)
            }
            None => Err(LocatorError::NotFound {
                description: description.to_string(),
                suggestions: self.suggestions(probe).await,
            }),
        }
    }

    async fn best_dom(
        &self,
        description: &str,
        probe: &dyn PageProbe,
    ) -> Result<Option<ResolvedElement>, LocatorError> {
        let mut best: Option<ResolvedElement> = None;
        for strategy in &self.dom {
            let candidate = strategy.locate(description, probe).await?;
            self.count(strategy.kind(), candidate.is_some());
            if let Some(candidate) = candidate {
                let better = best
                    .as_ref()
                    .map(|b| candidate.confidence > b.confidence)
                    .unwrap_or(true);
                if better {
                    best = Some(candidate);
                }
            }
        }
        Ok(best)
    }

    async fn try_vision(
        &self,
        description: &str,
        probe: &dyn PageProbe,
    ) -> Result<Option<ResolvedElement>, LocatorError> {
        let Some(vision) = &self.vision else {
            return Ok(None);
        };
        // Vision trouble must not sink a resolution the DOM can still win.
        match vision.locate(description, probe).await {
            Ok(candidate) => {
                self.count(StrategyKind::Vision, candidate.is_some());
                Ok(candidate)
            }
            Err(err) => {
                warn!(error = %err, "vision strategy failed");
                self.count(StrategyKind::Vision, false);
                Ok(None)
            }
        }
    }

    /// Vision is consulted only when the DOM produced nothing acceptable;
    /// an acceptable DOM candidate settles the resolution outright.
    async fn resolve_html_first(
        &self,
        description: &str,
        probe: &dyn PageProbe,
    ) -> Result<Option<ResolvedElement>, LocatorError> {
        let dom = self.best_dom(description, probe).await?;
        if let Some(el) = &dom {
            if el.confidence >= ACCEPT_THRESHOLD {
                debug!(confidence = el.confidence, "dom candidate accepted");
                return Ok(dom);
            }
        }
        let vision = self.try_vision(description, probe).await?;
        Ok(pick_better(dom, vision))
    }

    async fn resolve_vision_first(
        &self,
        description: &str,
        probe: &dyn PageProbe,
    ) -> Result<Option<ResolvedElement>, LocatorError> {
        if let Some(el) = self.try_vision(description, probe).await? {
            if el.confidence >= ACCEPT_THRESHOLD {
                return Ok(Some(el));
            }
        }
        self.best_dom(description, probe).await
    }

    /// Run both sides concurrently. A strong DOM candidate wins outright;
    /// otherwise agreement between independent evidence raises trust in the
    /// DOM candidate, which carries the more actionable locator.
    async fn resolve_fusion(
        &self,
        description: &str,
        probe: &dyn PageProbe,
    ) -> Result<Option<ResolvedElement>, LocatorError> {
        let (dom, vision) = tokio::join!(
            self.best_dom(description, probe),
            self.try_vision(description, probe)
        );
        let (dom, vision) = (dom?, vision?);
        match (dom, vision) {
            (Some(dom), _) if dom.confidence > SHORT_CIRCUIT_THRESHOLD => {
                debug!(confidence = dom.confidence, "dom short-circuit");
                Ok(Some(dom))
            }
            (Some(mut dom), Some(vision)) => {
                if corroborates(&dom, &vision) {
                    debug!("vision corroborates dom candidate");
                    dom.boost(CORROBORATION_BOOST);
                    Ok(Some(dom))
                } else {
                    Ok(pick_better(Some(dom), Some(vision)))
                }
            }
            (dom, vision) => Ok(pick_better(dom, vision)),
        }
    }

    /// Fixed order: selector tables, explicit hints, vision, text match.
    /// The first acceptable hit wins; text is the last resort because DOM
    /// text is the most volatile evidence.
    async fn resolve_chain(
        &self,
        description: &str,
        probe: &dyn PageProbe,
    ) -> Result<Option<ResolvedElement>, LocatorError> {
        for kind in [StrategyKind::Selector, StrategyKind::Hint] {
            if let Some(el) = self.try_dom_strategy(kind, description, probe).await? {
                if el.confidence >= ACCEPT_THRESHOLD {
                    return Ok(Some(el));
                }
            }
        }
        if let Some(el) = self.try_vision(description, probe).await? {
            if el.confidence >= ACCEPT_THRESHOLD {
                return Ok(Some(el));
            }
        }
        self.try_dom_strategy(StrategyKind::Text, description, probe)
            .await
    }

    async fn try_dom_strategy(
        &self,
        kind: StrategyKind,
        description: &str,
        probe: &dyn PageProbe,
    ) -> Result<Option<ResolvedElement>, LocatorError> {
        let Some(strategy) = self.dom.iter().find(|s| s.kind() == kind) else {
            return Ok(None);
        };
        let candidate = strategy.locate(description, probe).await?;
        self.count(kind, candidate.is_some());
        Ok(candidate)
    }

    /// Texts of elements actually on the page, for the not-found error.
    async fn suggestions(&self, probe: &dyn PageProbe) -> Vec<String> {
        let mut texts: Vec<String> = match probe.interactive_elements().await {
            Ok(elements) => elements
                .into_iter()
                .map(|el| el.text)
                .filter(|t| !t.trim().is_empty())
                .collect(),
            Err(_) => Vec::new(),
        };
        texts.dedup();
        texts.truncate(MAX_SUGGESTIONS);
        texts
    }

    fn count(&self, kind: StrategyKind, hit: bool) {
        let mut entry = self.stats.entry(kind).or_default();
        if hit {
            entry.hits += 1;
        } else {
            entry.misses += 1;
        }
    }

    fn record(&self, description: &str, outcome: Option<&ResolvedElement>) {
        let mut history = self.history.lock();
        if history.len() >= HISTORY_CAP {
            history.remove(0);
        }
        history.push(ResolveRecord {
            description: description.to_string(),
            outcome: outcome.map(|el| el.source),
            confidence: outcome.map(|el| el.confidence).unwrap_or(0.0),
            at: Instant::now(),
        });
    }

    pub fn history(&self) -> Vec<ResolveRecord> {
        self.history.lock().clone()
    }

    pub fn stats(&self, kind: StrategyKind) -> StrategyStats {
        self.stats.get(&kind).map(|s| *s).unwrap_or_default()
    }
}

fn pick_better(
    a: Option<ResolvedElement>,
    b: Option<ResolvedElement>,
) -> Option<ResolvedElement> {
    match (a, b) {
        (Some(a), Some(b)) => Some(if b.confidence > a.confidence { b } else { a }),
        (a, b) => a.or(b),
    }
}

/// Independent evidence agrees when the boxes line up or the labels match.
fn corroborates(dom: &ResolvedElement, vision: &ResolvedElement) -> bool {
    if let (Some(db), Some(vb)) = (&dom.bounding_box, &vision.bounding_box) {
        if db.corroborates(vb) {
            return true;
        }
    }
    match (&dom.text, &vision.text) {
        (Some(d), Some(v)) => {
            let d = d.trim().to_lowercase();
            let v = v.trim().to_lowercase();
            !d.is_empty() && (d == v || d.contains(&v) || v.contains(&d))
        }
        _ => false,
    }
}
