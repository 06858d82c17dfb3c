//! Page inspection seam.
//!
//! Strategies never script the surface directly; they go through
//! [`PageProbe`]. [`ScriptProbe`] is the production implementation over a
//! [`BrowserSurface`], [`StaticProbe`] backs tests with a fixed element set.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use webpilot_surface::{BrowserSurface, ImageRef, SurfaceError};

use crate::errors::LocatorError;
use crate::types::BoundingBox;

/// One element as seen by a probe query.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementSnapshot {
    /// A selector that uniquely addresses this element right now.
    pub selector: String,
    pub tag: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub classes: Vec<String>,
    #[serde(default)]
    pub visible: bool,
    #[serde(default)]
    pub bounding_box: Option<BoundingBox>,
}

#[async_trait]
pub trait PageProbe: Send + Sync {
    /// Visible elements matching a CSS selector.
    async fn query_selector(&self, selector: &str) -> Result<Vec<ElementSnapshot>, LocatorError>;

    /// All visible interactive elements (links, buttons, inputs, selects).
    async fn interactive_elements(&self) -> Result<Vec<ElementSnapshot>, LocatorError>;

    /// Current page image for the vision path.
    async fn capture(&self) -> Result<ImageRef, LocatorError>;

    /// Page-load generation, forwarded from the surface.
    fn generation(&self) -> u64;
}

/// Probe that runs collection scripts in the page context.
pub struct ScriptProbe {
    surface: Arc<dyn BrowserSurface>,
}

impl ScriptProbe {
    pub fn new(surface: Arc<dyn BrowserSurface>) -> Self {
        Self { surface }
    }

    fn snapshot_script(selector_expr: &str) -> String {
        // Returns an array of snapshot objects; nth-of-type paths keep the
        // returned selectors addressable without element handles.
        format!(
            r#"(() => {{
  const path = (el) => {{
    if (el.id) return '#' + CSS.escape(el.id);
    const parts = [];
    while (el && el.nodeType === 1 && parts.length < 6) {{
      let part = el.tagName.toLowerCase();
      const siblings = Array.from(el.parentNode ? el.parentNode.children : [])
        .filter(s => s.tagName === el.tagName);
      if (siblings.length > 1) part += `:nth-of-type(${{siblings.indexOf(el) + 1}})`;
      parts.unshift(part);
      el = el.parentNode;
    }}
    return parts.join(' > ');
  }};
  const visible = (el) => {{
    const r = el.getBoundingClientRect();
    return r.width > 0 && r.height > 0;
  }};
  const box = (el) => {{
    const r = el.getBoundingClientRect();
    const vw = window.innerWidth || 1, vh = window.innerHeight || 1;
    return {{ x: r.x / vw * 100, y: r.y / vh * 100,
              width: r.width / vw * 100, height: r.height / vh * 100 }};
  }};
  return Array.from(document.querySelectorAll({selector_expr}))
    .filter(visible)
    .slice(0, 50)
    .map(el => ({{
      selector: path(el),
      tag: el.tagName.toLowerCase(),
      text: (el.innerText || el.value || el.placeholder || '').trim().slice(0, 200),
      id: el.id || '',
      classes: Array.from(el.classList),
      visible: true,
      bounding_box: box(el),
    }}));
}})()"#
        )
    }

    fn parse_snapshots(value: Value) -> Result<Vec<ElementSnapshot>, LocatorError> {
        serde_json::from_value(value).map_err(|e| LocatorError::MalformedProbe(e.to_string()))
    }
}

#[async_trait]
impl PageProbe for ScriptProbe {
    async fn query_selector(&self, selector: &str) -> Result<Vec<ElementSnapshot>, LocatorError> {
        let expr = serde_json::to_string(selector)
            .map_err(|e| LocatorError::MalformedProbe(e.to_string()))?;
        let script = Self::snapshot_script(&expr);
        let value = self.surface.execute_script(&script).await?;
        Self::parse_snapshots(value)
    }

    async fn interactive_elements(&self) -> Result<Vec<ElementSnapshot>, LocatorError> {
        let script = Self::snapshot_script(
            r#"'a, button, input, select, textarea, [role="button"], [onclick]'"#,
        );
        let value = self.surface.execute_script(&script).await?;
        Self::parse_snapshots(value)
    }

    async fn capture(&self) -> Result<ImageRef, LocatorError> {
        Ok(self.surface.capture_page().await?)
    }

    fn generation(&self) -> u64 {
        self.surface.generation()
    }
}

/// In-memory probe over a fixed element set.
pub struct StaticProbe {
    elements: RwLock<Vec<ElementSnapshot>>,
    screenshot: Vec<u8>,
    generation: u64,
    fail_capture: bool,
}

impl StaticProbe {
    pub fn new(elements: Vec<ElementSnapshot>) -> Self {
        Self {
            elements: RwLock::new(elements),
            screenshot: vec![0u8; 16],
            generation: 1,
            fail_capture: false,
        }
    }

    pub fn with_screenshot(mut self, bytes: Vec<u8>) -> Self {
        self.screenshot = bytes;
        self
    }

    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    pub fn failing_capture(mut self) -> Self {
        self.fail_capture = true;
        self
    }

    pub fn set_elements(&self, elements: Vec<ElementSnapshot>) {
        *self.elements.write() = elements;
    }

    /// Minimal selector matching: exact stored selector, `#id`, `.class`,
    /// bare tag, or a comma list of those.
    fn matches(snapshot: &ElementSnapshot, selector: &str) -> bool {
        selector.split(',').map(str::trim).any(|part| {
            if part == snapshot.selector {
                true
            } else if let Some(id) = part.strip_prefix('#') {
                snapshot.id == id
            } else if let Some(class) = part.strip_prefix('.') {
                snapshot.classes.iter().any(|c| c == class)
            } else if let Some((tag, rest)) = part.split_once('[') {
                // tag[attr] forms match on tag only here.
                (tag.is_empty() || tag == snapshot.tag) && rest.ends_with(']')
            } else {
                part == snapshot.tag
            }
        })
    }
}

#[async_trait]
impl PageProbe for StaticProbe {
    async fn query_selector(&self, selector: &str) -> Result<Vec<ElementSnapshot>, LocatorError> {
        Ok(self
            .elements
            .read()
            .iter()
            .filter(|s| s.visible && Self::matches(s, selector))
            .cloned()
            .collect())
    }

    async fn interactive_elements(&self) -> Result<Vec<ElementSnapshot>, LocatorError> {
        Ok(self
            .elements
            .read()
            .iter()
            .filter(|s| s.visible)
            .cloned()
            .collect())
    }

    async fn capture(&self) -> Result<ImageRef, LocatorError> {
        if self.fail_capture {
            return Err(SurfaceError::CaptureFailed("capture disabled".to_string()).into());
        }
        Ok(ImageRef::new("static", self.screenshot.clone()))
    }

    fn generation(&self) -> u64 {
        self.generation
    }
}

/// Snapshot builder for tests.
impl ElementSnapshot {
    pub fn interactive(
        selector: impl Into<String>,
        tag: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            selector: selector.into(),
            tag: tag.into(),
            text: text.into(),
            visible: true,
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_classes(mut self, classes: &[&str]) -> Self {
        self.classes = classes.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_box(mut self, bounding_box: BoundingBox) -> Self {
        self.bounding_box = Some(bounding_box);
        self
    }
}
