//! Predefined selector tables for common element categories.

use async_trait::async_trait;
use tracing::debug;

use crate::probe::PageProbe;
use crate::types::{ResolvedElement, StrategyKind};
use crate::LocatorError;

use super::LocateStrategy;

struct Category {
    name: &'static str,
    /// Description keywords that select this category.
    keywords: &'static [&'static str],
    /// Candidate selectors, best first.
    selectors: &'static [&'static str],
}

/// The categories cover the elements automation scripts ask for constantly.
/// Selector order within a category encodes site-specific knowledge first
/// (Baidu's `#kw`, Google's `[name=q]`), generic attributes after.
const CATEGORIES: &[Category] = &[
    Category {
        name: "search_box",
        keywords: &["search box", "search field", "search input", "search bar", "搜索框"],
        selectors: &[
            "#kw",
            "input[name=q]",
            "input[name=wd]",
            "input[type=search]",
            "input[placeholder*=search i]",
            "input[aria-label*=search i]",
            ".search-input",
        ],
    },
    Category {
        name: "username",
        keywords: &["username", "user name", "email field", "account", "用户名"],
        selectors: &[
            "input[name=username]",
            "input[name=user]",
            "input[name=email]",
            "input[type=email]",
            "input[autocomplete=username]",
            "#username",
            "#email",
        ],
    },
    Category {
        name: "password",
        keywords: &["password", "密码"],
        selectors: &[
            "input[type=password]",
            "input[name=password]",
            "#password",
        ],
    },
    Category {
        name: "login_button",
        keywords: &["login button", "log in button", "sign in", "登录按钮", "登录"],
        selectors: &[
            "button[type=submit]",
            "input[type=submit]",
            "#login",
            ".login-btn",
            "button[name=login]",
        ],
    },
    Category {
        name: "submit_button",
        keywords: &["submit", "confirm button", "提交"],
        selectors: &[
            "button[type=submit]",
            "input[type=submit]",
            "#su",
            ".submit-btn",
        ],
    },
    Category {
        name: "next_button",
        keywords: &["next button", "next page", "下一页"],
        selectors: &["a[rel=next]", ".next", "#next", "button[aria-label*=next i]"],
    },
    Category {
        name: "prev_button",
        keywords: &["previous button", "prev button", "previous page", "上一页"],
        selectors: &["a[rel=prev]", ".prev", "#prev", "button[aria-label*=prev i]"],
    },
];

fn category_for(description: &str) -> Option<&'static Category> {
    let lower = description.to_lowercase();
    CATEGORIES
        .iter()
        .find(|c| c.keywords.iter().any(|k| lower.contains(k)))
}

/// Resolves descriptions that name a known element category.
pub struct SelectorStrategy;

#[async_trait]
impl LocateStrategy for SelectorStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Selector
    }

    async fn locate(
        &self,
        description: &str,
        probe: &dyn PageProbe,
    ) -> Result<Option<ResolvedElement>, LocatorError> {
        let Some(category) = category_for(description) else {
            return Ok(None);
        };
        for selector in category.selectors {
            let hits = probe.query_selector(selector).await?;
            if let Some(hit) = hits.into_iter().next() {
                debug!(category = category.name, selector, "selector table hit");
                return Ok(Some(ResolvedElement {
                    locator: hit.selector.clone(),
                    source: StrategyKind::Selector,
                    confidence: 0.9,
                    bounding_box: hit.bounding_box,
                    text: (!hit.text.is_empty()).then(|| hit.text.clone()),
                    generation: probe.generation(),
                }));
            }
        }
        Ok(None)
    }
}
