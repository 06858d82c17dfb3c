//! Ordered pattern table for rule-based command parsing.
//!
//! Rules run in declaration order, most specific first, and the first match
//! wins. Patterns are word-bounded but deliberately not anchored so a leading
//! time phrase ("tomorrow 9am search weather") still matches the action.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use webpilot_core_types::{CommandKind, WaitCondition};

use crate::sites::canonical_site_url;

type Builder = fn(&Captures<'_>) -> Option<CommandKind>;

pub struct Rule {
    pub name: &'static str,
    pub pattern: &'static Lazy<Regex>,
    pub build: Builder,
}

macro_rules! rule_regex {
    ($name:ident, $pattern:expr) => {
        static $name: Lazy<Regex> =
            Lazy::new(|| Regex::new($pattern).expect(concat!("rule regex ", stringify!($name))));
    };
}

rule_regex!(
    NAVIGATE_SEARCH,
    r"(?i)\b(?:open|go to|visit)\s+(\S+?)\s+(?:and\s+)?search(?:\s+for)?\s+(.+)$"
);
rule_regex!(
    FORM_FILL,
    r"(?i)\bfill\s+(?:in\s+|out\s+)?(?:the\s+)?form\s+(?:with\s+)?(.+)$"
);
rule_regex!(
    NAVIGATE,
    r"(?i)\b(?:open|go to|visit|navigate to)\s+(\S+)\s*$"
);
rule_regex!(
    EXTRACT,
    r"(?i)\b(?:extract|scrape|collect|get all)\s+(?:the\s+)?(.+)$"
);
rule_regex!(SEARCH, r"(?i)\bsearch(?:\s+for)?\s+(.+)$");
rule_regex!(CLICK, r"(?i)\b(?:click|press|tap)(?:\s+on)?\s+(?:the\s+)?(.+)$");
rule_regex!(
    INPUT_TARGETED,
    r#"(?i)\b(?:type|enter|input)\s+"?([^"]+?)"?\s+(?:in|into)\s+(?:the\s+)?(.+)$"#
);
rule_regex!(
    WAIT_DURATION,
    r"(?i)\bwait\s+(?:for\s+)?(\d+)\s*(seconds?|secs?|s|milliseconds?|ms)\b"
);
rule_regex!(WAIT_ELEMENT, r"(?i)\bwait\s+(?:for|until)\s+(?:the\s+)?(.+)$");
rule_regex!(SCREENSHOT, r"(?i)\b(?:take\s+a\s+)?screenshot\b|\bcapture\s+(?:the\s+)?(?:page|screen)\b");
rule_regex!(DOWNLOAD, r"(?i)\b(?:download|save)\s+(?:the\s+)?(.+)$");
rule_regex!(SCROLL, r"(?i)\bscroll\b");
rule_regex!(INPUT_PLAIN, r#"(?i)\b(?:type|enter|input)\s+"?([^"]+?)"?\s*$"#);

fn build_navigate_search(caps: &Captures<'_>) -> Option<CommandKind> {
    let site = caps[1].trim().to_string();
    let query = caps[2].trim().to_string();
    if query.is_empty() {
        return None;
    }
    Some(CommandKind::NavigateSearch {
        url: canonical_site_url(&site),
        site,
        query,
    })
}

/// `fill form with name: Alice, email: a@b.c` — comma-separated `key: value`
/// pairs. Fails the rule (falling through to the model) when no pair parses.
fn build_form_fill(caps: &Captures<'_>) -> Option<CommandKind> {
    let mut fields = BTreeMap::new();
    for pair in caps[1].split(',') {
        let mut parts = pair.splitn(2, [':', '=']);
        let key = parts.next()?.trim();
        if let Some(value) = parts.next() {
            let value = value.trim();
            if !key.is_empty() && !value.is_empty() {
                fields.insert(key.to_string(), value.to_string());
            }
        }
    }
    if fields.is_empty() {
        return None;
    }
    Some(CommandKind::FormFill { fields })
}

fn build_navigate(caps: &Captures<'_>) -> Option<CommandKind> {
    Some(CommandKind::Navigate {
        url: canonical_site_url(caps[1].trim()),
    })
}

fn build_extract(caps: &Captures<'_>) -> Option<CommandKind> {
    Some(CommandKind::Extract {
        target: caps[1].trim().to_string(),
    })
}

fn build_search(caps: &Captures<'_>) -> Option<CommandKind> {
    let query = caps[1].trim().to_string();
    if query.is_empty() {
        return None;
    }
    Some(CommandKind::Search { query })
}

fn build_click(caps: &Captures<'_>) -> Option<CommandKind> {
    Some(CommandKind::Click {
        target: caps[1].trim().to_string(),
    })
}

fn build_input_targeted(caps: &Captures<'_>) -> Option<CommandKind> {
    Some(CommandKind::Input {
        target: Some(caps[2].trim().to_string()),
        value: caps[1].trim().to_string(),
    })
}

fn build_wait_duration(caps: &Captures<'_>) -> Option<CommandKind> {
    let amount: u64 = caps[1].parse().ok()?;
    let unit = caps[2].to_lowercase();
    let ms = if unit.starts_with('s') && !unit.starts_with("ms") {
        amount.saturating_mul(1000)
    } else {
        amount
    };
    Some(CommandKind::Wait {
        condition: WaitCondition::Duration { ms },
    })
}

fn build_wait_element(caps: &Captures<'_>) -> Option<CommandKind> {
    let description = caps[1].trim().to_string();
    // "wait for the page to load" is a settle wait, not an element wait.
    if description.ends_with("to load") || description == "page" {
        return Some(CommandKind::Wait {
            condition: WaitCondition::Duration { ms: 2000 },
        });
    }
    Some(CommandKind::Wait {
        condition: WaitCondition::Element { description },
    })
}

fn build_screenshot(_caps: &Captures<'_>) -> Option<CommandKind> {
    Some(CommandKind::Screenshot)
}

fn build_download(caps: &Captures<'_>) -> Option<CommandKind> {
    Some(CommandKind::Download {
        target: caps[1].trim().to_string(),
    })
}

fn build_scroll(_caps: &Captures<'_>) -> Option<CommandKind> {
    Some(CommandKind::Scroll)
}

fn build_input_plain(caps: &Captures<'_>) -> Option<CommandKind> {
    Some(CommandKind::Input {
        target: None,
        value: caps[1].trim().to_string(),
    })
}

/// The rule table. Order matters: compound and targeted forms come before the
/// generic forms they would otherwise shadow.
pub static RULES: &[Rule] = &[
    Rule {
        name: "navigate_search",
        pattern: &NAVIGATE_SEARCH,
        build: build_navigate_search,
    },
    Rule {
        name: "form_fill",
        pattern: &FORM_FILL,
        build: build_form_fill,
    },
    Rule {
        name: "navigate",
        pattern: &NAVIGATE,
        build: build_navigate,
    },
    Rule {
        name: "extract",
        pattern: &EXTRACT,
        build: build_extract,
    },
    Rule {
        name: "search",
        pattern: &SEARCH,
        build: build_search,
    },
    Rule {
        name: "click",
        pattern: &CLICK,
        build: build_click,
    },
    Rule {
        name: "input_targeted",
        pattern: &INPUT_TARGETED,
        build: build_input_targeted,
    },
    Rule {
        name: "wait_duration",
        pattern: &WAIT_DURATION,
        build: build_wait_duration,
    },
    Rule {
        name: "wait_element",
        pattern: &WAIT_ELEMENT,
        build: build_wait_element,
    },
    Rule {
        name: "screenshot",
        pattern: &SCREENSHOT,
        build: build_screenshot,
    },
    Rule {
        name: "download",
        pattern: &DOWNLOAD,
        build: build_download,
    },
    Rule {
        name: "scroll",
        pattern: &SCROLL,
        build: build_scroll,
    },
    Rule {
        name: "input_plain",
        pattern: &INPUT_PLAIN,
        build: build_input_plain,
    },
];

/// Run the rule table against `text`; first matching rule wins.
pub fn match_rules(text: &str) -> Option<(&'static str, CommandKind)> {
    for rule in RULES {
        if let Some(caps) = rule.pattern.captures(text) {
            if let Some(kind) = (rule.build)(&caps) {
                return Some((rule.name, kind));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind(text: &str) -> CommandKind {
        match_rules(text).unwrap_or_else(|| panic!("no rule matched {text:?}")).1
    }

    #[test]
    fn navigate_search_beats_navigate_and_search() {
        let (name, parsed) = match_rules("open baidu and search for rust books").unwrap();
        assert_eq!(name, "navigate_search");
        assert_eq!(
            parsed,
            CommandKind::NavigateSearch {
                site: "baidu".into(),
                url: "https://www.baidu.com".into(),
                query: "rust books".into(),
            }
        );
    }

    #[test]
    fn action_survives_a_leading_time_phrase() {
        assert_eq!(
            kind("tomorrow 9am search weather"),
            CommandKind::Search {
                query: "weather".into()
            }
        );
    }

    #[test]
    fn navigate_resolves_site_names() {
        assert_eq!(
            kind("go to zhihu"),
            CommandKind::Navigate {
                url: "https://www.zhihu.com".into()
            }
        );
    }

    #[test]
    fn targeted_input_captures_value_and_field() {
        assert_eq!(
            kind(r#"type "hello world" into the comment box"#),
            CommandKind::Input {
                target: Some("comment box".into()),
                value: "hello world".into(),
            }
        );
    }

    #[test]
    fn wait_duration_converts_seconds_to_millis() {
        assert_eq!(
            kind("wait 3 seconds"),
            CommandKind::Wait {
                condition: WaitCondition::Duration { ms: 3000 }
            }
        );
        assert_eq!(
            kind("wait 500 ms"),
            CommandKind::Wait {
                condition: WaitCondition::Duration { ms: 500 }
            }
        );
    }

    #[test]
    fn wait_for_element_keeps_the_description() {
        assert_eq!(
            kind("wait for the login button"),
            CommandKind::Wait {
                condition: WaitCondition::Element {
                    description: "login button".into()
                }
            }
        );
    }

    #[test]
    fn form_fill_parses_key_value_pairs() {
        let parsed = kind("fill in the form with name: Alice, email: alice@example.com");
        match parsed {
            CommandKind::FormFill { fields } => {
                assert_eq!(fields.get("name").map(String::as_str), Some("Alice"));
                assert_eq!(
                    fields.get("email").map(String::as_str),
                    Some("alice@example.com")
                );
            }
            other => panic!("expected form_fill, got {other:?}"),
        }
    }

    #[test]
    fn screenshot_and_scroll_are_bare() {
        assert_eq!(kind("take a screenshot"), CommandKind::Screenshot);
        assert_eq!(kind("scroll down"), CommandKind::Scroll);
    }

    #[test]
    fn nonsense_matches_nothing() {
        assert!(match_rules("florble the wurble").is_none());
    }
}
