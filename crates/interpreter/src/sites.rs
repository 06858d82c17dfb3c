//! Static catalog of recognized sites.

/// A site the interpreter knows by name.
pub struct SiteEntry {
    pub names: &'static [&'static str],
    pub url: &'static str,
}

/// Recognized sites, by every alias a user may type.
pub const SITES: &[SiteEntry] = &[
    SiteEntry {
        names: &["baidu", "百度"],
        url: "https://www.baidu.com",
    },
    SiteEntry {
        names: &["google", "谷歌"],
        url: "https://www.google.com",
    },
    SiteEntry {
        names: &["bing", "必应"],
        url: "https://www.bing.com",
    },
    SiteEntry {
        names: &["sogou", "搜狗"],
        url: "https://www.sogou.com",
    },
    SiteEntry {
        names: &["360", "360搜索"],
        url: "https://www.so.com",
    },
    SiteEntry {
        names: &["taobao", "淘宝"],
        url: "https://www.taobao.com",
    },
    SiteEntry {
        names: &["jd", "京东"],
        url: "https://www.jd.com",
    },
    SiteEntry {
        names: &["zhihu", "知乎"],
        url: "https://www.zhihu.com",
    },
    SiteEntry {
        names: &["weibo", "微博"],
        url: "https://weibo.com",
    },
];

/// Look up a site by name, exact alias match only.
pub fn lookup_site(name: &str) -> Option<&'static SiteEntry> {
    let normalized = name.trim().to_lowercase();
    SITES
        .iter()
        .find(|entry| entry.names.iter().any(|n| *n == normalized))
}

/// Resolve a site name or URL fragment to a canonical URL.
///
/// Known names hit the static table; full URLs pass through; anything with a
/// dot gets an https scheme; the rest becomes a best-effort www guess.
pub fn canonical_site_url(name: &str) -> String {
    let trimmed = name.trim();
    if let Some(entry) = lookup_site(trimmed) {
        return entry.url.to_string();
    }
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        return trimmed.to_string();
    }
    if trimmed.contains('.') {
        return format!("https://{trimmed}");
    }
    let slug: String = trimmed
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    format!("https://www.{slug}.com")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_names_resolve_to_canonical_urls() {
        assert_eq!(canonical_site_url("baidu"), "https://www.baidu.com");
        assert_eq!(canonical_site_url("Google"), "https://www.google.com");
        assert_eq!(canonical_site_url("淘宝"), "https://www.taobao.com");
    }

    #[test]
    fn urls_and_domains_pass_through() {
        assert_eq!(
            canonical_site_url("https://news.ycombinator.com"),
            "https://news.ycombinator.com"
        );
        assert_eq!(canonical_site_url("example.org"), "https://example.org");
    }

    #[test]
    fn unknown_names_get_a_best_effort_guess() {
        assert_eq!(canonical_site_url("acme shop"), "https://www.acmeshop.com");
    }
}
