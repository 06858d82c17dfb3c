//! Per-site search knowledge.
//!
//! Major sites get exact selectors; everything else falls back to the
//! generic search-box category plus Enter-key submission.

pub struct SiteSearch {
    /// Substring matched against `location.host`.
    pub host: &'static str,
    pub input: &'static str,
    pub submit: &'static str,
}

pub const SITE_SEARCH: &[SiteSearch] = &[
    SiteSearch {
        host: "baidu.com",
        input: "#kw",
        submit: "#su",
    },
    SiteSearch {
        host: "google.com",
        input: "textarea[name=q], input[name=q]",
        submit: "input[name=btnK]",
    },
    SiteSearch {
        host: "bing.com",
        input: "#sb_form_q",
        submit: "#search_icon",
    },
    SiteSearch {
        host: "sogou.com",
        input: "#query",
        submit: "#stb",
    },
    SiteSearch {
        host: "so.com",
        input: "#input",
        submit: "#search-button",
    },
    SiteSearch {
        host: "taobao.com",
        input: "#q",
        submit: ".btn-search",
    },
    SiteSearch {
        host: "jd.com",
        input: "#key",
        submit: ".button",
    },
    SiteSearch {
        host: "zhihu.com",
        input: "input[type=text]",
        submit: "button[type=submit]",
    },
    SiteSearch {
        host: "weibo.com",
        input: "input[type=search]",
        submit: "button[type=submit]",
    },
];

pub fn site_for_host(host: &str) -> Option<&'static SiteSearch> {
    SITE_SEARCH.iter().find(|s| host.contains(s.host))
}

/// Generic fallbacks when the host is unknown.
pub const GENERIC_SEARCH_INPUTS: &[&str] = &[
    "input[type=search]",
    "input[name=q]",
    "input[name=query]",
    "input[name=wd]",
    "input[placeholder*=search i]",
];

pub const GENERIC_SEARCH_SUBMITS: &[&str] =
    &["button[type=submit]", "input[type=submit]"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subdomains_match_their_site() {
        assert_eq!(site_for_host("www.baidu.com").unwrap().input, "#kw");
        assert_eq!(site_for_host("search.jd.com").unwrap().input, "#key");
        assert!(site_for_host("example.org").is_none());
    }
}
