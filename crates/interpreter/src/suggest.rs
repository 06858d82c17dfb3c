//! Suggestions attached to commands nothing could parse.

/// Example phrasings offered when neither the rules nor the model produced a
/// command. Ordered by how often users are expected to want them; callers
/// truncate, never reorder.
pub fn command_suggestions(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let mut out = Vec::new();

    // Lead with examples related to anything we did recognize in the text.
    if lower.contains("form") || lower.contains("fill") {
        out.push("fill in the form with name: Alice, email: alice@example.com".to_string());
    }
    if lower.contains("search") || lower.contains("find") {
        out.push("search for rust tutorials".to_string());
        out.push("open baidu and search for rust books".to_string());
    }
    if lower.contains("click") || lower.contains("button") {
        out.push("click the login button".to_string());
    }
    if lower.contains("time") || lower.contains("schedule") || lower.contains("tomorrow") {
        out.push("tomorrow 9am search weather".to_string());
    }

    for generic in [
        "open baidu",
        "search for rust tutorials",
        "click the login button",
        "type \"hello\" into the search box",
        "extract all links",
        "take a screenshot",
        "wait 3 seconds",
    ] {
        if !out.iter().any(|s| s == generic) {
            out.push(generic.to_string());
        }
    }

    out.truncate(10);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn related_suggestions_come_first() {
        let suggestions = command_suggestions("do something with the form please");
        assert!(suggestions[0].contains("form"));
    }

    #[test]
    fn never_more_than_ten() {
        let suggestions = command_suggestions("search find click form tomorrow");
        assert!(suggestions.len() <= 10);
        assert!(!suggestions.is_empty());
    }
}
