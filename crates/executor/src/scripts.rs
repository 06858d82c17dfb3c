//! Page-context script builders.
//!
//! Every interaction is one script round trip returning JSON. Selector and
//! value arguments are embedded as JSON string literals so page content can
//! never break out of the script.

use serde_json::json;

fn lit(value: &str) -> String {
    json!(value).to_string()
}

pub fn click(selector: &str) -> String {
    let sel = lit(selector);
    format!(
        r#"(() => {{
  const el = document.querySelector({sel});
  if (!el) return {{ ok: false, error: 'not found' }};
  el.scrollIntoView({{ block: 'center' }});
  el.click();
  return {{ ok: true }};
}})()"#
    )
}

/// Clicks whatever element sits at a viewport-percentage point. Used for
/// vision-only resolutions that carry no selector.
pub fn click_at_percent(x: f32, y: f32) -> String {
    format!(
        r#"(() => {{
  const px = window.innerWidth * {x} / 100;
  const py = window.innerHeight * {y} / 100;
  const el = document.elementFromPoint(px, py);
  if (!el) return {{ ok: false, error: 'nothing at point' }};
  el.click();
  return {{ ok: true }};
}})()"#
    )
}

/// Sets an input's value through the native setter so framework-bound inputs
/// observe the change, then fires input/change events.
pub fn set_value(selector: &str, value: &str) -> String {
    let sel = lit(selector);
    let val = lit(value);
    format!(
        r#"(() => {{
  const el = document.querySelector({sel});
  if (!el) return {{ ok: false, error: 'not found' }};
  el.focus();
  const proto = el.tagName === 'TEXTAREA'
    ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype;
  const setter = Object.getOwnPropertyDescriptor(proto, 'value');
  if (setter && setter.set) setter.set.call(el, {val}); else el.value = {val};
  el.dispatchEvent(new Event('input', {{ bubbles: true }}));
  el.dispatchEvent(new Event('change', {{ bubbles: true }}));
  return {{ ok: true }};
}})()"#
    )
}

pub fn press_enter(selector: &str) -> String {
    let sel = lit(selector);
    format!(
        r#"(() => {{
  const el = document.querySelector({sel});
  if (!el) return {{ ok: false, error: 'not found' }};
  for (const type of ['keydown', 'keypress', 'keyup']) {{
    el.dispatchEvent(new KeyboardEvent(type, {{
      key: 'Enter', code: 'Enter', keyCode: 13, bubbles: true,
    }}));
  }}
  if (el.form) el.form.submit();
  return {{ ok: true }};
}})()"#
    )
}

pub fn exists(selector: &str) -> String {
    let sel = lit(selector);
    format!(
        r#"(() => {{
  const el = document.querySelector({sel});
  if (!el) return false;
  const r = el.getBoundingClientRect();
  return r.width > 0 && r.height > 0;
}})()"#
    )
}

pub fn page_host() -> String {
    "location.host".to_string()
}

/// Collects links; capped because extraction feeds task records, not a
/// crawler.
pub fn extract_links(limit: usize) -> String {
    format!(
        r#"Array.from(document.querySelectorAll('a[href]'))
  .filter(a => (a.innerText || '').trim())
  .slice(0, {limit})
  .map(a => ({{ text: a.innerText.trim().slice(0, 200), href: a.href }}))"#
    )
}

pub fn extract_tables(limit: usize) -> String {
    format!(
        r#"Array.from(document.querySelectorAll('table')).slice(0, 5).map(table => ({{
  headers: Array.from(table.querySelectorAll('th')).map(th => th.innerText.trim()),
  rows: Array.from(table.querySelectorAll('tr'))
    .slice(0, {limit})
    .map(tr => Array.from(tr.querySelectorAll('td')).map(td => td.innerText.trim()))
    .filter(cells => cells.length > 0),
}}))"#
    )
}

pub fn extract_text(limit: usize) -> String {
    format!(
        r#"Array.from(document.querySelectorAll('h1, h2, h3, p, li'))
  .map(el => el.innerText.trim())
  .filter(t => t.length > 0)
  .slice(0, {limit})"#
    )
}

pub fn scroll_by_viewport() -> String {
    r#"(() => {window.scrollBy({ top: window.innerHeight * 0.8, behavior: 'instant' }); return { ok: true };})()"#
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selectors_are_json_escaped() {
        let script = click(r#"a[title="x"]"#);
        assert!(script.contains(r#""a[title=\"x\"]""#));
    }

    #[test]
    fn value_injection_cannot_escape_the_literal() {
        let script = set_value("#q", "'); alert(1); ('");
        assert!(script.contains(r#""'); alert(1); ('""#));
    }
}
