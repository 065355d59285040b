//! JavaScript snippets evaluated inside sandbox pages.
//!
//! Every snippet returns a JSON string so results come back through a single
//! decoding path. Selectors and values are embedded as JSON string literals.

use crate::submission::INTERNAL_MARKER;
use serde_json::Value;

/// Lookup helper shared by all element snippets. An invalid selector matches nothing.
const PRELUDE: &str = "\
const __q = (sel) => { try { return document.querySelector(sel); } catch (err) { return null; } };
const __qa = (sel, root) => { try { return Array.from((root || document).querySelectorAll(sel)); } catch (err) { return []; } };
const __describe = (el) => {
  const handlers = [];
  for (const key in el) {
    if (key.startsWith('on') && typeof el[key] === 'function') { handlers.push(key); }
  }
  return {
    tag: el.tagName.toLowerCase(),
    id: el.id || '',
    className: typeof el.className === 'string' ? el.className : (el.getAttribute('class') || ''),
    textContent: el.textContent || '',
    value: ('value' in el && typeof el.value === 'string') ? el.value : null,
    inlineHandlers: Array.from(el.attributes).map((attr) => attr.name.toLowerCase()).filter((name) => name.startsWith('on')),
    propertyHandlers: handlers,
  };
};";

fn literal(text: &str) -> String {
    Value::from(text).to_string()
}

fn wrap(body: &str) -> String {
    format!("(() => {{\n{PRELUDE}\n{body}\n}})()")
}

pub fn ready_state() -> String {
    "JSON.stringify(document.readyState)".to_owned()
}

pub fn recorded_errors() -> String {
    "JSON.stringify(window.__assayErrors || [])".to_owned()
}

pub fn query(selector: &str) -> String {
    wrap(&format!(
        "const el = __q({});\nreturn JSON.stringify(el ? __describe(el) : null);",
        literal(selector)
    ))
}

pub fn query_all(selector: &str) -> String {
    wrap(&format!(
        "return JSON.stringify(__qa({}).map(__describe));",
        literal(selector)
    ))
}

pub fn count_within(selector: &str, item_selector: &str) -> String {
    wrap(&format!(
        "const el = __q({});\nreturn JSON.stringify(el ? __qa({}, el).length : null);",
        literal(selector),
        literal(item_selector)
    ))
}

pub fn click(selector: &str) -> String {
    wrap(&format!(
        "const el = __q({});\nif (!el) {{ return JSON.stringify(false); }}\nel.click();\nreturn JSON.stringify(true);",
        literal(selector)
    ))
}

pub fn set_value(selector: &str, value: &str) -> String {
    wrap(&format!(
        "const el = __q({});
if (!el) {{ return JSON.stringify(false); }}
el.value = {};
el.dispatchEvent(new Event('input', {{ bubbles: true }}));
el.dispatchEvent(new Event('change', {{ bubbles: true }}));
return JSON.stringify(true);",
        literal(selector),
        literal(value)
    ))
}

pub fn press_key(selector: &str, key: &str) -> String {
    wrap(&format!(
        "const el = __q({});
if (!el) {{ return JSON.stringify(false); }}
const key = {};
const legacy = key === 'Enter' ? 13 : (key.length === 1 ? key.toUpperCase().charCodeAt(0) : 0);
for (const type of ['keydown', 'keypress', 'keyup']) {{
  const event = new KeyboardEvent(type, {{ key, code: key, bubbles: true, cancelable: true }});
  Object.defineProperty(event, 'keyCode', {{ get: () => legacy }});
  Object.defineProperty(event, 'which', {{ get: () => legacy }});
  el.dispatchEvent(event);
}}
return JSON.stringify(true);",
        literal(selector),
        literal(key)
    ))
}

pub fn script_sources() -> String {
    format!(
        "JSON.stringify(Array.from(document.scripts).filter((script) => !script.hasAttribute('{INTERNAL_MARKER}')).map((script) => script.textContent || ''))"
    )
}

/// Calls a user-supplied `(doc) => boolean` function. Exceptions propagate.
pub fn predicate(function_source: &str) -> String {
    format!(
        "(() => {{
const __test = ({function_source}\n);
if (typeof __test !== 'function') {{ throw new TypeError('custom test is not a function'); }}
return JSON.stringify(Boolean(__test(document)));
}})()"
    )
}
