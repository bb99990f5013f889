//! Page-side JavaScript shared by the browser backends.
//!
//! Every helper is a function expression taking the element as its only
//! argument. Backends wrap it with [`guarded`] so a detached element comes back
//! as a marker instead of a half-valid answer, then decode it with
//! [`unwrap_guarded`].

use crate::page::BackendError;
use serde_json::Value;

pub const TAG_NAME: &str = "function(el) { return el.tagName.toLowerCase(); }";

pub const TEXT: &str = "function(el) { return el.textContent || ''; }";

pub const SCROLL_INTO_VIEW: &str =
    "function(el) { el.scrollIntoView({ block: 'nearest', inline: 'nearest' }); return true; }";

pub const FOCUS: &str = "function(el) { if (el.focus) { el.focus(); } return true; }";

/// Full pointer sequence before the click: several widget libraries open on
/// mousedown and ignore a bare `click()`.
pub const CLICK: &str = r#"function(el) {
    el.scrollIntoView({ block: 'nearest', inline: 'nearest' });
    const opts = { bubbles: true, cancelable: true, view: window };
    el.dispatchEvent(new PointerEvent('pointerdown', opts));
    el.dispatchEvent(new MouseEvent('mousedown', opts));
    el.dispatchEvent(new PointerEvent('pointerup', opts));
    el.dispatchEvent(new MouseEvent('mouseup', opts));
    el.click();
    return true;
}"#;

/// `tag:nth-of-type(n)` segments from the root element down.
pub const ELEMENT_PATH: &str = r#"function(el) {
    const parts = [];
    let node = el;
    while (node && node.nodeType === 1) {
        const tag = node.tagName.toLowerCase();
        const parent = node.parentElement;
        if (!parent) { parts.unshift(tag); break; }
        let nth = 1;
        let sib = node;
        while ((sib = sib.previousElementSibling)) {
            if (sib.tagName === node.tagName) nth++;
        }
        parts.unshift(tag + ':nth-of-type(' + nth + ')');
        node = parent;
    }
    return parts.join('>');
}"#;

fn literal(s: &str) -> String {
    Value::from(s).to_string()
}

pub fn attribute(name: &str) -> String {
    format!(
        "function(el) {{ return el.getAttribute({}); }}",
        literal(name)
    )
}

/// Set a native select's value and fire the events frameworks listen to.
/// Yields `null` for non-select elements and `false` for unknown values.
pub fn select_value(value: &str) -> String {
    format!(
        r#"function(el) {{
    if (el.tagName !== 'SELECT') return null;
    const wanted = {};
    const option = Array.from(el.options).find(o => o.value === wanted);
    if (!option) return false;
    el.value = wanted;
    option.selected = true;
    el.dispatchEvent(new Event('input', {{ bubbles: true }}));
    el.dispatchEvent(new Event('change', {{ bubbles: true }}));
    return true;
}}"#,
        literal(value)
    )
}

/// Synthetic keydown/keyup on the element, for drivers that refuse to type
/// into non-editable widgets.
pub fn dispatch_key(key: &str) -> String {
    format!(
        r#"function(el) {{
    const init = {{ key: {k}, code: {k}, bubbles: true, cancelable: true }};
    el.dispatchEvent(new KeyboardEvent('keydown', init));
    el.dispatchEvent(new KeyboardEvent('keyup', init));
    return true;
}}"#,
        k = literal(key)
    )
}

/// Marks descendants matching `selector` with a query token and returns how
/// many were marked, or -1 when the selector does not parse.
pub fn mark_descendants(selector: &str, token: &str) -> String {
    format!(
        r#"function(el) {{
    let found;
    try {{ found = el.querySelectorAll({}); }} catch (e) {{ return -1; }}
    found.forEach(n => n.setAttribute('data-gazet-q', {}));
    return found.length;
}}"#,
        literal(selector),
        literal(token)
    )
}

pub fn marker_selector(token: &str) -> String {
    format!("[data-gazet-q='{}']", token.replace('\'', "\\'"))
}

/// Document-level statement removing a query token again.
pub fn unmark(token: &str) -> String {
    format!(
        "document.querySelectorAll({}).forEach(n => n.removeAttribute('data-gazet-q'))",
        literal(&marker_selector(token))
    )
}

/// Wrap a helper so that detached elements report `{ gone: true }` and
/// results come back as `{ value }`.
pub fn guarded(body: &str) -> String {
    format!(
        "function(el) {{ if (!el || !el.isConnected) return {{ gone: true }}; \
         const r = ({})(el); return {{ value: r === undefined ? null : r }}; }}",
        body
    )
}

pub fn unwrap_guarded(result: Value, id: u32) -> Result<Value, BackendError> {
    match result {
        Value::Object(mut map) => {
            if map.get("gone").and_then(Value::as_bool) == Some(true) {
                return Err(BackendError::ElementStale { id });
            }
            Ok(map.remove("value").unwrap_or(Value::Null))
        }
        other => Err(BackendError::ScriptError(format!(
            "unexpected helper result: {}",
            other
        ))),
    }
}

/// Decode a helper result expected to be a string or null.
pub fn as_opt_string(value: Value) -> Result<Option<String>, BackendError> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        other => Err(BackendError::ScriptError(format!(
            "expected a string, got {}",
            other
        ))),
    }
}
