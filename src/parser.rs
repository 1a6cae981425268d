//! Response parser: pull a JSON object out of free-form model output
//!
//! Models wrap their answer in prose, markdown fences or both. Candidates are
//! tried in order and the first one that parses wins:
//!
//! 1. the whole response
//! 2. a fenced block labelled `json`
//! 3. any fenced block
//! 4. the first balanced `{...}` span (string and escape aware), then the
//!    widest `{...}` span
//!
//! Every step runs on the text as given first, then once more with `\_`
//! escapes repaired. Whatever parses is then coerced so that it always
//! carries a `scope_of_work` array.

use serde_json::{json, Map, Value};

use crate::errors::{Result, ScopeError};

/// Top-level key every parsed scope carries
pub const SCOPE_KEY: &str = "scope_of_work";

/// Locate and parse the JSON payload in `raw`
pub fn extract_json(raw: &str) -> Result<Value> {
    let text = raw.trim();

    if text.is_empty() {
        return Err(ScopeError::Parse("model returned no output".to_string()));
    }

    if let Some(value) = find_payload(text) {
        return Ok(value);
    }

    // second pass with `\_` escapes repaired; valid JSON never needs it
    let repaired = sanitize(text);
    if repaired != text {
        if let Some(value) = find_payload(&repaired) {
            return Ok(value);
        }
    }

    Err(ScopeError::Parse(
        "could not extract valid JSON from model output".to_string(),
    ))
}

fn find_payload(text: &str) -> Option<Value> {
    if let Some(value) = parse_structured(text) {
        return Some(value);
    }

    let fenced = [fenced_block(text, Some("json")), fenced_block(text, None)];
    for block in fenced.into_iter().flatten() {
        if let Some(value) = parse_structured(block) {
            return Some(value);
        }
    }

    if let Some((start, end)) = find_balanced_object(text) {
        if let Some(value) = parse_structured(&text[start..=end]) {
            return Some(value);
        }
    }

    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => parse_structured(&text[start..=end]),
        _ => None,
    }
}

/// Ensure the value has a `scope_of_work` array
pub fn coerce_scope(value: Value) -> Value {
    match value {
        Value::Array(items) => json!({ SCOPE_KEY: items }),
        Value::Object(mut map) => {
            match map.get(SCOPE_KEY) {
                Some(Value::Array(_)) => {}
                Some(Value::Object(single)) => {
                    let single = Value::Object(single.clone());
                    map.insert(SCOPE_KEY.to_string(), Value::Array(vec![single]));
                }
                Some(_) => {
                    map.insert(SCOPE_KEY.to_string(), Value::Array(Vec::new()));
                }
                None => adopt_module_list(&mut map),
            }
            Value::Object(map)
        }
        _ => empty_scope(),
    }
}

/// `extract_json` followed by `coerce_scope`
pub fn try_parse_response(raw: &str) -> Result<Value> {
    extract_json(raw).map(coerce_scope)
}

/// Parse model output, falling back to an empty scope.
///
/// Never fails; the error and the raw output go to stderr.
pub fn parse_response(raw: &str) -> Value {
    match try_parse_response(raw) {
        Ok(value) => value,
        Err(e) => {
            eprintln!("Warning: {}", e);
            eprintln!("Raw model output:\n{}", raw);
            empty_scope()
        }
    }
}

/// `{"scope_of_work": []}`
pub fn empty_scope() -> Value {
    json!({ SCOPE_KEY: [] })
}

fn parse_structured(text: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(text.trim()) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => Some(value),
        _ => None,
    }
}

/// Models often escape underscores in keys (`sub\_module`), which is not a
/// valid JSON escape.
fn sanitize(text: &str) -> String {
    text.replace("\\_", "_")
}

/// Contents of the first fenced block, optionally requiring a language label
fn fenced_block<'a>(text: &'a str, label: Option<&str>) -> Option<&'a str> {
    let body_start = match label {
        Some(label) => {
            let marker = format!("```{}", label);
            text.find(&marker)? + marker.len()
        }
        None => {
            let pos = text.find("```")? + 3;
            // skip a language label on the fence line
            let line_end = text[pos..].find('\n').map(|i| pos + i).unwrap_or(text.len());
            let label = text[pos..line_end].trim();
            if !label.is_empty() && label.chars().all(|c| c.is_ascii_alphanumeric()) {
                line_end
            } else {
                pos
            }
        }
    };

    let rest = &text[body_start..];
    let end = rest.find("```")?;
    Some(rest[..end].trim())
}

/// Byte range of the first complete top-level `{...}`
fn find_balanced_object(text: &str) -> Option<(usize, usize)> {
    let mut depth = 0usize;
    let mut start: Option<usize> = None;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, &byte) in text.as_bytes().iter().enumerate() {
        if escape_next {
            escape_next = false;
            continue;
        }

        if start.is_some() && in_string && byte == b'\\' {
            escape_next = true;
            continue;
        }

        // quotes only matter once inside an object
        if byte == b'"' && start.is_some() {
            in_string = !in_string;
            continue;
        }

        if in_string {
            continue;
        }

        match byte {
            b'{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            // stray closers before the first object are prose
            b'}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    return start.map(|s| (s, i));
                }
            }
            _ => {}
        }
    }

    None
}

/// Object without `scope_of_work`: adopt the first module-shaped array, or
/// treat the object itself as a single module, or insert an empty list
fn adopt_module_list(map: &mut Map<String, Value>) {
    let adopted = map
        .iter()
        .find(|(_, v)| is_module_list(v))
        .map(|(k, _)| k.clone());

    if let Some(key) = adopted {
        if let Some(list) = map.remove(&key) {
            map.insert(SCOPE_KEY.to_string(), list);
        }
        return;
    }

    if map.contains_key("module") {
        let module = Value::Object(std::mem::take(map));
        map.insert(SCOPE_KEY.to_string(), Value::Array(vec![module]));
        return;
    }

    map.insert(SCOPE_KEY.to_string(), Value::Array(Vec::new()));
}

fn is_module_list(value: &Value) -> bool {
    match value {
        Value::Array(items) => {
            !items.is_empty()
                && items
                    .iter()
                    .all(|item| item.get("module").is_some() || item.get("sub_modules").is_some())
        }
        _ => false,
    }
}
