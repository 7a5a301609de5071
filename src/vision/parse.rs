//! Lenient parsing of vision service responses.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use super::VisionDiff;

fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)^\s*```[A-Za-z]*\s*(.*?)\s*```\s*$").expect("fence pattern is valid")
    })
}

/// Parse a raw service response into a [`VisionDiff`].
///
/// Markdown code fences are stripped. The changed map is read from `changed`
/// or `text`, the moved list from `moved` or `move`. A field of the wrong type
/// counts as empty, and a response that is not a JSON object yields an empty
/// diff.
pub fn parse_response(raw: &str) -> VisionDiff {
    let body = match fence_regex().captures(raw) {
        Some(caps) => caps.get(1).map_or(raw, |m| m.as_str()),
        None => raw.trim(),
    };

    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(e) => {
            log::warn!("vision response is not valid JSON: {}", e);
            return VisionDiff::default();
        }
    };
    let Value::Object(fields) = value else {
        log::warn!("vision response is not a JSON object");
        return VisionDiff::default();
    };

    let field = |names: &[&str]| names.iter().find_map(|n| fields.get(*n));

    let changed = match field(&["changed", "text"]) {
        Some(Value::Object(map)) => map
            .iter()
            .filter_map(|(new, old)| scalar(old).map(|old| (new.clone(), old)))
            .collect(),
        Some(other) => {
            log::warn!("vision 'changed' field is not an object: {}", other);
            Vec::new()
        }
        None => Vec::new(),
    };

    VisionDiff {
        changed,
        missing: string_list(field(&["missing"])),
        moved: string_list(field(&["moved", "move"])),
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(scalar).collect(),
        _ => Vec::new(),
    }
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
