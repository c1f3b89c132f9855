//! Heuristic call-argument extraction.
//!
//! Quoted substrings become path/identifier arguments, the request text
//! becomes the content argument for write-like operations, and embedded
//! numbers become count/limit arguments. The operation's input schema
//! steers which property names receive the values.

use serde_json::{json, Map, Value};

use crate::domain::models::OperationInfo;

const PATH_PROPERTIES: &[&str] = &["path", "file_path", "uri", "url", "name", "key", "query", "id"];
const CONTENT_PROPERTIES: &[&str] = &["content", "text", "body", "data", "value"];
const LIMIT_PROPERTIES: &[&str] = &["count", "limit", "max_results", "n"];

/// Substrings wrapped in double quotes, in order of appearance.
pub fn quoted_strings(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find('"') {
        let after = &rest[start + 1..];
        let Some(end) = after.find('"') else { break };
        if end > 0 {
            out.push(after[..end].to_string());
        }
        rest = &after[end + 1..];
    }
    out
}

/// First unsigned integer embedded in the text, if any.
pub fn first_number(text: &str) -> Option<u64> {
    let mut digits = String::new();
    for c in text.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
        } else if !digits.is_empty() {
            break;
        }
    }
    digits.parse().ok()
}

fn schema_properties(operation: &OperationInfo) -> Vec<String> {
    operation
        .input_schema
        .get("properties")
        .and_then(Value::as_object)
        .map(|props| props.keys().cloned().collect())
        .unwrap_or_default()
}

fn is_write_like(operation: &OperationInfo) -> bool {
    let name = operation.name.to_lowercase();
    ["write", "create", "add", "insert", "append", "store", "set"]
        .iter()
        .any(|verb| name.contains(verb))
}

/// Pick the schema property to carry a value, preferring well-known names.
fn pick_property(properties: &[String], preferred: &[&str], fallback: &str) -> String {
    preferred
        .iter()
        .find(|name| properties.iter().any(|p| p == *name))
        .map_or_else(|| fallback.to_string(), |name| (*name).to_string())
}

/// Build best-effort arguments for one operation from the request text.
pub fn extract_arguments(text: &str, operation: &OperationInfo) -> Value {
    let properties = schema_properties(operation);
    let mut args = Map::new();

    let quoted = quoted_strings(text);
    if let Some(first) = quoted.first() {
        let key = pick_property(&properties, PATH_PROPERTIES, "path");
        args.insert(key, json!(first));
    }

    if is_write_like(operation) {
        let key = pick_property(&properties, CONTENT_PROPERTIES, "content");
        // The literal request text is the best content guess available.
        args.entry(key).or_insert_with(|| json!(text));
    }

    if let Some(number) = first_number(text) {
        let key = pick_property(&properties, LIMIT_PROPERTIES, "limit");
        args.entry(key).or_insert_with(|| json!(number));
    }

    Value::Object(args)
}
