use crate::models::{Metadata, FILE_PATH_KEY, PAGE_NUMBER_KEY, UNKNOWN};
use serde_json::Value;

const LEGACY_PAGE_KEYS: [&str; 3] = ["page_label", "page", "page_num"];

const LEGACY_PATH_KEYS: [&str; 2] = ["source", "file_name"];

/// Nested values are flattened to JSON text. Normalizing twice yields the same map.
pub fn normalize_metadata(raw: Metadata) -> Metadata {
    let mut metadata = raw;

    let page = take_first(&mut metadata, PAGE_NUMBER_KEY, &LEGACY_PAGE_KEYS)
        .and_then(|value| stringify(&value))
        .unwrap_or_else(|| UNKNOWN.to_string());

    let path = take_first(&mut metadata, FILE_PATH_KEY, &LEGACY_PATH_KEYS)
        .and_then(|value| stringify(&value))
        .unwrap_or_else(|| UNKNOWN.to_string());

    for value in metadata.values_mut() {
        if value.is_array() || value.is_object() {
            *value = Value::String(value.to_string());
        }
    }

    metadata.insert(PAGE_NUMBER_KEY.to_string(), Value::String(page));
    metadata.insert(FILE_PATH_KEY.to_string(), Value::String(path));
    metadata
}

fn take_first(metadata: &mut Metadata, canonical: &str, legacy: &[&str]) -> Option<Value> {
    let mut found = metadata.remove(canonical).filter(|value| !value.is_null());
    for key in legacy {
        let value = metadata.remove(*key).filter(|value| !value.is_null());
        if found.is_none() {
            found = value;
        }
    }
    found
}

fn stringify(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(text) => text.trim().to_string(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        other => other.to_string(),
    };

    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}
