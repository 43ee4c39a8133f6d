//! Key-name conversion between the schema's camelCase properties and
//! snake_case data keys.

use serde_json::{Map, Value};

/// Convert a name to snake_case (`to_snake == true`) or camelCase.
///
/// Conversion is deterministic and idempotent in each direction.
pub fn to_alternate_case(name: &str, to_snake: bool) -> String {
    if to_snake {
        to_snake_case(name)
    } else {
        to_camel_case(name)
    }
}

/// `firstName` -> `first_name`, `HTTPCode` -> `http_code`.
pub fn to_snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c == '-' || c == ' ' {
            out.push('_');
            continue;
        }
        if c.is_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            let boundary = match prev {
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_uppercase() => next.is_some_and(|n| n.is_lowercase()),
                _ => false,
            };
            if boundary && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// `first_name` -> `firstName`. Leading separators are kept.
pub fn to_camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;

    for c in name.chars() {
        if matches!(c, '_' | '-' | ' ') {
            if out.is_empty() {
                out.push(c);
            } else {
                upper_next = true;
            }
            continue;
        }
        if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Recursively convert every object key in `value`.
pub fn convert_keys(value: &Value, to_snake: bool) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (to_alternate_case(k, to_snake), convert_keys(v, to_snake)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| convert_keys(item, to_snake))
                .collect(),
        ),
        other => other.clone(),
    }
}
