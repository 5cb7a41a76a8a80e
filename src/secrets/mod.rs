//! Credential handling: redaction for display and encryption at rest.

mod cipher;

pub use cipher::{CipherError, FieldCipher, ENCRYPTED_PREFIX, KEY_ENV_VAR};

use serde_json::{Map, Value};

/// Name fragments that mark a field as holding a credential.
const SENSITIVE_FRAGMENTS: &[&str] = &[
    "token",
    "apikey",
    "api_key",
    "password",
    "secret",
    "credential",
    "auth",
    "key",
    "plextoken",
    "x-api-key",
    "passwd",
    "bearer",
];

/// Characters kept at each end of a masked value by default.
pub const DEFAULT_VISIBLE_CHARS: usize = 4;

const MIN_MASK_LEN: usize = 8;

/// True when `field_name` looks like it holds a credential (case-insensitive).
pub fn is_sensitive(field_name: &str) -> bool {
    let name = field_name.to_lowercase();
    SENSITIVE_FRAGMENTS.iter().any(|fragment| name.contains(fragment))
}

/// Redact `value`, keeping `visible` characters at each end of long values.
///
/// Short values are fully starred (at most 8 stars) so their length does
/// not leak; long values always get at least 8 stars in the middle.
pub fn mask(value: Option<&str>, visible: usize) -> String {
    let Some(value) = value.filter(|v| !v.is_empty()) else {
        return String::new();
    };

    let chars: Vec<char> = value.chars().collect();
    let len = chars.len();
    if len <= visible * 2 {
        return "*".repeat(len.min(MIN_MASK_LEN));
    }

    let head: String = chars[..visible].iter().collect();
    let tail: String = chars[len - visible..].iter().collect();
    let stars = "*".repeat((len - 2 * visible).max(MIN_MASK_LEN));
    format!("{}{}{}", head, stars, tail)
}

/// Copy of `value` with every credential-named field masked.
///
/// Objects are walked recursively. Arrays are returned untouched, as are
/// nulls. Numbers and booleans under sensitive names are masked as text.
pub fn mask_object(value: &Value, visible: usize) -> Value {
    match value {
        Value::Object(map) => Value::Object(mask_map(map, visible)),
        other => other.clone(),
    }
}

fn mask_map(map: &Map<String, Value>, visible: usize) -> Map<String, Value> {
    map.iter()
        .map(|(name, value)| {
            let masked = match value {
                Value::Object(inner) => Value::Object(mask_map(inner, visible)),
                Value::String(s) if is_sensitive(name) => Value::String(mask(Some(s), visible)),
                Value::Number(_) | Value::Bool(_) if is_sensitive(name) => {
                    Value::String(mask(Some(&value.to_string()), visible))
                }
                other => other.clone(),
            };
            (name.clone(), masked)
        })
        .collect()
}
