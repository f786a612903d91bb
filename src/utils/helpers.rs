// utils/helpers.rs
use chrono::{SecondsFormat, Utc};
use serde_json::Value;

/// Horodatage courant au format RFC 3339
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// Horodatage UTC à la seconde près (`2025-01-01T10:00:00Z`)
pub fn now_utc_compact() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Limiter une chaîne de caractères (sans couper un caractère UTF-8)
pub fn truncate_string(s: &str, max_length: usize) -> String {
    match s.char_indices().nth(max_length) {
        Some((byte_index, _)) => format!("{}...", &s[..byte_index]),
        None => s.to_string(),
    }
}

/// Arrondir un nombre de secondes
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10_f64.powi(decimals);
    (value * factor).round() / factor
}

/// Rendu texte d'une valeur JSON (les chaînes sans guillemets)
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Vérité "à la Python" d'une valeur JSON
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Lire une colonne JSON qui peut être stockée sous forme de chaîne
pub fn json_column(row: &Value, key: &str) -> Value {
    match row.get(key) {
        Some(Value::String(raw)) => serde_json::from_str(raw).unwrap_or(Value::Null),
        Some(other) => other.clone(),
        None => Value::Null,
    }
}

/// Sérialiser une valeur en chaîne JSON si elle n'est pas vide
pub fn json_string_if_truthy(value: Option<&Value>) -> Value {
    match value {
        Some(v) if is_truthy(v) => Value::String(v.to_string()),
        _ => Value::Null,
    }
}

/// Estimer grossièrement un nombre de tokens (≈ 4 caractères par token)
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4
}
