use crate::types::PolicyRecord;
use serde_json::Value;

/// Normalize the free-text fields of an extracted policy into a readable
/// canonical form. The model sometimes returns JSON-encoded lists or
/// objects inside these string fields; they become bullet or `key: value`
/// lines. Plain text is trimmed and left alone.
///
/// The transform is idempotent: bullet and keyed text no longer parses as
/// JSON, so a second pass is a no-op.
pub fn normalize_record(mut record: PolicyRecord) -> PolicyRecord {
    for field in [
        &mut record.key_provisions,
        &mut record.company_obligations,
        &mut record.affected_stakeholders,
        &mut record.penalties_fines,
        &mut record.implementation_notes,
        &mut record.notes_commentary,
    ] {
        if let Some(value) = field.take() {
            *field = Some(readable_text(&value));
        }
    }
    record
}

/// Convert one field value into readable text.
pub fn readable_text(value: &str) -> String {
    match serde_json::from_str::<Value>(value) {
        Ok(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(format!("\u{2022} {}", s.trim())),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n"),
        Ok(Value::Object(map)) => map
            .into_iter()
            .map(|(key, val)| match val {
                Value::String(s) => format!("{}: {}", key, s),
                other => format!("{}: {}", key, other),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        Ok(Value::String(s)) => s.trim().to_string(),
        Ok(other) => other.to_string(),
        Err(_) => value.trim().to_string(),
    }
}
