use serde_json::Value;

use super::flatten;

/// Headline fields, in order of preference, over the flattened result.
const PRIORITY_KEYS: [&str; 6] = [
    "financing.base_monthly_payment",
    "metrics.npv",
    "base_monthly_payment",
    "label",
    "annual_file",
    "gross_cost",
];

/// Print just the key answer value from the output.
///
/// Objects print the first priority field present; arrays (catalog,
/// comparison) print one line per row, prefixed by the row id.
pub fn print_minimal(value: &Value) {
    let result = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    match result {
        Value::Array(rows) => {
            for row in rows {
                let id = row
                    .get("profile_id")
                    .or_else(|| row.get("id"))
                    .map(format_minimal)
                    .unwrap_or_default();
                println!("{}: {}", id, headline(row));
            }
        }
        _ => println!("{}", headline(result)),
    }
}

fn headline(value: &Value) -> String {
    let fields = flatten(value);
    for key in PRIORITY_KEYS {
        if let Some((_, val)) = fields.iter().find(|(k, v)| k == key && !v.is_null()) {
            return format_minimal(val);
        }
    }

    // Fall back to the first field
    match fields.first() {
        Some((key, val)) => format!("{}: {}", key, format_minimal(val)),
        None => format_minimal(value),
    }
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
