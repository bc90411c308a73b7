pub mod csv_out;
pub mod json;
pub mod minimal;
pub mod table;

use crate::OutputFormat;
use serde_json::{Map, Value};

/// Dispatch output to the appropriate formatter.
pub fn format_output(format: &OutputFormat, value: &Value) {
    match format {
        OutputFormat::Json => json::print_json(value),
        OutputFormat::Table => table::print_table(value),
        OutputFormat::Csv => csv_out::print_csv(value),
        OutputFormat::Minimal => minimal::print_minimal(value),
    }
}

/// Longest scalar array rendered inline; longer series are summarised.
const MAX_INLINE_ITEMS: usize = 12;

/// Flatten nested objects into dotted keys. Arrays of objects (schedules,
/// cash-flow rows) and long series are summarised by length.
pub fn flatten(value: &Value) -> Vec<(String, Value)> {
    let mut fields = Vec::new();
    if let Value::Object(map) = value {
        flatten_into("", map, &mut fields);
    }
    fields
}

fn flatten_into(prefix: &str, map: &Map<String, Value>, fields: &mut Vec<(String, Value)>) {
    for (key, val) in map {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        match val {
            Value::Object(inner) => flatten_into(&path, inner, fields),
            Value::Array(items) if items.iter().any(Value::is_object) => {
                fields.push((path, Value::String(format!("[{} rows]", items.len()))));
            }
            Value::Array(items) if items.len() > MAX_INLINE_ITEMS => {
                fields.push((path, Value::String(format!("[{} values]", items.len()))));
            }
            _ => fields.push((path, val.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flatten_nests_and_summarises() {
        let value = json!({
            "costs": { "gross_cost": "100" },
            "schedule": [{ "month": 1 }, { "month": 2 }],
            "annual": ["-10", "5"],
            "monthly": vec!["1"; 301],
        });
        let fields = flatten(&value);
        assert!(fields.contains(&("costs.gross_cost".to_string(), json!("100"))));
        assert!(fields.contains(&("schedule".to_string(), json!("[2 rows]"))));
        assert!(fields.contains(&("annual".to_string(), json!(["-10", "5"]))));
        assert!(fields.contains(&("monthly".to_string(), json!("[301 values]"))));
    }
}
