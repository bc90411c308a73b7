use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

use super::flatten;

/// Format output as a table using the tabled crate.
pub fn print_table(value: &Value) {
    match value {
        Value::Object(map) => match map.get("result") {
            Some(Value::Array(rows)) => {
                print_array_table(rows);
                print_envelope_notes(map);
            }
            Some(result) => {
                print_field_table(result);
                print_envelope_notes(map);
            }
            None => print_field_table(value),
        },
        Value::Array(arr) => print_array_table(arr),
        _ => println!("{}", value),
    }
}

fn print_envelope_notes(envelope: &Map<String, Value>) {
    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings.iter().filter_map(Value::as_str) {
                println!("  - {}", w);
            }
        }
    }

    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
}

fn print_field_table(value: &Value) {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in flatten(value) {
        builder.push_record([key, format_value(&val)]);
    }
    println!("{}", Table::from(builder));
}

fn print_array_table(arr: &[Value]) {
    if arr.is_empty() {
        println!("(empty)");
        return;
    }

    // Headers from the first row; nested profile fields become dotted columns
    let rows: Vec<Vec<(String, Value)>> = arr.iter().map(flatten).collect();
    let headers: Vec<String> = rows[0].iter().map(|(k, _)| k.clone()).collect();
    if headers.is_empty() {
        for item in arr {
            println!("{}", format_value(item));
        }
        return;
    }

    let mut builder = Builder::default();
    builder.push_record(headers.clone());
    for row in &rows {
        let record: Vec<String> = headers
            .iter()
            .map(|h| {
                row.iter()
                    .find(|(k, _)| k == h)
                    .map(|(_, v)| format_value(v))
                    .unwrap_or_default()
            })
            .collect();
        builder.push_record(record);
    }
    println!("{}", Table::from(builder));
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "-".to_string(),
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(format_value).collect();
            items.join(", ")
        }
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}
