use serde::Serialize;
use serde_json::Value;
use std::io;
use std::path::Path;

use super::flatten;

/// Write output as CSV to stdout.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    let body = match value {
        Value::Object(map) => map.get("result").unwrap_or(value),
        _ => value,
    };
    match body {
        Value::Array(rows) => write_array_csv(&mut wtr, rows),
        Value::Object(_) => {
            // Two-column CSV: field, value
            let _ = wtr.write_record(["field", "value"]);
            for (key, val) in flatten(body) {
                let _ = wtr.write_record([key, format_csv_value(&val)]);
            }
        }
        _ => {
            let _ = wtr.write_record([&format_csv_value(body)]);
        }
    }

    let _ = wtr.flush();
}

/// Serialise `rows` to a CSV file at `path`: a header row from the field
/// names, then one record per row.
pub fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), Box<dyn std::error::Error>> {
    let mut wtr = csv::Writer::from_path(path)
        .map_err(|e| format!("Failed to create '{}': {}", path.display(), e))?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

fn write_array_csv<W: io::Write>(wtr: &mut csv::Writer<W>, arr: &[Value]) {
    let rows: Vec<Vec<(String, Value)>> = arr.iter().map(flatten).collect();
    let Some(first) = rows.first() else {
        return;
    };

    if first.is_empty() {
        for item in arr {
            let _ = wtr.write_record([&format_csv_value(item)]);
        }
        return;
    }

    let headers: Vec<&str> = first.iter().map(|(k, _)| k.as_str()).collect();
    let _ = wtr.write_record(&headers);
    for row in &rows {
        let record: Vec<String> = headers
            .iter()
            .map(|h| {
                row.iter()
                    .find(|(k, _)| k == h)
                    .map(|(_, v)| format_csv_value(v))
                    .unwrap_or_default()
            })
            .collect();
        let _ = wtr.write_record(&record);
    }
}

fn format_csv_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_array_csv_flattens_nested_profile() {
        let rows = vec![
            json!({"profile_id": 0, "profile": {"term_years": 25}, "npv": "1.5"}),
            json!({"profile_id": 1, "profile": {"term_years": 20}, "npv": null}),
        ];
        let mut wtr = csv::Writer::from_writer(Vec::new());
        write_array_csv(&mut wtr, &rows);
        let text = String::from_utf8(wtr.into_inner().unwrap()).unwrap();
        assert_eq!(
            text,
            "npv,profile.term_years,profile_id\n1.5,25,0\n,20,1\n"
        );
    }
}
