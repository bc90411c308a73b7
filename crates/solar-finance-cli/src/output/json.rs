use serde_json::Value;
use std::io::{self, Write};

/// Pretty-print JSON to stdout, newline-terminated.
pub fn print_json(value: &Value) {
    let mut out = io::stdout().lock();
    if let Err(e) = serde_json::to_writer_pretty(&mut out, value) {
        eprintln!("JSON serialization error: {}", e);
        return;
    }
    let _ = writeln!(out);
}
