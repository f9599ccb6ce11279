// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Colored rendering of export values for the terminal

use owo_colors::OwoColorize;
use reqload_core::{Exports, Status, Value};

/// Nested module objects deeper than this are summarized
const MAX_DEPTH: usize = 4;

/// Format a value for display with syntax coloring
pub fn format_value(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value, &mut Vec::new(), 0);
    out
}

/// Format an exports object as an indented tree
pub fn format_exports(exports: &Exports) -> String {
    let mut out = String::new();
    write_exports(&mut out, exports, &mut Vec::new(), 0);
    out
}

/// Format a module status with its conventional color
pub fn format_status(status: Status) -> String {
    match status {
        Status::NotStarted => status.to_string().dimmed().to_string(),
        Status::InProgress => status.to_string().yellow().to_string(),
        Status::Done => status.to_string().green().to_string(),
    }
}

fn write_exports(out: &mut String, exports: &Exports, seen: &mut Vec<Exports>, depth: usize) {
    if seen.iter().any(|s| s.ptr_eq(exports)) {
        out.push_str(&"[Circular]".cyan().to_string());
        return;
    }
    if exports.is_empty() {
        out.push_str("{}");
        return;
    }
    if depth >= MAX_DEPTH {
        out.push_str(&"[Module]".cyan().to_string());
        return;
    }

    seen.push(exports.clone());
    let indent = "  ".repeat(depth + 1);
    out.push_str("{\n");
    for (key, value) in exports.entries() {
        out.push_str(&indent);
        out.push_str(&key);
        out.push_str(": ");
        write_value(out, &value, seen, depth + 1);
        out.push_str(",\n");
    }
    out.push_str(&"  ".repeat(depth));
    out.push('}');
    seen.pop();
}

fn write_value(out: &mut String, value: &Value, seen: &mut Vec<Exports>, depth: usize) {
    let rendered = match value {
        Value::Undefined => "undefined".blue().dimmed().to_string(),
        Value::Null => "null".blue().to_string(),
        Value::Bool(b) => b.to_string().yellow().to_string(),
        Value::Number(n) => {
            if n.is_nan() {
                "NaN".yellow().to_string()
            } else if n.is_infinite() {
                if *n > 0.0 {
                    "Infinity".yellow().to_string()
                } else {
                    "-Infinity".yellow().to_string()
                }
            } else {
                n.to_string().yellow().to_string()
            }
        }
        Value::String(s) => format!("'{}'", s).green().to_string(),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_value(out, item, seen, depth);
            }
            out.push(']');
            return;
        }
        Value::Function(func) => format!("[Function: {}]", func.name()).magenta().to_string(),
        Value::Object(exports) => {
            write_exports(out, exports, seen, depth);
            return;
        }
        Value::Opaque(_) => "[Opaque]".cyan().to_string(),
    };
    out.push_str(&rendered);
}
