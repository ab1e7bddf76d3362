//! Reply formatting for terminal output, in the familiar redis-cli
//! shapes: `(integer) n`, `(nil)`, quoted bulks, numbered arrays.

use cinder_protocol::Frame;
use colored::Colorize;

/// Formats a reply frame for printing.
pub fn format_response(frame: &Frame) -> String {
    match frame {
        Frame::Simple(s) => s.clone(),
        Frame::Error(e) => format!("(error) {e}").red().to_string(),
        Frame::Integer(n) => format!("(integer) {n}"),
        Frame::Bulk(data) => format!("\"{}\"", String::from_utf8_lossy(data)),
        Frame::Null | Frame::NullArray => "(nil)".dimmed().to_string(),
        Frame::Array(items) => {
            if items.is_empty() {
                return "(empty array)".dimmed().to_string();
            }
            let width = items.len().to_string().len();
            items
                .iter()
                .enumerate()
                .map(|(i, item)| format!("{:>width$}) {}", i + 1, format_inline(item)))
                .collect::<Vec<_>>()
                .join("\n")
        }
    }
}

/// Formats a nested element on a single line.
fn format_inline(frame: &Frame) -> String {
    match frame {
        Frame::Array(items) => {
            let parts: Vec<String> = items.iter().map(format_inline).collect();
            format!("[{}]", parts.join(", "))
        }
        other => format_response(other),
    }
}
