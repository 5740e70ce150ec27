//! Field extraction from search responses.

use serde::Deserialize;
use serde_json::Value;

use crate::error::Result;

/// Parses a search response of any nesting depth.
///
/// The parser's recursion limit is lifted and its stack grows on demand, so
/// depth is bounded by memory rather than by the call stack.
///
/// # Errors
///
/// Returns [`crate::SliceError::Serialization`] if `body` is not one JSON
/// document.
pub fn parse_document(body: &str) -> Result<Value> {
    let mut json = serde_json::Deserializer::from_str(body);
    json.disable_recursion_limit();
    let value = Value::deserialize(serde_stacker::Deserializer::new(&mut json))?;
    json.end()?;
    Ok(value)
}

/// Drops `document` without recursing into it.
pub fn release(document: Value) {
    let mut pending = vec![document];
    while let Some(value) = pending.pop() {
        match value {
            Value::Array(items) => pending.extend(items),
            Value::Object(map) => pending.extend(map.into_iter().map(|(_, v)| v)),
            _ => {}
        }
    }
}

enum Frame<'a> {
    Visit(&'a Value),
    Emit(&'a Value),
}

/// Collects every value stored under `field`, at any depth, in pre-order.
///
/// Map entries are visited in document order: a matching entry is emitted
/// before its own value is descended into, and both happen before the next
/// entry. Sequence elements are visited in order. String values yield their
/// text; anything else yields its compact JSON form.
///
/// The walk uses an explicit stack, so deeply nested documents cannot
/// exhaust the call stack.
#[must_use]
pub fn extract_field(document: &Value, field: &str) -> Vec<String> {
    let mut found = Vec::new();
    let mut stack = vec![Frame::Visit(document)];

    while let Some(frame) = stack.pop() {
        match frame {
            Frame::Emit(value) => found.push(value_text(value)),
            Frame::Visit(Value::Object(map)) => {
                for (key, value) in map.iter().rev() {
                    stack.push(Frame::Visit(value));
                    if key == field {
                        stack.push(Frame::Emit(value));
                    }
                }
            }
            Frame::Visit(Value::Array(items)) => {
                stack.extend(items.iter().rev().map(Frame::Visit));
            }
            Frame::Visit(_) => {}
        }
    }

    found
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
