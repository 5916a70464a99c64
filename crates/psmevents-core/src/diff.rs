//! Unified diffs for `object.updated` events.
//!
//! Both snapshots are pretty-printed the same way (two-space indent, keys in
//! the order they arrived) and compared line by line, so a diff only shows
//! fields whose rendered line changed.

use serde_json::{Map, Value};
use similar::TextDiff;
use thiserror::Error;

/// Default number of context lines around each change.
pub const DEFAULT_CONTEXT: usize = 2;

const UPDATED_METHOD: &str = "object.updated";

/// Why an event cannot be rendered as a diff.
///
/// Not a failure: callers print the whole event instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotDiffable {
    #[error("not an object.updated event")]
    NotAnUpdate,

    #[error("event has no params object")]
    MissingParams,

    #[error("params has no type string")]
    MissingType,

    #[error("params has no oldObject")]
    MissingOldObject,

    #[error("params has no newObject")]
    MissingNewObject,
}

/// Render an `object.updated` event as a unified diff of its old and new
/// object, with `context` unchanged lines around each change.
pub fn render_diff(event: &Value, context: usize) -> Result<String, NotDiffable> {
    if event.get("method").and_then(Value::as_str) != Some(UPDATED_METHOD) {
        return Err(NotDiffable::NotAnUpdate);
    }
    let params = event
        .get("params")
        .and_then(Value::as_object)
        .ok_or(NotDiffable::MissingParams)?;
    let object_type = params
        .get("type")
        .and_then(Value::as_str)
        .ok_or(NotDiffable::MissingType)?;
    let old_object = params
        .get("oldObject")
        .and_then(Value::as_object)
        .ok_or(NotDiffable::MissingOldObject)?;
    let new_object = params
        .get("newObject")
        .and_then(Value::as_object)
        .ok_or(NotDiffable::MissingNewObject)?;

    let old_text = snapshot(old_object);
    let new_text = snapshot(new_object);
    let diff = TextDiff::from_lines(&old_text, &new_text);
    Ok(diff
        .unified_diff()
        .context_radius(context)
        .header(&format!("old {object_type}"), &format!("new {object_type}"))
        .to_string())
}

fn snapshot(object: &Map<String, Value>) -> String {
    // Serializing a map of `Value`s cannot fail.
    let mut text = serde_json::to_string_pretty(object).unwrap_or_default();
    text.push('\n');
    text
}
