//! Field diff engine: reduces an edited record to the keys that changed.

use mongodb::bson::{self, Document};
use serde_json::{Map, Value};

use super::path;

/// Returns the keys of `current` whose value differs from `original`.
///
/// Nested objects are compared key by key and only their changed keys are
/// kept. Arrays and scalars compare by full equality. Keys that exist only in
/// `original` are ignored: absence in an edit means "untouched".
pub fn diff(current: &Value, original: &Value) -> Map<String, Value> {
    let mut changes = Map::new();
    let Some(current) = current.as_object() else {
        return changes;
    };
    let original = original.as_object();

    for (key, value) in current {
        let before = original.and_then(|map| map.get(key));
        match (value, before) {
            (Value::Object(_), Some(before @ Value::Object(_))) => {
                let nested = diff(value, before);
                if !nested.is_empty() {
                    changes.insert(key.clone(), Value::Object(nested));
                }
            }
            (value, Some(before)) if value == before => {}
            // A null edit on a field that never existed is not a change.
            (Value::Null, None) => {}
            (value, _) => {
                changes.insert(key.clone(), value.clone());
            }
        }
    }

    changes
}

pub fn has_changes(current: &Value, original: &Value) -> bool {
    !diff(current, original).is_empty()
}

/// Dotted leaf paths of a diff, sorted.
pub fn changed_paths(changes: &Map<String, Value>) -> Vec<String> {
    let mut paths: Vec<String> = path::flatten("", changes)
        .into_iter()
        .map(|(path, _)| path)
        .collect();
    paths.sort();
    paths
}

/// Flattens a diff into a `$set` document under `prefix`, so untouched
/// siblings of a nested change are left alone in storage.
pub fn to_set_document(prefix: &str, changes: &Map<String, Value>) -> Result<Document, bson::ser::Error> {
    let mut set = Document::new();
    for (path, value) in path::flatten(prefix, changes) {
        set.insert(path, bson::to_bson(&value)?);
    }
    Ok(set)
}
