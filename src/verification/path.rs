//! Dotted field-path helpers over JSON records.

use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("field path is empty")]
    Empty,
    #[error("cannot descend into '{0}': not an object")]
    NotAnObject(String),
}

/// Resolves `a.b.c` against a record. Missing segments resolve to `None`.
pub fn get<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(record, |node, segment| node.as_object()?.get(segment))
}

/// Writes `value` at `path`, creating intermediate objects as needed.
pub fn set(record: &mut Value, path: &str, value: Value) -> Result<(), PathError> {
    if path.is_empty() {
        return Err(PathError::Empty);
    }

    let mut node = record;
    let mut parent = String::new();
    let mut segments = path.split('.').peekable();

    while let Some(segment) = segments.next() {
        if node.is_null() {
            *node = Value::Object(Map::new());
        }
        let map = node
            .as_object_mut()
            .ok_or_else(|| PathError::NotAnObject(parent.clone()))?;

        if segments.peek().is_none() {
            map.insert(segment.to_string(), value);
            return Ok(());
        }
        parent = join(&parent, segment);
        node = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }

    Ok(())
}

/// Deep-merges `patch` into `target`. Objects merge key by key; anything
/// else (arrays included) replaces the target value.
pub fn merge(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                match target.get_mut(key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        merge(existing, value)
                    }
                    _ => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}

/// Flattens nested objects to `(dotted path, leaf)` pairs. Arrays and
/// scalars are leaves; an empty object is kept as a leaf of its own.
pub fn flatten(prefix: &str, value: &Map<String, Value>) -> Vec<(String, Value)> {
    let mut out = Vec::new();
    for (key, child) in value {
        let path = join(prefix, key);
        match child {
            Value::Object(inner) if !inner.is_empty() => out.extend(flatten(&path, inner)),
            other => out.push((path, other.clone())),
        }
    }
    out
}

/// True when `ancestor` equals `path` or is a dot-boundary prefix of it.
pub fn is_ancestor_or_self(ancestor: &str, path: &str) -> bool {
    path == ancestor
        || path
            .strip_prefix(ancestor)
            .is_some_and(|rest| rest.starts_with('.'))
}

pub fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}
