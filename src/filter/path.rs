//! Dotted field paths (`version.major`) over JSON documents.

use serde_json::Value;

use super::error::FilterError;
use crate::types::Document;

pub fn validate(path: &str) -> Result<(), FilterError> {
    if path.is_empty() || path.split('.').any(|segment| segment.is_empty() || segment.starts_with('$')) {
        return Err(FilterError::InvalidPath(path.to_string()));
    }
    Ok(())
}

pub fn lookup<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = doc.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Sets `value` at `path`, creating intermediate objects. Fails when an
/// intermediate segment holds a non-object value.
pub fn set(doc: &mut Document, path: &str, value: Value) -> Result<(), FilterError> {
    validate(path)?;
    let segments: Vec<&str> = path.split('.').collect();
    let (last, parents) = segments
        .split_last()
        .ok_or_else(|| FilterError::InvalidPath(path.to_string()))?;

    let mut current = doc;
    for segment in parents {
        let entry = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Document::new()));
        current = match entry {
            Value::Object(map) => map,
            _ => return Err(FilterError::InvalidPath(path.to_string())),
        };
    }
    current.insert(last.to_string(), value);
    Ok(())
}

/// Removes the value at `path`, returning it when present.
pub fn remove(doc: &mut Document, path: &str) -> Option<Value> {
    let segments: Vec<&str> = path.split('.').collect();
    let (last, parents) = segments.split_last()?;

    let mut current = doc;
    for segment in parents {
        current = match current.get_mut(*segment)? {
            Value::Object(map) => map,
            _ => return None,
        };
    }
    current.remove(*last)
}
