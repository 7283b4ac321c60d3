//! Update-document semantics shared by the store backends.

use serde_json::Value;

use super::StoreError;
use crate::filter::path;
use crate::types::{Document, ObjectId, ID_FIELD};

/// Applies `$set` / `$unset` operators to `doc`, returning whether anything changed.
pub fn apply_update(doc: &mut Document, update: &Document) -> Result<bool, StoreError> {
    if update.is_empty() {
        return Err(StoreError::InvalidUpdate("update document is empty".to_string()));
    }

    let mut changed = false;
    for (op, fields) in update {
        let fields = fields
            .as_object()
            .ok_or_else(|| StoreError::InvalidUpdate(format!("{} requires an object", op)))?;
        match op.as_str() {
            "$set" => {
                for (field, value) in fields {
                    if field == ID_FIELD {
                        if doc.get(ID_FIELD) != Some(value) {
                            return Err(StoreError::InvalidUpdate("_id is immutable".to_string()));
                        }
                        continue;
                    }
                    if path::lookup(doc, field) != Some(value) {
                        path::set(doc, field, value.clone())?;
                        changed = true;
                    }
                }
            }
            "$unset" => {
                for field in fields.keys() {
                    if field == ID_FIELD {
                        return Err(StoreError::InvalidUpdate("_id is immutable".to_string()));
                    }
                    changed |= path::remove(doc, field).is_some();
                }
            }
            other if !other.starts_with('$') => {
                return Err(StoreError::InvalidUpdate(format!(
                    "update field {} is not an operator; use a replacement",
                    other
                )));
            }
            other => return Err(StoreError::InvalidUpdate(format!("unsupported update operator {}", other))),
        }
    }
    Ok(changed)
}

/// Seed document for an upsert: the filter's plain equality fields.
pub fn seed_from_filter(filter: &Document) -> Document {
    let mut seed = Document::new();
    for (field, value) in filter {
        if field.starts_with('$') {
            continue;
        }
        let is_operator = value
            .as_object()
            .map_or(false, |obj| obj.keys().any(|k| k.starts_with('$')));
        if !is_operator {
            // the filter parsed successfully, so its paths are valid
            let _ = path::set(&mut seed, field, value.clone());
        }
    }
    seed
}

/// Reads `_id`, assigning a fresh identity when absent.
pub fn ensure_id(doc: &mut Document) -> Result<ObjectId, StoreError> {
    match doc.get(ID_FIELD) {
        Some(Value::String(raw)) => raw
            .parse()
            .map_err(|_| StoreError::InvalidDocument(format!("_id {} is not an object id", raw))),
        Some(other) => Err(StoreError::InvalidDocument(format!("_id {} is not an object id", other))),
        None => {
            let id = ObjectId::new();
            doc.insert(ID_FIELD.to_string(), Value::from(id));
            Ok(id)
        }
    }
}

/// Prepares a replacement for a stored document, keeping its identity.
pub fn prepare_replacement(mut replacement: Document, existing_id: &Value) -> Result<Document, StoreError> {
    if let Some(key) = replacement.keys().find(|k| k.starts_with('$')) {
        return Err(StoreError::InvalidDocument(format!("replacement contains operator {}", key)));
    }
    match replacement.get(ID_FIELD) {
        Some(id) if id != existing_id => {
            return Err(StoreError::InvalidUpdate("_id is immutable".to_string()));
        }
        _ => {}
    }
    replacement.insert(ID_FIELD.to_string(), existing_id.clone());
    Ok(replacement)
}
