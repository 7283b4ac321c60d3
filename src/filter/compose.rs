use serde_json::{json, Value};

use crate::types::{Document, ObjectId, DELETED_FIELD, ID_FIELD};

/// Builds the effective filter for an operation on a resource.
///
/// Without an identity the result is a copy of `static_filter`. With one,
/// `_id` is pinned to it and, for soft-delete resources, documents flagged
/// `_deleted: true` are excluded. The input is never modified.
pub fn compose_filter(static_filter: &Document, id: Option<&ObjectId>, soft_delete: bool) -> Document {
    let mut filter = static_filter.clone();
    if let Some(id) = id {
        filter.insert(ID_FIELD.to_string(), Value::from(*id));
        if soft_delete {
            filter = exclude_deleted(filter);
        }
    }
    filter
}

/// `compose_filter`, additionally hiding flagged documents from
/// identity-less operations on soft-delete resources.
pub fn visible_filter(static_filter: &Document, id: Option<&ObjectId>, soft_delete: bool) -> Document {
    let filter = compose_filter(static_filter, id, soft_delete);
    if soft_delete && id.is_none() {
        exclude_deleted(filter)
    } else {
        filter
    }
}

/// Adds the `_deleted != true` clause to `filter`.
pub fn exclude_deleted(mut filter: Document) -> Document {
    filter.insert(DELETED_FIELD.to_string(), json!({"$ne": true}));
    filter
}
