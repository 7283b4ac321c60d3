use std::cmp::Ordering;

use serde_json::Value;

use super::filter_where::{compare_same_type, json_path};
use super::path;
use super::types::{SortDirection, SortKey};
use crate::types::Document;

pub struct FilterOrder;

impl FilterOrder {
    /// Compares two documents key by key. Missing and null values sort first.
    pub fn compare(a: &Document, b: &Document, keys: &[SortKey]) -> Ordering {
        for key in keys {
            let ordering = total_order(path::lookup(a, &key.path), path::lookup(b, &key.path));
            let ordering = match key.sort {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }

    /// `ORDER BY` over the JSONB body, falling back to insertion order.
    pub fn generate(keys: &[SortKey]) -> String {
        let mut parts: Vec<String> = keys
            .iter()
            .map(|k| format!("{} {}", json_path(&k.path), k.sort.to_sql()))
            .collect();
        parts.push("\"seq\" ASC".to_string());
        format!("ORDER BY {}", parts.join(", "))
    }
}

fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Number(_)) => 1,
        Some(Value::String(_)) => 2,
        Some(Value::Object(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Bool(_)) => 5,
    }
}

pub fn total_order(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let (ra, rb) = (type_rank(a), type_rank(b));
    if ra != rb {
        return ra.cmp(&rb);
    }
    match (a, b) {
        (Some(x), Some(y)) => compare_same_type(x, y).unwrap_or(Ordering::Equal),
        _ => Ordering::Equal,
    }
}
