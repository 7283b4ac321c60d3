use serde_json::Value;

use super::error::FilterError;
use super::path;
use crate::types::{Document, ID_FIELD};

/// Field selection applied to documents on the way out of the store.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    Include { fields: Vec<String>, with_id: bool },
    Exclude(Vec<String>),
}

impl Projection {
    /// Parses `{"from": 1, "amount": 1}` or `{"secret": 0}`. Inclusion and
    /// exclusion cannot be mixed, except for `_id: 0`.
    pub fn parse(spec: &Document) -> Result<Self, FilterError> {
        let mut included = Vec::new();
        let mut excluded = Vec::new();
        let mut with_id = true;

        for (field, flag) in spec {
            path::validate(field)?;
            let include = match flag {
                Value::Bool(b) => *b,
                Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
                other => {
                    return Err(FilterError::InvalidProjection(format!("{}: {}", field, other)));
                }
            };
            if field == ID_FIELD {
                with_id = include;
                if !include {
                    excluded.push(field.clone());
                }
            } else if include {
                included.push(field.clone());
            } else {
                excluded.push(field.clone());
            }
        }

        if included.is_empty() {
            return Ok(Projection::Exclude(excluded));
        }
        if excluded.iter().any(|f| f != ID_FIELD) {
            return Err(FilterError::InvalidProjection(
                "cannot mix inclusion and exclusion".to_string(),
            ));
        }
        Ok(Projection::Include { fields: included, with_id })
    }

    pub fn apply(&self, doc: Document) -> Document {
        match self {
            Projection::Include { fields, with_id } => {
                let mut out = Document::new();
                if *with_id {
                    if let Some(id) = doc.get(ID_FIELD) {
                        out.insert(ID_FIELD.to_string(), id.clone());
                    }
                }
                for field in fields {
                    if let Some(value) = path::lookup(&doc, field) {
                        // paths are validated at parse time
                        let _ = path::set(&mut out, field, value.clone());
                    }
                }
                out
            }
            Projection::Exclude(fields) => {
                let mut out = doc;
                for field in fields {
                    path::remove(&mut out, field);
                }
                out
            }
        }
    }
}
