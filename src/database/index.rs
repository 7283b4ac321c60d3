use serde_json::Value;

use crate::filter::path;
use crate::types::Document;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Ascending,
    Descending,
    Geo,
    Hashed,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexField {
    pub path: String,
    pub kind: IndexKind,
}

impl IndexField {
    /// Reads a declared field: `-when` descending, `@location` geospatial,
    /// `#owner` hashed, `~caption` text, plain ascending.
    pub fn parse(spec: &str) -> Self {
        let (kind, path) = match spec.chars().next() {
            Some('-') => (IndexKind::Descending, &spec[1..]),
            Some('@') => (IndexKind::Geo, &spec[1..]),
            Some('#') => (IndexKind::Hashed, &spec[1..]),
            Some('~') => (IndexKind::Text, &spec[1..]),
            _ => (IndexKind::Ascending, spec),
        };
        Self { path: path.to_string(), kind }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexModel {
    pub name: String,
    pub fields: Vec<IndexField>,
    pub unique: bool,
    pub sparse: bool,
}

impl IndexModel {
    pub fn new(name: impl Into<String>, fields: &[&str], unique: bool) -> Self {
        Self {
            name: name.into(),
            fields: fields.iter().map(|f| IndexField::parse(f)).collect(),
            unique,
            sparse: true,
        }
    }

    /// Key of `doc` under this index; `None` when a sparse index skips it.
    pub fn key_of(&self, doc: &Document) -> Option<Vec<Value>> {
        let values: Vec<Option<&Value>> = self.fields.iter().map(|f| path::lookup(doc, &f.path)).collect();
        if self.sparse && values.iter().all(Option::is_none) {
            return None;
        }
        Some(values.into_iter().map(|v| v.cloned().unwrap_or(Value::Null)).collect())
    }

    pub fn describe_key(&self, key: &[Value]) -> String {
        let parts: Vec<String> = self
            .fields
            .iter()
            .zip(key)
            .map(|(f, v)| format!("{}: {}", f.path, v))
            .collect();
        format!("{{ {} }}", parts.join(", "))
    }
}
