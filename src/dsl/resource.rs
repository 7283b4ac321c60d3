use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::methods::ResourceMethod;
use super::model::{model, Model, ModelBinding};
use crate::filter::SortKey;
use crate::types::Document;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    List,
    Create,
    Read,
    Update,
    Replace,
    Delete,
}

impl Verb {
    pub const ALL: [Verb; 6] = [Verb::List, Verb::Create, Verb::Read, Verb::Update, Verb::Replace, Verb::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::List => "list",
            Verb::Create => "create",
            Verb::Read => "read",
            Verb::Update => "update",
            Verb::Replace => "replace",
            Verb::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// Exactly one document
    Simple,
    /// Many documents addressed by identity
    List,
}

/// Where a resource's documents live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub database: String,
    pub collection: String,
}

impl TableRef {
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self { database: database.into(), collection: collection.into() }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.collection)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    /// Field names, optionally prefixed: `-` descending, `@` geospatial,
    /// `#` hashed, `~` text
    pub fields: Vec<String>,
    pub unique: bool,
}

/// Declarative description of one REST resource.
#[derive(Clone)]
pub struct Resource {
    pub kind: ResourceKind,
    pub table: TableRef,
    /// Empty means every verb the kind supports
    pub verbs: BTreeSet<Verb>,
    /// AND-ed into every operation; must be a JSON object
    pub filter: Value,
    pub soft_delete: bool,
    pub sort: Vec<SortKey>,
    pub list_projection: Option<Value>,
    pub item_projection: Option<Value>,
    pub methods: BTreeMap<String, ResourceMethod>,
    pub item_methods: BTreeMap<String, ResourceMethod>,
    pub indexes: BTreeMap<String, IndexSpec>,
    pub list_max_results: Option<u64>,
    pub model: Arc<dyn ModelBinding>,
}

impl Resource {
    pub fn simple(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self::new(ResourceKind::Simple, TableRef::new(database, collection))
    }

    pub fn list(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self::new(ResourceKind::List, TableRef::new(database, collection))
    }

    fn new(kind: ResourceKind, table: TableRef) -> Self {
        Self {
            kind,
            table,
            verbs: BTreeSet::new(),
            filter: json!({}),
            soft_delete: false,
            sort: Vec::new(),
            list_projection: None,
            item_projection: None,
            methods: BTreeMap::new(),
            item_methods: BTreeMap::new(),
            indexes: BTreeMap::new(),
            list_max_results: None,
            model: model::<Document>(),
        }
    }

    pub fn model<T: Model>(mut self) -> Self {
        self.model = model::<T>();
        self
    }

    pub fn verbs(mut self, verbs: &[Verb]) -> Self {
        self.verbs = verbs.iter().copied().collect();
        self
    }

    pub fn filter(mut self, filter: Value) -> Self {
        self.filter = filter;
        self
    }

    pub fn soft_delete(mut self, soft_delete: bool) -> Self {
        self.soft_delete = soft_delete;
        self
    }

    pub fn sort(mut self, sort: Vec<SortKey>) -> Self {
        self.sort = sort;
        self
    }

    pub fn list_projection(mut self, projection: Value) -> Self {
        self.list_projection = Some(projection);
        self
    }

    pub fn item_projection(mut self, projection: Value) -> Self {
        self.item_projection = Some(projection);
        self
    }

    pub fn method(mut self, name: impl Into<String>, method: ResourceMethod) -> Self {
        self.methods.insert(name.into(), method);
        self
    }

    pub fn item_method(mut self, name: impl Into<String>, method: ResourceMethod) -> Self {
        self.item_methods.insert(name.into(), method);
        self
    }

    pub fn index(mut self, name: impl Into<String>, fields: &[&str], unique: bool) -> Self {
        let spec = IndexSpec { fields: fields.iter().map(|f| f.to_string()).collect(), unique };
        self.indexes.insert(name.into(), spec);
        self
    }

    pub fn list_max_results(mut self, max: u64) -> Self {
        self.list_max_results = Some(max);
        self
    }

    /// Declared verbs, or the full set for the kind when none are declared
    pub fn effective_verbs(&self) -> BTreeSet<Verb> {
        if !self.verbs.is_empty() {
            return self.verbs.clone();
        }
        Verb::ALL
            .iter()
            .copied()
            .filter(|v| self.kind == ResourceKind::List || *v != Verb::List)
            .collect()
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("kind", &self.kind)
            .field("table", &self.table)
            .field("verbs", &self.verbs)
            .field("soft_delete", &self.soft_delete)
            .field("methods", &self.methods)
            .field("item_methods", &self.item_methods)
            .field("model", &self.model.type_name())
            .finish_non_exhaustive()
    }
}
