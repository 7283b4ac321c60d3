use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

use super::resource::{Resource, ResourceKind, TableRef, Verb};
use super::is_valid_name;
use crate::database::IndexField;
use crate::filter::{path, FilterError, Predicate, Projection};
use crate::types::{Document, ObjectId};

pub const DEFAULT_DATABASE: &str = "docrest";
pub const DEFAULT_AUTH_COLLECTION: &str = "auth";
pub const DEFAULT_SCRATCH_COLLECTION: &str = "scratch_updates";
pub const DEFAULT_LIST_MAX_RESULTS: u64 = 20;

/// Paths the server answers itself; resources cannot take them
pub const RESERVED_KEYS: [&str; 1] = ["health"];

#[derive(Debug, Error, PartialEq)]
pub enum SettingsError {
    #[error("invalid {what} name: {name:?}")]
    InvalidName { what: &'static str, name: String },

    #[error("resource {0:?} uses a reserved key")]
    ReservedKey(String),

    #[error("resource {key:?}: verb {verb} is not allowed on simple resources")]
    VerbNotAllowed { key: String, verb: &'static str },

    #[error("resource {key:?}: {option} is only allowed on list resources")]
    ListOnly { key: String, option: &'static str },

    #[error("resource {key:?}: method name {name:?} has the shape of a document identity")]
    AmbiguousMethod { key: String, name: String },

    #[error("resource {key:?}: {what} must be a JSON object")]
    NotAnObject { key: String, what: &'static str },

    #[error("resource {key:?}: invalid {what}: {source}")]
    Filter {
        key: String,
        what: &'static str,
        #[source]
        source: FilterError,
    },

    #[error("resource {key:?}: index {name:?} {reason}")]
    InvalidIndex { key: String, name: String, reason: String },

    #[error("resource {key:?}: list_max_results must be positive")]
    ZeroListMax { key: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Global {
    pub list_max_results: u64,
}

impl Default for Global {
    fn default() -> Self {
        Self { list_max_results: DEFAULT_LIST_MAX_RESULTS }
    }
}

/// Top-level configuration: where tokens and scratch copies live, global
/// defaults, and every resource keyed by its URL segment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub debug: bool,
    pub global: Global,
    pub auth: TableRef,
    pub scratch: TableRef,
    pub resources: BTreeMap<String, Resource>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: false,
            global: Global::default(),
            auth: TableRef::new(DEFAULT_DATABASE, DEFAULT_AUTH_COLLECTION),
            scratch: TableRef::new(DEFAULT_DATABASE, DEFAULT_SCRATCH_COLLECTION),
            resources: BTreeMap::new(),
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resource(mut self, key: impl Into<String>, resource: Resource) -> Self {
        self.resources.insert(key.into(), resource);
        self
    }

    /// Page size cap for `resource`; a zero global cap counts as one.
    pub fn list_max_results(&self, resource: &Resource) -> u64 {
        resource.list_max_results.unwrap_or(self.global.list_max_results.max(1))
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        validate_table("auth database", "auth collection", &self.auth)?;
        validate_table("scratch database", "scratch collection", &self.scratch)?;
        for (key, resource) in &self.resources {
            validate_resource(key, resource)?;
        }
        Ok(())
    }
}

fn validate_table(db_what: &'static str, coll_what: &'static str, table: &TableRef) -> Result<(), SettingsError> {
    if !is_valid_name(&table.database) {
        return Err(SettingsError::InvalidName { what: db_what, name: table.database.clone() });
    }
    if !is_valid_name(&table.collection) {
        return Err(SettingsError::InvalidName { what: coll_what, name: table.collection.clone() });
    }
    Ok(())
}

fn validate_resource(key: &str, resource: &Resource) -> Result<(), SettingsError> {
    if !is_valid_name(key) {
        return Err(SettingsError::InvalidName { what: "resource", name: key.to_string() });
    }
    if RESERVED_KEYS.contains(&key) {
        return Err(SettingsError::ReservedKey(key.to_string()));
    }
    validate_table("database", "collection", &resource.table)?;

    if resource.kind == ResourceKind::Simple {
        if resource.verbs.contains(&Verb::List) {
            return Err(SettingsError::VerbNotAllowed { key: key.to_string(), verb: Verb::List.as_str() });
        }
        if resource.list_projection.is_some() {
            return Err(SettingsError::ListOnly { key: key.to_string(), option: "list_projection" });
        }
        if !resource.item_methods.is_empty() {
            return Err(SettingsError::ListOnly { key: key.to_string(), option: "item_methods" });
        }
    }

    let filter = as_document(key, "filter", &resource.filter)?;
    Predicate::parse(&filter).map_err(|source| SettingsError::Filter { key: key.to_string(), what: "filter", source })?;

    for (what, projection) in [
        ("list_projection", &resource.list_projection),
        ("item_projection", &resource.item_projection),
    ] {
        if let Some(projection) = projection {
            let spec = as_document(key, what, projection)?;
            Projection::parse(&spec).map_err(|source| SettingsError::Filter { key: key.to_string(), what, source })?;
        }
    }

    for sort_key in &resource.sort {
        path::validate(&sort_key.path)
            .map_err(|source| SettingsError::Filter { key: key.to_string(), what: "sort", source })?;
    }

    for name in resource.methods.keys().chain(resource.item_methods.keys()) {
        if !is_valid_name(name) {
            return Err(SettingsError::InvalidName { what: "method", name: name.clone() });
        }
        if ObjectId::is_valid(name) {
            return Err(SettingsError::AmbiguousMethod { key: key.to_string(), name: name.clone() });
        }
    }

    for (name, spec) in &resource.indexes {
        if !is_valid_name(name) {
            return Err(SettingsError::InvalidName { what: "index", name: name.clone() });
        }
        if spec.fields.is_empty() {
            return Err(SettingsError::InvalidIndex {
                key: key.to_string(),
                name: name.clone(),
                reason: "has no fields".to_string(),
            });
        }
        for field in &spec.fields {
            let parsed = IndexField::parse(field);
            path::validate(&parsed.path).map_err(|e| SettingsError::InvalidIndex {
                key: key.to_string(),
                name: name.clone(),
                reason: e.to_string(),
            })?;
        }
    }

    if resource.list_max_results == Some(0) {
        return Err(SettingsError::ZeroListMax { key: key.to_string() });
    }
    Ok(())
}

/// Reads a declared JSON value that must be an object
pub fn as_document(key: &str, what: &'static str, value: &Value) -> Result<Document, SettingsError> {
    value
        .as_object()
        .cloned()
        .ok_or_else(|| SettingsError::NotAnObject { key: key.to_string(), what })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::{MethodKind, ResourceMethod};
    use serde_json::json;

    fn settings_with(key: &str, resource: Resource) -> Settings {
        Settings::new().resource(key, resource)
    }

    #[test]
    fn accepts_well_formed_resources() {
        let settings = settings_with(
            "payments",
            Resource::list("bank", "payments")
                .soft_delete(true)
                .list_projection(json!({"from": 1, "amount": 1}))
                .index("by-from", &["from", "-when"], false)
                .item_method("put-now", ResourceMethod::unbound(MethodKind::Operation)),
        );
        assert_eq!(settings.validate(), Ok(()));
    }

    #[test]
    fn rejects_bad_names() {
        let err = settings_with("9lives", Resource::list("bank", "payments")).validate().unwrap_err();
        assert!(matches!(err, SettingsError::InvalidName { what: "resource", .. }));

        let err = settings_with("payments", Resource::list("bank!", "payments")).validate().unwrap_err();
        assert!(matches!(err, SettingsError::InvalidName { what: "database", .. }));

        let err = settings_with("health", Resource::list("bank", "payments")).validate().unwrap_err();
        assert_eq!(err, SettingsError::ReservedKey("health".into()));
    }

    #[test]
    fn simple_resources_reject_list_only_options() {
        let err = settings_with("universe", Resource::simple("db", "u").verbs(&[Verb::List, Verb::Read]))
            .validate()
            .unwrap_err();
        assert!(matches!(err, SettingsError::VerbNotAllowed { .. }));

        let err = settings_with("universe", Resource::simple("db", "u").list_projection(json!({"a": 1})))
            .validate()
            .unwrap_err();
        assert!(matches!(err, SettingsError::ListOnly { option: "list_projection", .. }));

        let err = settings_with(
            "universe",
            Resource::simple("db", "u").item_method("x-y", ResourceMethod::unbound(MethodKind::View)),
        )
        .validate()
        .unwrap_err();
        assert!(matches!(err, SettingsError::ListOnly { option: "item_methods", .. }));
    }

    #[test]
    fn rejects_identity_shaped_method_names() {
        let err = settings_with(
            "payments",
            Resource::list("bank", "payments")
                .method("abcdefabcdefabcdefabcdef", ResourceMethod::unbound(MethodKind::View)),
        )
        .validate()
        .unwrap_err();
        assert!(matches!(err, SettingsError::AmbiguousMethod { .. }));
    }

    #[test]
    fn rejects_malformed_filters_and_projections() {
        let err = settings_with("payments", Resource::list("bank", "payments").filter(json!([1])))
            .validate()
            .unwrap_err();
        assert!(matches!(err, SettingsError::NotAnObject { what: "filter", .. }));

        let err = settings_with(
            "payments",
            Resource::list("bank", "payments").filter(json!({"a": {"$regex": "x"}})),
        )
        .validate()
        .unwrap_err();
        assert!(matches!(err, SettingsError::Filter { what: "filter", .. }));

        let err = settings_with(
            "payments",
            Resource::list("bank", "payments").item_projection(json!({"a": 1, "b": 0})),
        )
        .validate()
        .unwrap_err();
        assert!(matches!(err, SettingsError::Filter { what: "item_projection", .. }));
    }

    #[test]
    fn rejects_bad_indexes_and_limits() {
        let err = settings_with("payments", Resource::list("bank", "payments").index("by-x", &[], true))
            .validate()
            .unwrap_err();
        assert!(matches!(err, SettingsError::InvalidIndex { .. }));

        let err = settings_with("payments", Resource::list("bank", "payments").list_max_results(0))
            .validate()
            .unwrap_err();
        assert!(matches!(err, SettingsError::ZeroListMax { .. }));
    }

    #[test]
    fn zero_global_limit_counts_as_one() {
        let mut settings = Settings::new();
        settings.global.list_max_results = 0;
        let resource = Resource::list("bank", "payments");
        assert_eq!(settings.list_max_results(&resource), 1);
        assert_eq!(settings.list_max_results(&resource.list_max_results(5)), 5);
    }
}
