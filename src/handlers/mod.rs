//! Request handlers shared by every compiled resource.
//!
//! `record` holds the CRUD flows, `simple` and `list` adapt them to the
//! two resource kinds, and `methods` runs custom handlers.

pub mod body;
pub mod list;
pub mod methods;
pub mod record;
pub mod simple;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::database::DocumentStore;
use crate::dsl::{ModelBinding, ResourceMethod, Verb};
use crate::error::ApiError;
use crate::records::{RecordOperations, SimulatedUpdate};
use crate::types::ObjectId;
use crate::validation::Validator;

/// Per-resource state shared by all of the resource's routes.
pub struct Endpoint {
    pub key: String,
    pub verbs: BTreeSet<Verb>,
    pub records: RecordOperations,
    pub simulation: SimulatedUpdate,
    pub model: Arc<dyn ModelBinding>,
    pub validator: Validator,
    pub store: Arc<dyn DocumentStore>,
    pub methods: BTreeMap<String, ResourceMethod>,
    pub item_methods: BTreeMap<String, ResourceMethod>,
    pub list_max_results: u64,
}

impl Endpoint {
    pub fn allows(&self, verb: Verb) -> bool {
        self.verbs.contains(&verb)
    }
}

/// Identity from a path segment; malformed ones name nothing.
pub fn parse_id(raw: &str) -> Result<ObjectId, ApiError> {
    raw.parse().map_err(|_| ApiError::NotFound)
}
