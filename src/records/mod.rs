//! CRUD over one resource's collection, scoped by its static filter.

pub mod simulate;

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::database::{Collection, FindOptions, StoreError};
use crate::dsl::settings::as_document;
use crate::dsl::{Resource, SettingsError};
use crate::filter::{visible_filter, Predicate, Projection, SortKey};
use crate::types::{Document, ObjectId, DELETED_FIELD};

pub use simulate::{SimulatedUpdate, SimulationError};

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("record not found")]
    NotFound,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The six record operations bound to one resource. Built once at wiring
/// time and shared across requests.
pub struct RecordOperations {
    collection: Arc<dyn Collection>,
    filter: Document,
    soft_delete: bool,
    sort: Vec<SortKey>,
    list_projection: Option<Projection>,
    item_projection: Option<Projection>,
}

impl RecordOperations {
    pub fn new(key: &str, resource: &Resource, collection: Arc<dyn Collection>) -> Result<Self, SettingsError> {
        let filter = as_document(key, "filter", &resource.filter)?;
        Predicate::parse(&filter).map_err(|source| SettingsError::Filter { key: key.to_string(), what: "filter", source })?;

        Ok(Self {
            collection,
            filter,
            soft_delete: resource.soft_delete,
            sort: resource.sort.clone(),
            list_projection: parse_projection(key, "list_projection", resource.list_projection.as_ref())?,
            item_projection: parse_projection(key, "item_projection", resource.item_projection.as_ref())?,
        })
    }

    pub fn collection(&self) -> &Arc<dyn Collection> {
        &self.collection
    }

    pub fn static_filter(&self) -> &Document {
        &self.filter
    }

    pub fn soft_delete(&self) -> bool {
        self.soft_delete
    }

    fn scope(&self, id: Option<&ObjectId>) -> Document {
        visible_filter(&self.filter, id, self.soft_delete)
    }

    pub async fn create_one(&self, document: Document) -> Result<ObjectId, RecordError> {
        Ok(self.collection.insert_one(document).await?)
    }

    /// Item read with the item projection; no identity reads the singleton.
    pub async fn get_one(&self, id: Option<&ObjectId>) -> Result<Document, RecordError> {
        let options = FindOptions {
            sort: self.sort.clone(),
            projection: self.item_projection.clone(),
            ..FindOptions::default()
        };
        self.find_one(id, &options).await
    }

    /// Same match as `get_one`, without any projection.
    pub async fn get_full(&self, id: Option<&ObjectId>) -> Result<Document, RecordError> {
        let options = FindOptions { sort: self.sort.clone(), ..FindOptions::default() };
        self.find_one(id, &options).await
    }

    async fn find_one(&self, id: Option<&ObjectId>, options: &FindOptions) -> Result<Document, RecordError> {
        self.collection
            .find_one(&self.scope(id), options)
            .await?
            .ok_or(RecordError::NotFound)
    }

    /// One page of the list; a zero `limit` means everything, and `page`
    /// only matters when a limit is set.
    pub async fn get_many(&self, page: u64, limit: u64) -> Result<Vec<Document>, RecordError> {
        let mut options = FindOptions {
            sort: self.sort.clone(),
            projection: self.list_projection.clone(),
            ..FindOptions::default()
        };
        if limit > 0 {
            options.limit = Some(limit);
            options.skip = page.saturating_mul(limit);
        }
        Ok(self.collection.find(&self.scope(None), &options).await?)
    }

    /// Merges `fields` into the matching document.
    pub async fn update_one(&self, id: Option<&ObjectId>, fields: Document) -> Result<bool, RecordError> {
        let outcome = self.collection.update_one(&self.scope(id), &set_update(fields), false).await?;
        Ok(outcome.modified > 0)
    }

    pub async fn replace_one(&self, id: Option<&ObjectId>, document: Document) -> Result<bool, RecordError> {
        let outcome = self.collection.replace_one(&self.scope(id), document, false).await?;
        Ok(outcome.matched > 0)
    }

    /// Soft-delete resources flag the document instead of removing it.
    pub async fn delete_one(&self, id: Option<&ObjectId>) -> Result<bool, RecordError> {
        let filter = self.scope(id);
        if self.soft_delete {
            let mut flag = Document::new();
            flag.insert(DELETED_FIELD.to_string(), Value::Bool(true));
            let outcome = self.collection.update_one(&filter, &set_update(flag), false).await?;
            return Ok(outcome.matched > 0);
        }
        Ok(self.collection.delete_one(&filter).await? > 0)
    }
}

fn parse_projection(key: &str, what: &'static str, spec: Option<&Value>) -> Result<Option<Projection>, SettingsError> {
    spec.map(|spec| {
        let spec = as_document(key, what, spec)?;
        Projection::parse(&spec).map_err(|source| SettingsError::Filter { key: key.to_string(), what, source })
    })
    .transpose()
}

fn set_update(fields: Document) -> Document {
    let mut update = Document::new();
    update.insert("$set".to_string(), Value::Object(fields));
    update
}
