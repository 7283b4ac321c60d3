//! Document store capability and its backends.
//!
//! Everything above this module talks to a [`DocumentStore`] handing out
//! [`Collection`]s; `memory` keeps documents in-process, `manager` and
//! `postgres` keep them as JSONB rows.

pub mod index;
pub mod manager;
pub mod memory;
pub mod postgres;
pub mod update;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::filter::{FilterError, Projection, SortKey};
use crate::types::{Document, ObjectId};

pub use index::{IndexField, IndexKind, IndexModel};
pub use manager::PgStore;
pub use memory::MemoryStore;

/// Write error codes the document-store family uses for unique violations
pub const DUPLICATE_KEY_CODES: [i32; 4] = [11000, 11001, 12582, 16460];

const DUPLICATE_KEY_MARKERS: [&str; 4] = ["E11000", "E11001", "E12582", "16460"];

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("write error {code}: {message}")]
    Write { code: i32, message: String },

    #[error("Invalid update: {0}")]
    InvalidUpdate(String),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Invalid index: {0}")]
    InvalidIndex(String),

    #[error("Invalid database name: {0}")]
    InvalidName(String),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl StoreError {
    pub fn duplicate_key(message: impl Into<String>) -> Self {
        StoreError::Write { code: DUPLICATE_KEY_CODES[0], message: message.into() }
    }

    /// Unique-constraint violation, recognised by write code or, failing
    /// that, by the code appearing in the error text.
    pub fn is_duplicate_key(&self) -> bool {
        if let StoreError::Write { code, .. } = self {
            if DUPLICATE_KEY_CODES.contains(code) {
                return true;
            }
        }
        let text = self.to_string();
        DUPLICATE_KEY_MARKERS.iter().any(|marker| text.contains(marker))
    }
}

#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    pub sort: Vec<SortKey>,
    pub projection: Option<Projection>,
    pub skip: u64,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub matched: u64,
    pub modified: u64,
    pub upserted: Option<ObjectId>,
}

#[async_trait]
pub trait Collection: Send + Sync {
    fn database(&self) -> &str;

    fn name(&self) -> &str;

    async fn find(&self, filter: &Document, options: &FindOptions) -> Result<Vec<Document>, StoreError>;

    async fn find_one(&self, filter: &Document, options: &FindOptions) -> Result<Option<Document>, StoreError> {
        let mut options = options.clone();
        options.limit = Some(1);
        Ok(self.find(filter, &options).await?.into_iter().next())
    }

    /// Inserts `document`, assigning an `_id` when it has none.
    async fn insert_one(&self, document: Document) -> Result<ObjectId, StoreError>;

    /// Applies an operator update (`$set`, `$unset`) to the first match.
    async fn update_one(&self, filter: &Document, update: &Document, upsert: bool) -> Result<UpdateOutcome, StoreError>;

    /// Replaces the first match, keeping its `_id`.
    async fn replace_one(&self, filter: &Document, replacement: Document, upsert: bool) -> Result<UpdateOutcome, StoreError>;

    async fn delete_one(&self, filter: &Document) -> Result<u64, StoreError>;

    async fn delete_many(&self, filter: &Document) -> Result<u64, StoreError>;

    async fn create_index(&self, index: &IndexModel) -> Result<(), StoreError>;
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    fn collection(&self, database: &str, name: &str) -> Arc<dyn Collection>;

    async fn ping(&self) -> Result<(), StoreError>;
}
