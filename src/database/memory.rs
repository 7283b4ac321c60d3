use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock as StdRwLock};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::update::{apply_update, ensure_id, prepare_replacement, seed_from_filter};
use super::{Collection, DocumentStore, FindOptions, IndexModel, StoreError, UpdateOutcome};
use crate::filter::filter_where::values_equal;
use crate::filter::{FilterOrder, Predicate};
use crate::types::{Document, ObjectId, ID_FIELD};

/// In-process document store. Collections are created on first use.
#[derive(Default)]
pub struct MemoryStore {
    collections: StdRwLock<HashMap<(String, String), Arc<MemoryCollection>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn collection(&self, database: &str, name: &str) -> Arc<dyn Collection> {
        let key = (database.to_string(), name.to_string());
        {
            let collections = self.collections.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(collection) = collections.get(&key) {
                return collection.clone();
            }
        }
        let mut collections = self.collections.write().unwrap_or_else(PoisonError::into_inner);
        collections
            .entry(key)
            .or_insert_with(|| Arc::new(MemoryCollection::new(database, name)))
            .clone()
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

pub struct MemoryCollection {
    database: String,
    name: String,
    state: RwLock<State>,
}

#[derive(Default)]
struct State {
    documents: Vec<Document>,
    indexes: Vec<IndexModel>,
}

impl State {
    fn position(&self, predicate: &Predicate) -> Option<usize> {
        self.documents.iter().position(|doc| predicate.matches(doc))
    }

    /// Fails with a duplicate-key error when `candidate` collides with
    /// another stored document on `_id` or on a unique index.
    fn check_unique(&self, namespace: &str, candidate: &Document, skip: Option<usize>) -> Result<(), StoreError> {
        let others = self
            .documents
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != skip)
            .map(|(_, doc)| doc);

        for other in others {
            if let (Some(a), Some(b)) = (candidate.get(ID_FIELD), other.get(ID_FIELD)) {
                if a == b {
                    return Err(StoreError::duplicate_key(format!(
                        "E11000 duplicate key error collection: {} index: _id_ dup key: {{ _id: {} }}",
                        namespace, a
                    )));
                }
            }
            for index in self.indexes.iter().filter(|i| i.unique) {
                let (Some(mine), Some(theirs)) = (index.key_of(candidate), index.key_of(other)) else {
                    continue;
                };
                if mine.iter().zip(&theirs).all(|(l, r)| values_equal(l, r)) {
                    return Err(StoreError::duplicate_key(format!(
                        "E11000 duplicate key error collection: {} index: {} dup key: {}",
                        namespace,
                        index.name,
                        index.describe_key(&mine)
                    )));
                }
            }
        }
        Ok(())
    }
}

impl MemoryCollection {
    fn new(database: &str, name: &str) -> Self {
        Self {
            database: database.to_string(),
            name: name.to_string(),
            state: RwLock::new(State::default()),
        }
    }

    fn namespace(&self) -> String {
        format!("{}.{}", self.database, self.name)
    }

    fn upsert(&self, state: &mut State, mut doc: Document) -> Result<UpdateOutcome, StoreError> {
        let id = ensure_id(&mut doc)?;
        state.check_unique(&self.namespace(), &doc, None)?;
        state.documents.push(doc);
        Ok(UpdateOutcome { matched: 0, modified: 0, upserted: Some(id) })
    }
}

#[async_trait]
impl Collection for MemoryCollection {
    fn database(&self) -> &str {
        &self.database
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn find(&self, filter: &Document, options: &FindOptions) -> Result<Vec<Document>, StoreError> {
        let predicate = Predicate::parse(filter)?;
        let state = self.state.read().await;

        let mut found: Vec<&Document> = state.documents.iter().filter(|doc| predicate.matches(doc)).collect();
        if !options.sort.is_empty() {
            found.sort_by(|a, b| FilterOrder::compare(a, b, &options.sort));
        }

        let skip = usize::try_from(options.skip).unwrap_or(usize::MAX);
        let limit = options
            .limit
            .map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));

        Ok(found
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|doc| match &options.projection {
                Some(projection) => projection.apply(doc.clone()),
                None => doc.clone(),
            })
            .collect())
    }

    async fn insert_one(&self, mut document: Document) -> Result<ObjectId, StoreError> {
        let id = ensure_id(&mut document)?;
        let mut state = self.state.write().await;
        state.check_unique(&self.namespace(), &document, None)?;
        state.documents.push(document);
        Ok(id)
    }

    async fn update_one(&self, filter: &Document, update: &Document, upsert: bool) -> Result<UpdateOutcome, StoreError> {
        let predicate = Predicate::parse(filter)?;
        let mut state = self.state.write().await;

        match state.position(&predicate) {
            Some(i) => {
                let mut updated = state.documents[i].clone();
                let changed = apply_update(&mut updated, update)?;
                if changed {
                    state.check_unique(&self.namespace(), &updated, Some(i))?;
                    state.documents[i] = updated;
                }
                Ok(UpdateOutcome { matched: 1, modified: u64::from(changed), upserted: None })
            }
            None if upsert => {
                let mut seed = seed_from_filter(filter);
                apply_update(&mut seed, update)?;
                self.upsert(&mut state, seed)
            }
            None => Ok(UpdateOutcome::default()),
        }
    }

    async fn replace_one(&self, filter: &Document, replacement: Document, upsert: bool) -> Result<UpdateOutcome, StoreError> {
        let predicate = Predicate::parse(filter)?;
        let mut state = self.state.write().await;

        match state.position(&predicate) {
            Some(i) => {
                let existing_id = state.documents[i].get(ID_FIELD).cloned().unwrap_or(Value::Null);
                let replaced = prepare_replacement(replacement, &existing_id)?;
                let changed = replaced != state.documents[i];
                if changed {
                    state.check_unique(&self.namespace(), &replaced, Some(i))?;
                    state.documents[i] = replaced;
                }
                Ok(UpdateOutcome { matched: 1, modified: u64::from(changed), upserted: None })
            }
            None if upsert => {
                let mut doc = replacement;
                if !doc.contains_key(ID_FIELD) {
                    if let Some(id) = seed_from_filter(filter).remove(ID_FIELD) {
                        doc.insert(ID_FIELD.to_string(), id);
                    }
                }
                self.upsert(&mut state, doc)
            }
            None => Ok(UpdateOutcome::default()),
        }
    }

    async fn delete_one(&self, filter: &Document) -> Result<u64, StoreError> {
        let predicate = Predicate::parse(filter)?;
        let mut state = self.state.write().await;
        match state.position(&predicate) {
            Some(i) => {
                state.documents.remove(i);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_many(&self, filter: &Document) -> Result<u64, StoreError> {
        let predicate = Predicate::parse(filter)?;
        let mut state = self.state.write().await;
        let before = state.documents.len();
        state.documents.retain(|doc| !predicate.matches(doc));
        Ok((before - state.documents.len()) as u64)
    }

    async fn create_index(&self, index: &IndexModel) -> Result<(), StoreError> {
        if index.fields.is_empty() {
            return Err(StoreError::InvalidIndex(format!("index {} has no fields", index.name)));
        }
        let mut state = self.state.write().await;
        if let Some(existing) = state.indexes.iter().find(|i| i.name == index.name) {
            if existing == index {
                return Ok(());
            }
            return Err(StoreError::InvalidIndex(format!(
                "index {} already exists with different options",
                index.name
            )));
        }

        if index.unique {
            let mut probe = State { documents: vec![], indexes: vec![index.clone()] };
            for doc in &state.documents {
                // `_id` is already unique, so only the new index can collide
                let mut keyed = doc.clone();
                keyed.remove(ID_FIELD);
                probe.check_unique(&self.namespace(), &keyed, None)?;
                probe.documents.push(keyed);
            }
        }

        state.indexes.push(index.clone());
        Ok(())
    }
}
