use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::database::{Collection, FindOptions, StoreError};
use crate::dsl::{Instance, ModelBinding};
use crate::filter::FilterError;
use crate::types::{Document, ObjectId, DELETED_FIELD, ID_FIELD};

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("patch does not apply: {0}")]
    Rejected(FilterError),

    #[error("scratch copy of {0} vanished before read-back")]
    Missing(ObjectId),

    #[error("patched document does not decode: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Previews a PATCH by applying it to a scratch copy of the document, so
/// the result can be validated before the live document is touched.
///
/// Each preview overwrites the scratch copy keyed by the document's id and
/// leaves it in place. Concurrent previews of one document may read each
/// other's copy.
#[derive(Clone)]
pub struct SimulatedUpdate {
    scratch: Arc<dyn Collection>,
    model: Arc<dyn ModelBinding>,
}

impl SimulatedUpdate {
    pub fn new(scratch: Arc<dyn Collection>, model: Arc<dyn ModelBinding>) -> Self {
        Self { scratch, model }
    }

    /// Returns `current` with `patch` merged in, decoded as the model.
    /// Patch keys `_id` and `_deleted` are ignored.
    pub async fn preview(
        &self,
        id: &ObjectId,
        current: Document,
        patch: &Document,
    ) -> Result<Box<dyn Instance>, SimulationError> {
        let mut by_id = Document::new();
        by_id.insert(ID_FIELD.to_string(), Value::from(*id));

        self.scratch.replace_one(&by_id, current, true).await?;

        let fields: Document = patch
            .iter()
            .filter(|(key, _)| key.as_str() != ID_FIELD && key.as_str() != DELETED_FIELD)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        if !fields.is_empty() {
            let mut update = Document::new();
            update.insert("$set".to_string(), Value::Object(fields));
            match self.scratch.update_one(&by_id, &update, false).await {
                Ok(_) => {}
                Err(StoreError::Filter(e)) => return Err(SimulationError::Rejected(e)),
                Err(e) => return Err(e.into()),
            }
        }

        let mut patched = self
            .scratch
            .find_one(&by_id, &FindOptions::default())
            .await?
            .ok_or(SimulationError::Missing(*id))?;
        patched.remove(ID_FIELD);
        Ok(self.model.decode(patched)?)
    }
}
