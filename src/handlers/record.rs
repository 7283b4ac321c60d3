use axum::http::HeaderMap;
use serde::Deserialize;

use super::body::{read_document, read_json};
use super::Endpoint;
use crate::dsl::Instance;
use crate::error::ApiError;
use crate::filter::path;
use crate::middleware::{ApiResponse, ApiResult};
use crate::records::RecordError;
use crate::types::{Document, ObjectId, ID_FIELD};

/// `skip` is a page index, `limit` the page size.
///
/// Unlike `RecordOperations::get_many`, where a zero limit means no limit,
/// a missing or non-positive `limit` here means the resource's page cap.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub skip: Option<u64>,
    pub limit: Option<i64>,
}

impl ListQuery {
    /// Requested page size, falling back to and capped by `max`.
    pub fn page_size(&self, max: u64) -> u64 {
        match self.limit {
            Some(limit) if limit > 0 => (limit as u64).min(max),
            _ => max,
        }
    }
}

pub async fn list(endpoint: &Endpoint, query: &ListQuery) -> ApiResult {
    let limit = query.page_size(endpoint.list_max_results);
    let page = query.skip.unwrap_or(0);
    let documents = endpoint.records.get_many(page, limit).await?;
    ApiResponse::success(documents)
}

/// Creates a document; singletons refuse a second one before looking at
/// the body.
pub async fn create(endpoint: &Endpoint, singleton: bool, headers: &HeaderMap, body: &[u8]) -> ApiResult {
    if singleton {
        match endpoint.records.get_full(None).await {
            Ok(_) => return Err(ApiError::AlreadyExists),
            Err(RecordError::NotFound) => {}
            Err(e) => return Err(e.into()),
        }
    }

    let instance = decode_valid(endpoint, read_document(headers, body)?)?;
    let id = endpoint.records.create_one(encode(instance.as_ref())?).await?;
    tracing::debug!("Created {} in {}", id, endpoint.key);
    Ok(ApiResponse::created(id))
}

pub async fn read(endpoint: &Endpoint, id: Option<&ObjectId>) -> ApiResult {
    let document = endpoint.records.get_one(id).await?;
    ApiResponse::success(document)
}

/// Partial update: the patch is simulated on a scratch copy and the result
/// validated before the live document is replaced. Answers the merged
/// document.
pub async fn update(endpoint: &Endpoint, id: Option<&ObjectId>, headers: &HeaderMap, body: &[u8]) -> ApiResult {
    let patch: Document = read_json(headers, body)?;
    for key in patch.keys() {
        path::validate(key).map_err(|e| {
            tracing::debug!("Rejecting patch on {}: {}", endpoint.key, e);
            ApiError::UnexpectedFormat
        })?;
    }

    let current = endpoint.records.get_full(id).await?;
    let stored_id = match id {
        Some(id) => *id,
        None => identity_of(endpoint, &current)?,
    };

    let mut instance = endpoint.simulation.preview(&stored_id, current, &patch).await?;
    instance.check(&endpoint.validator).map_err(ApiError::InvalidFormat)?;

    if !endpoint.records.replace_one(Some(&stored_id), encode(instance.as_ref())?).await? {
        return Err(ApiError::NotFound);
    }
    instance.set_identity(stored_id);
    ApiResponse::success(to_document(instance.as_ref())?)
}

pub async fn replace(endpoint: &Endpoint, id: Option<&ObjectId>, headers: &HeaderMap, body: &[u8]) -> ApiResult {
    let instance = decode_valid(endpoint, read_document(headers, body)?)?;
    if !endpoint.records.replace_one(id, encode(instance.as_ref())?).await? {
        return Err(ApiError::NotFound);
    }
    Ok(ApiResponse::ok())
}

pub async fn delete(endpoint: &Endpoint, id: Option<&ObjectId>) -> ApiResult {
    if !endpoint.records.delete_one(id).await? {
        return Err(ApiError::NotFound);
    }
    Ok(ApiResponse::ok())
}

fn decode_valid(endpoint: &Endpoint, document: Document) -> Result<Box<dyn Instance>, ApiError> {
    let instance = endpoint.model.decode(document).map_err(|e| {
        tracing::debug!("Body does not decode as {}: {}", endpoint.model.type_name(), e);
        ApiError::UnexpectedFormat
    })?;
    instance.check(&endpoint.validator).map_err(ApiError::InvalidFormat)?;
    Ok(instance)
}

/// Model value as a storable document; identity is left to the store.
fn encode(instance: &dyn Instance) -> Result<Document, ApiError> {
    let mut document = to_document(instance)?;
    document.remove(ID_FIELD);
    Ok(document)
}

fn to_document(instance: &dyn Instance) -> Result<Document, ApiError> {
    instance.to_document().map_err(|e| {
        tracing::error!("Failed to encode model: {}", e);
        ApiError::Internal
    })
}

/// Identity of a singleton's stored document, read through its model and
/// falling back to the raw `_id` for models that carry none.
fn identity_of(endpoint: &Endpoint, current: &Document) -> Result<ObjectId, ApiError> {
    let modelled = endpoint.model.decode(current.clone()).ok().and_then(|instance| instance.identity());
    if let Some(id) = modelled {
        return Ok(id);
    }
    current
        .get(ID_FIELD)
        .and_then(|id| id.as_str())
        .and_then(|id| id.parse().ok())
        .ok_or_else(|| {
            tracing::error!("Stored {} document has no usable _id", endpoint.key);
            ApiError::Internal
        })
}
