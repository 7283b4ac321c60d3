//! Handlers for resources holding many documents addressed by identity.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;

use super::methods::{dispatch, Invocation};
use super::record::{self, ListQuery};
use super::{parse_id, Endpoint};
use crate::dsl::{MethodKind, Verb};
use crate::middleware::ApiResult;
use crate::types::ObjectId;

/// GET /{key}?skip=&limit=
pub async fn list(State(endpoint): State<Arc<Endpoint>>, Query(query): Query<ListQuery>) -> ApiResult {
    record::list(&endpoint, &query).await
}

/// POST /{key}
pub async fn create(State(endpoint): State<Arc<Endpoint>>, headers: HeaderMap, body: Bytes) -> ApiResult {
    record::create(&endpoint, false, &headers, &body).await
}

/// GET /{key}/{id} or GET /{key}/~{method}
///
/// An identity-shaped segment always names a document.
pub async fn read_or_view(
    State(endpoint): State<Arc<Endpoint>>,
    Path(target): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult {
    if endpoint.allows(Verb::Read) && ObjectId::is_valid(&target) {
        let id = parse_id(&target)?;
        return record::read(&endpoint, Some(&id)).await;
    }
    let invocation = Invocation { headers, query, body, id: None };
    dispatch(&endpoint, &endpoint.methods, MethodKind::View, &target, invocation).await
}

/// POST /{key}/~{method}
pub async fn operation(
    State(endpoint): State<Arc<Endpoint>>,
    Path(method): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult {
    let invocation = Invocation { headers, query, body, id: None };
    dispatch(&endpoint, &endpoint.methods, MethodKind::Operation, &method, invocation).await
}

/// PATCH /{key}/{id}
pub async fn update(
    State(endpoint): State<Arc<Endpoint>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult {
    let id = parse_id(&id)?;
    record::update(&endpoint, Some(&id), &headers, &body).await
}

/// PUT /{key}/{id}
pub async fn replace(
    State(endpoint): State<Arc<Endpoint>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult {
    let id = parse_id(&id)?;
    record::replace(&endpoint, Some(&id), &headers, &body).await
}

/// DELETE /{key}/{id}
pub async fn delete(State(endpoint): State<Arc<Endpoint>>, Path(id): Path<String>) -> ApiResult {
    let id = parse_id(&id)?;
    record::delete(&endpoint, Some(&id)).await
}

/// GET /{key}/{id}/~{method}
pub async fn item_view(
    State(endpoint): State<Arc<Endpoint>>,
    Path((id, method)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult {
    item_method(&endpoint, MethodKind::View, &id, &method, Invocation { headers, query, body, id: None }).await
}

/// POST /{key}/{id}/~{method}
pub async fn item_operation(
    State(endpoint): State<Arc<Endpoint>>,
    Path((id, method)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult {
    item_method(&endpoint, MethodKind::Operation, &id, &method, Invocation { headers, query, body, id: None }).await
}

async fn item_method(
    endpoint: &Endpoint,
    kind: MethodKind,
    raw_id: &str,
    method: &str,
    mut invocation: Invocation,
) -> ApiResult {
    invocation.id = Some(parse_id(raw_id)?);
    dispatch(endpoint, &endpoint.item_methods, kind, method, invocation).await
}
