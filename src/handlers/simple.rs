//! Handlers for resources holding exactly one document.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;

use super::methods::{dispatch, Invocation};
use super::{record, Endpoint};
use crate::dsl::MethodKind;
use crate::middleware::ApiResult;

/// GET /{key}
pub async fn read(State(endpoint): State<Arc<Endpoint>>) -> ApiResult {
    record::read(&endpoint, None).await
}

/// POST /{key}
pub async fn create(State(endpoint): State<Arc<Endpoint>>, headers: HeaderMap, body: Bytes) -> ApiResult {
    record::create(&endpoint, true, &headers, &body).await
}

/// PATCH /{key}
pub async fn update(State(endpoint): State<Arc<Endpoint>>, headers: HeaderMap, body: Bytes) -> ApiResult {
    record::update(&endpoint, None, &headers, &body).await
}

/// PUT /{key}
pub async fn replace(State(endpoint): State<Arc<Endpoint>>, headers: HeaderMap, body: Bytes) -> ApiResult {
    record::replace(&endpoint, None, &headers, &body).await
}

/// DELETE /{key}
pub async fn delete(State(endpoint): State<Arc<Endpoint>>) -> ApiResult {
    record::delete(&endpoint, None).await
}

/// GET /{key}/~{method}
pub async fn view(
    State(endpoint): State<Arc<Endpoint>>,
    Path(method): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult {
    let invocation = Invocation { headers, query, body, id: None };
    dispatch(&endpoint, &endpoint.methods, MethodKind::View, &method, invocation).await
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
