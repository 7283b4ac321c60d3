use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::panic::AssertUnwindSafe;

use axum::body::Bytes;
use axum::http::HeaderMap;
use futures::FutureExt;

use super::Endpoint;
use crate::dsl::{MethodContext, MethodKind, ResourceMethod};
use crate::error::ApiError;
use crate::middleware::ApiResult;
use crate::types::ObjectId;

pub const METHOD_SIGIL: char = '~';

/// Request parts handed to a custom method.
pub struct Invocation {
    pub headers: HeaderMap,
    pub query: HashMap<String, String>,
    pub body: Bytes,
    pub id: Option<ObjectId>,
}

/// Resolves `~name` among `methods` and runs it. Unknown names, unbound
/// handlers and kind mismatches are all Not Found; a panicking handler
/// answers Internal Error.
pub async fn dispatch(
    endpoint: &Endpoint,
    methods: &BTreeMap<String, ResourceMethod>,
    kind: MethodKind,
    raw_name: &str,
    invocation: Invocation,
) -> ApiResult {
    let name = raw_name.strip_prefix(METHOD_SIGIL).ok_or(ApiError::NotFound)?;
    let handler = match methods.get(name) {
        Some(ResourceMethod { kind: declared, handler: Some(handler) }) if *declared == kind => handler.clone(),
        _ => {
            tracing::debug!("No {:?} method {} on {}", kind, name, endpoint.key);
            return Err(ApiError::NotFound);
        }
    };

    if let Some(id) = &invocation.id {
        // item methods run on an existing, visible document
        endpoint.records.get_full(Some(id)).await?;
    }

    let context = MethodContext {
        headers: invocation.headers,
        query: invocation.query,
        body: invocation.body,
        store: endpoint.store.clone(),
        resource: endpoint.key.clone(),
        method: name.to_string(),
        collection: endpoint.records.collection().clone(),
        validator: endpoint.validator.clone(),
        filter: endpoint.records.static_filter().clone(),
        soft_delete: endpoint.records.soft_delete(),
        id: invocation.id,
    };

    tracing::debug!("Invoking {:?} method {} on {}", kind, name, endpoint.key);
    let future = match std::panic::catch_unwind(AssertUnwindSafe(|| handler(context))) {
        Ok(future) => future,
        Err(payload) => return Err(panicked(&endpoint.key, name, payload)),
    };
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(panicked(&endpoint.key, name, payload)),
    }
}

fn panicked(resource: &str, method: &str, payload: Box<dyn Any + Send>) -> ApiError {
    tracing::error!("Method {} on {} panicked: {}", method, resource, panic_message(payload.as_ref()));
    ApiError::Internal
}

pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
