use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use axum::body::Bytes;
use axum::http::HeaderMap;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::de::DeserializeOwned;

use super::model::Model;
use crate::database::{Collection, DocumentStore};
use crate::error::ApiError;
use crate::filter::visible_filter;
use crate::handlers::body::read_json;
use crate::middleware::ApiResult;
use crate::types::{Document, ObjectId};
use crate::validation::{Validation, Validator};

/// View methods answer GET, operation methods answer POST.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    View,
    Operation,
}

pub type MethodFuture = BoxFuture<'static, ApiResult>;
pub type MethodHandler = Arc<dyn Fn(MethodContext) -> MethodFuture + Send + Sync>;

/// A custom method declared on a resource or on its items.
#[derive(Clone)]
pub struct ResourceMethod {
    pub kind: MethodKind,
    pub handler: Option<MethodHandler>,
}

impl ResourceMethod {
    pub fn view<F, Fut>(handler: F) -> Self
    where
        F: Fn(MethodContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApiResult> + Send + 'static,
    {
        Self::bind(MethodKind::View, handler)
    }

    pub fn operation<F, Fut>(handler: F) -> Self
    where
        F: Fn(MethodContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApiResult> + Send + 'static,
    {
        Self::bind(MethodKind::Operation, handler)
    }

    /// Declared without a handler; requests for it answer Not Found.
    pub fn unbound(kind: MethodKind) -> Self {
        Self { kind, handler: None }
    }

    fn bind<F, Fut>(kind: MethodKind, handler: F) -> Self
    where
        F: Fn(MethodContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApiResult> + Send + 'static,
    {
        let handler: MethodHandler = Arc::new(move |ctx| handler(ctx).boxed());
        Self { kind, handler: Some(handler) }
    }
}

impl fmt::Debug for ResourceMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceMethod")
            .field("kind", &self.kind)
            .field("bound", &self.handler.is_some())
            .finish()
    }
}

/// Everything a custom method gets to work with.
#[derive(Clone)]
pub struct MethodContext {
    pub headers: HeaderMap,
    pub query: HashMap<String, String>,
    pub body: Bytes,
    pub store: Arc<dyn DocumentStore>,
    pub resource: String,
    pub method: String,
    pub collection: Arc<dyn Collection>,
    pub validator: Validator,
    pub filter: Document,
    pub soft_delete: bool,
    /// Set for item methods
    pub id: Option<ObjectId>,
}

impl MethodContext {
    pub fn query(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    /// Decodes the JSON request body.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        read_json(&self.headers, &self.body)
    }

    /// Runs `value`'s validation rules against the shared validator.
    pub fn validate<T: Model>(&self, value: &T) -> Result<(), ApiError> {
        let mut validation = Validation::new(&self.validator);
        value.validate(&mut validation);
        validation.finish().map_err(ApiError::InvalidFormat)
    }

    /// The resource's effective filter, pinned to the item for item methods.
    pub fn scope(&self) -> Document {
        visible_filter(&self.filter, self.id.as_ref(), self.soft_delete)
    }
}
