use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::auth::{Authenticator, Permission};
use crate::error::ApiError;

/// Authentication state for one resource's routes
#[derive(Clone)]
pub struct ResourceGuard {
    pub authenticator: Authenticator,
    pub resource: String,
}

/// Bearer authentication in front of every resource route; the needed
/// permission follows the HTTP method.
pub async fn require_permission(
    State(guard): State<Arc<ResourceGuard>>,
    request: Request,
    next: Next,
) -> Response {
    let permission = Permission::for_method(request.method());
    let header = request.headers().get(header::AUTHORIZATION);

    match guard.authenticator.authenticate(header, &guard.resource, permission).await {
        Ok(_) => {
            tracing::debug!("Granted {} on {}", permission.as_str(), guard.resource);
            next.run(request).await
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}
