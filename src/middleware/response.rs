use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::types::ObjectId;

/// Successful response: a status and a JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status_code: StatusCode,
    pub body: Value,
}

impl ApiResponse {
    /// `200 {"code": "ok"}`
    pub fn ok() -> Self {
        Self::with_status(json!({"code": "ok"}), StatusCode::OK)
    }

    /// `200` with `data` serialized as the body
    pub fn success<T: Serialize>(data: T) -> Result<Self, ApiError> {
        let body = serde_json::to_value(data).map_err(|e| {
            tracing::error!("Failed to serialize response data: {}", e);
            ApiError::Internal
        })?;
        Ok(Self::with_status(body, StatusCode::OK))
    }

    /// `201 {"id": "<hex>"}`
    pub fn created(id: ObjectId) -> Self {
        Self::with_status(json!({"id": id}), StatusCode::CREATED)
    }

    pub fn with_status(body: Value, status_code: StatusCode) -> Self {
        Self { status_code, body }
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        (self.status_code, Json(self.body)).into_response()
    }
}

pub type ApiResult = Result<ApiResponse, ApiError>;

/// Replaces bodies of non-JSON error responses produced outside the
/// handlers (unmatched routes, wrong methods, extractor rejections) with
/// the matching JSON error.
pub async fn json_fallback(response: Response) -> Response {
    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map_or(false, |v| v.contains("application/json"));
    if is_json {
        return response;
    }

    let replacement = match response.status() {
        StatusCode::BAD_REQUEST | StatusCode::UNSUPPORTED_MEDIA_TYPE | StatusCode::UNPROCESSABLE_ENTITY => {
            ApiError::UnexpectedFormat
        }
        StatusCode::UNAUTHORIZED => ApiError::MissingAuthorization,
        StatusCode::FORBIDDEN => ApiError::Forbidden,
        StatusCode::NOT_FOUND => ApiError::NotFound,
        StatusCode::METHOD_NOT_ALLOWED => ApiError::MethodNotAllowed,
        StatusCode::INTERNAL_SERVER_ERROR => ApiError::Internal,
        _ => return response,
    };
    replacement.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[tokio::test]
    async fn converts_plain_errors() {
        let plain = Response::builder()
            .status(StatusCode::METHOD_NOT_ALLOWED)
            .body(Body::empty())
            .unwrap();
        let converted = json_fallback(plain).await;
        assert_eq!(converted.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(
            converted.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }

    #[tokio::test]
    async fn keeps_json_and_success_responses() {
        let json = ApiError::NotFound.into_response();
        assert_eq!(json_fallback(json).await.status(), StatusCode::NOT_FOUND);

        let ok = ApiResponse::ok().into_response();
        assert_eq!(json_fallback(ok).await.status(), StatusCode::OK);
    }

    #[test]
    fn created_renders_id() {
        let id: ObjectId = "65a1f0c2d3e4f5a6b7c8d9e0".parse().unwrap();
        let response = ApiResponse::created(id);
        assert_eq!(response.status_code, StatusCode::CREATED);
        assert_eq!(response.body, json!({"id": "65a1f0c2d3e4f5a6b7c8d9e0"}));
    }
}
