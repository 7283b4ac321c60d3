use axum::http::{header, HeaderMap};
use serde::de::DeserializeOwned;

use crate::error::ApiError;
use crate::types::{Document, DELETED_FIELD, ID_FIELD};

/// Decodes a JSON request body. Anything not declared as
/// `application/json`, or not parsing as `T`, is an unexpected format.
pub fn read_json<T: DeserializeOwned>(headers: &HeaderMap, body: &[u8]) -> Result<T, ApiError> {
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map_or(false, |v| v.to_ascii_lowercase().contains("application/json"));
    if !is_json {
        return Err(ApiError::UnexpectedFormat);
    }

    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!("Rejected request body: {}", e);
        ApiError::UnexpectedFormat
    })
}

/// Request body as a document, without the fields clients may not set.
pub fn read_document(headers: &HeaderMap, body: &[u8]) -> Result<Document, ApiError> {
    let mut document: Document = read_json(headers, body)?;
    document.remove(ID_FIELD);
    document.remove(DELETED_FIELD);
    Ok(document)
}
