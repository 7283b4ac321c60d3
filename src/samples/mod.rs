//! Two sample resources served by the `docrest` binary: a paged list of
//! payments and a singleton universe.

pub mod payments;
pub mod universe;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::auth::{AuthToken, Permissions};
use crate::dsl::Settings;
use crate::error::ApiError;
use crate::types::Document;
use crate::validation::Validator;

pub const SAMPLE_API_KEY: &str = "sample-abcdef";

pub fn settings() -> Settings {
    Settings::new()
        .resource("universe", universe::resource())
        .resource("payments", payments::resource())
}

/// Validator carrying the custom rules the sample models use.
pub fn validator() -> Validator {
    Validator::builder().rule("address", payments::is_address).build()
}

/// Full access to both sample resources.
pub fn token(api_key: &str) -> AuthToken {
    let permissions = Permissions::new()
        .grant("universe", ["read", "write", "delete"])
        .grant("payments", ["read", "write", "delete"]);
    AuthToken::new(api_key, permissions)
}

fn decode<T: DeserializeOwned>(document: Document) -> Result<T, ApiError> {
    serde_json::from_value(Value::Object(document)).map_err(|e| {
        tracing::error!("Stored document does not decode: {}", e);
        ApiError::Internal
    })
}

fn set(fields: Document) -> Document {
    let mut update = Document::new();
    update.insert("$set".to_string(), Value::Object(fields));
    update
}
