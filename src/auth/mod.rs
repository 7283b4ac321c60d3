//! Bearer-token authentication against the token collection.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::database::{Collection, FindOptions, StoreError};
use crate::formats::DateTime;
use crate::types::{Document, ObjectId};

pub const API_KEY_FIELD: &str = "api-key";
pub const WILDCARD: &str = "*";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authorization header missing")]
    MissingHeader,

    #[error("authorization header is not a bearer token")]
    BadScheme,

    #[error("api key not found or expired")]
    NotFound,

    #[error("permission denied")]
    Forbidden,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Read,
    Write,
    Delete,
}

impl Permission {
    /// GET and HEAD read, DELETE deletes, everything else writes.
    pub fn for_method(method: &Method) -> Self {
        if method == Method::GET || method == Method::HEAD {
            Permission::Read
        } else if method == Method::DELETE {
            Permission::Delete
        } else {
            Permission::Write
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Read => "read",
            Permission::Write => "write",
            Permission::Delete => "delete",
        }
    }
}

/// Permission strings granted on one resource; stored as a string or a
/// list of strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PermissionSet(BTreeSet<String>);

impl PermissionSet {
    pub fn allows(&self, permission: Permission) -> bool {
        self.0.contains(WILDCARD) || self.0.contains(permission.as_str())
    }
}

impl<'de> Deserialize<'de> for PermissionSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            One(String),
            Many(Vec<String>),
        }

        let raw = Raw::deserialize(deserializer)
            .map_err(|_| serde::de::Error::custom("permissions must be a string or a list of strings"))?;
        Ok(match raw {
            Raw::One(permission) => PermissionSet(BTreeSet::from([permission])),
            Raw::Many(permissions) => PermissionSet(permissions.into_iter().collect()),
        })
    }
}

impl<const N: usize> From<[&str; N]> for PermissionSet {
    fn from(permissions: [&str; N]) -> Self {
        PermissionSet(permissions.iter().map(|p| p.to_string()).collect())
    }
}

/// Resource key (or `*`) to granted permissions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permissions(HashMap<String, PermissionSet>);

impl Permissions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(mut self, resource: impl Into<String>, permissions: impl Into<PermissionSet>) -> Self {
        self.0.insert(resource.into(), permissions.into());
        self
    }

    pub fn allows(&self, resource: &str, permission: Permission) -> bool {
        [WILDCARD, resource]
            .iter()
            .filter_map(|key| self.0.get(*key))
            .any(|set| set.allows(permission))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthToken {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(rename = "api-key")]
    pub api_key: String,
    /// Absent means the token never expires
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<DateTime>,
    #[serde(default)]
    pub permissions: Permissions,
}

impl AuthToken {
    pub fn new(api_key: impl Into<String>, permissions: Permissions) -> Self {
        Self { id: None, api_key: api_key.into(), valid_until: None, permissions }
    }

    pub fn valid_until(mut self, until: DateTime) -> Self {
        self.valid_until = Some(until);
        self
    }

    pub fn is_expired(&self, now: &DateTime) -> bool {
        self.valid_until.as_ref().map_or(false, |until| until < now)
    }
}

/// Looks up bearer tokens on every request; nothing is cached.
#[derive(Clone)]
pub struct Authenticator {
    tokens: Arc<dyn Collection>,
}

impl Authenticator {
    pub fn new(tokens: Arc<dyn Collection>) -> Self {
        Self { tokens }
    }

    pub fn collection(&self) -> &Arc<dyn Collection> {
        &self.tokens
    }

    /// Stores a token; the hosting application owns token lifecycle.
    pub async fn register(&self, token: &AuthToken) -> Result<ObjectId, AuthError> {
        let document = match serde_json::to_value(token)? {
            Value::Object(document) => document,
            _ => return Err(AuthError::Decode(serde::ser::Error::custom("token must serialize to an object"))),
        };
        Ok(self.tokens.insert_one(document).await?)
    }

    pub async fn authenticate(
        &self,
        header: Option<&HeaderValue>,
        resource: &str,
        permission: Permission,
    ) -> Result<AuthToken, AuthError> {
        let header = header.ok_or(AuthError::MissingHeader)?;
        let api_key = bearer_token(header)?;

        let mut filter = Document::new();
        filter.insert(API_KEY_FIELD.to_string(), Value::String(api_key.to_string()));
        let document = self
            .tokens
            .find_one(&filter, &FindOptions::default())
            .await?
            .ok_or(AuthError::NotFound)?;
        let token: AuthToken = serde_json::from_value(Value::Object(document))?;

        if token.is_expired(&DateTime::now()) {
            tracing::warn!("Expired api key used for {}", resource);
            return Err(AuthError::NotFound);
        }
        if !token.permissions.allows(resource, permission) {
            tracing::warn!("Api key lacks {} on {}", permission.as_str(), resource);
            return Err(AuthError::Forbidden);
        }
        Ok(token)
    }
}

fn bearer_token(header: &HeaderValue) -> Result<&str, AuthError> {
    let value = header.to_str().map_err(|_| AuthError::BadScheme)?;
    match value.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim()),
        _ => Err(AuthError::BadScheme),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{DocumentStore, MemoryStore};
    use chrono::Duration;
    use serde_json::json;

    async fn authenticator_with(tokens: &[AuthToken]) -> Authenticator {
        let store = MemoryStore::new();
        let auth = Authenticator::new(store.collection("docrest", "auth"));
        for token in tokens {
            auth.register(token).await.unwrap();
        }
        auth
    }

    fn bearer(key: &str) -> HeaderValue {
        HeaderValue::from_str(&format!("Bearer {}", key)).unwrap()
    }

    #[test]
    fn wildcard_allows_everything() {
        let permissions = Permissions::new().grant("*", ["*"]);
        assert!(permissions.allows("orders", Permission::Read));
        assert!(permissions.allows("payments", Permission::Delete));
    }

    #[test]
    fn resource_entries_are_scoped() {
        let permissions = Permissions::new().grant("orders", ["read"]);
        assert!(permissions.allows("orders", Permission::Read));
        assert!(!permissions.allows("orders", Permission::Write));
        assert!(!permissions.allows("payments", Permission::Read));
    }

    #[test]
    fn permissions_decode_from_strings_or_lists() {
        let permissions: Permissions = serde_json::from_value(json!({"*": "read", "orders": ["write", "delete"]})).unwrap();
        assert!(permissions.allows("anything", Permission::Read));
        assert!(permissions.allows("orders", Permission::Delete));

        assert!(serde_json::from_value::<Permissions>(json!({"orders": 5})).is_err());
        assert!(serde_json::from_value::<Permissions>(json!({"orders": ["read", 1]})).is_err());
    }

    #[test]
    fn permission_follows_http_method() {
        assert_eq!(Permission::for_method(&Method::GET), Permission::Read);
        assert_eq!(Permission::for_method(&Method::POST), Permission::Write);
        assert_eq!(Permission::for_method(&Method::PATCH), Permission::Write);
        assert_eq!(Permission::for_method(&Method::PUT), Permission::Write);
        assert_eq!(Permission::for_method(&Method::DELETE), Permission::Delete);
    }

    #[tokio::test]
    async fn header_shape_is_checked_first() {
        let auth = authenticator_with(&[]).await;
        let err = auth.authenticate(None, "orders", Permission::Read).await.unwrap_err();
        assert!(matches!(err, AuthError::MissingHeader));

        let basic = HeaderValue::from_static("Basic abc");
        let err = auth.authenticate(Some(&basic), "orders", Permission::Read).await.unwrap_err();
        assert!(matches!(err, AuthError::BadScheme));

        let empty = HeaderValue::from_static("Bearer ");
        let err = auth.authenticate(Some(&empty), "orders", Permission::Read).await.unwrap_err();
        assert!(matches!(err, AuthError::BadScheme));

        let err = auth.authenticate(Some(&bearer("nope")), "orders", Permission::Read).await.unwrap_err();
        assert!(matches!(err, AuthError::NotFound));
    }

    #[tokio::test]
    async fn grants_and_denies_by_permission() {
        let auth = authenticator_with(&[AuthToken::new("reader", Permissions::new().grant("orders", ["read"]))]).await;

        let token = auth.authenticate(Some(&bearer("reader")), "orders", Permission::Read).await.unwrap();
        assert_eq!(token.api_key, "reader");

        let err = auth.authenticate(Some(&bearer("reader")), "orders", Permission::Write).await.unwrap_err();
        assert!(matches!(err, AuthError::Forbidden));
    }

    #[tokio::test]
    async fn expired_tokens_are_not_found() {
        let yesterday = DateTime::from(DateTime::now().as_naive() - Duration::days(1));
        let tomorrow = DateTime::from(DateTime::now().as_naive() + Duration::days(1));
        let auth = authenticator_with(&[
            AuthToken::new("old", Permissions::new().grant("*", ["*"])).valid_until(yesterday),
            AuthToken::new("fresh", Permissions::new().grant("*", ["*"])).valid_until(tomorrow),
        ])
        .await;

        let err = auth.authenticate(Some(&bearer("old")), "orders", Permission::Read).await.unwrap_err();
        assert!(matches!(err, AuthError::NotFound));
        assert!(auth.authenticate(Some(&bearer("fresh")), "orders", Permission::Read).await.is_ok());
    }
}
