use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{decode, set};
use crate::database::FindOptions;
use crate::dsl::{MethodContext, Model, Resource, ResourceMethod};
use crate::error::ApiError;
use crate::formats::DateTime;
use crate::middleware::{ApiResponse, ApiResult};
use crate::types::{Document, ObjectId};
use crate::validation::Validation;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub when: Option<DateTime>,
}

impl Model for Payment {
    fn validate(&self, v: &mut Validation<'_>) {
        v.required_str("from", &self.from);
        if !self.from.is_empty() {
            v.custom("from", "address", &self.from);
        }
        v.gt("amount", self.amount as f64, 0.0);
        v.required("when", &self.when);
    }

    fn identity(&self) -> Option<ObjectId> {
        self.id
    }

    fn set_identity(&mut self, id: ObjectId) {
        self.id = Some(id);
    }
}

/// 3 to 64 characters of letters, digits, `-` or `_`.
pub fn is_address(value: &Value) -> bool {
    value.as_str().map_or(false, |s| {
        (3..=64).contains(&s.len()) && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    })
}

pub fn resource() -> Resource {
    Resource::list("mydb", "payments")
        .model::<Payment>()
        .soft_delete(true)
        .item_projection(json!({"from": 1, "amount": 1, "when": 1}))
        .index("by-from", &["from", "-when"], false)
        .method("get-from", ResourceMethod::view(get_from))
        .method("clear-from", ResourceMethod::operation(clear_from))
        .item_method("put-now", ResourceMethod::operation(put_now))
        .item_method("get-amount", ResourceMethod::view(get_amount))
}

fn from_filter(ctx: &MethodContext) -> Option<Document> {
    let from = ctx.query("from").map(str::trim).filter(|f| !f.is_empty())?;
    let mut filter = ctx.scope();
    filter.insert("from".to_string(), Value::String(from.to_string()));
    Some(filter)
}

/// GET /payments/~get-from?from=...
async fn get_from(ctx: MethodContext) -> ApiResult {
    let Some(filter) = from_filter(&ctx) else {
        return ApiResponse::success(Vec::<Payment>::new());
    };
    let payments = ctx
        .collection
        .find(&filter, &FindOptions::default())
        .await?
        .into_iter()
        .map(decode::<Payment>)
        .collect::<Result<Vec<_>, _>>()?;
    ApiResponse::success(payments)
}

/// POST /payments/~clear-from?from=...
async fn clear_from(ctx: MethodContext) -> ApiResult {
    if let Some(filter) = from_filter(&ctx) {
        let removed = ctx.collection.delete_many(&filter).await?;
        tracing::debug!("Cleared {} payments", removed);
    }
    Ok(ApiResponse::ok())
}

/// POST /payments/{id}/~put-now
async fn put_now(ctx: MethodContext) -> ApiResult {
    let scope = ctx.scope();
    let mut fields = Document::new();
    fields.insert("when".to_string(), Value::String(DateTime::now().to_string()));
    if ctx.collection.update_one(&scope, &set(fields), false).await?.matched == 0 {
        return Err(ApiError::NotFound);
    }

    let stored = ctx.collection.find_one(&scope, &FindOptions::default()).await?.ok_or(ApiError::NotFound)?;
    ApiResponse::success(decode::<Payment>(stored)?)
}

/// GET /payments/{id}/~get-amount
async fn get_amount(ctx: MethodContext) -> ApiResult {
    let stored = ctx
        .collection
        .find_one(&ctx.scope(), &FindOptions::default())
        .await?
        .ok_or(ApiError::NotFound)?;
    ApiResponse::success(decode::<Payment>(stored)?.amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::samples::validator;

    fn payment(from: &str, amount: i64) -> Payment {
        Payment { id: None, from: from.to_string(), amount, when: Some(DateTime::now()) }
    }

    fn violations(payment: &Payment) -> Vec<String> {
        let validator = validator();
        let mut v = Validation::new(&validator);
        payment.validate(&mut v);
        v.finish().err().unwrap_or_default().iter().map(|e| e.to_string()).collect()
    }

    #[test]
    fn validates_payments() {
        assert!(violations(&payment("alice", 10)).is_empty());
        assert_eq!(violations(&payment("alice", -5)), vec!["amount: gt"]);
        assert_eq!(violations(&payment("", 1)), vec!["from: required"]);
        assert_eq!(violations(&payment("no spaces allowed", 1)), vec!["from: address"]);

        let undated = Payment { when: None, ..payment("alice", 1) };
        assert_eq!(violations(&undated), vec!["when: required"]);
    }

    #[test]
    fn checks_addresses() {
        assert!(is_address(&json!("wallet_01")));
        assert!(!is_address(&json!("ab")));
        assert!(!is_address(&json!(12345)));
    }
}
