use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{decode, set};
use crate::database::FindOptions;
use crate::dsl::{MethodContext, Model, Resource, ResourceMethod};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::types::{Document, ObjectId};
use crate::validation::Validation;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniverseVersion {
    pub major: u32,
    pub minor: u32,
    pub revision: u32,
}

/// Singleton describing the whole game layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Universe {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(default)]
    pub caption: String,
    #[serde(default)]
    pub motd: String,
    #[serde(default)]
    pub version: UniverseVersion,
}

impl Model for Universe {
    fn validate(&self, v: &mut Validation<'_>) {
        v.required_str("caption", &self.caption);
        v.required_str("motd", &self.motd);
    }

    fn identity(&self) -> Option<ObjectId> {
        self.id
    }

    fn set_identity(&mut self, id: ObjectId) {
        self.id = Some(id);
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SetMotd {
    #[serde(default)]
    motd: String,
}

impl Model for SetMotd {
    fn validate(&self, v: &mut Validation<'_>) {
        v.required_str("motd", &self.motd);
    }
}

pub fn resource() -> Resource {
    Resource::simple("mydb", "universe")
        .model::<Universe>()
        .method("set-motd", ResourceMethod::operation(set_motd))
        .method("version", ResourceMethod::view(version))
}

/// POST /universe/~set-motd
async fn set_motd(ctx: MethodContext) -> ApiResult {
    let body: SetMotd = ctx.json()?;
    ctx.validate(&body)?;

    let mut fields = Document::new();
    fields.insert("motd".to_string(), Value::String(body.motd));
    if ctx.collection.update_one(&ctx.scope(), &set(fields), false).await?.matched == 0 {
        return Err(ApiError::NotFound);
    }
    Ok(ApiResponse::ok())
}

/// GET /universe/~version
async fn version(ctx: MethodContext) -> ApiResult {
    let stored = ctx
        .collection
        .find_one(&ctx.scope(), &FindOptions::default())
        .await?
        .ok_or(ApiError::NotFound)?;
    ApiResponse::success(decode::<Universe>(stored)?.version)
}
