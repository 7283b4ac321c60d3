pub mod auth;
pub mod response;

pub use auth::{require_permission, ResourceGuard};
pub use response::{json_fallback, ApiResponse, ApiResult};
