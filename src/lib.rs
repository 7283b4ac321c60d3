pub mod auth;
pub mod config;
pub mod database;
pub mod dsl;
pub mod error;
pub mod filter;
pub mod formats;
pub mod handlers;
pub mod middleware;
pub mod records;
pub mod samples;
pub mod server;
pub mod types;
pub mod validation;

pub use error::ApiError;
pub use middleware::{ApiResponse, ApiResult};
pub use server::{Server, ServerError};
