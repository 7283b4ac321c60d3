//! Resource declarations: what the server exposes and how.

pub mod methods;
pub mod model;
pub mod resource;
pub mod settings;

pub use methods::{MethodContext, MethodHandler, MethodKind, ResourceMethod};
pub use model::{model, Instance, Model, ModelBinding};
pub use resource::{IndexSpec, Resource, ResourceKind, TableRef, Verb};
pub use settings::{Global, Settings, SettingsError};

/// Names of resources, databases, collections, methods and indexes: a
/// letter followed by one or more letters, digits, `_` or `-`.
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {
            name.len() > 1 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        }
        _ => false,
    }
}
