pub mod compose;
pub mod error;
pub mod filter;
pub mod filter_order;
pub mod filter_where;
pub mod path;
pub mod projection;
pub mod types;

pub use compose::{compose_filter, exclude_deleted, visible_filter};
pub use error::FilterError;
pub use filter::Filter;
pub use filter_order::FilterOrder;
pub use filter_where::Predicate;
pub use projection::Projection;
pub use types::*;
