//! Wire formats shared by models.

pub mod datetime;

pub use datetime::DateTime;
