//! Foundation types for dbstream.
//!
//! Every other dbstream crate depends on `dbstream-types`. Nothing here does
//! any I/O; these are the values that flow between a cursor and its backend.
//!
//! # Key Types
//!
//! - [`Item`] -- an opaque structured record (`serde_json::Value`)
//! - [`WriteOp`] -- save-or-remove request on the write path
//! - [`QuerySpec`] -- deferred filter / sort / skip / limit description
//! - [`SortKey`] and [`SortDirection`] -- one entry of the sort priority list

pub mod error;
pub mod item;
pub mod query;

pub use error::QueryError;
pub use item::{Item, WriteOp, REMOVE_MARKER};
pub use query::{QuerySpec, SortDirection, SortKey};
