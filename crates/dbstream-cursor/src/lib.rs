//! Dual-mode object cursor for dbstream.
//!
//! A [`Cursor`] is readable and writable at once. Its readable side pulls
//! pages from a [`Backend`] on demand, against a query built with
//! `find` / `sort` / `skip` / `limit` before reading starts. Its writable
//! side hands every written item to the backend's `save`, or to
//! `remove_item` when the item was written with `Cursor::remove`.
//!
//! The cursor implements no storage itself. Concrete drivers implement the
//! [`Backend`] trait; [`InMemoryCollection`] is the reference backend used
//! in tests and for embedding.
//!
//! # Design Rules
//!
//! 1. A cursor without a query yields nothing and never calls `load`.
//! 2. Each write reaches exactly one hook, and completes only after it.
//! 3. Pages are requested only when the consumer asks and the buffer is empty.
//! 4. The query is frozen for the duration of a read pass.
//! 5. Every backend error is returned exactly once; nothing is retried.

pub mod backend;
pub mod config;
pub mod cursor;
pub mod error;
pub mod memory;

pub use backend::{Backend, Page, Unimplemented};
pub use config::CursorConfig;
pub use cursor::{Cursor, CursorStats};
pub use error::{CursorError, CursorResult, Hook};
pub use memory::{compare_values, fields_match, InMemoryBackend, InMemoryCollection, Matcher};

pub use dbstream_types::{Item, QuerySpec, SortDirection, SortKey, WriteOp};
