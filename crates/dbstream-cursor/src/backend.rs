//! The [`Backend`] trait: the entire boundary a storage driver implements.
//!
//! A cursor never touches storage itself. Reads become [`Backend::load`]
//! calls, writes become [`Backend::save`] or [`Backend::remove_item`] calls.
//! Every hook has a default body that fails with
//! [`CursorError::NotImplemented`], so a backend only implements the
//! directions it supports and the contract is enforced when a hook is used.

use async_trait::async_trait;
use dbstream_types::{Item, QuerySpec};

use crate::error::{CursorError, CursorResult, Hook};

/// One batch of results returned by [`Backend::load`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Page {
    /// Items in result order.
    pub items: Vec<Item>,
    /// `true` when the result set is exhausted after these items.
    pub end: bool,
}

impl Page {
    /// Items with more to follow.
    pub fn more(items: Vec<Item>) -> Self {
        Self { items, end: false }
    }

    /// The final items of the result set.
    pub fn last(items: Vec<Item>) -> Self {
        Self { items, end: true }
    }

    /// End of the result set with no further items.
    pub fn end() -> Self {
        Self::last(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Storage driver behind a [`Cursor`](crate::Cursor).
///
/// Hooks receive borrowed values that are only valid for the duration of
/// the call. A hook future must resolve exactly once; a hook that never
/// resolves stalls the cursor.
#[async_trait]
pub trait Backend: Send {
    /// Fetch the next page for `query`.
    ///
    /// `size` is advisory. Return [`Page::last`] or [`Page::end`] once the
    /// result set is exhausted; an empty non-final page makes the cursor
    /// ask again. Never called for a cursor without an attached query.
    async fn load(&mut self, query: &QuerySpec, size: usize) -> CursorResult<Page> {
        let _ = (query, size);
        Err(CursorError::NotImplemented(Hook::Load))
    }

    /// Persist one written item.
    async fn save(&mut self, item: &Item) -> CursorResult<()> {
        let _ = item;
        Err(CursorError::NotImplemented(Hook::Save))
    }

    /// Delete one item handed to `Cursor::remove`.
    async fn remove_item(&mut self, item: &Item) -> CursorResult<()> {
        let _ = item;
        Err(CursorError::NotImplemented(Hook::Remove))
    }

    /// Forget any per-pass paging state. Called by `Cursor::rewind`.
    fn rewind(&mut self) {}
}

#[async_trait]
impl<B: Backend + ?Sized> Backend for Box<B> {
    async fn load(&mut self, query: &QuerySpec, size: usize) -> CursorResult<Page> {
        (**self).load(query, size).await
    }

    async fn save(&mut self, item: &Item) -> CursorResult<()> {
        (**self).save(item).await
    }

    async fn remove_item(&mut self, item: &Item) -> CursorResult<()> {
        (**self).remove_item(item).await
    }

    fn rewind(&mut self) {
        (**self).rewind()
    }
}

/// A backend that implements nothing. Every hook fails with
/// [`CursorError::NotImplemented`].
#[derive(Clone, Copy, Debug, Default)]
pub struct Unimplemented;

#[async_trait]
impl Backend for Unimplemented {}
