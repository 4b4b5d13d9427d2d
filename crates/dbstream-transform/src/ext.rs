use dbstream_cursor::{Backend, Cursor, CursorResult};
use dbstream_types::Item;
use futures::future::BoxFuture;
use futures::FutureExt;

use crate::stream::ObjectStream;

/// Gives a backend-backed cursor the transform combinators directly, so
/// one object is both a queryable cursor and the head of a pipeline.
///
/// Each combinator starts a stage over the cursor's readable side; the
/// cursor stays borrowed until the returned stage is dropped.
pub trait CursorStreamExt {
    /// The readable side as an [`ObjectStream`].
    fn stream(&mut self) -> ObjectStream<'_>;

    fn filter<'a, F>(&'a mut self, predicate: F) -> ObjectStream<'a>
    where
        F: FnMut(&Item) -> bool + Send + 'a,
    {
        self.stream().filter(predicate)
    }

    fn map<'a, F>(&'a mut self, transform: F) -> ObjectStream<'a>
    where
        F: FnMut(Item) -> Item + Send + 'a,
    {
        self.stream().map(transform)
    }

    fn reduce<'a, F>(&'a mut self, combine: F, initial: Item) -> ObjectStream<'a>
    where
        F: FnMut(Item, Item) -> Item + Send + 'a,
    {
        self.stream().reduce(combine, initial)
    }

    fn each<'a, F>(&'a mut self, callback: F) -> ObjectStream<'a>
    where
        F: FnMut(&Item) + Send + 'a,
    {
        self.stream().each(callback)
    }

    fn for_each<'a, F>(&'a mut self, callback: F) -> ObjectStream<'a>
    where
        F: FnMut(&Item) + Send + 'a,
    {
        self.stream().for_each(callback)
    }

    /// Read the whole pass into a `Vec`.
    fn to_array(&mut self) -> BoxFuture<'_, CursorResult<Vec<Item>>> {
        self.stream().to_array().boxed()
    }
}

impl<B: Backend> CursorStreamExt for Cursor<B> {
    fn stream(&mut self) -> ObjectStream<'_> {
        ObjectStream::new(self.items())
    }
}
