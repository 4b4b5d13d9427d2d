use std::fmt;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use dbstream_cursor::{Backend, Cursor, CursorError, CursorResult};
use dbstream_types::{Item, WriteOp};
use futures::future;
use futures::stream::{self, BoxStream, Stream, StreamExt, TryStreamExt};
use tracing::debug;

/// A pull-driven pipeline stage of [`Item`]s.
///
/// Every combinator consumes the stage and returns a new one linked
/// downstream of it, so calls chain. Items keep their arrival order, and
/// nothing upstream is polled until something downstream asks.
///
/// Errors pass through unchanged. Once a stage yields an error it yields
/// nothing more.
pub struct ObjectStream<'a> {
    inner: BoxStream<'a, CursorResult<Item>>,
    failed: bool,
}

impl<'a> ObjectStream<'a> {
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = CursorResult<Item>> + Send + 'a,
    {
        Self {
            inner: stream.boxed(),
            failed: false,
        }
    }

    pub fn from_items<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Item>,
        I::IntoIter: Send + 'a,
    {
        Self::new(stream::iter(items.into_iter().map(Ok)))
    }

    pub fn empty() -> Self {
        Self::new(stream::empty())
    }

    /// Forward only the items for which `predicate` returns `true`.
    pub fn filter<F>(self, mut predicate: F) -> Self
    where
        F: FnMut(&Item) -> bool + Send + 'a,
    {
        Self::new(TryStreamExt::try_filter(self, move |item| {
            future::ready(predicate(item))
        }))
    }

    /// Like [`filter`](Self::filter), with a predicate that may fail. A
    /// failure surfaces as [`CursorError::Callback`].
    pub fn try_filter<F, E>(self, mut predicate: F) -> Self
    where
        F: FnMut(&Item) -> Result<bool, E> + Send + 'a,
        E: fmt::Display,
    {
        Self::new(TryStreamExt::try_filter_map(self, move |item| {
            future::ready(match predicate(&item) {
                Ok(true) => Ok(Some(item)),
                Ok(false) => Ok(None),
                Err(err) => Err(CursorError::callback(err)),
            })
        }))
    }

    /// Replace every item with `transform(item)`.
    pub fn map<F>(self, transform: F) -> Self
    where
        F: FnMut(Item) -> Item + Send + 'a,
    {
        Self::new(TryStreamExt::map_ok(self, transform))
    }

    /// Like [`map`](Self::map), with a transform that may fail.
    pub fn try_map<F, E>(self, mut transform: F) -> Self
    where
        F: FnMut(Item) -> Result<Item, E> + Send + 'a,
        E: fmt::Display,
    {
        Self::new(TryStreamExt::and_then(self, move |item| {
            future::ready(transform(item).map_err(CursorError::callback))
        }))
    }

    /// Fold the whole upstream into `memo = combine(memo, item)`, starting
    /// from `initial`, then emit the result.
    ///
    /// This is a barrier: nothing is emitted until upstream ends. An array
    /// memo is emitted element by element; any other memo is emitted as a
    /// single item.
    pub fn reduce<F>(self, mut combine: F, initial: Item) -> Self
    where
        F: FnMut(Item, Item) -> Item + Send + 'a,
    {
        let barrier = TryStreamExt::try_fold(self, initial, move |memo, item| {
            future::ready(Ok::<_, CursorError>(combine(memo, item)))
        });
        let spread = stream::once(barrier)
            .map_ok(|memo| {
                let items = match memo {
                    Item::Array(items) => items,
                    other => vec![other],
                };
                debug!(count = items.len(), "reduce drained upstream");
                stream::iter(items.into_iter().map(Ok::<Item, CursorError>))
            })
            .try_flatten();
        Self::new(spread)
    }

    /// Call `callback` on every item as it passes, leaving the stream
    /// unchanged.
    pub fn each<F>(self, callback: F) -> Self
    where
        F: FnMut(&Item) + Send + 'a,
    {
        Self::new(TryStreamExt::inspect_ok(self, callback))
    }

    /// Alias of [`each`](Self::each).
    pub fn for_each<F>(self, callback: F) -> Self
    where
        F: FnMut(&Item) + Send + 'a,
    {
        self.each(callback)
    }

    /// Collect every item in arrival order. Resolves once, after upstream
    /// ends, or with the first error.
    pub async fn to_array(self) -> CursorResult<Vec<Item>> {
        TryStreamExt::try_collect(self).await
    }

    /// Drain into a cursor's writable side in order. An item wrapped as
    /// `{"$remove": item}` is removed; every other item is saved. Returns
    /// the number of ops applied.
    pub async fn pipe<B: Backend>(self, cursor: &mut Cursor<B>) -> CursorResult<u64> {
        cursor
            .write_all(TryStreamExt::map_ok(self, WriteOp::from_envelope))
            .await
    }
}

impl Stream for ObjectStream<'_> {
    type Item = CursorResult<Item>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.failed {
            return Poll::Ready(None);
        }
        let next = ready!(self.inner.poll_next_unpin(cx));
        if matches!(next, Some(Err(_))) {
            self.failed = true;
        }
        Poll::Ready(next)
    }
}

impl fmt::Debug for ObjectStream<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectStream")
            .field("failed", &self.failed)
            .finish_non_exhaustive()
    }
}
