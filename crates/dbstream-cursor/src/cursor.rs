use std::collections::VecDeque;

use dbstream_types::{Item, QuerySpec, SortDirection, WriteOp};
use futures::stream::{self, Stream, StreamExt};
use serde::Serialize;
use tracing::{debug, warn};

use crate::backend::Backend;
use crate::config::CursorConfig;
use crate::error::{CursorError, CursorResult};

/// Counters for the work a cursor has handed to its backend.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CursorStats {
    pub pages_loaded: u64,
    pub items_read: u64,
    pub saved: u64,
    pub removed: u64,
}

/// Progress of the readable side.
#[derive(Debug)]
enum ReadState {
    /// No pass has started; the builder query may still change.
    Idle,
    /// A pass is running against this frozen copy of the query.
    Reading(QuerySpec),
    /// The backend signaled end-of-stream (or no query was attached).
    Ended,
}

/// A dual-mode object stream over a [`Backend`].
///
/// The readable side pulls pages from [`Backend::load`] only when the
/// consumer asks for an item and the buffer is empty. The writable side
/// routes each [`WriteOp`] to exactly one of [`Backend::save`] or
/// [`Backend::remove_item`] and completes only after the backend does.
///
/// Attach a query with [`find`](Self::find) (plus optional
/// [`sort`](Self::sort), [`skip`](Self::skip), [`limit`](Self::limit))
/// before reading. A cursor that was never queried yields nothing.
pub struct Cursor<B> {
    backend: B,
    config: CursorConfig,
    query: QuerySpec,
    state: ReadState,
    buffer: VecDeque<Item>,
    finished: bool,
    stats: CursorStats,
}

impl<B: Backend> Cursor<B> {
    /// Create a cursor with the default configuration.
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, CursorConfig::default())
    }

    pub fn with_config(backend: B, config: CursorConfig) -> Self {
        Self {
            backend,
            config,
            query: QuerySpec::new(),
            state: ReadState::Idle,
            buffer: VecDeque::new(),
            finished: false,
            stats: CursorStats::default(),
        }
    }

    // -----------------------------------------------------------------------
    // Query builder
    // -----------------------------------------------------------------------

    /// Attach (or replace) the filter. Last call wins.
    pub fn find(&mut self, filter: impl Into<Item>) -> &mut Self {
        self.note_late_change("find");
        self.query.set_filter(filter);
        self
    }

    /// Append an ascending sort key.
    pub fn sort(&mut self, key: impl Into<String>) -> &mut Self {
        self.sort_with(key, SortDirection::Ascending)
    }

    /// Append a sort key with an explicit direction. Calls accumulate into
    /// a priority list in call order.
    pub fn sort_with(&mut self, key: impl Into<String>, direction: SortDirection) -> &mut Self {
        self.note_late_change("sort");
        self.query.push_sort(key, direction);
        self
    }

    /// Append a sort key given in signed form (`1` ascending, `-1`
    /// descending). Any other value is rejected and the query is unchanged.
    pub fn sort_signed(
        &mut self,
        key: impl Into<String>,
        direction: i64,
    ) -> CursorResult<&mut Self> {
        let direction = SortDirection::try_from(direction)?;
        Ok(self.sort_with(key, direction))
    }

    pub fn skip(&mut self, n: u64) -> &mut Self {
        self.note_late_change("skip");
        self.query.skip = Some(n);
        self
    }

    pub fn limit(&mut self, n: u64) -> &mut Self {
        self.note_late_change("limit");
        self.query.limit = Some(n);
        self
    }

    /// The query as built so far.
    pub fn query(&self) -> &QuerySpec {
        &self.query
    }

    fn note_late_change(&self, op: &'static str) {
        if matches!(self.state, ReadState::Reading(_)) {
            warn!(op, "query changed during a read pass; applies after rewind");
        }
    }

    // -----------------------------------------------------------------------
    // Readable side
    // -----------------------------------------------------------------------

    /// Pull the next item, loading a page from the backend when needed.
    ///
    /// Returns `Ok(None)` at end-of-stream. A backend error ends the pass
    /// and is returned once.
    pub async fn read(&mut self) -> CursorResult<Option<Item>> {
        if let Some(item) = self.take_buffered() {
            return Ok(Some(item));
        }

        if let ReadState::Idle = self.state {
            if self.query.is_queried() {
                debug!(query = ?self.query, "read pass started");
                self.state = ReadState::Reading(self.query.clone());
            } else {
                debug!("no query attached; ending without loading");
                self.state = ReadState::Ended;
            }
        }

        loop {
            let ReadState::Reading(query) = &self.state else {
                return Ok(None);
            };
            let size = self.config.effective_page_size();

            let page = match self.backend.load(query, size).await {
                Ok(page) => page,
                Err(err) => {
                    self.state = ReadState::Ended;
                    return Err(err);
                }
            };
            self.stats.pages_loaded += 1;
            debug!(size, count = page.items.len(), end = page.end, "page loaded");

            self.buffer.extend(page.items);
            if page.end {
                self.state = ReadState::Ended;
                let items_read = self.stats.items_read + self.buffer.len() as u64;
                debug!(items_read, "read pass ended");
            }
            if let Some(item) = self.take_buffered() {
                return Ok(Some(item));
            }
        }
    }

    fn take_buffered(&mut self) -> Option<Item> {
        let item = self.buffer.pop_front()?;
        self.stats.items_read += 1;
        Some(item)
    }

    /// The readable side as a [`Stream`]. Nothing is loaded until polled.
    pub fn items(&mut self) -> impl Stream<Item = CursorResult<Item>> + Send + '_ {
        stream::try_unfold(self, |cursor| async move {
            Ok::<_, CursorError>(cursor.read().await?.map(move |item| (item, cursor)))
        })
    }

    /// Start a new read pass against the current builder query.
    pub fn rewind(&mut self) -> &mut Self {
        self.buffer.clear();
        self.state = ReadState::Idle;
        self.backend.rewind();
        self
    }

    /// Returns `true` once the readable side has signaled end-of-stream.
    pub fn is_ended(&self) -> bool {
        matches!(self.state, ReadState::Ended) && self.buffer.is_empty()
    }

    // -----------------------------------------------------------------------
    // Writable side
    // -----------------------------------------------------------------------

    /// Save one item.
    pub async fn write(&mut self, item: impl Into<Item>) -> CursorResult<()> {
        self.send(WriteOp::Save(item.into())).await
    }

    /// Remove one item. Same completion semantics as [`write`](Self::write).
    pub async fn remove(&mut self, item: impl Into<Item>) -> CursorResult<()> {
        self.send(WriteOp::Remove(item.into())).await
    }

    /// Serialize a record and save it.
    pub async fn write_record<T: Serialize + ?Sized>(&mut self, record: &T) -> CursorResult<()> {
        let item = serde_json::to_value(record)?;
        self.send(WriteOp::Save(item)).await
    }

    /// Dispatch one op to exactly one backend hook.
    pub async fn send(&mut self, op: WriteOp) -> CursorResult<()> {
        if self.finished {
            warn!(remove = op.is_remove(), "write attempted after end");
            return Err(CursorError::WriteAfterEnd);
        }
        match op {
            WriteOp::Save(item) => {
                self.backend.save(&item).await?;
                self.stats.saved += 1;
                debug!(saved = self.stats.saved, "item saved");
            }
            WriteOp::Remove(item) => {
                self.backend.remove_item(&item).await?;
                self.stats.removed += 1;
                debug!(removed = self.stats.removed, "item removed");
            }
        }
        Ok(())
    }

    /// Drain `ops` into the writable side in order.
    ///
    /// Stops at the first upstream or backend error. Returns the number of
    /// ops applied.
    pub async fn write_all<S, T>(&mut self, ops: S) -> CursorResult<u64>
    where
        S: Stream<Item = CursorResult<T>>,
        T: Into<WriteOp>,
    {
        let mut ops = std::pin::pin!(ops);
        let mut applied = 0;
        while let Some(op) = ops.next().await {
            self.send(op?.into()).await?;
            applied += 1;
        }
        Ok(applied)
    }

    /// Close the writable side.
    pub fn end(&mut self) {
        if !self.finished {
            debug!(
                saved = self.stats.saved,
                removed = self.stats.removed,
                "write side finished"
            );
        }
        self.finished = true;
    }

    /// Returns `true` once [`end`](Self::end) was called.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn stats(&self) -> CursorStats {
        self.stats
    }

    pub fn config(&self) -> &CursorConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }
}

impl<B> std::fmt::Debug for Cursor<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cursor")
            .field("query", &self.query)
            .field("state", &self.state)
            .field("buffered", &self.buffer.len())
            .field("finished", &self.finished)
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Page, Unimplemented};
    use crate::error::Hook;
    use async_trait::async_trait;
    use futures::TryStreamExt;
    use proptest::prelude::*;
    use dbstream_types::QueryError;
    use serde_json::json;

    /// Records every hook call; serves `data` one item per page.
    #[derive(Default)]
    struct Recording {
        data: VecDeque<Item>,
        saved: Vec<Item>,
        removed: Vec<Item>,
        ops: Vec<WriteOp>,
        seen_queries: Vec<QuerySpec>,
        sizes: Vec<usize>,
        fail_save: bool,
    }

    impl Recording {
        fn serving(items: Vec<Item>) -> Self {
            Self {
                data: items.into(),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl Backend for Recording {
        async fn load(&mut self, query: &QuerySpec, size: usize) -> CursorResult<Page> {
            self.seen_queries.push(query.clone());
            self.sizes.push(size);
            Ok(match self.data.pop_front() {
                Some(item) => Page::more(vec![item]),
                None => Page::end(),
            })
        }

        async fn save(&mut self, item: &Item) -> CursorResult<()> {
            if self.fail_save {
                return Err(CursorError::backend(Hook::Save, "disk full"));
            }
            self.saved.push(item.clone());
            self.ops.push(WriteOp::Save(item.clone()));
            Ok(())
        }

        async fn remove_item(&mut self, item: &Item) -> CursorResult<()> {
            self.removed.push(item.clone());
            self.ops.push(WriteOp::Remove(item.clone()));
            Ok(())
        }
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn writes_objects() {
        let mut cursor = Cursor::new(Recording::default());
        cursor.write(json!({"name": "Hello"})).await.unwrap();
        cursor.write(json!({"name": "World"})).await.unwrap();
        cursor.end();

        let saved = &cursor.backend().saved;
        assert_eq!(saved.len(), 2);
        assert_eq!(saved[0]["name"], "Hello");
        assert_eq!(saved[1]["name"], "World");
        assert!(cursor.backend().removed.is_empty());
    }

    #[tokio::test]
    async fn removes_objects() {
        let mut cursor = Cursor::new(Recording::default());
        cursor.remove(json!({"name": "Hello"})).await.unwrap();
        cursor.remove(json!({"name": "World"})).await.unwrap();
        cursor.end();

        let removed = &cursor.backend().removed;
        assert_eq!(removed.len(), 2);
        assert_eq!(removed[0]["name"], "Hello");
        assert_eq!(removed[1]["name"], "World");
        assert!(cursor.backend().saved.is_empty());
        assert_eq!(cursor.stats().removed, 2);
    }

    #[tokio::test]
    async fn envelope_ops_are_routed() {
        let mut cursor = Cursor::new(Recording::default());
        cursor
            .send(WriteOp::from_envelope(json!({"$remove": {"id": 1}})))
            .await
            .unwrap();
        cursor
            .send(WriteOp::from_envelope(json!({"id": 2})))
            .await
            .unwrap();

        assert_eq!(cursor.backend().removed, vec![json!({"id": 1})]);
        assert_eq!(cursor.backend().saved, vec![json!({"id": 2})]);
    }

    #[tokio::test]
    async fn write_after_end_fails() {
        let mut cursor = Cursor::new(Recording::default());
        cursor.end();
        assert!(cursor.is_finished());
        let err = cursor.write(json!({})).await.unwrap_err();
        assert_eq!(err, CursorError::WriteAfterEnd);
        assert!(cursor.backend().saved.is_empty());
    }

    #[tokio::test]
    async fn backend_failure_is_reported_once() {
        let mut cursor = Cursor::new(Recording {
            fail_save: true,
            ..Recording::default()
        });
        let err = cursor.write(json!({"id": 1})).await.unwrap_err();
        assert_eq!(err, CursorError::backend(Hook::Save, "disk full"));
        assert_eq!(cursor.stats().saved, 0);

        // Only that write failed; the cursor still accepts removals.
        cursor.remove(json!({"id": 1})).await.unwrap();
        assert_eq!(cursor.stats().removed, 1);
    }

    #[tokio::test]
    async fn write_record_serializes() {
        #[derive(Serialize)]
        struct User<'a> {
            name: &'a str,
            age: u32,
        }

        let mut cursor = Cursor::new(Recording::default());
        cursor
            .write_record(&User { name: "Ada", age: 36 })
            .await
            .unwrap();
        assert_eq!(cursor.backend().saved, vec![json!({"name": "Ada", "age": 36})]);
    }

    #[tokio::test]
    async fn write_all_drains_in_order_and_stops_on_error() {
        let mut cursor = Cursor::new(Recording::default());
        let ops = stream::iter(vec![
            Ok(WriteOp::Save(json!(1))),
            Ok(WriteOp::Remove(json!(2))),
            Err(CursorError::Callback("boom".into())),
            Ok(WriteOp::Save(json!(3))),
        ]);
        let err = cursor.write_all(ops).await.unwrap_err();
        assert_eq!(err, CursorError::Callback("boom".into()));
        assert_eq!(cursor.backend().saved, vec![json!(1)]);
        assert_eq!(cursor.backend().removed, vec![json!(2)]);

        let applied = cursor
            .write_all(stream::iter(vec![Ok::<_, CursorError>(json!(4))]))
            .await
            .unwrap();
        assert_eq!(applied, 1);
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn reads_objects() {
        let mut cursor = Cursor::new(Recording::serving(vec![
            json!({"name": "Hello"}),
            json!({"name": "World"}),
        ]));
        cursor.find(json!({}));

        let read: Vec<Item> = cursor.items().try_collect().await.unwrap();
        assert_eq!(read.len(), 2);
        assert_eq!(read[0]["name"], "Hello");
        assert_eq!(read[1]["name"], "World");
        assert!(cursor.is_ended());
        assert_eq!(cursor.stats().items_read, 2);
        assert_eq!(cursor.stats().pages_loaded, 3);
        assert_eq!(cursor.read().await.unwrap(), None);
    }

    #[tokio::test]
    async fn unqueried_cursor_yields_nothing() {
        let mut cursor = Cursor::new(Recording::serving(vec![json!({"name": "Hello"})]));
        cursor.sort("name").limit(1);

        assert_eq!(cursor.read().await.unwrap(), None);
        assert!(cursor.is_ended());
        assert!(cursor.backend().seen_queries.is_empty());
    }

    #[tokio::test]
    async fn null_filter_counts_as_unqueried() {
        let mut cursor = Cursor::new(Unimplemented);
        cursor.find(json!(null));
        assert_eq!(cursor.read().await.unwrap(), None);
    }

    #[tokio::test]
    async fn provides_query_to_load() {
        let mut cursor = Cursor::with_config(
            Recording::serving(vec![json!({"name": "Hello"}), json!({"name": "World"})]),
            CursorConfig::default().with_page_size(8),
        );
        cursor
            .find(json!({"id": 15}))
            .sort("name")
            .sort_with("age", SortDirection::Descending)
            .skip(5)
            .limit(3);

        let read: Vec<Item> = cursor.items().try_collect().await.unwrap();
        assert_eq!(read.len(), 2);

        let query = &cursor.backend().seen_queries[0];
        assert_eq!(query.filter, Some(json!({"id": 15})));
        assert_eq!(
            query.sort,
            vec![
                dbstream_types::SortKey::ascending("name"),
                dbstream_types::SortKey::descending("age"),
            ]
        );
        assert_eq!(query.skip, Some(5));
        assert_eq!(query.limit, Some(3));
        assert!(cursor.backend().sizes.iter().all(|&s| s == 8));
    }

    #[tokio::test]
    async fn find_may_come_last() {
        let mut cursor = Cursor::new(Recording::serving(vec![]));
        cursor.limit(2).sort("a").skip(1).find(json!({"x": 1})).find(json!({"x": 2}));
        assert_eq!(cursor.read().await.unwrap(), None);

        let query = &cursor.backend().seen_queries[0];
        assert_eq!(query.filter, Some(json!({"x": 2})));
        assert_eq!(query.sort.len(), 1);
        assert_eq!(query.skip, Some(1));
        assert_eq!(query.limit, Some(2));
    }

    #[tokio::test]
    async fn signed_sort_direction() {
        let mut cursor = Cursor::new(Recording::serving(vec![]));
        cursor.sort_signed("name", 1).unwrap().sort_signed("age", -1).unwrap();

        let err = cursor.sort_signed("id", 0).unwrap_err();
        assert_eq!(err, CursorError::Query(QueryError::InvalidDirection(0)));
        assert_eq!(
            cursor.query().sort,
            vec![
                dbstream_types::SortKey::ascending("name"),
                dbstream_types::SortKey::descending("age"),
            ]
        );
    }

    #[tokio::test]
    async fn query_is_frozen_for_the_pass() {
        let mut cursor = Cursor::new(Recording::serving(vec![json!(1), json!(2)]));
        cursor.find(json!({"v": 1}));
        assert_eq!(cursor.read().await.unwrap(), Some(json!(1)));

        cursor.find(json!({"v": 2}));
        assert_eq!(cursor.read().await.unwrap(), Some(json!(2)));
        assert!(cursor
            .backend()
            .seen_queries
            .iter()
            .all(|q| q.filter == Some(json!({"v": 1}))));

        cursor.rewind();
        assert_eq!(cursor.read().await.unwrap(), None);
        let last = cursor.backend().seen_queries.last().cloned().unwrap();
        assert_eq!(last.filter, Some(json!({"v": 2})));
    }

    #[tokio::test]
    async fn loads_lazily() {
        let mut cursor = Cursor::new(Recording::serving(vec![json!(1), json!(2), json!(3)]));
        cursor.find(json!({}));
        {
            let items = cursor.items();
            let first: Vec<Item> = items.take(1).try_collect().await.unwrap();
            assert_eq!(first, vec![json!(1)]);
        }
        assert_eq!(cursor.backend().seen_queries.len(), 1);
    }

    // -----------------------------------------------------------------------
    // Unimplemented hooks
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn requires_implementation_of_save() {
        let mut cursor = Cursor::new(Unimplemented);
        let err = cursor.write(json!({})).await.unwrap_err();
        assert_eq!(err, CursorError::NotImplemented(Hook::Save));
    }

    #[tokio::test]
    async fn requires_implementation_of_load() {
        let mut cursor = Cursor::new(Unimplemented);
        cursor.find(json!({}));
        let err = cursor.read().await.unwrap_err();
        assert_eq!(err, CursorError::NotImplemented(Hook::Load));
        assert!(cursor.is_ended());
    }

    #[tokio::test]
    async fn requires_implementation_of_remove() {
        let mut cursor = Cursor::new(Unimplemented);
        let err = cursor.remove(json!({})).await.unwrap_err();
        assert_eq!(err, CursorError::NotImplemented(Hook::Remove));
    }

    // -----------------------------------------------------------------------
    // Properties
    // -----------------------------------------------------------------------

    fn write_op() -> impl Strategy<Value = WriteOp> {
        (any::<bool>(), any::<i64>()).prop_map(|(remove, id)| {
            let item = json!({ "id": id });
            if remove {
                WriteOp::Remove(item)
            } else {
                WriteOp::Save(item)
            }
        })
    }

    proptest! {
        #[test]
        fn writes_reach_backend_in_order(ops in proptest::collection::vec(write_op(), 0..32)) {
            let mut cursor = Cursor::new(Recording::default());
            futures::executor::block_on(async {
                for op in ops.clone() {
                    cursor.send(op).await.unwrap();
                }
            });

            let expected_saved = ops.iter().filter(|op| !op.is_remove()).count() as u64;
            let expected_removed = ops.iter().filter(|op| op.is_remove()).count() as u64;

            prop_assert_eq!(&cursor.backend().ops, &ops);
            prop_assert_eq!(cursor.stats().saved, expected_saved);
            prop_assert_eq!(cursor.stats().removed, expected_removed);
        }
    }
}
