use std::cmp::Ordering;
use std::collections::VecDeque;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use dbstream_types::{Item, QuerySpec, SortKey};
use serde_json::Value;
use tracing::debug;

use crate::backend::{Backend, Page};
use crate::config::CursorConfig;
use crate::cursor::Cursor;
use crate::error::CursorResult;

/// Decides whether an item satisfies a filter.
pub type Matcher = Arc<dyn Fn(&Item, &Item) -> bool + Send + Sync>;

/// Shared, `Vec`-backed collection for tests and embedding.
///
/// Clones share the same items. Each [`cursor`](Self::cursor) gets its own
/// paging state, so several cursors may read and write one collection.
/// Filters are interpreted by a [`Matcher`]; the default one is
/// [`fields_match`].
#[derive(Clone)]
pub struct InMemoryCollection {
    items: Arc<RwLock<Vec<Item>>>,
    matcher: Matcher,
}

impl InMemoryCollection {
    /// Create an empty collection using [`fields_match`].
    pub fn new() -> Self {
        Self::with_matcher(fields_match)
    }

    /// Create an empty collection with a custom filter matcher.
    pub fn with_matcher<F>(matcher: F) -> Self
    where
        F: Fn(&Item, &Item) -> bool + Send + Sync + 'static,
    {
        Self {
            items: Arc::new(RwLock::new(Vec::new())),
            matcher: Arc::new(matcher),
        }
    }

    /// Number of items currently stored.
    pub fn len(&self) -> usize {
        self.items.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.items.read().expect("lock poisoned").is_empty()
    }

    /// Copy of all items in insertion order.
    pub fn snapshot(&self) -> Vec<Item> {
        self.items.read().expect("lock poisoned").clone()
    }

    /// Remove all items.
    pub fn clear(&self) {
        self.items.write().expect("lock poisoned").clear();
    }

    /// A backend over this collection.
    pub fn backend(&self) -> InMemoryBackend {
        InMemoryBackend {
            collection: self.clone(),
            pending: None,
        }
    }

    /// A cursor over this collection with the default configuration.
    pub fn cursor(&self) -> Cursor<InMemoryBackend> {
        Cursor::new(self.backend())
    }

    pub fn cursor_with_config(&self, config: CursorConfig) -> Cursor<InMemoryBackend> {
        Cursor::with_config(self.backend(), config)
    }

    /// Evaluate `query` against the current contents: filter, sort, skip,
    /// then limit.
    pub fn evaluate(&self, query: &QuerySpec) -> Vec<Item> {
        let items = self.items.read().expect("lock poisoned");
        let mut matched: Vec<Item> = match &query.filter {
            Some(filter) => items
                .iter()
                .filter(|item| (self.matcher)(filter, *item))
                .cloned()
                .collect(),
            None => items.clone(),
        };
        drop(items);

        if !query.sort.is_empty() {
            // Vec::sort_by is stable, so ties keep insertion order.
            matched.sort_by(|a, b| compare_by_keys(a, b, &query.sort));
        }

        let skip = usize::try_from(query.skip_count()).unwrap_or(usize::MAX);
        let limit = query
            .limit
            .map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));
        matched.into_iter().skip(skip).take(limit).collect()
    }
}

impl Default for InMemoryCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryCollection")
            .field("item_count", &self.len())
            .finish()
    }
}

/// [`Backend`] over an [`InMemoryCollection`].
///
/// The result set is materialized on the first `load` of a pass and then
/// served in pages of at most `size` items.
#[derive(Debug)]
pub struct InMemoryBackend {
    collection: InMemoryCollection,
    pending: Option<VecDeque<Item>>,
}

impl InMemoryBackend {
    pub fn collection(&self) -> &InMemoryCollection {
        &self.collection
    }
}

#[async_trait]
impl Backend for InMemoryBackend {
    async fn load(&mut self, query: &QuerySpec, size: usize) -> CursorResult<Page> {
        let collection = &self.collection;
        let pending = self.pending.get_or_insert_with(|| {
            let results = collection.evaluate(query);
            debug!(count = results.len(), "result set materialized");
            results.into()
        });

        let take = size.max(1).min(pending.len());
        let items: Vec<Item> = pending.drain(..take).collect();
        if pending.is_empty() {
            Ok(Page::last(items))
        } else {
            Ok(Page::more(items))
        }
    }

    async fn save(&mut self, item: &Item) -> CursorResult<()> {
        self.collection
            .items
            .write()
            .expect("lock poisoned")
            .push(item.clone());
        Ok(())
    }

    async fn remove_item(&mut self, item: &Item) -> CursorResult<()> {
        let matcher = Arc::clone(&self.collection.matcher);
        let mut items = self.collection.items.write().expect("lock poisoned");
        let before = items.len();
        items.retain(|stored| !matcher(item, stored));
        debug!(removed = before - items.len(), "items removed");
        Ok(())
    }

    fn rewind(&mut self) {
        self.pending = None;
    }
}

/// Default matcher: an object filter matches when every one of its fields
/// equals the item's field of the same name. Any other filter matches by
/// equality.
pub fn fields_match(filter: &Item, item: &Item) -> bool {
    match (filter, item) {
        (Value::Object(wanted), Value::Object(fields)) => wanted
            .iter()
            .all(|(key, value)| fields.get(key) == Some(value)),
        (Value::Object(wanted), _) => wanted.is_empty(),
        _ => filter == item,
    }
}

fn compare_by_keys(a: &Item, b: &Item, keys: &[SortKey]) -> Ordering {
    for sort_key in keys {
        let ord = compare_values(a.get(&sort_key.key), b.get(&sort_key.key));
        let ord = if sort_key.direction.is_descending() {
            ord.reverse()
        } else {
            ord
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Total order over optional JSON values:
/// missing < null < bool < number < string < array < object.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => compare_present(a, b),
    }
}

fn compare_present(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => {
                let x = x.as_f64().unwrap_or(f64::NAN);
                let y = y.as_f64().unwrap_or(f64::NAN);
                x.total_cmp(&y)
            }
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (x, y) in x.iter().zip(y.iter()) {
                let ord = compare_present(x, y);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        _ => rank(a).cmp(&rank(b)),
    }
}

fn rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}
