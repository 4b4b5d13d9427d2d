use serde::{Deserialize, Serialize};

use crate::error::QueryError;
use crate::item::Item;

/// Direction of one sort key. Serialized in its signed form (`1` / `-1`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    /// The signed form: `1` ascending, `-1` descending.
    pub const fn as_i8(self) -> i8 {
        match self {
            Self::Ascending => 1,
            Self::Descending => -1,
        }
    }

    /// Returns `true` for [`SortDirection::Descending`].
    pub const fn is_descending(self) -> bool {
        matches!(self, Self::Descending)
    }
}

impl TryFrom<i64> for SortDirection {
    type Error = QueryError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Ascending),
            -1 => Ok(Self::Descending),
            other => Err(QueryError::InvalidDirection(other)),
        }
    }
}

impl From<SortDirection> for i64 {
    fn from(direction: SortDirection) -> Self {
        i64::from(direction.as_i8())
    }
}

/// One entry of the sort priority list.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortKey {
    pub key: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn new(key: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            key: key.into(),
            direction,
        }
    }

    pub fn ascending(key: impl Into<String>) -> Self {
        Self::new(key, SortDirection::Ascending)
    }

    pub fn descending(key: impl Into<String>) -> Self {
        Self::new(key, SortDirection::Descending)
    }
}

/// Deferred description of what a read pass should return.
///
/// The filter is opaque: it is handed verbatim to the backend, which alone
/// decides what it means. `sort` is a priority list (first key wins), built
/// by appending. A spec without a filter describes no query at all, and a
/// cursor holding one yields nothing.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Item>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<SortKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
}

impl QuerySpec {
    /// An empty spec (no filter attached).
    pub fn new() -> Self {
        Self::default()
    }

    /// A spec with the given filter attached.
    pub fn with_filter(filter: impl Into<Item>) -> Self {
        Self {
            filter: Some(filter.into()),
            ..Self::default()
        }
    }

    /// Replace the filter. Last write wins.
    pub fn set_filter(&mut self, filter: impl Into<Item>) {
        self.filter = Some(filter.into());
    }

    /// Append a key to the sort priority list.
    pub fn push_sort(&mut self, key: impl Into<String>, direction: SortDirection) {
        self.sort.push(SortKey::new(key, direction));
    }

    /// Returns `true` when a non-null filter is attached.
    pub fn is_queried(&self) -> bool {
        self.filter.as_ref().is_some_and(|f| !f.is_null())
    }

    /// Number of leading results to omit (absent means 0).
    pub fn skip_count(&self) -> u64 {
        self.skip.unwrap_or(0)
    }
}
