use serde::{Deserialize, Serialize};

/// Configuration for a [`Cursor`](crate::Cursor).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorConfig {
    /// Advisory number of items requested from the backend per page.
    /// Backends may return more or fewer.
    pub page_size: usize,
}

impl Default for CursorConfig {
    fn default() -> Self {
        Self { page_size: 16 }
    }
}

impl CursorConfig {
    /// Set the page size hint. Zero is clamped to one.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// The page size hint actually passed to the backend.
    pub fn effective_page_size(&self) -> usize {
        self.page_size.max(1)
    }
}
