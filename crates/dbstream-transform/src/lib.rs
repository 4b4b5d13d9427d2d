//! Chainable object-stream combinators for dbstream.
//!
//! [`ObjectStream`] is a pipeline stage over items: `filter`, `map`,
//! `reduce`, `each` / `for_each`, and `to_array` each link a new stage
//! downstream of the current one. [`stage`] creates a pass-through stage
//! that can be written into mid-pipeline, and [`CursorStreamExt`] puts the
//! same combinators on any [`Cursor`](dbstream_cursor::Cursor), so a
//! backend-backed cursor works as the head of a pipeline.
//!
//! Stages are pull driven: nothing is read from a cursor until the end of
//! the pipeline asks for it, and `reduce` waits for its whole upstream
//! before emitting anything.

pub mod ext;
pub mod stage;
pub mod stream;

pub use ext::CursorStreamExt;
pub use stage::{stage, stage_with_config, StageConfig, StageWriter};
pub use stream::ObjectStream;
