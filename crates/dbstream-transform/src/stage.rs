//! Pass-through stages: a writable handle paired with an [`ObjectStream`].
//!
//! A stage lets items be pushed into the middle of a pipeline. It is backed
//! by a bounded channel, so a writer waits whenever the reading side has
//! fallen `capacity` items behind.

use dbstream_cursor::{CursorError, CursorResult};
use dbstream_types::Item;
use futures::stream::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use crate::stream::ObjectStream;

/// Configuration for a pass-through stage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageConfig {
    /// Items buffered between writer and reader before writes wait.
    pub capacity: usize,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self { capacity: 16 }
    }
}

/// Writable half of a stage. Clones feed the same stage; the stream ends
/// once every writer is dropped or ended.
#[derive(Clone, Debug)]
pub struct StageWriter {
    tx: mpsc::Sender<CursorResult<Item>>,
}

impl StageWriter {
    /// Push one item, waiting while the stage is full.
    pub async fn write(&self, item: impl Into<Item>) -> CursorResult<()> {
        self.tx
            .send(Ok(item.into()))
            .await
            .map_err(|_| CursorError::StageClosed)
    }

    /// Deliver an error to the reading side.
    pub async fn fail(&self, err: CursorError) -> CursorResult<()> {
        self.tx
            .send(Err(err))
            .await
            .map_err(|_| CursorError::StageClosed)
    }

    /// Drain `upstream` into this stage in order.
    ///
    /// An upstream error is handed to the reader, which observes it in
    /// place of further items, and forwarding stops there. Returns the
    /// number of items written.
    pub async fn forward<S>(&self, upstream: S) -> CursorResult<u64>
    where
        S: Stream<Item = CursorResult<Item>>,
    {
        let mut upstream = std::pin::pin!(upstream);
        let mut written = 0;
        while let Some(next) = upstream.next().await {
            match next {
                Ok(item) => {
                    self.write(item).await?;
                    written += 1;
                }
                Err(err) => {
                    debug!(%err, written, "forwarding upstream error");
                    self.fail(err).await?;
                    break;
                }
            }
        }
        Ok(written)
    }

    /// Close this writer.
    pub fn end(self) {}

    /// Returns `true` once the reading side is gone.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Create a stage with the default configuration.
pub fn stage() -> (StageWriter, ObjectStream<'static>) {
    stage_with_config(StageConfig::default())
}

/// Create a stage. A zero capacity is clamped to one.
pub fn stage_with_config(config: StageConfig) -> (StageWriter, ObjectStream<'static>) {
    let (tx, rx) = mpsc::channel(config.capacity.max(1));
    (
        StageWriter { tx },
        ObjectStream::new(ReceiverStream::new(rx)),
    )
}
