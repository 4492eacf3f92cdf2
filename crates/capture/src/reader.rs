use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{OpenError, ReadFailure};
use crate::source::StreamSource;

/// Opens live connections against a [`StreamSource`].
///
/// Implementations must buffer at most one frame internally so that an
/// emitted frame is never more than one read cycle stale.
#[async_trait]
pub trait StreamReader: Send + Sync {
    async fn open(&self, source: &StreamSource) -> Result<Box<dyn FrameHandle>, OpenError>;
}

/// A live connection yielding raw frames.
///
/// Owned exclusively by whichever capture loop currently holds it; the
/// engine guarantees at most one open handle per instance and releases
/// it through a single teardown path before opening another.
#[async_trait]
pub trait FrameHandle: Send {
    async fn read(&mut self) -> Result<Bytes, ReadFailure>;

    /// Close the underlying connection and free retained buffers.
    /// Must be idempotent.
    async fn close(&mut self);
}
