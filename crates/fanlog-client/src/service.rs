//! Wire client contract.
//!
//! The writer does not speak any particular protocol itself; it is handed an
//! implementation of [`LogService`] and treats it as the wire. The trait is
//! consumed as `Arc<dyn LogService>`: the writer neither owns nor closes the
//! underlying client, and in-flight attempts keep their own references, so a
//! dispatched record set outlives the writer that sealed it.

use async_trait::async_trait;
use bytes::Bytes;
use fanlog_core::LogPosition;

use crate::error::Result;

/// One remote append surface over N equivalent streams.
#[async_trait]
pub trait LogService: Send + Sync {
    /// Append a framed record set to the named stream.
    ///
    /// Resolves with the position of the set's first slot; any failure
    /// (transport, per-request timeout, service rejection) is a
    /// [`ClientError::Stream`](crate::ClientError::Stream) and is treated by
    /// the dispatcher as a signal to try another stream.
    async fn write_record_set(&self, stream: &str, record_set: Bytes) -> Result<LogPosition>;
}
