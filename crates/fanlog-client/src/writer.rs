//! Multi-stream writer facade.
//!
//! This module provides the public entry point for producing records. The
//! writer admits one record at a time, packs records into record sets under
//! a size and latency budget, and hands each sealed set to the speculative
//! dispatcher.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  write(..)  │ caller
//! └──────┬──────┘
//!        │
//!        ▼
//! ┌──────────────────────────────┐
//! │  open RecordSetBuffer        │ one facade mutex
//! │  - seal early if the record  │
//! │    would cross the set limit │
//! │  - seal when buffer_size is  │
//! │    reached                   │
//! └──────┬───────────────────────┘
//!        │ seal = move
//!        ▼
//! ┌──────────────────────────────┐      ┌─────────────────────────┐
//! │  PendingWrite                │ ──▶  │ speculative attempts on │
//! │  (one per sealed set)        │      │ the shuffled roster     │
//! └──────────────────────────────┘      └─────────────────────────┘
//! ```
//!
//! A periodic flush task seals whatever is buffered every
//! `flush_interval`, so low-traffic writers still meet the latency budget.
//! Sets race independently: per-stream order is preserved by the service,
//! but nothing orders two sets against each other, even when they were
//! sealed in order. Callers needing per-key order must route by key to a
//! writer of their own.
//!
//! ## Example
//!
//! ```ignore
//! use fanlog_client::{MultiStreamWriter, LogService};
//! use bytes::Bytes;
//! use std::sync::Arc;
//!
//! let writer = MultiStreamWriter::builder()
//!     .client(service)
//!     .streams(vec!["events-000".into(), "events-001".into()])
//!     .compression(Compression::Lz4)
//!     .build()?;
//!
//! let ack = writer.write(Bytes::from_static(b"payload")).await?;
//! let position = ack.wait().await?;
//! ```

use std::mem;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use fanlog_core::{Compression, MAX_RECORDSET_SIZE, MAX_RECORD_SIZE};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::buffer::{RecordSetBuffer, WriteAck};
use crate::clock::{Clock, SystemClock};
use crate::error::{ClientError, Result};
use crate::pending::PendingWrite;
use crate::roster::StreamRoster;
use crate::service::LogService;
use crate::speculative::SpeculativePolicy;

/// Write to multiple equivalent streams.
///
/// Thread-safe: share it behind an `Arc` and call [`write`](Self::write)
/// from any task. The wire client is injected and never owned; dispatched
/// record sets keep their own references and outlive the writer.
impl std::fmt::Debug for MultiStreamWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiStreamWriter").finish_non_exhaustive()
    }
}

pub struct MultiStreamWriter {
    inner: Arc<WriterInner>,
    flush_task: Option<tokio::task::JoinHandle<()>>,
}

struct WriterInner {
    cur: Mutex<RecordSetBuffer>,
    roster: Arc<StreamRoster>,
    client: Arc<dyn LogService>,
    clock: Arc<dyn Clock>,
    codec: Compression,
    buffer_size: usize,
    request_timeout: Duration,
    speculative: SpeculativePolicy,
}

impl WriterInner {
    fn new_buffer(&self) -> RecordSetBuffer {
        RecordSetBuffer::new(self.codec)
    }

    async fn write(&self, record: Bytes) -> Result<WriteAck> {
        if record.len() > MAX_RECORD_SIZE {
            return Err(ClientError::RecordTooLong {
                size: record.len(),
                max: MAX_RECORD_SIZE,
            });
        }

        let mut cur = self.cur.lock().await;

        // seal early rather than let the next record cross the set limit
        if cur.num_bytes() + record.len() > MAX_RECORDSET_SIZE {
            let stolen = mem::replace(&mut *cur, self.new_buffer());
            self.dispatch(stolen);
        }

        let ack = match cur.append(&record) {
            Ok(ack) => ack,
            Err(err @ ClientError::RecordTooLong { .. }) => return Err(err),
            Err(err) => {
                // the buffer can no longer vouch for its contents: fail
                // everything pending in it and start fresh
                let stolen = mem::replace(&mut *cur, self.new_buffer());
                stolen.abort(err.clone());
                return Err(err);
            }
        };

        if cur.num_bytes() >= self.buffer_size {
            let stolen = mem::replace(&mut *cur, self.new_buffer());
            self.dispatch(stolen);
        }

        Ok(ack)
    }

    async fn flush(&self) {
        let stolen = {
            let mut cur = self.cur.lock().await;
            if cur.num_records() == 0 {
                return;
            }
            mem::replace(&mut *cur, self.new_buffer())
        };
        self.dispatch(stolen);
    }

    fn dispatch(&self, buffer: RecordSetBuffer) {
        let set = match buffer.seal() {
            Ok(set) => set,
            Err(err) => {
                // seal already failed every record in the buffer
                warn!(error = %err, "sealing record set failed");
                return;
            }
        };
        debug!(records = set.num_records(), "dispatching record set");
        let pending = PendingWrite::new(
            set,
            Arc::clone(&self.roster),
            Arc::clone(&self.client),
            Arc::clone(&self.clock),
            self.request_timeout,
        );
        pending.dispatch(self.speculative);
    }
}

impl MultiStreamWriter {
    /// Start configuring a writer.
    pub fn builder() -> MultiStreamWriterBuilder {
        MultiStreamWriterBuilder::new()
    }

    /// Admit one record.
    ///
    /// Returns a [`WriteAck`] that resolves with the record's
    /// [`LogPosition`](fanlog_core::LogPosition) once the set it was packed
    /// into is acknowledged, or with the set's terminal error.
    ///
    /// # Errors
    ///
    /// - `RecordTooLong`: payload exceeds the record ceiling; nothing is
    ///   buffered
    /// - `Write`: framing rejected the append; the open buffer is aborted
    ///   and replaced, and every record pending in it fails with the cause
    pub async fn write(&self, record: Bytes) -> Result<WriteAck> {
        self.inner.write(record).await
    }

    /// Seal and dispatch whatever is buffered right now.
    pub async fn flush(&self) {
        self.inner.flush().await;
    }

    /// Shut the writer down.
    ///
    /// Stops the periodic flush task and drains the open buffer with one
    /// final flush. Record sets already dispatched keep racing on their own
    /// tasks and resolve their acks independently; `close` does not wait
    /// for them.
    pub async fn close(mut self) {
        if let Some(task) = self.flush_task.take() {
            task.abort();
        }
        self.inner.flush().await;
        debug!("writer closed");
    }
}

impl Drop for MultiStreamWriter {
    fn drop(&mut self) {
        // without this, the flush task would keep the inner state alive
        // forever when a writer is dropped without close()
        if let Some(task) = self.flush_task.take() {
            task.abort();
        }
    }
}

/// Fluent configuration for [`MultiStreamWriter`].
///
/// # Defaults
///
/// - `buffer_size`: 16 KiB (capped at the record set ceiling)
/// - `flush_interval`: 2000 µs; zero disables the periodic flush
/// - `compression`: none
/// - `request_timeout`: 500 ms
/// - speculative ladder: first 50 ms, max 200 ms, ×2
/// - `clock`: the process monotonic clock
///
/// `client` and a non-empty `streams` list are required.
pub struct MultiStreamWriterBuilder {
    client: Option<Arc<dyn LogService>>,
    streams: Vec<String>,
    buffer_size: usize,
    flush_interval: Duration,
    codec: Compression,
    request_timeout: Duration,
    speculative: SpeculativePolicy,
    clock: Arc<dyn Clock>,
}

impl MultiStreamWriterBuilder {
    fn new() -> Self {
        Self {
            client: None,
            streams: Vec::new(),
            buffer_size: 16 * 1024,
            flush_interval: Duration::from_micros(2000),
            codec: Compression::None,
            request_timeout: Duration::from_millis(500),
            speculative: SpeculativePolicy::default(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Wire client used to submit record sets. Required; not owned by the
    /// writer.
    pub fn client(mut self, client: Arc<dyn LogService>) -> Self {
        self.client = Some(client);
        self
    }

    /// Equivalent target streams. Required, non-empty; shuffled once into
    /// the dispatch roster.
    pub fn streams(mut self, streams: Vec<String>) -> Self {
        self.streams = streams;
        self
    }

    /// Payload bytes buffered before a set is sealed and dispatched.
    pub fn buffer_size(mut self, bytes: usize) -> Self {
        self.buffer_size = bytes;
        self
    }

    /// Periodic flush interval. Zero disables the flush task.
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Periodic flush interval in microseconds.
    pub fn flush_interval_micros(self, micros: u64) -> Self {
        self.flush_interval(Duration::from_micros(micros))
    }

    /// Periodic flush interval in milliseconds.
    pub fn flush_interval_ms(self, millis: u64) -> Self {
        self.flush_interval(Duration::from_millis(millis))
    }

    /// Codec for sealed record sets.
    pub fn compression(mut self, codec: Compression) -> Self {
        self.codec = codec;
        self
    }

    /// Hard per-set deadline. A record set that is neither acknowledged nor
    /// out of streams by then fails with a timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Gap before the first speculative attempt on another stream.
    pub fn first_speculative_timeout(mut self, timeout: Duration) -> Self {
        self.speculative.first = timeout;
        self
    }

    /// Ceiling on the gap between speculative attempts.
    pub fn max_speculative_timeout(mut self, timeout: Duration) -> Self {
        self.speculative.max = timeout;
        self
    }

    /// Growth factor for the speculative gap.
    pub fn speculative_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.speculative.multiplier = multiplier;
        self
    }

    /// Monotonic clock used for deadline arithmetic. Injectable for tests.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Validate the configuration and start the writer.
    ///
    /// Must be called within a tokio runtime; the periodic flush task (when
    /// enabled) is spawned here.
    ///
    /// # Errors
    ///
    /// `ClientError::Config` when the client is missing, the stream list is
    /// empty, the codec is unimplemented, or the speculative ladder does
    /// not satisfy `0 < first <= max < request_timeout` with a positive
    /// multiplier.
    pub fn build(self) -> Result<MultiStreamWriter> {
        let client = self
            .client
            .ok_or_else(|| ClientError::Config("no wire client provided".to_string()))?;
        if self.streams.is_empty() {
            return Err(ClientError::Config("no streams provided".to_string()));
        }
        if self.codec == Compression::Zstd {
            return Err(ClientError::Config(
                "Zstd compression not yet implemented".to_string(),
            ));
        }
        self.speculative.validate(self.request_timeout)?;

        let buffer_size = self.buffer_size.min(MAX_RECORDSET_SIZE);
        let inner = Arc::new(WriterInner {
            cur: Mutex::new(RecordSetBuffer::new(self.codec)),
            roster: Arc::new(StreamRoster::new(self.streams)),
            client,
            clock: self.clock,
            codec: self.codec,
            buffer_size,
            request_timeout: self.request_timeout,
            speculative: self.speculative,
        });

        let flush_task = if self.flush_interval.is_zero() {
            None
        } else {
            let flusher = Arc::clone(&inner);
            let interval = self.flush_interval;
            Some(tokio::spawn(async move {
                let mut tick = tokio::time::interval(interval);
                loop {
                    tick.tick().await;
                    flusher.flush().await;
                }
            }))
        };

        Ok(MultiStreamWriter { inner, flush_task })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullService;

    #[async_trait::async_trait]
    impl LogService for NullService {
        async fn write_record_set(
            &self,
            _stream: &str,
            _record_set: Bytes,
        ) -> Result<fanlog_core::LogPosition> {
            Err(ClientError::Stream("unreachable service".to_string()))
        }
    }

    fn base_builder() -> MultiStreamWriterBuilder {
        MultiStreamWriter::builder()
            .client(Arc::new(NullService))
            .streams(vec!["a".to_string(), "b".to_string()])
    }

    #[tokio::test]
    async fn test_build_with_defaults() {
        assert!(base_builder().build().is_ok());
    }

    #[tokio::test]
    async fn test_build_requires_client() {
        let err = MultiStreamWriter::builder()
            .streams(vec!["a".to_string()])
            .build()
            .unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
    }

    #[tokio::test]
    async fn test_build_requires_streams() {
        let err = MultiStreamWriter::builder()
            .client(Arc::new(NullService))
            .build()
            .unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
    }

    #[tokio::test]
    async fn test_build_rejects_zstd() {
        let err = base_builder()
            .compression(Compression::Zstd)
            .build()
            .unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
    }

    #[tokio::test]
    async fn test_build_rejects_first_above_max() {
        let err = base_builder()
            .first_speculative_timeout(Duration::from_millis(300))
            .max_speculative_timeout(Duration::from_millis(200))
            .build()
            .unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
    }

    #[tokio::test]
    async fn test_build_rejects_max_at_request_timeout() {
        let err = base_builder()
            .max_speculative_timeout(Duration::from_millis(500))
            .request_timeout(Duration::from_millis(500))
            .build()
            .unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
    }

    #[tokio::test]
    async fn test_build_rejects_zero_multiplier() {
        let err = base_builder()
            .speculative_backoff_multiplier(0.0)
            .build()
            .unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
    }

    #[tokio::test]
    async fn test_write_rejects_oversized_record_synchronously() {
        let writer = base_builder().flush_interval(Duration::ZERO).build().unwrap();
        let oversized = Bytes::from(vec![0u8; MAX_RECORD_SIZE + 1]);
        let err = writer.write(oversized).await.unwrap_err();
        assert!(matches!(err, ClientError::RecordTooLong { .. }));
        // the open buffer is untouched
        assert_eq!(writer.inner.cur.lock().await.num_records(), 0);
    }

    #[tokio::test]
    async fn test_buffer_size_is_capped_at_recordset_ceiling() {
        let writer = base_builder()
            .buffer_size(usize::MAX)
            .flush_interval(Duration::ZERO)
            .build()
            .unwrap();
        assert_eq!(writer.inner.buffer_size, MAX_RECORDSET_SIZE);
    }

    #[tokio::test]
    async fn test_small_writes_stay_buffered() {
        let writer = base_builder().flush_interval(Duration::ZERO).build().unwrap();
        let _a = writer.write(Bytes::from_static(b"hello")).await.unwrap();
        let _b = writer.write(Bytes::from_static(b"world")).await.unwrap();
        let cur = writer.inner.cur.lock().await;
        assert_eq!(cur.num_records(), 2);
        assert_eq!(cur.num_bytes(), 10);
    }

    #[tokio::test]
    async fn test_reaching_buffer_size_seals_the_set() {
        let writer = base_builder()
            .buffer_size(8)
            .flush_interval(Duration::ZERO)
            .build()
            .unwrap();
        let _a = writer.write(Bytes::from_static(b"aaaa")).await.unwrap();
        let _b = writer.write(Bytes::from_static(b"bbbb")).await.unwrap();
        // 8 bytes reached: sealed and handed off, fresh buffer in place
        assert_eq!(writer.inner.cur.lock().await.num_records(), 0);

        let _c = writer.write(Bytes::from_static(b"c")).await.unwrap();
        assert_eq!(writer.inner.cur.lock().await.num_records(), 1);
    }
}
