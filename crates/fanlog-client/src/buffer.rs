//! Record set buffering and per-record completion fanout.
//!
//! Records admitted by the writer accumulate in a [`RecordSetBuffer`]
//! together with one completion sender per record. Sealing is a move:
//!
//! ```text
//! ┌───────────────────┐   seal()    ┌──────────────────┐
//! │ RecordSetBuffer   │ ──────────▶ │ SealedRecordSet  │
//! │  append()         │             │  payload()       │
//! │  num_bytes()      │             │  complete(pos)   │
//! │  num_records()    │             │  abort(cause)    │
//! │  abort(cause)     │             └──────────────────┘
//! └───────────────────┘
//! ```
//!
//! Once sealed, the set is append-immutable by construction, and exactly one
//! of `complete` / `abort` can ever run because both consume the set. Each
//! record's completion is a oneshot channel: single-assignment, resolved
//! exactly once, with the receiver handed back to the caller as a
//! [`WriteAck`].
//!
//! ## Size accounting
//!
//! `num_bytes()` counts record payload bytes. Framing overhead and
//! compression are applied at seal time and do not move the size gate; the
//! gate's job is to keep sealed sets under the record-set ceiling, which the
//! payload count plus the ceiling's built-in framing headroom guarantees.

use bytes::Bytes;
use fanlog_core::{Compression, LogPosition, RecordSetEncoder, MAX_RECORD_SIZE};
use tokio::sync::oneshot;
use tracing::trace;

use crate::error::{ClientError, Result};

type Completion = oneshot::Sender<Result<LogPosition>>;

/// Caller-side handle for one record's outcome.
///
/// Resolves exactly once: with the record's [`LogPosition`] when the set it
/// was packed into is acknowledged, or with the set's terminal error. If the
/// writer goes away before the record is handed to the wire, the ack
/// resolves with [`ClientError::Closed`].
#[derive(Debug)]
pub struct WriteAck {
    rx: oneshot::Receiver<Result<LogPosition>>,
}

impl WriteAck {
    /// Wait for the record's outcome.
    pub async fn wait(self) -> Result<LogPosition> {
        match self.rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(ClientError::Closed),
        }
    }
}

/// Open, appendable record set.
#[derive(Debug)]
pub struct RecordSetBuffer {
    encoder: RecordSetEncoder,
    completions: Vec<Completion>,
    num_bytes: usize,
}

impl RecordSetBuffer {
    pub fn new(codec: Compression) -> Self {
        Self {
            encoder: RecordSetEncoder::new(codec),
            completions: Vec::new(),
            num_bytes: 0,
        }
    }

    /// Payload bytes buffered so far.
    pub fn num_bytes(&self) -> usize {
        self.num_bytes
    }

    /// Records buffered so far.
    pub fn num_records(&self) -> usize {
        self.completions.len()
    }

    /// Frame one record and register its completion.
    ///
    /// On `RecordTooLong` the buffer is untouched and only this record
    /// fails. Any other framing failure means the buffer can no longer
    /// vouch for its contents; the caller aborts and replaces it.
    pub fn append(&mut self, payload: &[u8]) -> Result<WriteAck> {
        if payload.len() > MAX_RECORD_SIZE {
            return Err(ClientError::RecordTooLong {
                size: payload.len(),
                max: MAX_RECORD_SIZE,
            });
        }

        self.encoder.append(payload)?;

        let (tx, rx) = oneshot::channel();
        self.completions.push(tx);
        self.num_bytes += payload.len();
        trace!(
            records = self.completions.len(),
            bytes = self.num_bytes,
            "buffered record"
        );
        Ok(WriteAck { rx })
    }

    /// Freeze the buffer into its framed wire payload.
    ///
    /// If framing the set fails, every buffered record is failed with the
    /// cause before the error is returned; there is nothing left to seal.
    pub fn seal(self) -> Result<SealedRecordSet> {
        let num_records = self.completions.len();
        match self.encoder.finish() {
            Ok(payload) => Ok(SealedRecordSet {
                payload,
                completions: self.completions,
            }),
            Err(err) => {
                let cause = ClientError::from(err);
                for tx in self.completions {
                    let _ = tx.send(Err(cause.clone()));
                }
                trace!(records = num_records, "record set seal failed");
                Err(cause)
            }
        }
    }

    /// Fail every buffered record with `cause` and discard the buffer.
    pub fn abort(self, cause: ClientError) {
        for tx in self.completions {
            let _ = tx.send(Err(cause.clone()));
        }
    }
}

/// Sealed, append-immutable record set awaiting transmission.
#[derive(Debug)]
pub struct SealedRecordSet {
    payload: Bytes,
    completions: Vec<Completion>,
}

impl SealedRecordSet {
    /// The framed wire payload. Cheap to clone per attempt.
    pub fn payload(&self) -> Bytes {
        self.payload.clone()
    }

    pub fn num_records(&self) -> usize {
        self.completions.len()
    }

    /// Fan the set's acknowledgement out to every record: slot `i` of the
    /// set resolves with `base.with_slot_offset(i)`, in append order.
    pub fn complete(self, base: LogPosition) {
        for (i, tx) in self.completions.into_iter().enumerate() {
            let _ = tx.send(Ok(base.with_slot_offset(i as i32)));
        }
    }

    /// Fail every record in the set with the terminal `cause`.
    pub fn abort(self, cause: ClientError) {
        for tx in self.completions.into_iter() {
            let _ = tx.send(Err(cause.clone()));
        }
    }
}
