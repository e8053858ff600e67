//! Error types for writer operations.
//!
//! ## Error Handling Strategy
//!
//! Errors split along the dispatch hierarchy:
//!
//! - **Per-record**: `RecordTooLong` fails only the offending `write()` call;
//!   nothing is buffered or retried.
//! - **Per-buffer**: `Write` (framing) aborts the current open buffer; every
//!   record pending in it fails with the same cause and a fresh buffer takes
//!   its place.
//! - **Per-attempt**: `Stream` covers any single wire attempt failure. It is
//!   never surfaced to callers; the dispatcher answers it by speculating on
//!   the next stream.
//! - **Per-set**: `Timeout` is the terminal verdict once every stream was
//!   tried or the hard deadline elapsed; it fans out to every record packed
//!   in the set.
//! - **Construction**: `Config` is raised by the builder, never at runtime.
//!
//! The enum is `Clone` because one terminal cause is delivered to many
//! per-record completions.

use std::time::Duration;

use thiserror::Error;

/// Convenience alias used throughout the client.
pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// Payload exceeds the framed record ceiling. Never retried, never
    /// buffered.
    #[error("record of {size} bytes exceeds the {max} byte limit")]
    RecordTooLong { size: usize, max: usize },

    /// The record-set framer rejected an append or a seal. The open buffer
    /// is aborted and every record pending in it receives this cause.
    #[error("record set write failed: {0}")]
    Write(String),

    /// A single wire attempt failed (transport error, per-request timeout
    /// from the wire client, service rejection). Swallowed by the
    /// dispatcher, which immediately tries the next stream.
    #[error("stream write failed: {0}")]
    Stream(String),

    /// The record set ran out of road: every stream was tried, or the hard
    /// per-set deadline elapsed first.
    #[error("record set timed out after {elapsed:?} ({attempts} streams tried)")]
    Timeout { elapsed: Duration, attempts: usize },

    /// Invalid build parameters.
    #[error("configuration error: {0}")]
    Config(String),

    /// The writer went away before this record was handed to the wire. Seen
    /// when a writer is dropped with records still in its open buffer.
    #[error("writer closed before the record was transmitted")]
    Closed,
}

impl From<fanlog_core::Error> for ClientError {
    fn from(err: fanlog_core::Error) -> Self {
        match err {
            fanlog_core::Error::RecordTooLong { size, max } => {
                ClientError::RecordTooLong { size, max }
            }
            other => ClientError::Write(other.to_string()),
        }
    }
}
