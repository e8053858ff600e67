//! Fanlog Client - Multi-Stream Writer
//!
//! This crate provides the client-side writer for a fanlog deployment: a
//! batching, speculatively-retrying producer that fronts N equivalent
//! append-only streams.
//!
//! ## How a record travels
//!
//! 1. [`MultiStreamWriter::write`] admits the record into the open record
//!    set buffer and returns a [`WriteAck`].
//! 2. When the buffer reaches its size budget, or the periodic flush tick
//!    fires, the set is sealed (framed, optionally LZ4-compressed) and
//!    handed to a dispatcher.
//! 3. The dispatcher races the set across the shuffled stream roster:
//!    attempt one stream, then speculatively add parallel attempts on an
//!    exponential tick ladder, until the first acknowledgement wins or the
//!    hard deadline gives up.
//! 4. The winning acknowledgement names the set's base position; every
//!    record's ack resolves with its own slot in append order.
//!
//! Per-stream order is preserved by the service. Nothing orders records
//! across streams or across record sets; callers needing per-key order
//! must route by key externally.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use bytes::Bytes;
//! use fanlog_client::MultiStreamWriter;
//! use fanlog_core::Compression;
//!
//! let writer = MultiStreamWriter::builder()
//!     .client(service)                       // Arc<dyn LogService>
//!     .streams(vec!["events-000".into(), "events-001".into()])
//!     .compression(Compression::Lz4)
//!     .build()?;
//!
//! let ack = writer.write(Bytes::from_static(b"payload")).await?;
//! println!("committed at {}", ack.wait().await?);
//! ```

pub mod buffer;
pub mod clock;
pub mod error;
pub mod roster;
pub mod service;
pub mod speculative;
pub mod writer;

mod pending;

pub use buffer::{RecordSetBuffer, SealedRecordSet, WriteAck};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ClientError, Result};
pub use roster::StreamRoster;
pub use service::LogService;
pub use speculative::SpeculativePolicy;
pub use writer::{MultiStreamWriter, MultiStreamWriterBuilder};

pub use fanlog_core::{Compression, LogPosition};
