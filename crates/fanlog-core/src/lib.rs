//! Fanlog Core - Record Set Wire Format
//!
//! This crate defines the data types shared between the fanlog client and any
//! service-side consumer of record sets:
//!
//! - [`LogPosition`]: the (segment, entry, slot) coordinate naming a committed
//!   record in the log
//! - [`RecordSetEncoder`] / [`decode_record_set`]: the framed, optionally
//!   compressed wire format used to ship a batch of records as one append
//! - [`Compression`]: codec selection for record set bodies
//!
//! The crate has no async surface and no client dependencies; everything that
//! schedules, retries or batches lives in `fanlog-client`.
//!
//! ## Example
//! ```ignore
//! use fanlog_core::{Compression, RecordSetEncoder, decode_record_set};
//!
//! let mut encoder = RecordSetEncoder::new(Compression::Lz4);
//! encoder.append(b"hello")?;
//! encoder.append(b"world")?;
//! let frame = encoder.finish()?;
//!
//! let records = decode_record_set(&frame)?;
//! assert_eq!(records.len(), 2);
//! ```

pub mod error;
pub mod position;
pub mod recordset;
pub mod varint;

pub use error::{Error, Result};
pub use position::LogPosition;
pub use recordset::{
    decode_record_set, Compression, RecordSetEncoder, MAX_RECORDSET_SIZE, MAX_RECORD_SIZE,
};
