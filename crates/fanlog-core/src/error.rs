//! Error Types for the Record Set Wire Format
//!
//! This module defines all error conditions that can occur while encoding or
//! decoding record sets.
//!
//! ## Error Categories
//!
//! ### Encoding Errors
//! - `RecordTooLong`: a single record exceeds the framed record ceiling
//! - `TooManyRecords`: the record count would overflow the frame's u32
//!
//! ### Data Integrity Errors
//! - `InvalidMagic`: frame doesn't start with the expected magic bytes ("FLRS")
//! - `CrcMismatch`: corruption detected via checksum
//! - `Truncated`: frame ends before the declared body/record boundary
//! - `InvalidRecordSet`: malformed frame contents
//!
//! ### Version/Compatibility Errors
//! - `UnsupportedVersion`: frame was written by a newer format revision
//! - `InvalidCompression`: unknown compression type id
//!
//! ### Compression Errors
//! - `Decompression`: failed to decompress a body (likely corruption)
//! - `Unsupported`: codec is reserved but not yet implemented (Zstd)
//!
//! All functions in this crate return `Result<T>`, aliased to
//! `Result<T, Error>`, so `?` propagation composes across the format layer.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("record of {size} bytes exceeds the {max} byte record limit")]
    RecordTooLong { size: usize, max: usize },

    #[error("record set already holds the maximum number of records")]
    TooManyRecords,

    #[error("invalid magic bytes")]
    InvalidMagic,

    #[error("unsupported record set version: {0}")]
    UnsupportedVersion(u16),

    #[error("invalid compression type: {0}")]
    InvalidCompression(u16),

    #[error("CRC mismatch")]
    CrcMismatch,

    #[error("record set truncated")]
    Truncated,

    #[error("varint exceeds 64 bits")]
    VarintOverflow,

    #[error("decompression failed: {0}")]
    Decompression(String),

    #[error("invalid record set: {0}")]
    InvalidRecordSet(String),

    #[error("unsupported: {0}")]
    Unsupported(String),
}
