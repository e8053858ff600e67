//! Record Set Wire Format
//!
//! A record set is a batch of records shipped to the log service as one
//! framed, optionally compressed append. This module owns the frame layout:
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ magic      "FLRS"              4 bytes       │
//! │ version    u16                 2 bytes       │
//! │ codec      u16                 2 bytes       │
//! │ count      u32                 4 bytes       │
//! │ body_len   u32 (as written)    4 bytes       │
//! │ raw_len    u32 (uncompressed)  4 bytes       │
//! │ crc32      u32 (of body)       4 bytes       │
//! ├──────────────────────────────────────────────┤
//! │ body: per record                             │
//! │   varint(payload len) ++ payload             │
//! │ compressed as one block when codec != None   │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Compression
//! - **None**: body written as-is
//! - **LZ4**: `lz4_flex` block compression, size-prepended
//! - **Zstd**: reserved codec id, not yet implemented
//!
//! ## Size Ceilings
//! `MAX_RECORD_SIZE` and `MAX_RECORDSET_SIZE` leave 8 KiB of headroom under
//! 1 MiB for framing, so a maximal record set never crosses the service's
//! 1 MiB entry limit. Callers must not exceed them; the encoder enforces the
//! per-record ceiling itself.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};
use crate::varint;

/// Largest payload accepted for a single record.
pub const MAX_RECORD_SIZE: usize = 1024 * 1024 - 8 * 1024;

/// Largest payload volume packed into one record set.
pub const MAX_RECORDSET_SIZE: usize = 1024 * 1024 - 8 * 1024;

const RECORDSET_MAGIC: [u8; 4] = *b"FLRS";
const RECORDSET_VERSION: u16 = 1;
const HEADER_SIZE: usize = 24;

/// Compression codec for record set bodies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u16)]
pub enum Compression {
    #[default]
    None = 0,
    Lz4 = 1,
    Zstd = 2,
}

impl TryFrom<u16> for Compression {
    type Error = Error;

    fn try_from(value: u16) -> Result<Self> {
        match value {
            0 => Ok(Compression::None),
            1 => Ok(Compression::Lz4),
            2 => Ok(Compression::Zstd),
            _ => Err(Error::InvalidCompression(value)),
        }
    }
}

/// Incremental encoder for one record set.
///
/// Records are appended in order and framed into the body immediately;
/// `finish()` compresses the body (per the codec) and prepends the header.
///
/// # Example
/// ```ignore
/// let mut encoder = RecordSetEncoder::new(Compression::None);
/// encoder.append(b"hello")?;
/// let frame = encoder.finish()?;
/// ```
#[derive(Debug)]
pub struct RecordSetEncoder {
    codec: Compression,
    body: BytesMut,
    count: u32,
}

impl RecordSetEncoder {
    pub fn new(codec: Compression) -> Self {
        Self {
            codec,
            body: BytesMut::new(),
            count: 0,
        }
    }

    /// Frame one record payload into the body.
    ///
    /// Fails with `RecordTooLong` when the payload exceeds
    /// `MAX_RECORD_SIZE` and `TooManyRecords` when the record count would
    /// overflow the frame's u32. Neither failure mutates the body.
    pub fn append(&mut self, payload: &[u8]) -> Result<()> {
        if payload.len() > MAX_RECORD_SIZE {
            return Err(Error::RecordTooLong {
                size: payload.len(),
                max: MAX_RECORD_SIZE,
            });
        }
        if self.count == u32::MAX {
            return Err(Error::TooManyRecords);
        }

        varint::encode_u64(&mut self.body, payload.len() as u64);
        self.body.put_slice(payload);
        self.count += 1;
        Ok(())
    }

    /// Number of records framed so far.
    pub fn num_records(&self) -> u32 {
        self.count
    }

    /// Compress the body and produce the complete frame.
    pub fn finish(self) -> Result<Bytes> {
        let raw_len = self.body.len() as u32;

        let body = match self.codec {
            Compression::None => self.body.freeze(),
            Compression::Lz4 => Bytes::from(lz4_flex::compress_prepend_size(&self.body)),
            Compression::Zstd => {
                return Err(Error::Unsupported(
                    "Zstd compression not yet implemented".to_string(),
                ));
            }
        };

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&body);
        let crc = hasher.finalize();

        let mut frame = BytesMut::with_capacity(HEADER_SIZE + body.len());
        frame.put_slice(&RECORDSET_MAGIC);
        frame.put_u16(RECORDSET_VERSION);
        frame.put_u16(self.codec as u16);
        frame.put_u32(self.count);
        frame.put_u32(body.len() as u32);
        frame.put_u32(raw_len);
        frame.put_u32(crc);
        frame.put_slice(&body);
        Ok(frame.freeze())
    }
}

/// Decode a record set frame back into its ordered payloads.
///
/// Validates magic, version, codec, checksum and record boundaries before
/// returning anything.
pub fn decode_record_set(frame: &[u8]) -> Result<Vec<Bytes>> {
    let mut buf = frame;

    if buf.remaining() < HEADER_SIZE {
        return Err(Error::Truncated);
    }

    let mut magic = [0u8; 4];
    buf.copy_to_slice(&mut magic);
    if magic != RECORDSET_MAGIC {
        return Err(Error::InvalidMagic);
    }

    let version = buf.get_u16();
    if version != RECORDSET_VERSION {
        return Err(Error::UnsupportedVersion(version));
    }

    let codec = Compression::try_from(buf.get_u16())?;
    let count = buf.get_u32();
    let body_len = buf.get_u32() as usize;
    let raw_len = buf.get_u32() as usize;
    let crc = buf.get_u32();

    if buf.remaining() < body_len {
        return Err(Error::Truncated);
    }
    let body = &buf[..body_len];

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(body);
    if hasher.finalize() != crc {
        return Err(Error::CrcMismatch);
    }

    let raw: Bytes = match codec {
        Compression::None => Bytes::copy_from_slice(body),
        Compression::Lz4 => lz4_flex::decompress_size_prepended(body)
            .map_err(|e| Error::Decompression(e.to_string()))?
            .into(),
        Compression::Zstd => {
            return Err(Error::Unsupported(
                "Zstd compression not yet implemented".to_string(),
            ));
        }
    };

    if raw.len() != raw_len {
        return Err(Error::InvalidRecordSet(format!(
            "body declares {} uncompressed bytes but holds {}",
            raw_len,
            raw.len()
        )));
    }

    let mut cursor = raw;
    let mut records = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let len = varint::decode_u64(&mut cursor)? as usize;
        if cursor.remaining() < len {
            return Err(Error::Truncated);
        }
        records.push(cursor.copy_to_bytes(len));
    }

    if cursor.has_remaining() {
        return Err(Error::InvalidRecordSet(
            "trailing bytes after last record".to_string(),
        ));
    }

    Ok(records)
}
