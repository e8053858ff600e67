//! Variable-length Integer Encoding
//!
//! Record payloads inside a record set are framed as `varint(len) ++ bytes`.
//! Varints spend only as many bytes as the value needs: lengths up to 127 take
//! one byte, and each further byte carries 7 more bits plus a continuation
//! flag. Small records are the common case, so this keeps per-record framing
//! overhead at a single byte most of the time.
//!
//! Decoding runs on wire input, so it returns `Result` rather than assuming
//! well-formed bytes.

use bytes::{Buf, BufMut};

use crate::error::{Error, Result};

/// Encode an unsigned integer as a varint.
pub fn encode_u64(buf: &mut impl BufMut, mut value: u64) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;

        if value != 0 {
            byte |= 0x80; // continuation bit
        }

        buf.put_u8(byte);

        if value == 0 {
            break;
        }
    }
}

/// Decode a varint into an unsigned integer.
///
/// Fails with `Truncated` if the input ends mid-varint and `VarintOverflow`
/// if the encoding claims more than 64 bits.
pub fn decode_u64(buf: &mut impl Buf) -> Result<u64> {
    let mut value: u64 = 0;
    let mut shift = 0;

    loop {
        if !buf.has_remaining() {
            return Err(Error::Truncated);
        }

        let byte = buf.get_u8();
        value |= ((byte & 0x7F) as u64) << shift;

        if (byte & 0x80) == 0 {
            return Ok(value);
        }

        shift += 7;

        if shift >= 64 {
            return Err(Error::VarintOverflow);
        }
    }
}
