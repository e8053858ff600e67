//! Log Positions
//!
//! This module defines [`LogPosition`] - the coordinate naming a committed
//! record in the log.
//!
//! ## Structure
//! A position is a triple:
//! - **segment_seq**: sequence number of the log segment holding the record
//! - **entry_id**: id of the entry (one batched append) within the segment
//! - **slot_id**: slot of the record within the entry
//!
//! The service acknowledges a record set with the position of its first slot;
//! the client derives each record's own position by offsetting the slot.
//!
//! ## Ordering
//! Positions order lexicographically over (segment, entry, slot), so two
//! positions from the same stream compare the way the log is laid out.
//! Comparing positions from different streams is meaningless; the writer
//! offers no cross-stream ordering.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Coordinate of a single committed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LogPosition {
    /// Sequence number of the log segment
    pub segment_seq: i64,

    /// Entry id within the segment
    pub entry_id: i64,

    /// Slot within the entry
    pub slot_id: i32,
}

impl LogPosition {
    pub fn new(segment_seq: i64, entry_id: i64, slot_id: i32) -> Self {
        Self {
            segment_seq,
            entry_id,
            slot_id,
        }
    }

    /// Position of the slot `offset` places after this one, within the same
    /// entry. Used to fan a record set acknowledgement out to the individual
    /// records packed in the set.
    pub fn with_slot_offset(&self, offset: i32) -> Self {
        Self {
            segment_seq: self.segment_seq,
            entry_id: self.entry_id,
            slot_id: self.slot_id + offset,
        }
    }
}

impl fmt::Display for LogPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.segment_seq, self.entry_id, self.slot_id)
    }
}
