//! Slot codec and on-disk layout for flashring queue files.
//!
//! A queue file is a flat array of fixed-size slots with no header:
//!
//! ```text
//! [0 .. W+R)                 slot 0     = seq (W bytes, LE) || payload (R bytes)
//! [W+R .. 2(W+R))            slot 1
//! ...
//! [(S-1)(W+R) .. S(W+R))     slot S-1
//! ```
//!
//! `W` is the sequence width ([`SeqWidth`]), `R` the record size and `S` the
//! capacity. A seq of zero marks an inactive slot.

use serde::{Deserialize, Serialize};

use crate::record::Record;

/// Width of the per-slot sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeqWidth {
    /// Two-byte sequence numbers (the default, compatible with existing images).
    #[default]
    U16,
    /// Four-byte sequence numbers.
    U32,
}

impl SeqWidth {
    /// Number of bytes the seq field occupies.
    #[inline]
    pub const fn bytes(self) -> usize {
        match self {
            Self::U16 => 2,
            Self::U32 => 4,
        }
    }

    /// Largest seq value representable at this width.
    #[inline]
    pub const fn max(self) -> u32 {
        match self {
            Self::U16 => u16::MAX as u32,
            Self::U32 => u32::MAX,
        }
    }

    /// Writes `seq` into the first [`SeqWidth::bytes`] bytes of `buf`.
    #[inline]
    #[allow(clippy::cast_possible_truncation)] // seq is bounded by max() for U16
    pub fn encode(self, seq: u32, buf: &mut [u8]) {
        match self {
            Self::U16 => buf[..2].copy_from_slice(&(seq as u16).to_le_bytes()),
            Self::U32 => buf[..4].copy_from_slice(&seq.to_le_bytes()),
        }
    }

    /// Reads a seq from the first [`SeqWidth::bytes`] bytes of `buf`.
    #[inline]
    pub fn decode(self, buf: &[u8]) -> u32 {
        match self {
            Self::U16 => u32::from(u16::from_le_bytes([buf[0], buf[1]])),
            Self::U32 => u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
        }
    }
}

impl std::fmt::Display for SeqWidth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::U16 => f.write_str("u16"),
            Self::U32 => f.write_str("u32"),
        }
    }
}

/// Pre-computed sizes and offsets for a queue file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SlotLayout {
    /// Number of slots in the file.
    capacity: u32,
    /// Size of the record payload in bytes.
    record_size: usize,
    /// Width of the seq field.
    seq_width: SeqWidth,
    /// Size of one slot (seq + payload).
    slot_size: usize,
    /// Total file size in bytes.
    file_size: u64,
}

impl SlotLayout {
    /// Computes the layout for `capacity` slots of `record_size`-byte records.
    pub fn new(capacity: u32, record_size: usize, seq_width: SeqWidth) -> Self {
        let slot_size = seq_width.bytes() + record_size;
        let file_size = u64::from(capacity) * slot_size as u64;

        Self {
            capacity,
            record_size,
            seq_width,
            slot_size,
            file_size,
        }
    }

    /// Computes the layout for records of type `T`.
    pub fn for_record<T: Record>(capacity: u32, seq_width: SeqWidth) -> Self {
        Self::new(capacity, T::SIZE, seq_width)
    }

    /// Number of slots.
    #[inline]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Payload size in bytes.
    #[inline]
    pub fn record_size(&self) -> usize {
        self.record_size
    }

    /// Sequence field width.
    #[inline]
    pub fn seq_width(&self) -> SeqWidth {
        self.seq_width
    }

    /// Size of one slot in bytes.
    #[inline]
    pub fn slot_size(&self) -> usize {
        self.slot_size
    }

    /// Size of the whole file in bytes.
    #[inline]
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Byte offset of physical slot `index`.
    #[inline]
    pub fn offset(&self, index: u32) -> u64 {
        u64::from(index) * self.slot_size as u64
    }

    /// Byte offset of the slot following the one at `offset`, wrapping to the
    /// start of the file past the last slot.
    #[inline]
    pub fn next_offset(&self, offset: u64) -> u64 {
        self.wrap(offset + self.slot_size as u64)
    }

    /// Byte offset of the slot `slots` positions after the one at `offset`,
    /// wrapping around the end of the file.
    #[inline]
    pub fn advance(&self, offset: u64, slots: u32) -> u64 {
        let slot_size = self.slot_size as u64;
        let index = (offset / slot_size + u64::from(slots)) % u64::from(self.capacity);
        index * slot_size
    }

    /// Maps an offset at or past the end of the file back to zero.
    #[inline]
    pub fn wrap(&self, offset: u64) -> u64 {
        if offset >= self.file_size { 0 } else { offset }
    }

    /// Physical slot index of the slot starting at `offset`.
    #[inline]
    #[allow(clippy::cast_possible_truncation)] // offsets are < file_size, so the index is < capacity
    pub fn slot_index(&self, offset: u64) -> u32 {
        (offset / self.slot_size as u64) as u32
    }

    /// Encodes a full slot into `buf`, which must be [`SlotLayout::slot_size`] bytes.
    pub fn encode_slot<T: Record>(&self, seq: u32, record: &T, buf: &mut [u8]) {
        let seq_bytes = self.seq_width.bytes();
        self.seq_width.encode(seq, &mut buf[..seq_bytes]);
        record.encode(&mut buf[seq_bytes..self.slot_size]);
    }

    /// Reads the seq field from the start of a slot buffer.
    #[inline]
    pub fn decode_seq(&self, buf: &[u8]) -> u32 {
        self.seq_width.decode(buf)
    }

    /// Decodes the payload of a slot buffer.
    #[inline]
    pub fn decode_payload<T: Record>(&self, buf: &[u8]) -> T {
        T::decode(&buf[self.seq_width.bytes()..self.slot_size])
    }

    /// Encodes an inactive, zero-filled slot into `buf`.
    pub fn encode_empty(&self, buf: &mut [u8]) {
        buf[..self.slot_size].fill(0);
    }
}
