//! Recovery scan: rebuilding queue state from the on-disk image.
//!
//! Queue files have no header, so after a restart the head, tail, count, and
//! last-used seq are rediscovered by reading every slot once in physical order.
//!
//! # Algorithm
//!
//! Active seqs increase strictly from the tail (smallest seq) to the head
//! (largest seq), wrapping around the end of the file at most once. Reading
//! the slots from offset 0, the raw seq values (zeros included) therefore drop
//! at most once: either where the newest records give way to inactive slots or
//! older records, or where the active run ends. A second drop cannot come from
//! any sequence of pushes and pops and is reported as corruption, together with
//! the offset of the slot where it was seen.
//!
//! Torn writes that leave a garbled but still monotone seq are not detected.

use std::io::{Read, Seek, SeekFrom};

use serde::Serialize;
use tracing::{debug, error, trace};

use crate::error::{Result, StorageError};
use crate::slot::SlotLayout;

/// In-memory position of an open queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct QueueState {
    /// Number of active records.
    pub count: u32,
    /// Byte offset of the newest record's slot.
    pub head: u64,
    /// Byte offset of the oldest record's slot.
    pub tail: u64,
    /// Highest seq in use; the next push writes `next_seq + 1`.
    pub next_seq: u32,
}

/// Result of scanning a queue file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The image is consistent; the queue resumes from this state.
    Clean(QueueState),
    /// A second falling edge was found in the slot starting at `offset`.
    Corrupted {
        /// Byte offset of the offending slot.
        offset: u64,
    },
}

/// Scans all slots of `file` and reconstructs the queue state.
///
/// `path` is only used for error reporting. The file must be at least
/// [`SlotLayout::file_size`] bytes long.
///
/// # Errors
///
/// Returns [`StorageError::Read`] if a slot cannot be read.
pub fn scan<F: Read + Seek>(file: &mut F, layout: &SlotLayout, path: &str) -> Result<ScanOutcome> {
    let mut state = QueueState::default();
    let mut tail_seq = 0u32;
    let mut prev_seq = 0u32;
    let mut falling_edges = 0u8;

    let mut buf = vec![0u8; layout.slot_size()];

    file.seek(SeekFrom::Start(0)).map_err(|e| StorageError::Read {
        path: path.to_string(),
        offset: 0,
        source: e,
    })?;

    for index in 0..layout.capacity() {
        let offset = layout.offset(index);
        file.read_exact(&mut buf).map_err(|e| StorageError::Read {
            path: path.to_string(),
            offset,
            source: e,
        })?;
        let seq = layout.decode_seq(&buf);

        if prev_seq > seq {
            falling_edges += 1;
            if falling_edges > 1 {
                error!(path, offset, prev_seq, seq, "second falling seq edge, queue file corrupted");
                return Ok(ScanOutcome::Corrupted { offset });
            }
        }

        if seq > state.next_seq {
            // Newer than anything seen so far
            state.head = offset;
            state.next_seq = seq;
            state.count += 1;
            if tail_seq == 0 {
                state.tail = offset;
                tail_seq = seq;
            }
        } else if seq > 0 {
            state.count += 1;
            if seq < tail_seq {
                state.tail = offset;
                tail_seq = seq;
            }
        }

        trace!(offset, seq, "scanned slot");
        prev_seq = seq;
    }

    debug!(
        path,
        count = state.count,
        head = state.head,
        tail = state.tail,
        next_seq = state.next_seq,
        "recovered queue state"
    );

    Ok(ScanOutcome::Clean(state))
}
