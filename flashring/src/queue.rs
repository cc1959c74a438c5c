//! The persistent circular queue.
//!
//! [`Queue`] ties the slot layout, the storage adapter, and the recovery scan
//! together. Its only durable state is the queue file itself: head, tail, and
//! count live in memory and are rebuilt by [`recovery::scan`] on every open.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use flashring::{OpenFlags, Queue, QueueConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut queue: Queue<i32> = Queue::new(QueueConfig::new(5)?)?;
//! queue.open("buffer.bin", OpenFlags::default().reset(true))?;
//!
//! for value in 1..=6 {
//!     queue.push(value)?; // the sixth push overwrites 1
//! }
//! assert_eq!(queue.pop()?, 2);
//!
//! queue.close()?;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::io::{Read, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::path::Path;

use tracing::{debug, error, info, trace, warn};

use crate::config::{OpenFlags, QueueConfig};
use crate::error::{ConfigError, CorruptionError, Result, StorageError, UsageError};
use crate::record::Record;
use crate::recovery::{self, QueueState, ScanOutcome};
use crate::slot::SlotLayout;
use crate::storage::{FileSystem, OpenMode, StdFs, StorageFile};

/// A bounded FIFO of fixed-size records persisted in a single file.
///
/// A queue is created closed; [`Queue::open`] binds it to a file and recovers
/// its state, [`Queue::close`] releases the file. Every mutating operation
/// writes through to the file and syncs it before returning.
///
/// # Thread Safety
///
/// All operations take `&mut self`. A queue is meant to be driven by one
/// thread, and one file must not be opened by two queues at once.
pub struct Queue<T, F: FileSystem = StdFs> {
    /// Filesystem hosting the queue file.
    fs: F,
    /// Slot layout derived from the configuration and `T::SIZE`.
    layout: SlotLayout,
    /// Open file handle; `None` while closed.
    file: Option<F::File>,
    /// Path of the queue file (for error reporting).
    path: String,
    /// Recovered and maintained position.
    state: QueueState,
    /// Whether a push into a full queue overwrites the oldest record.
    circular: bool,
    /// One slot's worth of bytes, reused by every read and write.
    scratch: Vec<u8>,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> Queue<T, StdFs> {
    /// Creates a closed queue on the host filesystem.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration is invalid or `T` is
    /// zero-sized.
    pub fn new(config: QueueConfig) -> Result<Self> {
        Self::with_fs(StdFs, config)
    }
}

impl<T: Record, F: FileSystem> Queue<T, F> {
    /// Creates a closed queue on the given filesystem.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration is invalid or `T` is
    /// zero-sized.
    pub fn with_fs(fs: F, config: QueueConfig) -> Result<Self> {
        config.validate()?;
        if T::SIZE == 0 {
            return Err(ConfigError::ZeroRecordSize.into());
        }

        let layout = SlotLayout::for_record::<T>(config.capacity, config.seq_width);

        Ok(Self {
            fs,
            layout,
            file: None,
            path: String::new(),
            state: QueueState::default(),
            circular: true,
            scratch: vec![0u8; layout.slot_size()],
            _record: PhantomData,
        })
    }

    /// Opens the queue file at `path` and recovers the queue state from it.
    ///
    /// With `flags.reset` the existing file is discarded. A missing file, or one
    /// shorter than [`SlotLayout::file_size`], is also treated as a reset: it
    /// is (re)initialized to all-inactive slots. If the queue is already open,
    /// the previous file is closed first.
    ///
    /// # Errors
    ///
    /// - [`StorageError`] if the file cannot be opened, sized, read, or
    ///   initialized
    /// - [`CorruptionError::FallingEdges`] if the recovery scan finds an
    ///   inconsistent image; reopen with `reset` to start over
    pub fn open<P: AsRef<Path>>(&mut self, path: P, flags: OpenFlags) -> Result<()> {
        self.close()?;

        let path = path.as_ref();
        let path_str = path.display().to_string();

        self.circular = flags.circular;
        self.state = QueueState::default();

        let mut reset = flags.reset;
        if reset && let Err(e) = self.fs.remove(path) {
            warn!(
                path = %path_str,
                exists = self.fs.exists(path),
                error = %e,
                "failed to remove old queue file"
            );
        }
        reset |= !self.fs.exists(path);

        let mode = if reset { OpenMode::Truncate } else { OpenMode::ReadWrite };
        let mut file = self.fs.open(path, mode).map_err(|e| StorageError::Open {
            path: path_str.clone(),
            source: e,
        })?;

        let size = file.size().map_err(|e| StorageError::Size {
            path: path_str.clone(),
            source: e,
        })?;

        // Test read to catch a handle that opens but cannot be read
        if size > 0 {
            let mut first = [0u8; 1];
            let readable = file
                .seek(SeekFrom::Start(0))
                .and_then(|_| file.read(&mut first))
                .is_ok_and(|n| n == 1);
            if !readable {
                error!(path = %path_str, "test read of queue file failed");
                return Err(StorageError::TestRead { path: path_str }.into());
            }
        }

        if size < self.layout.file_size() {
            if !reset {
                warn!(
                    path = %path_str,
                    size,
                    expected = self.layout.file_size(),
                    "queue file too small, resetting"
                );
            }
            reset = true;
        }

        self.file = Some(file);
        self.path = path_str;

        if reset && let Err(e) = self.clear() {
            self.file = None;
            return Err(e);
        }

        debug!(
            path = %self.path,
            record_size = self.layout.record_size(),
            capacity = self.layout.capacity(),
            reset,
            "queue file open"
        );

        let file = self.file.as_mut().ok_or(UsageError::NotOpen)?;
        match recovery::scan(file, &self.layout, &self.path) {
            Ok(ScanOutcome::Clean(state)) => {
                self.state = state;
                Ok(())
            }
            Ok(ScanOutcome::Corrupted { offset }) => {
                self.file = None;
                Err(CorruptionError::FallingEdges {
                    path: self.path.clone(),
                    offset,
                }
                .into())
            }
            Err(e) => {
                self.file = None;
                Err(e)
            }
        }
    }

    /// Syncs and closes the queue file.
    ///
    /// Closing a queue that is not open does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Sync`] if the final sync fails. The file is
    /// closed either way.
    pub fn close(&mut self) -> Result<()> {
        if let Some(mut file) = self.file.take() {
            sync(&mut file, &self.path)?;
            debug!(path = %self.path, "queue file closed");
        }
        Ok(())
    }

    /// Appends a record as the newest entry.
    ///
    /// In circular mode a push into a full queue overwrites the oldest record.
    /// The in-memory state advances as soon as the slot write is attempted, so
    /// it keeps matching whatever part of the slot reached the file even when
    /// an error is returned.
    ///
    /// # Errors
    ///
    /// - [`UsageError::NotOpen`] if the queue is closed
    /// - [`UsageError::Full`] if the queue is full and not circular
    /// - [`StorageError`] if the slot cannot be written completely or synced;
    ///   the record still occupies its slot
    pub fn push(&mut self, record: T) -> Result<()> {
        if self.file.is_none() {
            return Err(UsageError::NotOpen.into());
        }
        if self.is_full() && !self.circular {
            return Err(UsageError::Full {
                capacity: self.layout.capacity(),
            }
            .into());
        }
        if self.state.next_seq >= self.layout.seq_width().max() {
            self.renumber()?;
        }

        let was_empty = self.is_empty();
        let was_full = self.is_full();
        let write_pos = if was_empty {
            self.layout.wrap(self.state.head)
        } else {
            self.layout.next_offset(self.state.head)
        };

        // Head catching up with tail means the oldest record is overwritten
        let tail = if !was_empty && write_pos == self.state.tail {
            self.layout.next_offset(self.state.tail)
        } else {
            self.state.tail
        };

        let seq = self.state.next_seq + 1;
        self.layout.encode_slot(seq, &record, &mut self.scratch);

        let file = self.file.as_mut().ok_or(UsageError::NotOpen)?;
        let written = write_at(file, &self.path, write_pos, &self.scratch);

        self.state.head = write_pos;
        self.state.tail = tail;
        self.state.next_seq = seq;
        if !was_full {
            self.state.count += 1;
        }

        if let Err(e) = written.and_then(|()| sync(file, &self.path)) {
            warn!(seq, offset = write_pos, error = %e, "push did not complete cleanly");
            return Err(e);
        }

        trace!(
            seq,
            head = self.state.head,
            tail = self.state.tail,
            count = self.state.count,
            "pushed record"
        );
        Ok(())
    }

    /// Removes and returns the oldest record.
    ///
    /// The slot is read first and then deactivated by zeroing its seq.
    /// Popping the last record rewinds head, tail, and the seq counter to zero.
    ///
    /// # Errors
    ///
    /// - [`UsageError::NotOpen`] if the queue is closed
    /// - [`UsageError::Empty`] if there is nothing to pop
    /// - [`StorageError::Read`] or [`StorageError::Write`] if the slot cannot be
    ///   read or deactivated; the record stays queued
    /// - [`StorageError::Sync`] if the final sync fails; the record has already
    ///   been removed
    pub fn pop(&mut self) -> Result<T> {
        let file = self.file.as_mut().ok_or(UsageError::NotOpen)?;
        if self.state.count == 0 {
            return Err(UsageError::Empty.into());
        }

        let tail = self.state.tail;
        let seq_bytes = self.layout.seq_width().bytes();

        read_at(file, &self.path, tail, &mut self.scratch)?;
        let record = self.layout.decode_payload::<T>(&self.scratch);
        write_at(file, &self.path, tail, &[0u8; 4][..seq_bytes])?;

        self.state.count -= 1;
        if self.state.head == tail {
            self.state = QueueState::default();
        } else {
            self.state.tail = self.layout.next_offset(tail);
        }

        sync(file, &self.path)?;

        trace!(
            head = self.state.head,
            tail = self.state.tail,
            count = self.state.count,
            "popped record"
        );
        Ok(record)
    }

    /// Returns the record `index` positions after the oldest, without
    /// removing it. `peek(0)` is the record `pop` would return.
    ///
    /// # Errors
    ///
    /// - [`UsageError::NotOpen`] if the queue is closed
    /// - [`UsageError::IndexOutOfRange`] if `index >= size()`
    /// - [`StorageError::Read`] if the slot cannot be read
    pub fn peek(&mut self, index: u32) -> Result<T> {
        let file = self.file.as_mut().ok_or(UsageError::NotOpen)?;
        if index >= self.state.count {
            return Err(UsageError::IndexOutOfRange {
                index,
                len: self.state.count,
            }
            .into());
        }

        let offset = self.layout.advance(self.state.tail, index);
        read_at(file, &self.path, offset, &mut self.scratch)?;
        Ok(self.layout.decode_payload::<T>(&self.scratch))
    }

    /// Reads physical slot `index`, ignoring logical order.
    ///
    /// Returns `None` if the slot is inactive.
    ///
    /// # Errors
    ///
    /// - [`UsageError::NotOpen`] if the queue is closed
    /// - [`UsageError::IndexOutOfRange`] if `index >= capacity()`
    /// - [`StorageError::Read`] if the slot cannot be read
    pub fn get_raw(&mut self, index: u32) -> Result<Option<T>> {
        let file = self.file.as_mut().ok_or(UsageError::NotOpen)?;
        if index >= self.layout.capacity() {
            return Err(UsageError::IndexOutOfRange {
                index,
                len: self.layout.capacity(),
            }
            .into());
        }

        read_at(file, &self.path, self.layout.offset(index), &mut self.scratch)?;
        if self.layout.decode_seq(&self.scratch) == 0 {
            return Ok(None);
        }
        Ok(Some(self.layout.decode_payload::<T>(&self.scratch)))
    }

    /// Removes every record by writing an inactive, zeroed image over the
    /// whole file.
    ///
    /// # Errors
    ///
    /// - [`UsageError::NotOpen`] if the queue is closed
    /// - [`StorageError`] if the file cannot be written
    pub fn clear(&mut self) -> Result<()> {
        let file = self.file.as_mut().ok_or(UsageError::NotOpen)?;

        self.layout.encode_empty(&mut self.scratch);
        for index in 0..self.layout.capacity() {
            write_at(file, &self.path, self.layout.offset(index), &self.scratch)?;
        }
        sync(file, &self.path)?;

        self.state = QueueState::default();
        debug!(path = %self.path, slots = self.layout.capacity(), "queue cleared");
        Ok(())
    }

    /// Returns the seq of every physical slot, zero for inactive slots.
    ///
    /// # Errors
    ///
    /// - [`UsageError::NotOpen`] if the queue is closed
    /// - [`StorageError::Read`] if a slot cannot be read
    pub fn slot_seqs(&mut self) -> Result<Vec<u32>> {
        let file = self.file.as_mut().ok_or(UsageError::NotOpen)?;

        let seq_bytes = self.layout.seq_width().bytes();
        let mut seqs = Vec::with_capacity(self.layout.capacity() as usize);
        for index in 0..self.layout.capacity() {
            read_at(
                file,
                &self.path,
                self.layout.offset(index),
                &mut self.scratch[..seq_bytes],
            )?;
            seqs.push(self.layout.decode_seq(&self.scratch));
        }
        Ok(seqs)
    }

    /// Returns all records from oldest to newest without removing them.
    ///
    /// # Errors
    ///
    /// Same as [`Queue::peek`].
    pub fn peek_all(&mut self) -> Result<Vec<T>> {
        (0..self.state.count).map(|i| self.peek(i)).collect()
    }

    /// Rewrites the active seqs as `1..=count` in logical order.
    ///
    /// Runs when the seq counter would overflow its on-disk width. Relative
    /// order is unchanged, so the image keeps its single falling edge.
    fn renumber(&mut self) -> Result<()> {
        let file = self.file.as_mut().ok_or(UsageError::NotOpen)?;

        let width = self.layout.seq_width();
        let mut buf = [0u8; 4];
        let mut pos = self.state.tail;
        for seq in 1..=self.state.count {
            width.encode(seq, &mut buf);
            write_at(file, &self.path, pos, &buf[..width.bytes()])?;
            pos = self.layout.next_offset(pos);
        }
        sync(file, &self.path)?;

        info!(
            path = %self.path,
            count = self.state.count,
            from = self.state.next_seq,
            "seq counter exhausted, renumbered active slots"
        );
        self.state.next_seq = self.state.count;
        Ok(())
    }

    /// Number of records in the queue.
    #[inline]
    pub fn size(&self) -> u32 {
        self.state.count
    }

    /// Number of records that can be pushed before the queue is full.
    #[inline]
    pub fn available(&self) -> u32 {
        self.layout.capacity() - self.state.count
    }

    /// Maximum number of records.
    #[inline]
    pub fn capacity(&self) -> u32 {
        self.layout.capacity()
    }

    /// Returns `true` if the queue holds no records.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.state.count == 0
    }

    /// Returns `true` if the queue holds `capacity()` records.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.state.count == self.layout.capacity()
    }

    /// Returns `true` once the queue has been opened successfully.
    #[inline]
    pub fn is_ready(&self) -> bool {
        self.file.is_some()
    }

    /// Returns `true` if pushes into a full queue overwrite the oldest record.
    #[inline]
    pub fn is_circular(&self) -> bool {
        self.circular
    }

    /// Current head/tail/count position.
    pub fn state(&self) -> QueueState {
        self.state
    }

    /// The file layout.
    pub fn layout(&self) -> &SlotLayout {
        &self.layout
    }

    /// Path of the open (or last opened) queue file.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl<T, F: FileSystem> fmt::Debug for Queue<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue")
            .field("path", &self.path)
            .field("layout", &self.layout)
            .field("state", &self.state)
            .field("circular", &self.circular)
            .field("ready", &self.file.is_some())
            .finish_non_exhaustive()
    }
}

fn write_at<W: Write + Seek>(file: &mut W, path: &str, offset: u64, buf: &[u8]) -> Result<()> {
    file.seek(SeekFrom::Start(offset))
        .and_then(|_| file.write_all(buf))
        .map_err(|e| StorageError::Write {
            path: path.to_string(),
            offset,
            source: e,
        })?;
    Ok(())
}

fn read_at<R: Read + Seek>(file: &mut R, path: &str, offset: u64, buf: &mut [u8]) -> Result<()> {
    file.seek(SeekFrom::Start(offset))
        .and_then(|_| file.read_exact(buf))
        .map_err(|e| StorageError::Read {
            path: path.to_string(),
            offset,
            source: e,
        })?;
    Ok(())
}

fn sync<S: StorageFile>(file: &mut S, path: &str) -> Result<()> {
    file.sync().map_err(|e| {
        StorageError::Sync {
            path: path.to_string(),
            source: e,
        }
        .into()
    })
}
