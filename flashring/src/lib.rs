//! # flashring
//!
//! Persistent, bounded, circular record queue stored in a single fixed-size file.
//!
//! flashring is a Rust library for buffering fixed-size records on small
//! devices with flash-backed filesystems: log lines waiting to be shipped,
//! sensor readings waiting for connectivity, events that must survive a
//! reboot. The queue file is allocated once and never grows.
//!
//! ## Key Properties
//!
//! - One file, `capacity × (seq + record)` bytes, no header
//! - FIFO order preserved across process restarts
//! - Optional circular mode: a push into a full queue overwrites the oldest record
//! - State recovered by a single scan; an inconsistent image is reported as
//!   corruption rather than silently misread
//! - Pluggable storage through the [`FileSystem`] trait
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use flashring::{OpenFlags, Queue, QueueConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut queue: Queue<u32> = Queue::new(QueueConfig::new(100)?)?;
//!
//! // Keep whatever survived the last run
//! queue.open("readings.bin", OpenFlags::default())?;
//!
//! queue.push(42)?;
//! while !queue.is_empty() {
//!     println!("{}", queue.pop()?);
//! }
//!
//! queue.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`queue`]: Queue lifecycle, push, pop, peek, inspection
//! - [`recovery`]: State reconstruction from the on-disk image
//! - [`slot`]: Slot layout and codec
//! - [`record`]: The fixed-size [`Record`] trait
//! - [`storage`]: Filesystem adapters
//! - [`config`]: Queue configuration and open flags
//! - [`error`]: Error types

pub mod config;
pub mod error;
pub mod queue;
pub mod record;
pub mod recovery;
pub mod slot;
pub mod storage;

// Re-export primary API types at crate root for convenience.
pub use config::{OpenFlags, QueueConfig};
pub use error::{FlashringError, Result};
pub use queue::Queue;
pub use record::Record;
pub use recovery::QueueState;
pub use slot::{SeqWidth, SlotLayout};
pub use storage::{FileSystem, MemFs, OpenMode, StdFs, StorageFile};
