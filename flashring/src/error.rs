//! Error types for the flashring persistent queue.

use thiserror::Error;

/// The main error type for all flashring operations.
///
/// This enum covers all possible error conditions that can occur while opening,
/// mutating, or inspecting a queue file.
#[derive(Error, Debug)]
pub enum FlashringError {
    /// The caller violated an operation's precondition.
    #[error("usage error: {0}")]
    Usage(#[from] UsageError),

    /// The storage adapter failed to open, size, read, write, or sync the file.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The recovery scan found an inconsistent on-disk image.
    #[error("corrupted queue file: {0}")]
    Corrupted(#[from] CorruptionError),

    /// Queue configuration is invalid or could not be loaded.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

impl FlashringError {
    /// Returns the byte offset where corruption was detected, if this is a
    /// corruption error.
    pub fn corruption_offset(&self) -> Option<u64> {
        match self {
            Self::Corrupted(CorruptionError::FallingEdges { offset, .. }) => Some(*offset),
            _ => None,
        }
    }

    /// Returns `true` if this error indicates a caller bug rather than an
    /// environmental failure.
    pub fn is_usage(&self) -> bool {
        matches!(self, Self::Usage(_))
    }
}

/// Precondition violations. These indicate a bug in the calling code.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UsageError {
    /// The queue has not been opened, or has been closed.
    #[error("queue is not open")]
    NotOpen,

    /// `pop` was called on an empty queue.
    #[error("queue is empty")]
    Empty,

    /// `push` was called on a full queue that is not in circular mode.
    #[error("queue is full ({capacity} records) and not circular")]
    Full {
        /// Capacity of the queue in records.
        capacity: u32,
    },

    /// An index passed to `peek` or `get_raw` was out of range.
    #[error("index {index} out of range (len {len})")]
    IndexOutOfRange {
        /// The requested index.
        index: u32,
        /// The exclusive upper bound for the index.
        len: u32,
    },
}

/// Errors reported by the storage adapter.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The queue file could not be opened or created.
    #[error("failed to open queue file '{path}': {source}")]
    Open {
        /// The file path.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The one-byte test read after opening failed.
    #[error("test read of queue file '{path}' failed")]
    TestRead {
        /// The file path.
        path: String,
    },

    /// The file size could not be determined.
    #[error("failed to stat queue file '{path}': {source}")]
    Size {
        /// The file path.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to read from the queue file.
    #[error("failed to read queue file '{path}' at offset {offset}: {source}")]
    Read {
        /// The file path.
        path: String,
        /// The byte offset where the read failed.
        offset: u64,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to write to the queue file.
    #[error("failed to write queue file '{path}' at offset {offset}: {source}")]
    Write {
        /// The file path.
        path: String,
        /// The byte offset where the write failed.
        offset: u64,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to flush the queue file to stable storage.
    #[error("failed to sync queue file '{path}': {source}")]
    Sync {
        /// The file path.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Errors detected by the recovery scan.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CorruptionError {
    /// More than one falling edge was seen across the physical slot array.
    #[error("'{path}' has a second falling sequence edge at offset {offset}")]
    FallingEdges {
        /// The file path.
        path: String,
        /// Byte offset of the slot holding the second falling edge.
        offset: u64,
    },
}

/// Errors in queue configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Capacity must be at least one record.
    #[error("capacity must be greater than zero")]
    ZeroCapacity,

    /// Capacity does not fit the sequence number range.
    #[error("capacity {capacity} needs more sequence numbers than a {seq_bytes}-byte seq provides (max capacity {max})")]
    CapacityExceedsSeqRange {
        /// The configured capacity.
        capacity: u32,
        /// Width of the sequence field in bytes.
        seq_bytes: usize,
        /// Largest capacity supported by this width.
        max: u32,
    },

    /// Zero-sized records cannot be stored.
    #[error("record type has zero size")]
    ZeroRecordSize,

    /// Failed to read a config file.
    #[error("failed to load config from '{path}': {source}")]
    Load {
        /// The config file path.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse or serialize a config file.
    #[error("failed to parse config '{path}': {source}")]
    Parse {
        /// The config file path.
        path: String,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Failed to write a config file.
    #[error("failed to save config to '{path}': {source}")]
    Save {
        /// The config file path.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Type alias for `Result<T, FlashringError>`.
pub type Result<T> = std::result::Result<T, FlashringError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corruption_offset() {
        let err: FlashringError = CorruptionError::FallingEdges {
            path: "q.bin".to_string(),
            offset: 18,
        }
        .into();
        assert_eq!(err.corruption_offset(), Some(18));
        assert!(!err.is_usage());
        assert!(err.to_string().contains("offset 18"));
    }

    #[test]
    fn test_usage_classification() {
        let err: FlashringError = UsageError::Empty.into();
        assert!(err.is_usage());
        assert_eq!(err.corruption_offset(), None);
        assert_eq!(err.to_string(), "usage error: queue is empty");
    }
}
