//! Queue configuration.
//!
//! [`QueueConfig`] fixes the file layout (capacity and seq width) and is
//! chosen when the queue is constructed. [`OpenFlags`] control a single
//! `open` call.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::slot::SeqWidth;

/// Layout configuration for a queue file.
///
/// The same configuration must be used every time a given file is opened;
/// the file carries no header recording it.
///
/// # Example
///
/// ```rust
/// use flashring::config::QueueConfig;
/// use flashring::slot::SeqWidth;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = QueueConfig::new(200)?;
/// assert_eq!(config.seq_width, SeqWidth::U16);
///
/// let wide = QueueConfig::new(100_000)?.with_seq_width(SeqWidth::U32);
/// wide.validate()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Number of records the queue holds.
    pub capacity: u32,

    /// Width of the per-slot sequence number.
    #[serde(default)]
    pub seq_width: SeqWidth,
}

impl QueueConfig {
    /// Creates a configuration with the default two-byte seq width.
    ///
    /// Capacities too large for a two-byte seq are widened to four bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroCapacity`] if `capacity` is zero.
    pub fn new(capacity: u32) -> Result<Self> {
        let seq_width = if capacity < SeqWidth::U16.max() {
            SeqWidth::U16
        } else {
            SeqWidth::U32
        };
        let config = Self {
            capacity,
            seq_width,
        };
        config.validate()?;
        Ok(config)
    }

    /// Returns a copy with the given seq width.
    #[must_use]
    pub fn with_seq_width(mut self, seq_width: SeqWidth) -> Self {
        self.seq_width = seq_width;
        self
    }

    /// Validates the configuration.
    ///
    /// Capacity must leave room below the seq maximum so that renumbering the
    /// active records `1..=capacity` still allows one more push.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if validation fails.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity.into());
        }

        let max = self.seq_width.max() - 1;
        if self.capacity > max {
            return Err(ConfigError::CapacityExceedsSeqRange {
                capacity: self.capacity,
                seq_bytes: self.seq_width.bytes(),
                max,
            }
            .into());
        }

        Ok(())
    }

    /// Loads and validates a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] or [`ConfigError::Parse`] if the file
    /// cannot be read or parsed, or a validation error.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|e| ConfigError::Load {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: Self = serde_json::from_str(&data).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Saves the configuration as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if serialization fails or
    /// [`ConfigError::Save`] if the file cannot be written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let data = serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            source: e,
        })?;
        std::fs::write(path, data).map_err(|e| ConfigError::Save {
            path: path.display().to_string(),
            source: e,
        })?;
        Ok(())
    }
}

/// Options for a single [`Queue::open`](crate::Queue::open) call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenFlags {
    /// Discard any existing file content and start empty.
    pub reset: bool,
    /// Overwrite the oldest record when pushing into a full queue.
    pub circular: bool,
}

impl OpenFlags {
    /// Sets whether the file is reset on open.
    #[must_use]
    pub fn reset(mut self, reset: bool) -> Self {
        self.reset = reset;
        self
    }

    /// Sets whether pushes overwrite the oldest record when full.
    #[must_use]
    pub fn circular(mut self, circular: bool) -> Self {
        self.circular = circular;
        self
    }
}

impl Default for OpenFlags {
    fn default() -> Self {
        Self {
            reset: false,
            circular: true,
        }
    }
}
