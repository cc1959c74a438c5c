//! Storage adapters for queue files.
//!
//! The queue never touches `std::fs` directly. It talks to a [`FileSystem`]
//! that can check for, remove, and open files, and to the [`StorageFile`]
//! handles it returns. Two adapters are provided:
//!
//! - [`StdFs`]: the host filesystem via `std::fs::File`.
//! - [`MemFs`]: an in-memory filesystem with an optional capacity limit,
//!   useful for tests and for simulating a full flash partition.
//!
//! Closing a file is dropping its handle.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// How a queue file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Read-write, creating the file and truncating any existing content ("w+").
    Truncate,
    /// Read-write on an existing file ("r+").
    ReadWrite,
}

/// A random-access file handle.
pub trait StorageFile: Read + Write + Seek {
    /// Returns the current size of the file in bytes.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the size cannot be determined.
    fn size(&self) -> io::Result<u64>;

    /// Flushes buffered data and makes previous writes durable.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the sync fails.
    fn sync(&mut self) -> io::Result<()> {
        self.flush()
    }
}

/// A filesystem that can host queue files.
pub trait FileSystem {
    /// The handle type returned by [`FileSystem::open`].
    type File: StorageFile;

    /// Returns `true` if a file exists at `path`.
    fn exists(&self, path: &Path) -> bool;

    /// Removes the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file does not exist or cannot be removed.
    fn remove(&self, path: &Path) -> io::Result<()>;

    /// Opens the file at `path` for reading and writing.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be opened in the given mode.
    fn open(&self, path: &Path, mode: OpenMode) -> io::Result<Self::File>;
}

/// The host filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdFs;

impl StorageFile for File {
    fn size(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn sync(&mut self) -> io::Result<()> {
        self.flush()?;
        self.sync_data()
    }
}

impl FileSystem for StdFs {
    type File = File;

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }

    fn open(&self, path: &Path, mode: OpenMode) -> io::Result<File> {
        match mode {
            OpenMode::Truncate => OpenOptions::new()
                .create(true)
                .truncate(true)
                .read(true)
                .write(true)
                .open(path),
            OpenMode::ReadWrite => OpenOptions::new().read(true).write(true).open(path),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

type SharedBytes = Arc<Mutex<Vec<u8>>>;

/// An in-memory filesystem.
///
/// Clones share the same files, so a test can keep one handle to inspect or
/// tamper with file images while a queue owns another.
///
/// A capacity limit caps how large any file may grow; writes past the limit
/// are short, which is how a full flash partition behaves.
#[derive(Debug, Clone, Default)]
pub struct MemFs {
    files: Arc<Mutex<HashMap<PathBuf, SharedBytes>>>,
    limit: Arc<Mutex<Option<u64>>>,
}

impl MemFs {
    /// Creates an empty in-memory filesystem with no size limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty filesystem whose files cannot grow past `limit` bytes.
    pub fn with_capacity_limit(limit: u64) -> Self {
        let fs = Self::default();
        fs.set_capacity_limit(Some(limit));
        fs
    }

    /// Changes the per-file size limit. Applies to already-open handles too.
    pub fn set_capacity_limit(&self, limit: Option<u64>) {
        *lock(&self.limit) = limit;
    }

    /// Returns a copy of the file's current contents.
    pub fn read_file<P: AsRef<Path>>(&self, path: P) -> Option<Vec<u8>> {
        let files = lock(&self.files);
        files.get(path.as_ref()).map(|bytes| lock(bytes).clone())
    }

    /// Replaces the file's contents, creating it if needed.
    pub fn write_file<P: AsRef<Path>>(&self, path: P, contents: &[u8]) {
        let mut files = lock(&self.files);
        let entry = files.entry(path.as_ref().to_path_buf()).or_default();
        *lock(entry) = contents.to_vec();
    }
}

impl FileSystem for MemFs {
    type File = MemFile;

    fn exists(&self, path: &Path) -> bool {
        lock(&self.files).contains_key(path)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        lock(&self.files)
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such file"))
    }

    fn open(&self, path: &Path, mode: OpenMode) -> io::Result<MemFile> {
        let mut files = lock(&self.files);
        let data = match mode {
            OpenMode::Truncate => {
                let data = SharedBytes::default();
                files.insert(path.to_path_buf(), Arc::clone(&data));
                data
            }
            OpenMode::ReadWrite => files
                .get(path)
                .cloned()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such file"))?,
        };

        Ok(MemFile {
            data,
            pos: 0,
            limit: Arc::clone(&self.limit),
        })
    }
}

/// A handle to a file in a [`MemFs`].
#[derive(Debug)]
pub struct MemFile {
    data: SharedBytes,
    pos: u64,
    limit: Arc<Mutex<Option<u64>>>,
}

impl Read for MemFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let data = lock(&self.data);
        let pos = usize::try_from(self.pos).unwrap_or(usize::MAX);
        if pos >= data.len() {
            return Ok(0);
        }

        let n = buf.len().min(data.len() - pos);
        buf[..n].copy_from_slice(&data[pos..pos + n]);
        self.pos += n as u64;
        Ok(n)
    }
}

impl Write for MemFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut n = buf.len();
        if let Some(limit) = *lock(&self.limit) {
            let room = limit.saturating_sub(self.pos);
            n = n.min(usize::try_from(room).unwrap_or(usize::MAX));
        }
        if n == 0 {
            return Ok(0);
        }

        let pos = usize::try_from(self.pos)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "position out of range"))?;
        let end = pos + n;

        let mut data = lock(&self.data);
        if data.len() < end {
            data.resize(end, 0);
        }
        data[pos..end].copy_from_slice(&buf[..n]);
        self.pos += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for MemFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::End(delta) => (lock(&self.data).len() as u64).checked_add_signed(delta),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
        };

        let target = target.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek to a negative position")
        })?;
        self.pos = target;
        Ok(target)
    }
}

impl StorageFile for MemFile {
    fn size(&self) -> io::Result<u64> {
        Ok(lock(&self.data).len() as u64)
    }
}
