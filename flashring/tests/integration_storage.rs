//! Storage-level behavior: reset, reopen, missing files, and adapter failures.

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use flashring::error::{FlashringError, StorageError};
use flashring::storage::MemFile;
use flashring::{FileSystem, MemFs, OpenFlags, OpenMode, Queue, QueueConfig, SeqWidth, StorageFile};
use tempfile::tempdir;

/// Wraps [`MemFs`] with switchable read, sync and remove failures.
#[derive(Clone, Default)]
struct FlakyFs {
    inner: MemFs,
    fail_read: Arc<AtomicBool>,
    fail_sync: Arc<AtomicBool>,
    fail_remove: Arc<AtomicBool>,
}

struct FlakyFile {
    inner: MemFile,
    fail_read: Arc<AtomicBool>,
    fail_sync: Arc<AtomicBool>,
}

impl Read for FlakyFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.fail_read.load(Ordering::SeqCst) {
            return Err(io::Error::other("read failed"));
        }
        self.inner.read(buf)
    }
}

impl Write for FlakyFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl Seek for FlakyFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}

impl StorageFile for FlakyFile {
    fn size(&self) -> io::Result<u64> {
        self.inner.size()
    }

    fn sync(&mut self) -> io::Result<()> {
        if self.fail_sync.load(Ordering::SeqCst) {
            return Err(io::Error::other("sync failed"));
        }
        self.inner.sync()
    }
}

impl FileSystem for FlakyFs {
    type File = FlakyFile;

    fn exists(&self, path: &Path) -> bool {
        self.inner.exists(path)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        if self.fail_remove.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"));
        }
        self.inner.remove(path)
    }

    fn open(&self, path: &Path, mode: OpenMode) -> io::Result<FlakyFile> {
        Ok(FlakyFile {
            inner: self.inner.open(path, mode)?,
            fail_read: Arc::clone(&self.fail_read),
            fail_sync: Arc::clone(&self.fail_sync),
        })
    }
}

fn config() -> QueueConfig {
    QueueConfig::new(4).unwrap()
}

#[test]
fn test_reset_discards_existing_records() {
    let fs = MemFs::new();
    let mut queue: Queue<u32, MemFs> = Queue::with_fs(fs.clone(), config()).unwrap();

    queue.open("q.bin", OpenFlags::default()).unwrap();
    queue.push(1).unwrap();
    queue.push(2).unwrap();
    queue.close().unwrap();

    queue.open("q.bin", OpenFlags::default().reset(true)).unwrap();
    assert!(queue.is_empty());
    assert_eq!(fs.read_file("q.bin").unwrap(), vec![0u8; 24]);
}

#[test]
fn test_reopen_switches_files() {
    let fs = MemFs::new();
    let mut queue: Queue<u32, MemFs> = Queue::with_fs(fs.clone(), config()).unwrap();

    queue.open("a.bin", OpenFlags::default()).unwrap();
    queue.push(10).unwrap();

    // Opening another file closes the first one
    queue.open("b.bin", OpenFlags::default()).unwrap();
    assert!(queue.is_empty());
    assert_eq!(queue.path(), "b.bin");
    queue.push(20).unwrap();

    queue.open("a.bin", OpenFlags::default()).unwrap();
    assert_eq!(queue.peek_all().unwrap(), vec![10]);
}

#[test]
fn test_larger_file_is_not_truncated() {
    let fs = MemFs::new();
    let mut image = vec![0u8; 24];
    image.extend_from_slice(&[0xee; 10]);
    fs.write_file("q.bin", &image);

    let mut queue: Queue<u32, MemFs> = Queue::with_fs(fs.clone(), config()).unwrap();
    queue.open("q.bin", OpenFlags::default()).unwrap();
    queue.push(5).unwrap();

    let after = fs.read_file("q.bin").unwrap();
    assert_eq!(after.len(), 34);
    assert_eq!(&after[24..], &[0xee; 10]);
}

#[test]
fn test_reset_survives_failed_remove() {
    let fs = FlakyFs::default();
    let mut queue: Queue<u32, FlakyFs> = Queue::with_fs(fs.clone(), config()).unwrap();

    queue.open("q.bin", OpenFlags::default()).unwrap();
    queue.push(7).unwrap();
    queue.close().unwrap();

    fs.fail_remove.store(true, Ordering::SeqCst);
    queue.open("q.bin", OpenFlags::default().reset(true)).unwrap();
    assert!(queue.is_empty());
    assert_eq!(fs.inner.read_file("q.bin").unwrap(), vec![0u8; 24]);
}

#[test]
fn test_sync_failure_is_reported() {
    let fs = FlakyFs::default();
    let mut queue: Queue<u32, FlakyFs> = Queue::with_fs(fs.clone(), config()).unwrap();
    queue.open("q.bin", OpenFlags::default()).unwrap();
    queue.push(1).unwrap();

    fs.fail_sync.store(true, Ordering::SeqCst);
    let err = queue.push(2).unwrap_err();
    assert!(matches!(err, FlashringError::Storage(StorageError::Sync { .. })));

    // The slot was written, so the record is queued
    assert_eq!(queue.size(), 2);

    // Close still releases the handle when its sync fails
    assert!(queue.close().is_err());
    assert!(!queue.is_ready());
}

#[test]
fn test_unsynced_push_survives_reopen_in_order() {
    let fs = FlakyFs::default();
    let mut queue: Queue<u32, FlakyFs> =
        Queue::with_fs(fs.clone(), QueueConfig::new(3).unwrap()).unwrap();
    queue.open("q.bin", OpenFlags::default()).unwrap();
    queue.push(1).unwrap();
    queue.push(2).unwrap();

    fs.fail_sync.store(true, Ordering::SeqCst);
    assert!(queue.push(3).is_err());
    fs.fail_sync.store(false, Ordering::SeqCst);

    assert_eq!(queue.pop().unwrap(), 1);
    assert_eq!(queue.pop().unwrap(), 2);
    queue.push(9).unwrap();
    assert_eq!(queue.peek_all().unwrap(), vec![3, 9]);

    let before = queue.state();
    queue.close().unwrap();
    queue.open("q.bin", OpenFlags::default()).unwrap();

    assert_eq!(queue.state(), before);
    assert_eq!(queue.slot_seqs().unwrap(), vec![4, 0, 3]);
    assert_eq!(queue.peek_all().unwrap(), vec![3, 9]);
}

#[test]
fn test_unsynced_overwrite_keeps_fifo_order() {
    let fs = FlakyFs::default();
    let mut queue: Queue<u32, FlakyFs> =
        Queue::with_fs(fs.clone(), QueueConfig::new(3).unwrap()).unwrap();
    queue.open("q.bin", OpenFlags::default()).unwrap();
    for v in 1..=3 {
        queue.push(v).unwrap();
    }

    fs.fail_sync.store(true, Ordering::SeqCst);
    assert!(queue.push(4).is_err());
    fs.fail_sync.store(false, Ordering::SeqCst);

    let popped: Vec<u32> = (0..3).map(|_| queue.pop().unwrap()).collect();
    assert_eq!(popped, vec![2, 3, 4]);
    assert!(queue.is_empty());
}

#[test]
fn test_pop_sync_failure_removes_record() {
    let fs = FlakyFs::default();
    let mut queue: Queue<u32, FlakyFs> = Queue::with_fs(fs.clone(), config()).unwrap();
    queue.open("q.bin", OpenFlags::default()).unwrap();
    queue.push(1).unwrap();
    queue.push(2).unwrap();

    fs.fail_sync.store(true, Ordering::SeqCst);
    assert!(matches!(
        queue.pop(),
        Err(FlashringError::Storage(StorageError::Sync { .. }))
    ));
    fs.fail_sync.store(false, Ordering::SeqCst);

    // The seq was zeroed on disk, and memory agrees
    let before = queue.state();
    assert_eq!(queue.size(), 1);
    queue.close().unwrap();
    queue.open("q.bin", OpenFlags::default()).unwrap();
    assert_eq!(queue.state(), before);
    assert_eq!(queue.peek_all().unwrap(), vec![2]);
}

#[test]
fn test_unreadable_file_fails_test_read() {
    let fs = FlakyFs::default();
    let mut queue: Queue<u32, FlakyFs> = Queue::with_fs(fs.clone(), config()).unwrap();
    queue.open("q.bin", OpenFlags::default()).unwrap();
    queue.push(1).unwrap();
    queue.close().unwrap();

    fs.fail_read.store(true, Ordering::SeqCst);
    let err = queue.open("q.bin", OpenFlags::default()).unwrap_err();
    assert!(matches!(err, FlashringError::Storage(StorageError::TestRead { .. })));
    assert!(!queue.is_ready());

    // The image was left alone
    fs.fail_read.store(false, Ordering::SeqCst);
    queue.open("q.bin", OpenFlags::default()).unwrap();
    assert_eq!(queue.peek_all().unwrap(), vec![1]);
}

#[test]
fn test_open_missing_directory_fails() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("missing").join("q.bin");

    let mut queue: Queue<u32> = Queue::new(config()).unwrap();
    let err = queue.open(&path, OpenFlags::default()).unwrap_err();
    assert!(matches!(err, FlashringError::Storage(StorageError::Open { .. })));
    assert!(!queue.is_ready());
}

#[test]
fn test_wide_seq_file_layout() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("wide.bin");
    let config = QueueConfig::new(3).unwrap().with_seq_width(SeqWidth::U32);

    let mut queue: Queue<u16> = Queue::new(config).unwrap();
    queue.open(&path, OpenFlags::default()).unwrap();
    queue.push(0xabcd).unwrap();
    queue.close().unwrap();

    let image = std::fs::read(&path).unwrap();
    assert_eq!(image.len(), 18);
    assert_eq!(&image[..6], &[1, 0, 0, 0, 0xcd, 0xab]);

    queue.open(&path, OpenFlags::default()).unwrap();
    assert_eq!(queue.pop().unwrap(), 0xabcd);
}

#[test]
fn test_config_file_drives_queue() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("queue.json");
    let queue_path = temp_dir.path().join("queue.bin");

    QueueConfig::new(8).unwrap().save(&config_path).unwrap();
    let config = QueueConfig::load(&config_path).unwrap();

    let mut queue: Queue<i64> = Queue::new(config).unwrap();
    queue.open(&queue_path, OpenFlags::default()).unwrap();
    assert_eq!(queue.capacity(), 8);
    assert_eq!(std::fs::metadata(&queue_path).unwrap().len(), 8 * 10);
}
