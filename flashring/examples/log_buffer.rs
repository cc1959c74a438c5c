//! Buffers log lines in a queue file so they survive a restart before they
//! are shipped.
//!
//! Run with: `cargo run -p flashring --example log_buffer [path]`
//!
//! Set `RUST_LOG=flashring=debug` to see the queue's own logging.

#![allow(missing_docs)]

use std::time::Instant;

use flashring::{OpenFlags, Queue, QueueConfig, Record};

const LINE_LEN: usize = 80;

/// A timestamped, NUL-padded log line.
#[derive(Debug, Clone, Copy)]
struct LogEntry {
    ms: u32,
    line: [u8; LINE_LEN],
}

impl LogEntry {
    fn new(ms: u32, text: &str) -> Self {
        let mut line = [0u8; LINE_LEN];
        let n = text.len().min(LINE_LEN - 1);
        line[..n].copy_from_slice(&text.as_bytes()[..n]);
        Self { ms, line }
    }

    fn text(&self) -> String {
        let end = self.line.iter().position(|&b| b == 0).unwrap_or(LINE_LEN);
        String::from_utf8_lossy(&self.line[..end]).into_owned()
    }
}

impl Record for LogEntry {
    const SIZE: usize = 4 + LINE_LEN;

    fn encode(&self, buf: &mut [u8]) {
        buf[..4].copy_from_slice(&self.ms.to_le_bytes());
        buf[4..Self::SIZE].copy_from_slice(&self.line);
    }

    fn decode(buf: &[u8]) -> Self {
        let mut line = [0u8; LINE_LEN];
        line.copy_from_slice(&buf[4..Self::SIZE]);
        Self {
            ms: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            line,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "logbuffer.bin".to_string());
    let started = Instant::now();
    let millis = || u32::try_from(started.elapsed().as_millis()).unwrap_or(u32::MAX);

    let mut buffer: Queue<LogEntry> = Queue::new(QueueConfig::new(100)?)?;

    // No reset: entries left over from a previous run are still pending
    buffer.open(&path, OpenFlags::default())?;
    if !buffer.is_empty() {
        println!("{} entries pending from a previous run", buffer.size());
    }

    buffer.push(LogEntry::new(millis(), "Log entry 1"))?;
    buffer.push(LogEntry::new(millis(), "Log entry 2"))?;

    while !buffer.is_empty() {
        let entry = buffer.pop()?;
        println!("[{}] {}", entry.ms, entry.text());
    }

    buffer.close()?;
    Ok(())
}
