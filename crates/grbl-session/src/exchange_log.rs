//! Exchange transcript
//!
//! Every byte sent to and received from the controller can be recorded
//! for post-mortem debugging. Records are plain text: control characters
//! in payloads are escaped before they reach a sink.
//!
//! Record format (one per entry):
//!
//! ```text
//! --- 2024-03-01T14:22:05.123456
//! SEND
//! G90<0D>
//! ```

use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Local};
use grbl_protocol::escape_control;

/// Default transcript file, relative to the working directory
pub const DEFAULT_LOG_FILE: &str = "4xidraw-serial.log";

/// Which side of the exchange an entry records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Bytes written to the controller
    Send,
    /// A line read from the controller
    Recv,
    /// Retry progress inside a query
    Query,
}

impl Direction {
    /// Tag written in the transcript
    pub fn tag(&self) -> &'static str {
        match self {
            Direction::Send => "SEND",
            Direction::Recv => "RECV",
            Direction::Query => "QUERY",
        }
    }
}

/// One transcript record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub direction: Direction,
    /// Payload with control characters escaped
    pub payload: String,
}

impl LogEntry {
    /// Record `payload` as of now
    pub fn now(direction: Direction, payload: &str) -> Self {
        Self {
            timestamp: Local::now(),
            direction,
            payload: escape_control(payload),
        }
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "--- {}",
            self.timestamp.format("%Y-%m-%dT%H:%M:%S%.6f")
        )?;
        writeln!(f, "{}", self.direction.tag())?;
        writeln!(f, "{}", self.payload)
    }
}

/// Append-only destination for transcript records
pub trait ExchangeLog {
    /// Append one record
    fn append(&mut self, entry: &LogEntry) -> io::Result<()>;

    /// Whether records are wanted at all
    ///
    /// Sessions skip building entries when this is false.
    fn is_enabled(&self) -> bool {
        true
    }
}

impl<L: ExchangeLog + ?Sized> ExchangeLog for Box<L> {
    fn append(&mut self, entry: &LogEntry) -> io::Result<()> {
        (**self).append(entry)
    }

    fn is_enabled(&self) -> bool {
        (**self).is_enabled()
    }
}

/// Logging turned off
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLog;

impl ExchangeLog for NullLog {
    fn append(&mut self, _entry: &LogEntry) -> io::Result<()> {
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// Appends records to a text file
#[derive(Debug, Clone)]
pub struct FileLog {
    path: PathBuf,
}

impl FileLog {
    /// Log to `path`, created on first append
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path records are appended to
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_FILE)
    }
}

impl ExchangeLog for FileLog {
    fn append(&mut self, entry: &LogEntry) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(entry.to_string().as_bytes())
    }
}

/// Keeps records in memory
///
/// Clones share the same records, so a clone kept aside can inspect what
/// a session logged.
#[derive(Debug, Clone, Default)]
pub struct MemoryLog {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record so far
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Snapshot of the records for one direction
    pub fn entries_for(&self, direction: Direction) -> Vec<LogEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.direction == direction)
            .collect()
    }
}

impl ExchangeLog for MemoryLog {
    fn append(&mut self, entry: &LogEntry) -> io::Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry.clone());
        Ok(())
    }
}
