//! Byte-range file service.
//!
//! Thin wrapper around a [`File`] exposing positioned reads and
//! size-tracked appends. The writer always writes at the tracked `size`
//! offset and advances it by the exact bytes written, so segment files are
//! effectively append-only even though every call addresses an absolute
//! offset. Every failure carries the operation and offset.

use crate::error::{Result, SegmentError};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::error;

/// An open segment file handle with a tracked logical size.
#[derive(Debug)]
pub struct SegFile {
    file: File,
    size: u64,
}

impl SegFile {
    /// Creates (or truncates) a writable segment file.
    pub fn create(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(true)
            .open(path)
            .map_err(|source| io_err("open", 0, source))?;
        Ok(Self { file, size: 0 })
    }

    /// Opens an existing segment file for reading.
    pub fn open_readonly(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|source| io_err("open", 0, source))?;
        let size = file
            .metadata()
            .map_err(|source| io_err("stat", 0, source))?
            .len();
        Ok(Self { file, size })
    }

    /// Current logical file size (the next append offset).
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Writes `buf` at the current size offset and advances the size.
    /// Returns the offset the buffer was written at.
    pub fn append(&mut self, buf: &[u8]) -> Result<u64> {
        let offset = self.size;
        self.file
            .seek(SeekFrom::Start(offset))
            .and_then(|_| self.file.write_all(buf))
            .map_err(|source| io_err("write", offset, source))?;
        self.size += buf.len() as u64;
        Ok(offset)
    }

    /// Reads exactly `buf.len()` bytes starting at `offset`.
    pub fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(offset))
            .and_then(|_| self.file.read_exact(buf))
            .map_err(|source| io_err("read", offset, source))
    }

    /// Flushes file contents to stable storage.
    pub fn sync(&mut self) -> Result<()> {
        self.file
            .sync_all()
            .map_err(|source| io_err("fsync", self.size, source))
    }
}

fn io_err(op: &'static str, offset: u64, source: std::io::Error) -> SegmentError {
    error!(op, offset, %source, "segment file operation failed");
    SegmentError::Io { op, offset, source }
}
