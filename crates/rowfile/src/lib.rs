//! # Row file — sealed sequential row log
//!
//! A row file is the flat "data file" source the iterator layer can merge
//! alongside segment files and the memtable: a run of CRC-framed row
//! records in strictly ascending key order, sealed by a per-table index and
//! a fixed trailer. Bulk loaders produce row files cheaply (pure appends,
//! no columnar buffering) and the engine later converts them into proper
//! segment files.
//!
//! ## Binary layout
//!
//! ```text
//! [record ...][table index][trailer]
//!
//! record:  [record_len: u32 LE][crc32: u32 LE][body ...]
//! body:    [group: u64][sub: u64][ts: i64][version: u64]
//!          [schema_version: u32][ncols: u16]
//!          per column: [kind: u8][payload]
//! index:   per table, in file order:
//!          [group: u64][sub: u64][first_record_offset: u64][row_count: u32]
//! trailer: [index_offset: u64][record_count: u64][index_len: u32][magic: u32]
//! ```
//!
//! `record_len` includes the 4-byte CRC but not itself; the CRC covers the
//! body. Column payloads: `I64`/`F64` are 8 LE bytes, `Bytes` is
//! `[len: u32][bytes]`.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crc32fast::Hasher as Crc32;
use memtable::{ColumnValue, Row, RowKey, TableId};
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom, Write};
use std::path::Path;
use thiserror::Error;
use tracing::error;

/// Magic sealing a finished row file (ASCII "RWF1").
pub const ROWFILE_MAGIC: u32 = 0x5257_4631;

/// Trailer size: index_offset(8) + record_count(8) + index_len(4) + magic(4).
pub const TRAILER_LEN: u64 = 24;

/// Encoded size of one table index entry.
pub const INDEX_ENTRY_LEN: u64 = 8 + 8 + 8 + 4;

/// Reject framed records above this size as corruption.
const MAX_RECORD_LEN: u32 = 64 * 1024 * 1024;

/// Errors from row file operations.
#[derive(Debug, Error)]
pub enum RowFileError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Bad magic, bad framing, CRC mismatch, or an unknown column kind.
    #[error("corrupt row file: {0}")]
    Corrupt(&'static str),

    /// A record was appended out of ascending key order.
    #[error("row {got:?} appended after {prev:?}; keys must strictly ascend")]
    OutOfOrder { prev: RowKey, got: RowKey },
}

/// One table's entry in the seek index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableIndexEntry {
    pub table: TableId,
    /// Offset of the table's first record.
    pub offset: u64,
    pub rows: u32,
}

/// Appends rows in key order and seals the file with index + trailer.
pub struct RowFileWriter {
    file: File,
    offset: u64,
    /// Reusable frame buffer; cleared per append, allocation kept.
    buf: Vec<u8>,
    index: Vec<TableIndexEntry>,
    last_key: Option<RowKey>,
    nrows: u64,
}

impl RowFileWriter {
    /// Creates (or truncates) a row file at `path`.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, RowFileError> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        Ok(Self {
            file,
            offset: 0,
            buf: Vec::with_capacity(256),
            index: Vec::new(),
            last_key: None,
            nrows: 0,
        })
    }

    /// Appends one row. Keys must strictly ascend across the whole file;
    /// a violation returns [`RowFileError::OutOfOrder`] and writes nothing.
    pub fn append(&mut self, table: TableId, row: &Row) -> Result<(), RowFileError> {
        let key = RowKey::new(table, row.ts, row.version);
        if let Some(prev) = self.last_key {
            if key <= prev {
                return Err(RowFileError::OutOfOrder { prev, got: key });
            }
        }

        // Frame header placeholder, filled in once the body length is known.
        self.buf.clear();
        self.buf.extend_from_slice(&[0u8; 8]);

        self.buf.write_u64::<LittleEndian>(table.group_id)?;
        self.buf.write_u64::<LittleEndian>(table.sub_id)?;
        self.buf.write_i64::<LittleEndian>(row.ts)?;
        self.buf.write_u64::<LittleEndian>(row.version)?;
        self.buf.write_u32::<LittleEndian>(row.schema_version)?;
        self.buf.write_u16::<LittleEndian>(row.values.len() as u16)?;
        for value in &row.values {
            match value {
                ColumnValue::I64(v) => {
                    self.buf.write_u8(0)?;
                    self.buf.write_i64::<LittleEndian>(*v)?;
                }
                ColumnValue::F64(v) => {
                    self.buf.write_u8(1)?;
                    self.buf.write_f64::<LittleEndian>(*v)?;
                }
                ColumnValue::Bytes(b) => {
                    self.buf.write_u8(2)?;
                    self.buf.write_u32::<LittleEndian>(b.len() as u32)?;
                    self.buf.extend_from_slice(b);
                }
            }
        }

        let body = &self.buf[8..];
        let mut hasher = Crc32::new();
        hasher.update(body);
        let crc = hasher.finalize();
        let record_len = body.len() as u32 + 4;
        self.buf[0..4].copy_from_slice(&record_len.to_le_bytes());
        self.buf[4..8].copy_from_slice(&crc.to_le_bytes());

        self.file.write_all(&self.buf)?;

        match self.index.last_mut() {
            Some(entry) if entry.table == table => entry.rows += 1,
            _ => self.index.push(TableIndexEntry {
                table,
                offset: self.offset,
                rows: 1,
            }),
        }

        self.offset += self.buf.len() as u64;
        self.last_key = Some(key);
        self.nrows += 1;
        Ok(())
    }

    /// Writes the table index and trailer, fsyncs, and seals the file.
    pub fn finish(mut self) -> Result<(), RowFileError> {
        let index_offset = self.offset;
        self.buf.clear();
        for entry in &self.index {
            self.buf.write_u64::<LittleEndian>(entry.table.group_id)?;
            self.buf.write_u64::<LittleEndian>(entry.table.sub_id)?;
            self.buf.write_u64::<LittleEndian>(entry.offset)?;
            self.buf.write_u32::<LittleEndian>(entry.rows)?;
        }
        let index_len = self.buf.len() as u32;
        self.buf.write_u64::<LittleEndian>(index_offset)?;
        self.buf.write_u64::<LittleEndian>(self.nrows)?;
        self.buf.write_u32::<LittleEndian>(index_len)?;
        self.buf.write_u32::<LittleEndian>(ROWFILE_MAGIC)?;

        self.file.write_all(&self.buf)?;
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }
}

/// Sequential reader over a sealed row file, with index-backed table seek.
pub struct RowFileReader {
    rdr: BufReader<File>,
    /// Byte position of the next unread record.
    pos: u64,
    index_offset: u64,
    nrows: u64,
    index: Vec<TableIndexEntry>,
}

impl RowFileReader {
    /// Opens a sealed row file, validating the trailer and loading the
    /// table index.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, RowFileError> {
        let mut file = File::open(path)?;
        let filesize = file.seek(SeekFrom::End(0))?;
        if filesize < TRAILER_LEN {
            return Err(RowFileError::Corrupt("file smaller than trailer"));
        }

        file.seek(SeekFrom::End(-(TRAILER_LEN as i64)))?;
        let index_offset = file.read_u64::<LittleEndian>()?;
        let nrows = file.read_u64::<LittleEndian>()?;
        let index_len = file.read_u32::<LittleEndian>()? as u64;
        let magic = file.read_u32::<LittleEndian>()?;

        if magic != ROWFILE_MAGIC {
            return Err(RowFileError::Corrupt("bad trailer magic"));
        }
        if index_len % INDEX_ENTRY_LEN != 0
            || index_offset
                .checked_add(index_len)
                .map_or(true, |end| end != filesize - TRAILER_LEN)
        {
            error!(index_offset, index_len, filesize, "row file index out of bounds");
            return Err(RowFileError::Corrupt("index out of bounds"));
        }

        file.seek(SeekFrom::Start(index_offset))?;
        let mut index = Vec::with_capacity((index_len / INDEX_ENTRY_LEN) as usize);
        for _ in 0..index_len / INDEX_ENTRY_LEN {
            let group_id = file.read_u64::<LittleEndian>()?;
            let sub_id = file.read_u64::<LittleEndian>()?;
            let offset = file.read_u64::<LittleEndian>()?;
            let rows = file.read_u32::<LittleEndian>()?;
            index.push(TableIndexEntry {
                table: TableId::new(group_id, sub_id),
                offset,
                rows,
            });
        }

        file.seek(SeekFrom::Start(0))?;
        Ok(Self {
            rdr: BufReader::new(file),
            pos: 0,
            index_offset,
            nrows,
            index,
        })
    }

    /// Total rows in the file, from the trailer.
    pub fn row_count(&self) -> u64 {
        self.nrows
    }

    /// The per-table seek index, in file order.
    pub fn tables(&self) -> &[TableIndexEntry] {
        &self.index
    }

    /// Reads the next record, or `None` once positioned at the index.
    ///
    /// Every record's CRC is verified; a mismatch in a sealed file is
    /// [`RowFileError::Corrupt`].
    pub fn next_row(&mut self) -> Result<Option<(TableId, Row)>, RowFileError> {
        if self.pos >= self.index_offset {
            return Ok(None);
        }

        let record_len = self.rdr.read_u32::<LittleEndian>()?;
        if record_len <= 4
            || record_len > MAX_RECORD_LEN
            || self.pos + 4 + record_len as u64 > self.index_offset
        {
            error!(pos = self.pos, record_len, "row record framing out of bounds");
            return Err(RowFileError::Corrupt("record framing out of bounds"));
        }
        let stored_crc = self.rdr.read_u32::<LittleEndian>()?;

        let body_len = (record_len - 4) as usize;
        let mut body = vec![0u8; body_len];
        self.rdr.read_exact(&mut body)?;

        let mut hasher = Crc32::new();
        hasher.update(&body);
        if hasher.finalize() != stored_crc {
            error!(pos = self.pos, "row record crc mismatch");
            return Err(RowFileError::Corrupt("record crc mismatch"));
        }

        self.pos += 8 + body_len as u64;
        let (table, row) = decode_body(&body)?;
        Ok(Some((table, row)))
    }

    /// Positions the reader past every remaining record of `table`.
    ///
    /// Uses the table index for a single forward seek; never moves
    /// backwards, so tables already passed are unaffected.
    pub fn seek_past_table(&mut self, table: TableId) -> Result<(), RowFileError> {
        let Some(i) = self.index.iter().position(|e| e.table == table) else {
            return Ok(());
        };
        let target = match self.index.get(i + 1) {
            Some(next) => next.offset,
            None => self.index_offset,
        };
        if target > self.pos {
            self.rdr.seek(SeekFrom::Start(target))?;
            self.pos = target;
        }
        Ok(())
    }
}

fn decode_body(body: &[u8]) -> Result<(TableId, Row), RowFileError> {
    let mut rdr = Cursor::new(body);
    let group_id = rdr.read_u64::<LittleEndian>()?;
    let sub_id = rdr.read_u64::<LittleEndian>()?;
    let ts = rdr.read_i64::<LittleEndian>()?;
    let version = rdr.read_u64::<LittleEndian>()?;
    let schema_version = rdr.read_u32::<LittleEndian>()?;
    let ncols = rdr.read_u16::<LittleEndian>()?;

    let mut values = Vec::with_capacity(ncols as usize);
    for _ in 0..ncols {
        match rdr.read_u8()? {
            0 => values.push(ColumnValue::I64(rdr.read_i64::<LittleEndian>()?)),
            1 => values.push(ColumnValue::F64(rdr.read_f64::<LittleEndian>()?)),
            2 => {
                let len = rdr.read_u32::<LittleEndian>()? as usize;
                if len > body.len() {
                    return Err(RowFileError::Corrupt("byte column length out of bounds"));
                }
                let mut bytes = vec![0u8; len];
                rdr.read_exact(&mut bytes)?;
                values.push(ColumnValue::Bytes(bytes));
            }
            _ => return Err(RowFileError::Corrupt("unknown column kind")),
        }
    }

    Ok((
        TableId::new(group_id, sub_id),
        Row {
            ts,
            version,
            schema_version,
            values,
        },
    ))
}

#[cfg(test)]
mod tests;
