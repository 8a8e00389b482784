//! Segment binary format: header, footer and directory-entry layouts.
//!
//! All records here are fixed-size and encoded field by field in explicit
//! little-endian order — never by dumping in-memory struct layout — so the
//! format is portable and each field is independently testable.
//!
//! ## File layout
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ HEADER (64 B): magic | format version | compression |    │
//! │                page size | zero padding                  │
//! ├──────────────────────────────────────────────────────────┤
//! │ TIME-SERIES BLOCKS (4-region compressed columnar rows)   │
//! ├──────────────────────────────────────────────────────────┤
//! │ STATISTICS BLOCKS (raw column-major i64/u64 arrays)      │
//! ├──────────────────────────────────────────────────────────┤
//! │ DELETE BLOCKS (raw column-major i64/u64 arrays)          │
//! ├──────────────────────────────────────────────────────────┤
//! │ BLOOM FILTER (encoded TableBloom)                        │
//! ├──────────────────────────────────────────────────────────┤
//! │ BLOCK DIRECTORY  (flat array of 76 B entries)            │
//! │ STATS DIRECTORY  (flat array of 64 B entries)            │
//! │ DELETE DIRECTORY (flat array of 64 B entries)            │
//! ├──────────────────────────────────────────────────────────┤
//! │ FOOTER (96 B): prev footer | 4 x (offset,size) | magic   │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Directory arrays carry no per-record length prefix; array length is
//! `size / entry_len` and `size % entry_len != 0` is rejected as corrupt.
//! The footer is the sole structured entry point: a file whose trailing 96
//! bytes do not validate is not a sealed segment.

use crate::error::{Result, SegmentError};
use byteorder::{LittleEndian, ReadBytesExt};
use config::Compression;
use memtable::TableId;
use std::io::Cursor;

/// Magic identifying a tidemark segment file header (ASCII "TSG1").
pub const SEGMENT_MAGIC: u32 = 0x5453_4731;

/// Magic terminating a sealed segment footer (ASCII "TFT1").
pub const FOOTER_MAGIC: u32 = 0x5446_5431;

/// Current on-disk format version.
pub const FORMAT_VERSION: u16 = 1;

/// Fixed header size: magic(4) + version(2) + compression(1) + pad(1) +
/// page_size(4) + zero padding to 64.
pub const HEADER_LEN: u64 = 64;

/// Fixed footer size: prev_footer(8) + 4 x FilePtr(16) + reserved(20) +
/// magic(4).
pub const FOOTER_LEN: u64 = 96;

/// Encoded size of one [`BlockDirEntry`].
pub const BLOCK_ENTRY_LEN: u64 = 76;

/// Encoded size of one [`SpanDirEntry`] (statistics and delete dirs).
pub const SPAN_ENTRY_LEN: u64 = 64;

/// Footer dictionary slots, in fixed order.
pub const DICT_BLOOM: usize = 0;
pub const DICT_BLOCK: usize = 1;
pub const DICT_STATS: usize = 2;
pub const DICT_DELETE: usize = 3;

/// A byte range within the segment file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilePtr {
    pub offset: u64,
    pub size: u64,
}

/// Byte range of one time-series block. `key_size` covers the leading
/// regions holding only key columns, so readers can decode keys without
/// touching value columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    pub offset: u64,
    pub key_size: u32,
    pub total_size: u32,
}

/// Directory entry summarizing one time-series block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockDirEntry {
    pub group_id: u64,
    pub min_sub: u64,
    pub max_sub: u64,
    pub min_ts: i64,
    pub max_ts: i64,
    pub min_ver: u64,
    pub max_ver: u64,
    pub rows: u32,
    pub range: BlockRange,
}

impl BlockDirEntry {
    /// `true` if every row in the block belongs to `table`.
    #[must_use]
    pub fn covers_only(&self, table: TableId) -> bool {
        self.group_id == table.group_id
            && self.min_sub == table.sub_id
            && self.max_sub == table.sub_id
    }
}

/// Directory entry summarizing one statistics or delete block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanDirEntry {
    pub min_table: TableId,
    pub max_table: TableId,
    pub min_ver: u64,
    pub max_ver: u64,
    pub rows: u32,
    pub offset: u64,
    pub size: u32,
}

/// Fixed-size trailer record; the entry point into a sealed file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Footer {
    /// Offset of the previous footer for chained files, 0 for none.
    pub prev_footer: u64,
    /// {bloom filter, block dir, stats dir, delete dir} byte ranges.
    pub dict: [FilePtr; 4],
}

pub fn encode_header(out: &mut Vec<u8>, compression: Compression, page_size: u32) {
    out.extend_from_slice(&SEGMENT_MAGIC.to_le_bytes());
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.push(compression.code());
    out.push(0);
    out.extend_from_slice(&page_size.to_le_bytes());
    out.resize(HEADER_LEN as usize, 0);
}

/// Decodes and validates a file header, returning `(compression, page_size)`.
pub fn decode_header(buf: &[u8]) -> Result<(Compression, u32)> {
    let mut rdr = Cursor::new(buf);
    let magic = read_u32(&mut rdr)?;
    if magic != SEGMENT_MAGIC {
        return Err(SegmentError::corrupt(format!(
            "bad header magic {magic:#010x}"
        )));
    }
    let version = read_u16(&mut rdr)?;
    if version != FORMAT_VERSION {
        return Err(SegmentError::corrupt(format!(
            "unsupported format version {version}"
        )));
    }
    let code = read_u8(&mut rdr)?;
    let compression = Compression::from_code(code)
        .ok_or_else(|| SegmentError::corrupt(format!("unknown compression code {code}")))?;
    let _pad = read_u8(&mut rdr)?;
    let page_size = read_u32(&mut rdr)?;
    Ok((compression, page_size))
}

pub fn encode_footer(footer: &Footer, out: &mut Vec<u8>) {
    out.extend_from_slice(&footer.prev_footer.to_le_bytes());
    for ptr in &footer.dict {
        out.extend_from_slice(&ptr.offset.to_le_bytes());
        out.extend_from_slice(&ptr.size.to_le_bytes());
    }
    out.extend_from_slice(&[0u8; 20]);
    out.extend_from_slice(&FOOTER_MAGIC.to_le_bytes());
}

pub fn decode_footer(buf: &[u8]) -> Result<Footer> {
    if buf.len() != FOOTER_LEN as usize {
        return Err(SegmentError::corrupt("footer has wrong length"));
    }
    let magic = u32::from_le_bytes([buf[92], buf[93], buf[94], buf[95]]);
    if magic != FOOTER_MAGIC {
        return Err(SegmentError::corrupt(format!(
            "bad footer magic {magic:#010x}"
        )));
    }
    let mut rdr = Cursor::new(buf);
    let prev_footer = read_u64(&mut rdr)?;
    let mut dict = [FilePtr::default(); 4];
    for ptr in &mut dict {
        ptr.offset = read_u64(&mut rdr)?;
        ptr.size = read_u64(&mut rdr)?;
    }
    Ok(Footer { prev_footer, dict })
}

pub fn encode_block_entry(entry: &BlockDirEntry, out: &mut Vec<u8>) {
    out.extend_from_slice(&entry.group_id.to_le_bytes());
    out.extend_from_slice(&entry.min_sub.to_le_bytes());
    out.extend_from_slice(&entry.max_sub.to_le_bytes());
    out.extend_from_slice(&entry.min_ts.to_le_bytes());
    out.extend_from_slice(&entry.max_ts.to_le_bytes());
    out.extend_from_slice(&entry.min_ver.to_le_bytes());
    out.extend_from_slice(&entry.max_ver.to_le_bytes());
    out.extend_from_slice(&entry.rows.to_le_bytes());
    out.extend_from_slice(&entry.range.offset.to_le_bytes());
    out.extend_from_slice(&entry.range.key_size.to_le_bytes());
    out.extend_from_slice(&entry.range.total_size.to_le_bytes());
}

pub fn decode_block_entry(buf: &[u8]) -> Result<BlockDirEntry> {
    let mut rdr = Cursor::new(buf);
    Ok(BlockDirEntry {
        group_id: read_u64(&mut rdr)?,
        min_sub: read_u64(&mut rdr)?,
        max_sub: read_u64(&mut rdr)?,
        min_ts: read_i64(&mut rdr)?,
        max_ts: read_i64(&mut rdr)?,
        min_ver: read_u64(&mut rdr)?,
        max_ver: read_u64(&mut rdr)?,
        rows: read_u32(&mut rdr)?,
        range: BlockRange {
            offset: read_u64(&mut rdr)?,
            key_size: read_u32(&mut rdr)?,
            total_size: read_u32(&mut rdr)?,
        },
    })
}

pub fn encode_span_entry(entry: &SpanDirEntry, out: &mut Vec<u8>) {
    out.extend_from_slice(&entry.min_table.group_id.to_le_bytes());
    out.extend_from_slice(&entry.min_table.sub_id.to_le_bytes());
    out.extend_from_slice(&entry.max_table.group_id.to_le_bytes());
    out.extend_from_slice(&entry.max_table.sub_id.to_le_bytes());
    out.extend_from_slice(&entry.min_ver.to_le_bytes());
    out.extend_from_slice(&entry.max_ver.to_le_bytes());
    out.extend_from_slice(&entry.rows.to_le_bytes());
    out.extend_from_slice(&entry.offset.to_le_bytes());
    out.extend_from_slice(&entry.size.to_le_bytes());
}

pub fn decode_span_entry(buf: &[u8]) -> Result<SpanDirEntry> {
    let mut rdr = Cursor::new(buf);
    Ok(SpanDirEntry {
        min_table: TableId::new(read_u64(&mut rdr)?, read_u64(&mut rdr)?),
        max_table: TableId::new(read_u64(&mut rdr)?, read_u64(&mut rdr)?),
        min_ver: read_u64(&mut rdr)?,
        max_ver: read_u64(&mut rdr)?,
        rows: read_u32(&mut rdr)?,
        offset: read_u64(&mut rdr)?,
        size: read_u32(&mut rdr)?,
    })
}

// Cursor reads over validated fixed-size slices; EOF means truncation.

fn read_u8(rdr: &mut Cursor<&[u8]>) -> Result<u8> {
    rdr.read_u8().map_err(truncated)
}

fn read_u16(rdr: &mut Cursor<&[u8]>) -> Result<u16> {
    rdr.read_u16::<LittleEndian>().map_err(truncated)
}

fn read_u32(rdr: &mut Cursor<&[u8]>) -> Result<u32> {
    rdr.read_u32::<LittleEndian>().map_err(truncated)
}

fn read_u64(rdr: &mut Cursor<&[u8]>) -> Result<u64> {
    rdr.read_u64::<LittleEndian>().map_err(truncated)
}

fn read_i64(rdr: &mut Cursor<&[u8]>) -> Result<i64> {
    rdr.read_i64::<LittleEndian>().map_err(truncated)
}

fn truncated(_: std::io::Error) -> SegmentError {
    SegmentError::corrupt("truncated record")
}
