//! Segment file reader.
//!
//! All random access starts at the footer. `open` reads the trailing 96
//! bytes; `open_at_footer` follows a chained footer at an explicit end
//! offset. Directory arrays and the bloom filter are loaded eagerly (they
//! are small); block payloads are read on demand.

use crate::block::{decode_delete_rows, decode_stats_rows, DeleteEntry, StatsEntry};
use crate::codec::{decode_block, decode_block_keys, BlockKeys, BlockRows};
use crate::error::{Result, SegmentError};
use crate::format::{
    decode_block_entry, decode_footer, decode_header, decode_span_entry, BlockDirEntry, FilePtr,
    Footer, SpanDirEntry, BLOCK_ENTRY_LEN, DICT_BLOCK, DICT_BLOOM, DICT_DELETE, DICT_STATS,
    FOOTER_LEN, HEADER_LEN, SPAN_ENTRY_LEN,
};
use crate::fsio::SegFile;
use bloom::TableBloom;
use config::Compression;
use memtable::TableId;
use std::path::Path;

/// Random-access reader over one sealed segment.
pub struct SegmentReader {
    file: SegFile,
    compression: Compression,
    page_size: u32,
    footer: Footer,
    block_dir: Vec<BlockDirEntry>,
    stats_dir: Vec<SpanDirEntry>,
    delete_dir: Vec<SpanDirEntry>,
    bloom: Option<TableBloom>,
}

impl SegmentReader {
    /// Opens a sealed segment, reading the footer at the end of the file.
    pub fn open(path: &Path) -> Result<Self> {
        let file = SegFile::open_readonly(path)?;
        let end = file.size();
        Self::load(file, end)
    }

    /// Opens a segment at a chained footer ending at `footer_end`. Used to
    /// walk `prev_footer` links in files that were extended in place.
    pub fn open_at_footer(path: &Path, footer_end: u64) -> Result<Self> {
        let file = SegFile::open_readonly(path)?;
        Self::load(file, footer_end)
    }

    fn load(mut file: SegFile, footer_end: u64) -> Result<Self> {
        if footer_end < HEADER_LEN + FOOTER_LEN || footer_end > file.size() {
            return Err(SegmentError::corrupt("file too small for a footer"));
        }

        let mut buf = vec![0u8; HEADER_LEN as usize];
        file.read_at(0, &mut buf)?;
        let (compression, page_size) = decode_header(&buf)?;

        let mut buf = vec![0u8; FOOTER_LEN as usize];
        file.read_at(footer_end - FOOTER_LEN, &mut buf)?;
        let footer = decode_footer(&buf)?;

        let data_end = footer_end - FOOTER_LEN;
        for ptr in &footer.dict {
            if ptr.size > 0 && (ptr.offset < HEADER_LEN || ptr.offset + ptr.size > data_end) {
                return Err(SegmentError::corrupt("directory range out of bounds"));
            }
        }

        let block_dir = read_dir(&mut file, footer.dict[DICT_BLOCK], BLOCK_ENTRY_LEN, |b| {
            decode_block_entry(b)
        })?;
        let stats_dir = read_dir(&mut file, footer.dict[DICT_STATS], SPAN_ENTRY_LEN, |b| {
            decode_span_entry(b)
        })?;
        let delete_dir = read_dir(&mut file, footer.dict[DICT_DELETE], SPAN_ENTRY_LEN, |b| {
            decode_span_entry(b)
        })?;

        let bloom_ptr = footer.dict[DICT_BLOOM];
        let bloom = if bloom_ptr.size > 0 {
            let mut buf = vec![0u8; bloom_ptr.size as usize];
            file.read_at(bloom_ptr.offset, &mut buf)?;
            Some(
                TableBloom::decode(&buf)
                    .map_err(|e| SegmentError::corrupt(format!("bloom filter: {e}")))?,
            )
        } else {
            None
        };

        Ok(Self {
            file,
            compression,
            page_size,
            footer,
            block_dir,
            stats_dir,
            delete_dir,
            bloom,
        })
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Offset of the previous footer in a chained file, 0 for none.
    pub fn prev_footer(&self) -> u64 {
        self.footer.prev_footer
    }

    pub fn block_entries(&self) -> &[BlockDirEntry] {
        &self.block_dir
    }

    pub fn stats_entries(&self) -> &[SpanDirEntry] {
        &self.stats_dir
    }

    pub fn delete_entries(&self) -> &[SpanDirEntry] {
        &self.delete_dir
    }

    /// Bloom-backed table membership. False means the table has no rows and
    /// no deletes in this segment; true may be a false positive.
    pub fn may_contain_table(&self, table: TableId) -> bool {
        self.bloom
            .as_ref()
            .map_or(true, |b| b.may_contain(table.group_id, table.sub_id))
    }

    /// Reads and decodes a full time-series block.
    pub fn read_row_block(&mut self, entry: BlockDirEntry) -> Result<BlockRows> {
        let mut buf = vec![0u8; entry.range.total_size as usize];
        self.file.read_at(entry.range.offset, &mut buf)?;
        let rows = decode_block(&buf)?;
        if rows.len() != entry.rows as usize {
            return Err(SegmentError::corrupt("block row count mismatch"));
        }
        Ok(rows)
    }

    /// Reads and decodes only the key columns of a block, using the leading
    /// `key_size` bytes.
    pub fn read_block_keys(&mut self, entry: BlockDirEntry) -> Result<BlockKeys> {
        let mut buf = vec![0u8; entry.range.key_size as usize];
        self.file.read_at(entry.range.offset, &mut buf)?;
        decode_block_keys(&buf)
    }

    /// Reads and decodes one statistics block.
    pub fn read_stats_block(&mut self, entry: SpanDirEntry) -> Result<Vec<StatsEntry>> {
        let mut buf = vec![0u8; entry.size as usize];
        self.file.read_at(entry.offset, &mut buf)?;
        decode_stats_rows(&buf, entry.rows as usize)
    }

    /// Reads and decodes one delete block.
    pub fn read_delete_block(&mut self, entry: SpanDirEntry) -> Result<Vec<DeleteEntry>> {
        let mut buf = vec![0u8; entry.size as usize];
        self.file.read_at(entry.offset, &mut buf)?;
        decode_delete_rows(&buf, entry.rows as usize)
    }
}

fn read_dir<T>(
    file: &mut SegFile,
    ptr: FilePtr,
    entry_len: u64,
    decode: impl Fn(&[u8]) -> Result<T>,
) -> Result<Vec<T>> {
    if ptr.size == 0 {
        return Ok(Vec::new());
    }
    if ptr.size % entry_len != 0 {
        return Err(SegmentError::corrupt("directory size not a whole record"));
    }
    let mut buf = vec![0u8; ptr.size as usize];
    file.read_at(ptr.offset, &mut buf)?;
    buf.chunks_exact(entry_len as usize).map(decode).collect()
}
