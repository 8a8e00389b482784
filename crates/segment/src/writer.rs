//! Segment file writer.
//!
//! Rows arrive grouped by table with non-decreasing timestamps per table.
//! The writer buffers them column-wise, flushes a block whenever the buffer
//! reaches the configured row threshold or the table changes, and tracks a
//! running statistics entry per table run. `close` writes the bloom filter,
//! the three directory arrays and the footer, then fsyncs; until then the
//! file has no valid footer and readers reject it.

use crate::block::{DeleteBlock, RowBlock, StatsBlock};
use crate::codec::{encode_block, ScratchBuffers};
use crate::error::{Result, SegmentError};
use crate::format::{
    encode_block_entry, encode_footer, encode_header, encode_span_entry, BlockDirEntry,
    BlockRange, FilePtr, Footer, SpanDirEntry, DICT_BLOCK, DICT_BLOOM, DICT_DELETE, DICT_STATS,
};
use crate::fsio::SegFile;
use bloom::TableBloom;
use config::SegmentConfig;
use memtable::{DeleteRange, Row, SchemaCache, SchemaError, TableId};
use tracing::debug;

/// Streaming writer for one segment file.
///
/// The schema cache is borrowed for the writer's whole lifetime; the caller
/// registers schemas up front and can inspect `versions_seen` afterwards.
pub struct SegmentWriter<'c> {
    file: SegFile,
    config: SegmentConfig,
    schemas: &'c mut SchemaCache,
    block: Option<RowBlock>,
    stats: StatsBlock,
    deletes: DeleteBlock,
    bloom: TableBloom,
    scratch: ScratchBuffers,
    buf: Vec<u8>,
    block_dir: Vec<BlockDirEntry>,
    stats_dir: Vec<SpanDirEntry>,
    delete_dir: Vec<SpanDirEntry>,
    closed: bool,
}

impl<'c> SegmentWriter<'c> {
    /// Creates the segment file, writes its header and allocates the row
    /// buffers.
    pub fn open(config: SegmentConfig, schemas: &'c mut SchemaCache) -> Result<Self> {
        let mut file = SegFile::create(&config.path)?;
        let mut buf = Vec::new();
        encode_header(&mut buf, config.compression, config.page_size);
        file.append(&buf)?;

        let stats = StatsBlock::new(config.max_rows)?;
        let deletes = DeleteBlock::new(config.max_rows)?;
        let bloom = TableBloom::new(config.max_rows, config.bloom_fpr);
        Ok(Self {
            file,
            config,
            schemas,
            block: None,
            stats,
            deletes,
            bloom,
            scratch: ScratchBuffers::new(),
            buf,
            block_dir: Vec::new(),
            stats_dir: Vec::new(),
            delete_dir: Vec::new(),
            closed: false,
        })
    }

    /// Appends one time-series row.
    ///
    /// Within a table, timestamps must not decrease; a smaller timestamp is
    /// [`SegmentError::OrderingViolation`] and the row is not written.
    pub fn append_row(&mut self, table: TableId, row: &Row) -> Result<()> {
        if self.closed {
            return Err(SegmentError::AlreadyClosed);
        }

        let switching = self.block.as_ref().map_or(true, |b| b.table() != table);
        if switching {
            // Resolve and validate before touching any buffer so a schema or
            // allocation failure leaves the writer consistent.
            let schema = self.schemas.update_table_schema(table)?.clone();
            self.schemas.update_row_schema(table, row.schema_version)?;
            if !schema.matches(&row.values) {
                return Err(SchemaError::ColumnMismatch {
                    table,
                    version: schema.version,
                }
                .into());
            }
            let mut block = RowBlock::new(table, schema, self.config.max_rows)?;

            self.flush_row_block()?;
            if self.stats.len() >= self.config.max_rows {
                self.flush_stats()?;
            }
            // The opening entry already accounts for this first row.
            self.stats.open_entry(table, row.ts, row.version);
            self.bloom.insert(table.group_id, table.sub_id);
            block.push(row);
            self.block = Some(block);
        } else {
            // The row's declared version must exist; its values must fit the
            // block's active schema (rows of older layouts cannot share the
            // columnar buffer).
            self.schemas.update_row_schema(table, row.schema_version)?;
            let block = self
                .block
                .as_mut()
                .expect("row block exists when not switching");
            if !block.schema().matches(&row.values) {
                return Err(SchemaError::ColumnMismatch {
                    table,
                    version: block.schema().version,
                }
                .into());
            }
            self.stats.advance_tail(table, row.ts, row.version)?;
            block.push(row);
        }

        if self
            .block
            .as_ref()
            .map_or(false, |b| b.len() >= self.config.max_rows)
        {
            self.flush_row_block()?;
        }
        Ok(())
    }

    /// Appends one delete range.
    pub fn append_delete(&mut self, table: TableId, range: &DeleteRange) -> Result<()> {
        if self.closed {
            return Err(SegmentError::AlreadyClosed);
        }
        self.bloom.insert(table.group_id, table.sub_id);
        self.deletes.push(table, range);
        if self.deletes.len() >= self.config.max_rows {
            self.flush_deletes()?;
        }
        Ok(())
    }

    /// Flushes everything pending, writes bloom filter, directories and
    /// footer, fsyncs, and seals the writer. Any further call returns
    /// [`SegmentError::AlreadyClosed`].
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Err(SegmentError::AlreadyClosed);
        }
        self.flush_row_block()?;
        self.flush_stats()?;
        self.flush_deletes()?;

        self.buf.clear();
        self.bloom.encode_into(&mut self.buf);
        let bloom_ptr = FilePtr {
            offset: self.file.append(&self.buf)?,
            size: self.buf.len() as u64,
        };

        self.buf.clear();
        for entry in &self.block_dir {
            encode_block_entry(entry, &mut self.buf);
        }
        let block_ptr = FilePtr {
            offset: self.file.append(&self.buf)?,
            size: self.buf.len() as u64,
        };

        self.buf.clear();
        for entry in &self.stats_dir {
            encode_span_entry(entry, &mut self.buf);
        }
        let stats_ptr = FilePtr {
            offset: self.file.append(&self.buf)?,
            size: self.buf.len() as u64,
        };

        self.buf.clear();
        for entry in &self.delete_dir {
            encode_span_entry(entry, &mut self.buf);
        }
        let delete_ptr = FilePtr {
            offset: self.file.append(&self.buf)?,
            size: self.buf.len() as u64,
        };

        let mut footer = Footer {
            prev_footer: self.config.prev_footer,
            dict: [FilePtr::default(); 4],
        };
        footer.dict[DICT_BLOOM] = bloom_ptr;
        footer.dict[DICT_BLOCK] = block_ptr;
        footer.dict[DICT_STATS] = stats_ptr;
        footer.dict[DICT_DELETE] = delete_ptr;
        self.buf.clear();
        encode_footer(&footer, &mut self.buf);
        self.file.append(&self.buf)?;
        self.file.sync()?;

        debug!(
            path = %self.config.path.display(),
            blocks = self.block_dir.len(),
            stats_blocks = self.stats_dir.len(),
            delete_blocks = self.delete_dir.len(),
            bytes = self.file.size(),
            "sealed segment"
        );
        self.closed = true;
        Ok(())
    }

    fn flush_row_block(&mut self) -> Result<()> {
        let Some(block) = self.block.as_mut() else {
            return Ok(());
        };
        if block.is_empty() {
            return Ok(());
        }
        let summary = block.summary();
        let key_size = encode_block(block, self.config.compression, &mut self.scratch);
        let encoded = self.scratch.encoded();
        let total_size = encoded.len() as u32;
        let offset = self.file.append(encoded)?;
        self.block_dir.push(BlockDirEntry {
            group_id: block.table().group_id,
            min_sub: summary.min_sub,
            max_sub: summary.max_sub,
            min_ts: summary.min_ts,
            max_ts: summary.max_ts,
            min_ver: summary.min_ver,
            max_ver: summary.max_ver,
            rows: block.len() as u32,
            range: BlockRange {
                offset,
                key_size,
                total_size,
            },
        });
        block.clear();
        Ok(())
    }

    fn flush_stats(&mut self) -> Result<()> {
        if self.stats.is_empty() {
            return Ok(());
        }
        let (min_table, max_table, min_ver, max_ver) = self.stats.summary();
        self.buf.clear();
        self.stats.encode_into(&mut self.buf);
        let offset = self.file.append(&self.buf)?;
        self.stats_dir.push(SpanDirEntry {
            min_table,
            max_table,
            min_ver,
            max_ver,
            rows: self.stats.len() as u32,
            offset,
            size: self.buf.len() as u32,
        });
        self.stats.clear();
        Ok(())
    }

    fn flush_deletes(&mut self) -> Result<()> {
        if self.deletes.is_empty() {
            return Ok(());
        }
        let (min_table, max_table, min_ver, max_ver) = self.deletes.summary();
        self.buf.clear();
        self.deletes.encode_into(&mut self.buf);
        let offset = self.file.append(&self.buf)?;
        self.delete_dir.push(SpanDirEntry {
            min_table,
            max_table,
            min_ver,
            max_ver,
            rows: self.deletes.len() as u32,
            offset,
            size: self.buf.len() as u32,
        });
        self.deletes.clear();
        Ok(())
    }
}
