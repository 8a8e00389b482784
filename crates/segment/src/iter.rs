//! Row iterators over the three physical sources.
//!
//! A [`RowIter`] walks exactly one source (sealed segment, sealed row file,
//! or live memtable) in strictly ascending row-key order. `next` advances
//! and `get` exposes the current row until the next advance, so a merger
//! can peek without consuming.

use crate::codec::BlockRows;
use crate::error::Result;
use crate::format::BlockDirEntry;
use crate::reader::SegmentReader;
use memtable::{MemRow, Memtable, Row, RowKey, TableId};
use rowfile::RowFileReader;
use std::collections::btree_map::Range;

/// One row with its table identity, as produced by iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct RowInfo {
    pub table: TableId,
    pub row: Row,
}

impl RowInfo {
    /// Full identity key of this row.
    #[must_use]
    pub fn key(&self) -> RowKey {
        RowKey::new(self.table, self.row.ts, self.row.version)
    }
}

struct SegmentSource {
    reader: SegmentReader,
    /// Next directory index to load.
    next_block: usize,
    /// Group id of the loaded block's directory entry.
    group: u64,
    block: Option<BlockRows>,
    /// Next row index within the loaded block.
    row: usize,
}

enum Source<'a> {
    Segment(SegmentSource),
    RowFile(RowFileReader),
    Memtable {
        memt: &'a Memtable,
        cursor: Range<'a, RowKey, MemRow>,
    },
}

/// Forward iterator over one row source.
///
/// Freshly constructed iterators hold no current row; the first `next`
/// produces the source's smallest key.
pub struct RowIter<'a> {
    source: Source<'a>,
    current: Option<RowInfo>,
}

impl<'a> RowIter<'a> {
    /// Iterates a sealed segment in directory order.
    pub fn from_segment(reader: SegmentReader) -> RowIter<'a> {
        RowIter {
            source: Source::Segment(SegmentSource {
                reader,
                next_block: 0,
                group: 0,
                block: None,
                row: 0,
            }),
            current: None,
        }
    }

    /// Iterates a sealed row file front to back.
    pub fn from_rowfile(reader: RowFileReader) -> RowIter<'a> {
        RowIter {
            source: Source::RowFile(reader),
            current: None,
        }
    }

    /// Iterates a memtable starting at the first key `>= from`.
    pub fn from_memtable(memt: &'a Memtable, from: RowKey) -> RowIter<'a> {
        let cursor = memt.range_from(from);
        RowIter {
            source: Source::Memtable { memt, cursor },
            current: None,
        }
    }

    /// Advances to the next row, returning it, or `None` once exhausted.
    pub fn next(&mut self) -> Result<Option<&RowInfo>> {
        self.current = self.source.advance()?;
        Ok(self.current.as_ref())
    }

    /// The row produced by the last `next`, if any.
    pub fn get(&self) -> Option<&RowInfo> {
        self.current.as_ref()
    }

    /// Skips every remaining row of `table`, leaving the iterator on the
    /// first row past the table.
    ///
    /// Only effective when the current row belongs to `table`; otherwise the
    /// source holds no rows of `table` at or before its position and the
    /// call is a no-op.
    pub fn skip_table(&mut self, table: TableId) -> Result<()> {
        if self.current.as_ref().map_or(true, |c| c.table != table) {
            return Ok(());
        }
        match &mut self.source {
            Source::Segment(seg) => seg.skip_table(table),
            Source::RowFile(rdr) => rdr.seek_past_table(table)?,
            Source::Memtable { memt, cursor } => *cursor = memt.range_after_table(table),
        }
        self.current = self.source.advance()?;
        Ok(())
    }
}

impl Source<'_> {
    fn advance(&mut self) -> Result<Option<RowInfo>> {
        match self {
            Source::Segment(seg) => seg.advance(),
            Source::RowFile(rdr) => Ok(rdr.next_row()?.map(|(table, row)| RowInfo { table, row })),
            Source::Memtable { cursor, .. } => Ok(cursor.next().map(|(key, mem)| RowInfo {
                table: key.table,
                row: Row {
                    ts: key.ts,
                    version: key.version,
                    schema_version: mem.schema_version,
                    values: mem.values.clone(),
                },
            })),
        }
    }
}

impl SegmentSource {
    fn advance(&mut self) -> Result<Option<RowInfo>> {
        loop {
            if let Some(block) = &self.block {
                if self.row < block.len() {
                    let i = self.row;
                    self.row += 1;
                    let table = TableId::new(self.group, block.keys.sub_ids[i]);
                    let values = block.columns.iter().map(|c| c.value_at(i)).collect();
                    return Ok(Some(RowInfo {
                        table,
                        row: Row {
                            ts: block.keys.timestamps[i],
                            version: block.keys.versions[i],
                            schema_version: block.keys.schema_version,
                            values,
                        },
                    }));
                }
                self.block = None;
            }
            let Some(&entry) = self.reader.block_entries().get(self.next_block) else {
                return Ok(None);
            };
            self.next_block += 1;
            self.group = entry.group_id;
            self.block = Some(self.reader.read_row_block(entry)?);
            self.row = 0;
        }
    }

    /// Drops the loaded block and steps the directory cursor past every
    /// entry covering only `table`. Blocks of one table are contiguous in
    /// the directory because the writer flushes on table change.
    fn skip_table(&mut self, table: TableId) {
        self.block = None;
        while self
            .entries_at(self.next_block)
            .map_or(false, |e| e.covers_only(table))
        {
            self.next_block += 1;
        }
    }

    fn entries_at(&self, idx: usize) -> Option<&BlockDirEntry> {
        self.reader.block_entries().get(idx)
    }
}
