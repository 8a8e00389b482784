//! Columnar row buffers and their flush-time summaries.
//!
//! The writer owns three accumulators, each bounded by the configured row
//! threshold: a time-series [`RowBlock`] for the table currently being
//! appended, a per-table [`StatsBlock`], and a [`DeleteBlock`]. Statistics
//! and delete blocks are flushed as raw column-major arrays of 8-byte
//! little-endian words; time-series blocks go through the region codec.

use crate::error::{Result, SegmentError};
use byteorder::{LittleEndian, ReadBytesExt};
use memtable::{ColumnKind, ColumnValue, DeleteRange, Row, Schema, TableId};
use std::io::Cursor;

/// One value column stored column-major.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    I64(Vec<i64>),
    F64(Vec<f64>),
    /// Variable-length cells: `offsets[i]` is the end of row `i`'s slice
    /// in `data` (its start is `offsets[i - 1]`, or 0 for the first row).
    Bytes { offsets: Vec<u32>, data: Vec<u8> },
}

impl ColumnData {
    fn with_capacity(kind: ColumnKind, rows: usize) -> Result<Self> {
        Ok(match kind {
            ColumnKind::I64 => ColumnData::I64(try_vec(rows)?),
            ColumnKind::F64 => ColumnData::F64(try_vec(rows)?),
            ColumnKind::Bytes => ColumnData::Bytes {
                offsets: try_vec(rows)?,
                data: Vec::new(),
            },
        })
    }

    fn push(&mut self, value: &ColumnValue) {
        match (self, value) {
            (ColumnData::I64(col), ColumnValue::I64(v)) => col.push(*v),
            (ColumnData::F64(col), ColumnValue::F64(v)) => col.push(*v),
            (ColumnData::Bytes { offsets, data }, ColumnValue::Bytes(b)) => {
                data.extend_from_slice(b);
                offsets.push(data.len() as u32);
            }
            // Kinds are validated against the schema before push.
            _ => unreachable!("column kind mismatch after schema validation"),
        }
    }

    fn clear(&mut self) {
        match self {
            ColumnData::I64(col) => col.clear(),
            ColumnData::F64(col) => col.clear(),
            ColumnData::Bytes { offsets, data } => {
                offsets.clear();
                data.clear();
            }
        }
    }

    /// The value of row `i`.
    #[must_use]
    pub fn value_at(&self, i: usize) -> ColumnValue {
        match self {
            ColumnData::I64(col) => ColumnValue::I64(col[i]),
            ColumnData::F64(col) => ColumnValue::F64(col[i]),
            ColumnData::Bytes { offsets, data } => {
                let start = if i == 0 { 0 } else { offsets[i - 1] as usize };
                ColumnValue::Bytes(data[start..offsets[i] as usize].to_vec())
            }
        }
    }

    #[must_use]
    pub fn kind(&self) -> ColumnKind {
        match self {
            ColumnData::I64(_) => ColumnKind::I64,
            ColumnData::F64(_) => ColumnKind::F64,
            ColumnData::Bytes { .. } => ColumnKind::Bytes,
        }
    }
}

/// Min/max bounds of a row block, computed by one linear scan at flush.
#[derive(Debug, Clone, Copy)]
pub struct BlockSummary {
    pub min_sub: u64,
    pub max_sub: u64,
    pub min_ts: i64,
    pub max_ts: i64,
    pub min_ver: u64,
    pub max_ver: u64,
}

/// Columnar buffer of time-series rows for one table.
#[derive(Debug)]
pub struct RowBlock {
    table: TableId,
    schema: Schema,
    sub_ids: Vec<u64>,
    timestamps: Vec<i64>,
    versions: Vec<u64>,
    columns: Vec<ColumnData>,
}

impl RowBlock {
    /// Allocates a buffer for `table` sized for `capacity` rows.
    pub fn new(table: TableId, schema: Schema, capacity: usize) -> Result<Self> {
        let mut columns = Vec::with_capacity(schema.columns.len());
        for kind in &schema.columns {
            columns.push(ColumnData::with_capacity(*kind, capacity)?);
        }
        Ok(Self {
            table,
            schema,
            sub_ids: try_vec(capacity)?,
            timestamps: try_vec(capacity)?,
            versions: try_vec(capacity)?,
            columns,
        })
    }

    pub fn table(&self) -> TableId {
        self.table
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn sub_ids(&self) -> &[u64] {
        &self.sub_ids
    }

    pub fn timestamps(&self) -> &[i64] {
        &self.timestamps
    }

    pub fn versions(&self) -> &[u64] {
        &self.versions
    }

    pub fn columns(&self) -> &[ColumnData] {
        &self.columns
    }

    /// Appends a row. The caller has already validated `row.values`
    /// against this block's schema.
    pub fn push(&mut self, row: &Row) {
        self.sub_ids.push(self.table.sub_id);
        self.timestamps.push(row.ts);
        self.versions.push(row.version);
        for (col, value) in self.columns.iter_mut().zip(&row.values) {
            col.push(value);
        }
    }

    /// Key bounds over all buffered rows, one pass.
    pub fn summary(&self) -> BlockSummary {
        let mut s = BlockSummary {
            min_sub: self.sub_ids[0],
            max_sub: self.sub_ids[0],
            min_ts: self.timestamps[0],
            max_ts: self.timestamps[0],
            min_ver: self.versions[0],
            max_ver: self.versions[0],
        };
        for i in 1..self.len() {
            s.min_sub = s.min_sub.min(self.sub_ids[i]);
            s.max_sub = s.max_sub.max(self.sub_ids[i]);
            s.min_ts = s.min_ts.min(self.timestamps[i]);
            s.max_ts = s.max_ts.max(self.timestamps[i]);
            s.min_ver = s.min_ver.min(self.versions[i]);
            s.max_ver = s.max_ver.max(self.versions[i]);
        }
        s
    }

    /// Empties the buffer, keeping capacity and table binding.
    pub fn clear(&mut self) {
        self.sub_ids.clear();
        self.timestamps.clear();
        self.versions.clear();
        for col in &mut self.columns {
            col.clear();
        }
    }
}

/// One decoded per-table statistics row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsEntry {
    pub table: TableId,
    pub start_ts: i64,
    pub start_ver: u64,
    pub end_ts: i64,
    pub end_ver: u64,
    pub rows: u64,
}

/// Per-table statistics accumulator: one open entry per table touched
/// since the last flush. Stored as seven parallel columns.
#[derive(Debug)]
pub struct StatsBlock {
    groups: Vec<u64>,
    subs: Vec<u64>,
    start_ts: Vec<i64>,
    start_vers: Vec<u64>,
    end_ts: Vec<i64>,
    end_vers: Vec<u64>,
    counts: Vec<u64>,
}

/// Columns per statistics row on disk.
pub const STATS_COLUMNS: usize = 7;

/// Columns per delete row on disk.
pub const DELETE_COLUMNS: usize = 5;

impl StatsBlock {
    /// One spare slot beyond `capacity`: a table switch appends the new
    /// entry before the at-threshold buffer is flushed on the next switch.
    pub fn new(capacity: usize) -> Result<Self> {
        let cap = capacity + 1;
        Ok(Self {
            groups: try_vec(cap)?,
            subs: try_vec(cap)?,
            start_ts: try_vec(cap)?,
            start_vers: try_vec(cap)?,
            end_ts: try_vec(cap)?,
            end_vers: try_vec(cap)?,
            counts: try_vec(cap)?,
        })
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Opens a fresh entry for `table` starting at `(ts, version)`.
    pub fn open_entry(&mut self, table: TableId, ts: i64, version: u64) {
        self.groups.push(table.group_id);
        self.subs.push(table.sub_id);
        self.start_ts.push(ts);
        self.start_vers.push(version);
        self.end_ts.push(ts);
        self.end_vers.push(version);
        self.counts.push(1);
    }

    /// Advances the open entry's end bound with a newly appended row.
    ///
    /// A greater timestamp moves the end forward and counts the row; an
    /// equal timestamp only overwrites the end version (same point, newer
    /// write); a smaller timestamp is the caller's ordering violation.
    pub fn advance_tail(&mut self, table: TableId, ts: i64, version: u64) -> Result<()> {
        let last = self.len() - 1;
        if ts > self.end_ts[last] {
            self.end_ts[last] = ts;
            self.end_vers[last] = version;
            self.counts[last] += 1;
        } else if ts == self.end_ts[last] {
            self.end_vers[last] = version;
        } else {
            return Err(SegmentError::OrderingViolation {
                table,
                have: self.end_ts[last],
                got: ts,
            });
        }
        Ok(())
    }

    /// `(min_table, max_table, min_ver, max_ver)` over all entries.
    /// Entries arrive in table order, so the bounds are first/last.
    pub fn summary(&self) -> (TableId, TableId, u64, u64) {
        let last = self.len() - 1;
        let mut min_ver = self.start_vers[0];
        let mut max_ver = self.start_vers[0];
        for i in 0..self.len() {
            min_ver = min_ver.min(self.start_vers[i]).min(self.end_vers[i]);
            max_ver = max_ver.max(self.start_vers[i]).max(self.end_vers[i]);
        }
        (
            TableId::new(self.groups[0], self.subs[0]),
            TableId::new(self.groups[last], self.subs[last]),
            min_ver,
            max_ver,
        )
    }

    /// Appends the column-major on-disk encoding to `out`.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.reserve(self.len() * STATS_COLUMNS * 8);
        extend_u64s(out, &self.groups);
        extend_u64s(out, &self.subs);
        extend_i64s(out, &self.start_ts);
        extend_u64s(out, &self.start_vers);
        extend_i64s(out, &self.end_ts);
        extend_u64s(out, &self.end_vers);
        extend_u64s(out, &self.counts);
    }

    pub fn clear(&mut self) {
        self.groups.clear();
        self.subs.clear();
        self.start_ts.clear();
        self.start_vers.clear();
        self.end_ts.clear();
        self.end_vers.clear();
        self.counts.clear();
    }
}

/// Decodes a statistics block of `rows` entries.
pub fn decode_stats_rows(buf: &[u8], rows: usize) -> Result<Vec<StatsEntry>> {
    if buf.len() != rows * STATS_COLUMNS * 8 {
        return Err(SegmentError::corrupt("statistics block size mismatch"));
    }
    let mut rdr = Cursor::new(buf);
    let groups = read_u64s(&mut rdr, rows)?;
    let subs = read_u64s(&mut rdr, rows)?;
    let start_ts = read_i64s(&mut rdr, rows)?;
    let start_vers = read_u64s(&mut rdr, rows)?;
    let end_ts = read_i64s(&mut rdr, rows)?;
    let end_vers = read_u64s(&mut rdr, rows)?;
    let counts = read_u64s(&mut rdr, rows)?;
    Ok((0..rows)
        .map(|i| StatsEntry {
            table: TableId::new(groups[i], subs[i]),
            start_ts: start_ts[i],
            start_ver: start_vers[i],
            end_ts: end_ts[i],
            end_ver: end_vers[i],
            rows: counts[i],
        })
        .collect())
}

/// One decoded delete row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteEntry {
    pub table: TableId,
    pub version: u64,
    pub start_ts: i64,
    pub end_ts: i64,
}

/// Delete-range accumulator, five parallel columns.
#[derive(Debug)]
pub struct DeleteBlock {
    groups: Vec<u64>,
    subs: Vec<u64>,
    versions: Vec<u64>,
    start_ts: Vec<i64>,
    end_ts: Vec<i64>,
}

impl DeleteBlock {
    pub fn new(capacity: usize) -> Result<Self> {
        Ok(Self {
            groups: try_vec(capacity)?,
            subs: try_vec(capacity)?,
            versions: try_vec(capacity)?,
            start_ts: try_vec(capacity)?,
            end_ts: try_vec(capacity)?,
        })
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn push(&mut self, table: TableId, del: &DeleteRange) {
        self.groups.push(table.group_id);
        self.subs.push(table.sub_id);
        self.versions.push(del.version);
        self.start_ts.push(del.start_ts);
        self.end_ts.push(del.end_ts);
    }

    /// `(min_table, max_table, min_ver, max_ver)` over buffered rows.
    pub fn summary(&self) -> (TableId, TableId, u64, u64) {
        let last = self.len() - 1;
        let mut min_ver = self.versions[0];
        let mut max_ver = self.versions[0];
        for &v in &self.versions {
            min_ver = min_ver.min(v);
            max_ver = max_ver.max(v);
        }
        (
            TableId::new(self.groups[0], self.subs[0]),
            TableId::new(self.groups[last], self.subs[last]),
            min_ver,
            max_ver,
        )
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.reserve(self.len() * DELETE_COLUMNS * 8);
        extend_u64s(out, &self.groups);
        extend_u64s(out, &self.subs);
        extend_u64s(out, &self.versions);
        extend_i64s(out, &self.start_ts);
        extend_i64s(out, &self.end_ts);
    }

    pub fn clear(&mut self) {
        self.groups.clear();
        self.subs.clear();
        self.versions.clear();
        self.start_ts.clear();
        self.end_ts.clear();
    }
}

/// Decodes a delete block of `rows` entries.
pub fn decode_delete_rows(buf: &[u8], rows: usize) -> Result<Vec<DeleteEntry>> {
    if buf.len() != rows * DELETE_COLUMNS * 8 {
        return Err(SegmentError::corrupt("delete block size mismatch"));
    }
    let mut rdr = Cursor::new(buf);
    let groups = read_u64s(&mut rdr, rows)?;
    let subs = read_u64s(&mut rdr, rows)?;
    let versions = read_u64s(&mut rdr, rows)?;
    let start_ts = read_i64s(&mut rdr, rows)?;
    let end_ts = read_i64s(&mut rdr, rows)?;
    Ok((0..rows)
        .map(|i| DeleteEntry {
            table: TableId::new(groups[i], subs[i]),
            version: versions[i],
            start_ts: start_ts[i],
            end_ts: end_ts[i],
        })
        .collect())
}

fn try_vec<T>(capacity: usize) -> Result<Vec<T>> {
    let mut v = Vec::new();
    v.try_reserve(capacity).map_err(|_| SegmentError::OutOfMemory {
        bytes: capacity * std::mem::size_of::<T>(),
    })?;
    Ok(v)
}

fn extend_u64s(out: &mut Vec<u8>, vals: &[u64]) {
    for v in vals {
        out.extend_from_slice(&v.to_le_bytes());
    }
}

fn extend_i64s(out: &mut Vec<u8>, vals: &[i64]) {
    for v in vals {
        out.extend_from_slice(&v.to_le_bytes());
    }
}

fn read_u64s(rdr: &mut Cursor<&[u8]>, n: usize) -> Result<Vec<u64>> {
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        out.push(
            rdr.read_u64::<LittleEndian>()
                .map_err(|_| SegmentError::corrupt("truncated block column"))?,
        );
    }
    Ok(out)
}

fn read_i64s(rdr: &mut Cursor<&[u8]>, n: usize) -> Result<Vec<i64>> {
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        out.push(
            rdr.read_i64::<LittleEndian>()
                .map_err(|_| SegmentError::corrupt("truncated block column"))?,
        );
    }
    Ok(out)
}
