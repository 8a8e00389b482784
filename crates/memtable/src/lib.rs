//! Row data model and the sorted in-memory table.
//!
//! Everything in the tidemark workspace speaks in terms of the types defined
//! here: rows are identified by `(group_id, sub_id, timestamp, version)` and
//! carry typed value columns described by a [`Schema`]. The [`Memtable`] is
//! the freshest of the three row sources the iterator layer merges: a
//! `BTreeMap` keyed by [`RowKey`], so iteration is already in global key
//! order.

use std::collections::btree_map::Range;
use std::collections::BTreeMap;
use std::ops::Bound;

mod schema;
pub use schema::{Schema, SchemaCache, SchemaError};

/// Identifies one table: a schema group plus a table within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TableId {
    pub group_id: u64,
    pub sub_id: u64,
}

impl TableId {
    pub fn new(group_id: u64, sub_id: u64) -> Self {
        Self { group_id, sub_id }
    }
}

impl std::fmt::Display for TableId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.group_id, self.sub_id)
    }
}

/// Full row identity. The derived ordering is the global sort order:
/// group id, then sub id, then timestamp, then version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RowKey {
    pub table: TableId,
    pub ts: i64,
    pub version: u64,
}

impl RowKey {
    pub fn new(table: TableId, ts: i64, version: u64) -> Self {
        Self { table, ts, version }
    }

    /// Smallest possible key; seed for full-range iteration.
    pub const MIN: RowKey = RowKey {
        table: TableId { group_id: 0, sub_id: 0 },
        ts: i64::MIN,
        version: 0,
    };

    /// Largest key any row of `table` can have. Used as an exclusive lower
    /// bound when skipping past a whole table.
    pub fn table_max(table: TableId) -> Self {
        Self {
            table,
            ts: i64::MAX,
            version: u64::MAX,
        }
    }
}

/// Type of one value column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    I64,
    F64,
    Bytes,
}

impl ColumnKind {
    /// Stable one-byte code used in on-disk encodings.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            ColumnKind::I64 => 0,
            ColumnKind::F64 => 1,
            ColumnKind::Bytes => 2,
        }
    }

    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(ColumnKind::I64),
            1 => Some(ColumnKind::F64),
            2 => Some(ColumnKind::Bytes),
            _ => None,
        }
    }
}

/// One typed cell.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    I64(i64),
    F64(f64),
    Bytes(Vec<u8>),
}

impl ColumnValue {
    #[must_use]
    pub fn kind(&self) -> ColumnKind {
        match self {
            ColumnValue::I64(_) => ColumnKind::I64,
            ColumnValue::F64(_) => ColumnKind::F64,
            ColumnValue::Bytes(_) => ColumnKind::Bytes,
        }
    }
}

/// One time-series row as handed to the segment writer: key fields plus the
/// value columns, interpreted through `schema_version`.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub ts: i64,
    pub version: u64,
    pub schema_version: u32,
    pub values: Vec<ColumnValue>,
}

/// A logical delete: all rows of a table in `[start_ts, end_ts]` written at
/// or below `version` are shadowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteRange {
    pub version: u64,
    pub start_ts: i64,
    pub end_ts: i64,
}

/// Value payload stored per memtable row.
#[derive(Debug, Clone, PartialEq)]
pub struct MemRow {
    pub schema_version: u32,
    pub values: Vec<ColumnValue>,
}

/// Sorted in-memory table of time-series rows.
///
/// Re-inserting an identical key replaces the previous payload (the new
/// write is by definition the more recent one).
#[derive(Debug, Default)]
pub struct Memtable {
    rows: BTreeMap<RowKey, MemRow>,
    approx_bytes: usize,
}

impl Memtable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, table: TableId, row: Row) {
        let key = RowKey::new(table, row.ts, row.version);
        let value = MemRow {
            schema_version: row.schema_version,
            values: row.values,
        };
        let added = row_bytes(&value);
        if let Some(old) = self.rows.insert(key, value) {
            self.approx_bytes = self.approx_bytes.saturating_sub(row_bytes(&old));
        }
        self.approx_bytes += added;
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rough payload footprint, for flush-threshold decisions.
    pub fn approx_bytes(&self) -> usize {
        self.approx_bytes
    }

    /// All rows in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = (&RowKey, &MemRow)> {
        self.rows.iter()
    }

    /// Rows with key `>= from`, ascending.
    pub fn range_from(&self, from: RowKey) -> Range<'_, RowKey, MemRow> {
        self.rows.range((Bound::Included(from), Bound::Unbounded))
    }

    /// Rows strictly after every possible key of `table`, ascending.
    pub fn range_after_table(&self, table: TableId) -> Range<'_, RowKey, MemRow> {
        self.rows
            .range((Bound::Excluded(RowKey::table_max(table)), Bound::Unbounded))
    }
}

fn row_bytes(row: &MemRow) -> usize {
    row.values
        .iter()
        .map(|v| match v {
            ColumnValue::Bytes(b) => b.len(),
            _ => 8,
        })
        .sum()
}
