//! Table schema registry.
//!
//! The segment writer resolves the active schema of a table before encoding
//! its rows, and resolves each row's declared schema version before the row
//! is appended. The cache also records every `(table, version)` pair it has
//! resolved, so callers can tell which historical versions a segment build
//! actually touched.

use crate::{ColumnKind, ColumnValue, TableId};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// One version of a table's column layout. Key columns (sub-id, timestamp,
/// version) are implicit; `columns` describes value columns only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub version: u32,
    pub columns: Vec<ColumnKind>,
}

impl Schema {
    pub fn new(version: u32, columns: Vec<ColumnKind>) -> Self {
        Self { version, columns }
    }

    /// Checks a row's values against this schema, column by column.
    #[must_use]
    pub fn matches(&self, values: &[ColumnValue]) -> bool {
        values.len() == self.columns.len()
            && values.iter().zip(&self.columns).all(|(v, k)| v.kind() == *k)
    }
}

/// Errors from schema resolution.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("no schema registered for table {table}")]
    UnknownTable { table: TableId },

    #[error("table {table} has no schema version {version}")]
    UnknownVersion { table: TableId, version: u32 },

    #[error("row columns do not match schema version {version} of table {table}")]
    ColumnMismatch { table: TableId, version: u32 },
}

/// Registry of table schemas, newest version last.
#[derive(Debug, Default)]
pub struct SchemaCache {
    tables: HashMap<TableId, Vec<Schema>>,
    seen: HashSet<(TableId, u32)>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a schema version for `table`. Versions must be registered
    /// in ascending order; the last registered version is the active one.
    pub fn register(&mut self, table: TableId, schema: Schema) {
        self.tables.entry(table).or_default().push(schema);
    }

    /// Resolves the active (latest) schema of `table` and records it as
    /// seen. Called by the writer when switching to a new table.
    pub fn update_table_schema(&mut self, table: TableId) -> Result<&Schema, SchemaError> {
        let versions = self
            .tables
            .get(&table)
            .ok_or(SchemaError::UnknownTable { table })?;
        let schema = versions.last().expect("registered table has >= 1 version");
        self.seen.insert((table, schema.version));
        Ok(schema)
    }

    /// Resolves a specific schema version of `table` and records it as
    /// seen. Called by the writer for every row before encoding.
    pub fn update_row_schema(
        &mut self,
        table: TableId,
        version: u32,
    ) -> Result<&Schema, SchemaError> {
        let versions = self
            .tables
            .get(&table)
            .ok_or(SchemaError::UnknownTable { table })?;
        let schema = versions
            .iter()
            .find(|s| s.version == version)
            .ok_or(SchemaError::UnknownVersion { table, version })?;
        self.seen.insert((table, version));
        Ok(schema)
    }

    /// `(table, version)` pairs resolved so far.
    pub fn versions_seen(&self) -> impl Iterator<Item = &(TableId, u32)> {
        self.seen.iter()
    }
}
