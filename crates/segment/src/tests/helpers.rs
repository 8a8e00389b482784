use config::SegmentConfig;
use memtable::{ColumnKind, ColumnValue, Row, Schema, SchemaCache, TableId};
use std::path::Path;

pub fn table(group: u64, sub: u64) -> TableId {
    TableId::new(group, sub)
}

/// Cache with schema v1 = (I64, Bytes) registered for every given table.
pub fn cache_with(tables: &[TableId]) -> SchemaCache {
    let mut cache = SchemaCache::new();
    for &t in tables {
        cache.register(t, Schema::new(1, vec![ColumnKind::I64, ColumnKind::Bytes]));
    }
    cache
}

/// Row matching the helper schema, payload derived from `v`.
pub fn row(ts: i64, version: u64, v: i64) -> Row {
    Row {
        ts,
        version,
        schema_version: 1,
        values: vec![
            ColumnValue::I64(v),
            ColumnValue::Bytes(format!("payload-{v}").into_bytes()),
        ],
    }
}

pub fn small_config(path: &Path, max_rows: usize) -> SegmentConfig {
    let mut cfg = SegmentConfig::new(path);
    cfg.max_rows = max_rows;
    cfg
}
