use config::SegmentConfig;
use memtable::{ColumnKind, ColumnValue, Row, Schema, SchemaCache, TableId};
use std::path::Path;

pub fn table(group: u64, sub: u64) -> TableId {
    TableId::new(group, sub)
}

pub fn cache_with(tables: &[TableId]) -> SchemaCache {
    let mut cache = SchemaCache::new();
    for &t in tables {
        cache.register(t, Schema::new(1, vec![ColumnKind::I64]));
    }
    cache
}

pub fn row(ts: i64, version: u64, v: i64) -> Row {
    Row {
        ts,
        version,
        schema_version: 1,
        values: vec![ColumnValue::I64(v)],
    }
}

pub fn config(path: &Path) -> SegmentConfig {
    let mut cfg = SegmentConfig::new(path);
    cfg.max_rows = 4;
    cfg
}

pub fn payload(values: &[ColumnValue]) -> i64 {
    match values[0] {
        ColumnValue::I64(v) => v,
        _ => panic!("first column is I64"),
    }
}
