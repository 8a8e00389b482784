//! Memtable flush and row-file ingestion.

use anyhow::{Context, Result};
use config::SegmentConfig;
use memtable::{Memtable, Row, SchemaCache};
use rowfile::RowFileReader;
use segment::SegmentWriter;
use std::path::Path;
use tracing::info;

/// Drains a memtable into a sealed segment file, returning the number of
/// rows written.
///
/// The memtable iterates in ascending key order, which is exactly the order
/// the segment writer requires.
pub fn flush_memtable(
    memt: &Memtable,
    cache: &mut SchemaCache,
    config: SegmentConfig,
) -> Result<u64> {
    let path = config.path.clone();
    let mut writer = SegmentWriter::open(config, cache)
        .with_context(|| format!("opening segment {}", path.display()))?;
    let mut rows = 0u64;
    for (key, mem) in memt.iter() {
        let row = Row {
            ts: key.ts,
            version: key.version,
            schema_version: mem.schema_version,
            values: mem.values.clone(),
        };
        writer.append_row(key.table, &row)?;
        rows += 1;
    }
    writer.close()?;
    info!(path = %path.display(), rows, "flushed memtable to segment");
    Ok(rows)
}

/// Converts a sealed row file into a sealed segment, returning the number
/// of rows written.
pub fn ingest_rowfile(
    input: &Path,
    cache: &mut SchemaCache,
    config: SegmentConfig,
) -> Result<u64> {
    let mut reader = RowFileReader::open(input)
        .with_context(|| format!("opening row file {}", input.display()))?;
    let path = config.path.clone();
    let mut writer = SegmentWriter::open(config, cache)
        .with_context(|| format!("opening segment {}", path.display()))?;
    let mut rows = 0u64;
    while let Some((table, row)) = reader.next_row()? {
        writer.append_row(table, &row)?;
        rows += 1;
    }
    writer.close()?;
    info!(
        input = %input.display(),
        path = %path.display(),
        rows,
        "ingested row file into segment"
    );
    Ok(rows)
}
