//! Segment compaction.
//!
//! Merges several sealed segments (and optionally the live memtable) into
//! one output segment. Inputs are supplied oldest first; the memtable, when
//! present, is the most recent source and wins every exact-key tie through
//! the merger's recency tie-break. Delete ranges from the inputs are
//! carried into the output so they keep shadowing rows in segments outside
//! this compaction.

use anyhow::{Context, Result};
use config::SegmentConfig;
use memtable::{DeleteRange, Memtable, RowKey, SchemaCache, TableId};
use segment::{IterMerger, RowIter, SegmentReader, SegmentWriter};
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::info;

/// Compacts `inputs` (oldest first) and an optional memtable into one
/// segment at `config.path`. Tables in `drop_tables` are skipped wholesale,
/// rows and deletes alike. Returns the number of rows written.
pub fn compact(
    inputs: &[PathBuf],
    memt: Option<&Memtable>,
    drop_tables: &[TableId],
    cache: &mut SchemaCache,
    config: SegmentConfig,
) -> Result<u64> {
    let dropped: HashSet<TableId> = drop_tables.iter().copied().collect();

    let mut iters: Vec<RowIter<'_>> = Vec::with_capacity(inputs.len() + 1);
    let mut deletes: Vec<(TableId, DeleteRange)> = Vec::new();
    for path in inputs {
        let mut reader = SegmentReader::open(path)
            .with_context(|| format!("opening input segment {}", path.display()))?;
        for entry in reader.delete_entries().to_vec() {
            for del in reader.read_delete_block(entry)? {
                if !dropped.contains(&del.table) {
                    deletes.push((
                        del.table,
                        DeleteRange {
                            version: del.version,
                            start_ts: del.start_ts,
                            end_ts: del.end_ts,
                        },
                    ));
                }
            }
        }
        iters.push(RowIter::from_segment(reader));
    }
    if let Some(memt) = memt {
        iters.push(RowIter::from_memtable(memt, RowKey::MIN));
    }

    let out_path = config.path.clone();
    let mut writer = SegmentWriter::open(config, cache)
        .with_context(|| format!("opening output segment {}", out_path.display()))?;
    let mut merger = IterMerger::new(&mut iters)?;
    let mut rows = 0u64;
    while let Some(current) = merger.next()? {
        let table = current.table;
        if dropped.contains(&table) {
            merger.skip_table(table)?;
            continue;
        }
        let row = current.row.clone();
        writer.append_row(table, &row)?;
        rows += 1;
    }
    merger.close();

    let ndeletes = deletes.len();
    for (table, del) in deletes {
        writer.append_delete(table, &del)?;
    }
    writer.close()?;

    info!(
        inputs = inputs.len(),
        with_memtable = memt.is_some(),
        out = %out_path.display(),
        rows,
        deletes = ndeletes,
        "compacted segments"
    );
    Ok(rows)
}
