//! # tidemark - segment file inspection and compaction
//!
//! Command-line front end for the tidemark segment tier.
//!
//! ## Commands
//!
//! ```text
//! tidemark dump <file>               Print header, footer and directories
//! tidemark tables <file>             Print per-table statistics spans
//! tidemark compact <out> <in>...     Merge input segments into <out>
//! ```
//!
//! Logging is controlled through `RUST_LOG` (for example
//! `RUST_LOG=segment=debug tidemark dump x.seg`).

use anyhow::{bail, Context, Result};
use config::SegmentConfig;
use memtable::{Schema, SchemaCache, TableId};
use segment::SegmentReader;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("dump") if args.len() == 2 => {
            print!("{}", dump(Path::new(&args[1]))?);
            Ok(())
        }
        Some("tables") if args.len() == 2 => {
            print!("{}", tables(Path::new(&args[1]))?);
            Ok(())
        }
        Some("compact") if args.len() >= 3 => {
            let out = PathBuf::from(&args[1]);
            let inputs: Vec<PathBuf> = args[2..].iter().map(PathBuf::from).collect();
            let rows = compact(&out, &inputs)?;
            println!("compacted {} segments into {} ({rows} rows)", inputs.len(), out.display());
            Ok(())
        }
        _ => {
            eprintln!("usage: tidemark dump <file>");
            eprintln!("       tidemark tables <file>");
            eprintln!("       tidemark compact <out> <in>...");
            bail!("invalid arguments");
        }
    }
}

fn dump(path: &Path) -> Result<String> {
    let reader = SegmentReader::open(path)
        .with_context(|| format!("opening segment {}", path.display()))?;
    let mut out = String::new();
    out.push_str(&format!("segment {}\n", path.display()));
    out.push_str(&format!(
        "  compression {:?}, page size {}, prev footer {}\n",
        reader.compression(),
        reader.page_size(),
        reader.prev_footer()
    ));
    out.push_str(&format!("  blocks: {}\n", reader.block_entries().len()));
    for e in reader.block_entries() {
        out.push_str(&format!(
            "    group {} sub [{}..{}] ts [{}..{}] ver [{}..{}] rows {} at {}+{} (keys {})\n",
            e.group_id,
            e.min_sub,
            e.max_sub,
            e.min_ts,
            e.max_ts,
            e.min_ver,
            e.max_ver,
            e.rows,
            e.range.offset,
            e.range.total_size,
            e.range.key_size,
        ));
    }
    out.push_str(&format!("  stats blocks: {}\n", reader.stats_entries().len()));
    for e in reader.stats_entries() {
        out.push_str(&format!(
            "    tables [{}..{}] ver [{}..{}] entries {} at {}+{}\n",
            e.min_table, e.max_table, e.min_ver, e.max_ver, e.rows, e.offset, e.size
        ));
    }
    out.push_str(&format!("  delete blocks: {}\n", reader.delete_entries().len()));
    for e in reader.delete_entries() {
        out.push_str(&format!(
            "    tables [{}..{}] ver [{}..{}] entries {} at {}+{}\n",
            e.min_table, e.max_table, e.min_ver, e.max_ver, e.rows, e.offset, e.size
        ));
    }
    Ok(out)
}

fn tables(path: &Path) -> Result<String> {
    let mut reader = SegmentReader::open(path)
        .with_context(|| format!("opening segment {}", path.display()))?;
    let mut out = String::new();
    for entry in reader.stats_entries().to_vec() {
        for s in reader.read_stats_block(entry)? {
            out.push_str(&format!(
                "{} ts [{}..{}] ver [{}..{}] rows {}\n",
                s.table, s.start_ts, s.end_ts, s.start_ver, s.end_ver, s.rows
            ));
        }
    }
    Ok(out)
}

fn compact(out: &Path, inputs: &[PathBuf]) -> Result<u64> {
    let mut cache = SchemaCache::new();
    let mut known = HashSet::new();
    for input in inputs {
        register_schemas(input, &mut cache, &mut known)?;
    }
    engine::compact(inputs, None, &[], &mut cache, SegmentConfig::new(out))
}

/// Registers the schema of every block in `path`, reconstructed from the
/// self-describing key regions. The CLI has no external schema source, so
/// the input files themselves are the authority.
fn register_schemas(
    path: &Path,
    cache: &mut SchemaCache,
    known: &mut HashSet<(TableId, u32)>,
) -> Result<()> {
    let mut reader = SegmentReader::open(path)
        .with_context(|| format!("opening segment {}", path.display()))?;
    for entry in reader.block_entries().to_vec() {
        let table = TableId::new(entry.group_id, entry.min_sub);
        let keys = reader.read_block_keys(entry)?;
        if known.insert((table, keys.schema_version)) {
            cache.register(table, Schema::new(keys.schema_version, keys.column_kinds));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::SegmentConfig;
    use memtable::{ColumnKind, ColumnValue, Row};
    use segment::SegmentWriter;
    use tempfile::tempdir;

    fn sample_segment(path: &Path) {
        let a = TableId::new(1, 1);
        let mut cache = SchemaCache::new();
        cache.register(a, Schema::new(1, vec![ColumnKind::I64]));
        let mut w = SegmentWriter::open(SegmentConfig::new(path), &mut cache).unwrap();
        for ts in [10, 20] {
            let row = Row {
                ts,
                version: ts as u64,
                schema_version: 1,
                values: vec![ColumnValue::I64(ts)],
            };
            w.append_row(a, &row).unwrap();
        }
        w.close().unwrap();
    }

    #[test]
    fn dump_prints_directory_summary() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.seg");
        sample_segment(&path);
        let text = dump(&path).unwrap();
        assert!(text.contains("blocks: 1"));
        assert!(text.contains("ts [10..20]"));
        assert!(text.contains("stats blocks: 1"));
    }

    #[test]
    fn tables_lists_stats_entries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.seg");
        sample_segment(&path);
        let text = tables(&path).unwrap();
        assert!(text.contains("1.1 ts [10..20]"));
        assert!(text.contains("rows 2"));
    }

    #[test]
    fn compact_bootstraps_schemas_from_inputs() {
        let dir = tempdir().unwrap();
        let p1 = dir.path().join("a.seg");
        sample_segment(&p1);
        let out = dir.path().join("out.seg");
        let rows = compact(&out, &[p1]).unwrap();
        assert_eq!(rows, 2);
        assert!(tables(&out).unwrap().contains("rows 2"));
    }

    #[test]
    fn dump_rejects_garbage() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("junk.seg");
        std::fs::write(&path, b"not a segment").unwrap();
        assert!(dump(&path).is_err());
    }
}
