use super::helpers::*;
use crate::{flush_memtable, ingest_rowfile};
use memtable::Memtable;
use rowfile::RowFileWriter;
use segment::{RowIter, SegmentReader};
use tempfile::tempdir;

#[test]
fn flush_writes_every_memtable_row() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("m.seg");
    let a = table(1, 1);
    let b = table(1, 2);
    let mut cache = cache_with(&[a, b]);

    let mut memt = Memtable::new();
    memt.insert(a, row(10, 1, 100));
    memt.insert(a, row(20, 2, 200));
    memt.insert(b, row(5, 3, 300));

    let rows = flush_memtable(&memt, &mut cache, config(&out)).unwrap();
    assert_eq!(rows, 3);

    let mut iter = RowIter::from_segment(SegmentReader::open(&out).unwrap());
    let mut seen = Vec::new();
    while let Some(info) = iter.next().unwrap() {
        seen.push((info.table, info.row.ts, payload(&info.row.values)));
    }
    assert_eq!(seen, vec![(a, 10, 100), (a, 20, 200), (b, 5, 300)]);
}

#[test]
fn flush_empty_memtable_seals_an_empty_segment() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("m.seg");
    let mut cache = cache_with(&[]);

    let rows = flush_memtable(&Memtable::new(), &mut cache, config(&out)).unwrap();
    assert_eq!(rows, 0);
    let r = SegmentReader::open(&out).unwrap();
    assert_eq!(r.block_entries().len(), 0);
    assert_eq!(r.stats_entries().len(), 0);
}

#[test]
fn ingest_converts_a_sealed_row_file() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.rows");
    let out = dir.path().join("out.seg");
    let a = table(1, 1);
    let mut cache = cache_with(&[a]);

    let mut w = RowFileWriter::create(&input).unwrap();
    for ts in 1..=6 {
        w.append(a, &row(ts, ts as u64, ts * 10)).unwrap();
    }
    w.finish().unwrap();

    let rows = ingest_rowfile(&input, &mut cache, config(&out)).unwrap();
    assert_eq!(rows, 6);

    let r = SegmentReader::open(&out).unwrap();
    // max_rows 4 splits six rows into two blocks.
    assert_eq!(r.block_entries().len(), 2);
    assert_eq!(r.block_entries()[0].rows, 4);
    assert_eq!(r.block_entries()[1].rows, 2);
}

#[test]
fn ingest_missing_file_fails_with_context() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("out.seg");
    let mut cache = cache_with(&[]);
    let err = ingest_rowfile(&dir.path().join("absent.rows"), &mut cache, config(&out))
        .unwrap_err();
    assert!(err.to_string().contains("absent.rows"));
}
