use super::helpers::*;
use crate::{RowIter, SegmentReader, SegmentWriter};
use memtable::{Memtable, RowKey};
use rowfile::{RowFileReader, RowFileWriter};
use tempfile::tempdir;

fn collect_keys(iter: &mut RowIter<'_>) -> Vec<(u64, u64, i64, u64)> {
    let mut out = Vec::new();
    while let Some(info) = iter.next().unwrap() {
        out.push((
            info.table.group_id,
            info.table.sub_id,
            info.row.ts,
            info.row.version,
        ));
    }
    out
}

#[test]
fn segment_iterates_all_rows_in_key_order() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("t.seg");
    let a = table(1, 1);
    let b = table(1, 2);
    let mut cache = cache_with(&[a, b]);

    // Threshold 2 forces multiple blocks per table.
    let mut w = SegmentWriter::open(small_config(&path, 2), &mut cache).unwrap();
    for ts in [10, 20, 30] {
        w.append_row(a, &row(ts, ts as u64, 0)).unwrap();
    }
    w.append_row(b, &row(15, 99, 0)).unwrap();
    w.close().unwrap();

    let mut iter = RowIter::from_segment(SegmentReader::open(&path).unwrap());
    assert!(iter.get().is_none(), "fresh iterator has no current row");
    let keys = collect_keys(&mut iter);
    assert_eq!(
        keys,
        vec![(1, 1, 10, 10), (1, 1, 20, 20), (1, 1, 30, 30), (1, 2, 15, 99)]
    );
    assert!(iter.next().unwrap().is_none(), "stays exhausted");
}

#[test]
fn rowfile_iterates_sequentially() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("t.rows");
    let a = table(1, 1);
    let b = table(2, 1);

    let mut w = RowFileWriter::create(&path).unwrap();
    w.append(a, &row(1, 1, 0)).unwrap();
    w.append(a, &row(2, 2, 0)).unwrap();
    w.append(b, &row(1, 3, 0)).unwrap();
    w.finish().unwrap();

    let mut iter = RowIter::from_rowfile(RowFileReader::open(&path).unwrap());
    let keys = collect_keys(&mut iter);
    assert_eq!(keys, vec![(1, 1, 1, 1), (1, 1, 2, 2), (2, 1, 1, 3)]);
}

#[test]
fn memtable_iterates_from_seed_key() {
    let a = table(1, 1);
    let b = table(1, 2);
    let mut memt = Memtable::new();
    memt.insert(a, row(10, 1, 0));
    memt.insert(a, row(20, 2, 0));
    memt.insert(b, row(5, 3, 0));

    let mut iter = RowIter::from_memtable(&memt, RowKey::MIN);
    assert_eq!(
        collect_keys(&mut iter),
        vec![(1, 1, 10, 1), (1, 1, 20, 2), (1, 2, 5, 3)]
    );

    // Seeding past A's first row skips it.
    let mut iter = RowIter::from_memtable(&memt, RowKey::new(a, 15, 0));
    assert_eq!(collect_keys(&mut iter), vec![(1, 1, 20, 2), (1, 2, 5, 3)]);
}

#[test]
fn segment_skip_table_jumps_whole_blocks() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("t.seg");
    let a = table(1, 1);
    let b = table(1, 2);
    let c = table(1, 3);
    let mut cache = cache_with(&[a, b, c]);

    let mut w = SegmentWriter::open(small_config(&path, 2), &mut cache).unwrap();
    w.append_row(a, &row(1, 1, 0)).unwrap();
    for ts in [1, 2, 3, 4] {
        w.append_row(b, &row(ts, ts as u64, 0)).unwrap();
    }
    w.append_row(c, &row(1, 9, 0)).unwrap();
    w.close().unwrap();

    let mut iter = RowIter::from_segment(SegmentReader::open(&path).unwrap());
    iter.next().unwrap();
    iter.next().unwrap();
    assert_eq!(iter.get().unwrap().table, b);
    iter.skip_table(b).unwrap();
    assert_eq!(iter.get().unwrap().table, c);
    assert!(iter.next().unwrap().is_none());
}

#[test]
fn rowfile_skip_table_uses_the_index() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("t.rows");
    let a = table(1, 1);
    let b = table(1, 2);
    let c = table(1, 3);

    let mut w = RowFileWriter::create(&path).unwrap();
    w.append(a, &row(1, 1, 0)).unwrap();
    for ts in [1, 2, 3] {
        w.append(b, &row(ts, ts as u64, 0)).unwrap();
    }
    w.append(c, &row(1, 9, 0)).unwrap();
    w.finish().unwrap();

    let mut iter = RowIter::from_rowfile(RowFileReader::open(&path).unwrap());
    iter.next().unwrap();
    iter.next().unwrap();
    assert_eq!(iter.get().unwrap().table, b);
    iter.skip_table(b).unwrap();
    assert_eq!(iter.get().unwrap().table, c);
}

#[test]
fn memtable_skip_table_reranges() {
    let a = table(1, 1);
    let b = table(1, 2);
    let mut memt = Memtable::new();
    memt.insert(a, row(1, 1, 0));
    memt.insert(a, row(2, 2, 0));
    memt.insert(b, row(1, 3, 0));

    let mut iter = RowIter::from_memtable(&memt, RowKey::MIN);
    iter.next().unwrap();
    iter.skip_table(a).unwrap();
    assert_eq!(iter.get().unwrap().table, b);
    assert!(iter.next().unwrap().is_none());
}

#[test]
fn skip_table_is_a_noop_when_positioned_elsewhere() {
    let a = table(1, 1);
    let b = table(1, 2);
    let mut memt = Memtable::new();
    memt.insert(a, row(1, 1, 0));
    memt.insert(b, row(1, 2, 0));

    let mut iter = RowIter::from_memtable(&memt, RowKey::MIN);
    iter.next().unwrap();
    assert_eq!(iter.get().unwrap().table, a);
    // Head is in A; skipping B must not disturb it.
    iter.skip_table(b).unwrap();
    assert_eq!(iter.get().unwrap().table, a);
    assert_eq!(collect_keys(&mut iter), vec![(1, 2, 1, 2)]);
}
