use super::helpers::*;
use crate::{IterMerger, RowIter, SegmentReader, SegmentWriter};
use memtable::{ColumnValue, Memtable, Row, RowKey, TableId};
use tempfile::tempdir;

fn seg_iter<'a>(
    dir: &tempfile::TempDir,
    name: &str,
    tables: &[TableId],
    rows: &[(TableId, Row)],
) -> RowIter<'a> {
    let path = dir.path().join(name);
    let mut cache = cache_with(tables);
    let mut w = SegmentWriter::open(small_config(&path, 64), &mut cache).unwrap();
    for (t, r) in rows {
        w.append_row(*t, r).unwrap();
    }
    w.close().unwrap();
    RowIter::from_segment(SegmentReader::open(&path).unwrap())
}

fn payload(info: &crate::RowInfo) -> i64 {
    match info.row.values[0] {
        ColumnValue::I64(v) => v,
        _ => panic!("first column is I64"),
    }
}

#[test]
fn newest_source_wins_exact_key_ties() {
    // B sorts before A: identical group, smaller sub id.
    let b = table(1, 1);
    let a = table(1, 2);
    let dir = tempdir().unwrap();

    // Oldest: segment holding the stale payload v1 for (A, 100).
    let old = seg_iter(&dir, "old.seg", &[a], &[(a, row(100, 7, 1))]);
    // Middle: segment holding (B, 50) with payload v3.
    let mid = seg_iter(&dir, "mid.seg", &[b], &[(b, row(50, 3, 3))]);
    // Newest: memtable rewriting (A, 100) under the same key, payload v2.
    let mut memt = Memtable::new();
    memt.insert(a, row(100, 7, 2));

    let mut iters = vec![old, mid, RowIter::from_memtable(&memt, RowKey::MIN)];
    let mut merger = IterMerger::new(&mut iters).unwrap();

    let first = merger.next().unwrap().unwrap();
    assert_eq!((first.table, first.row.ts), (b, 50));
    assert_eq!(payload(first), 3);

    let second = merger.next().unwrap().unwrap();
    assert_eq!((second.table, second.row.ts), (a, 100));
    assert_eq!(payload(second), 2, "memtable shadows the old segment");

    assert!(merger.next().unwrap().is_none(), "v1 was never emitted");
}

#[test]
fn output_is_the_sorted_union_of_all_keys() {
    let a = table(1, 1);
    let b = table(1, 2);
    let dir = tempdir().unwrap();

    let s1 = seg_iter(
        &dir,
        "s1.seg",
        &[a, b],
        &[
            (a, row(10, 1, 0)),
            (a, row(30, 2, 0)),
            (b, row(5, 3, 0)),
        ],
    );
    let s2 = seg_iter(
        &dir,
        "s2.seg",
        &[a, b],
        &[(a, row(20, 4, 0)), (b, row(15, 5, 0))],
    );

    let mut iters = vec![s1, s2];
    let mut merger = IterMerger::new(&mut iters).unwrap();
    let mut keys = Vec::new();
    while let Some(info) = merger.next().unwrap() {
        keys.push(info.key());
    }
    assert_eq!(keys.len(), 5);
    for pair in keys.windows(2) {
        assert!(pair[0] < pair[1], "emitted keys strictly increase");
    }
}

#[test]
fn get_repeats_the_current_row_until_advanced() {
    let a = table(1, 1);
    let mut memt = Memtable::new();
    memt.insert(a, row(1, 1, 42));
    memt.insert(a, row(2, 2, 43));

    let mut iters = vec![RowIter::from_memtable(&memt, RowKey::MIN)];
    let mut merger = IterMerger::new(&mut iters).unwrap();
    assert!(merger.get().is_none(), "no current row before first next");
    merger.next().unwrap();
    assert_eq!(payload(merger.get().unwrap()), 42);
    assert_eq!(payload(merger.get().unwrap()), 42);
    merger.next().unwrap();
    assert_eq!(payload(merger.get().unwrap()), 43);
}

#[test]
fn skip_table_drops_the_table_across_all_sources() {
    let a = table(1, 1);
    let b = table(1, 2);
    let c = table(1, 3);
    let dir = tempdir().unwrap();

    let s1 = seg_iter(
        &dir,
        "s1.seg",
        &[a, b, c],
        &[(a, row(1, 1, 0)), (b, row(1, 2, 0)), (c, row(1, 3, 0))],
    );
    let s2 = seg_iter(
        &dir,
        "s2.seg",
        &[b, c],
        &[(b, row(2, 4, 0)), (c, row(2, 5, 0))],
    );

    let mut iters = vec![s1, s2];
    let mut merger = IterMerger::new(&mut iters).unwrap();
    let first = merger.next().unwrap().unwrap();
    assert_eq!(first.table, a);

    merger.skip_table(b).unwrap();
    let mut rest = Vec::new();
    while let Some(info) = merger.next().unwrap() {
        assert_ne!(info.table, b, "no B row may surface after the skip");
        rest.push((info.table, info.row.ts));
    }
    assert_eq!(rest, vec![(c, 1), (c, 2)], "C survives in full");
}

#[test]
fn skip_current_table_moves_to_the_next_one() {
    let a = table(1, 1);
    let b = table(1, 2);
    let mut memt = Memtable::new();
    memt.insert(a, row(1, 1, 0));
    memt.insert(a, row(2, 2, 0));
    memt.insert(b, row(1, 3, 0));

    let mut iters = vec![RowIter::from_memtable(&memt, RowKey::MIN)];
    let mut merger = IterMerger::new(&mut iters).unwrap();
    let first = merger.next().unwrap().unwrap();
    assert_eq!(first.table, a);

    merger.skip_table(a).unwrap();
    let next = merger.next().unwrap().unwrap();
    assert_eq!(next.table, b);
    assert!(merger.next().unwrap().is_none());
}

#[test]
fn close_is_idempotent_and_terminal() {
    let a = table(1, 1);
    let mut memt = Memtable::new();
    memt.insert(a, row(1, 1, 0));

    let mut iters = vec![RowIter::from_memtable(&memt, RowKey::MIN)];
    let mut merger = IterMerger::new(&mut iters).unwrap();
    merger.close();
    merger.close();
    assert!(merger.next().unwrap().is_none());
    assert!(merger.get().is_none());
}

#[test]
fn empty_sources_are_discarded_at_init() {
    let a = table(1, 1);
    let memt_empty = Memtable::new();
    let mut memt = Memtable::new();
    memt.insert(a, row(1, 1, 7));

    let mut iters = vec![
        RowIter::from_memtable(&memt_empty, RowKey::MIN),
        RowIter::from_memtable(&memt, RowKey::MIN),
    ];
    let mut merger = IterMerger::new(&mut iters).unwrap();
    assert_eq!(payload(merger.next().unwrap().unwrap()), 7);
    assert!(merger.next().unwrap().is_none());
}
