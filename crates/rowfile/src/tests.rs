use super::*;
use memtable::ColumnKind;
use tempfile::tempdir;

fn row(ts: i64, version: u64, v: i64) -> Row {
    Row {
        ts,
        version,
        schema_version: 1,
        values: vec![ColumnValue::I64(v)],
    }
}

#[test]
fn write_read_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("a.rows");
    let t = TableId::new(1, 1);

    let mut w = RowFileWriter::create(&path).unwrap();
    w.append(t, &row(10, 1, 100)).unwrap();
    w.append(t, &row(20, 1, 200)).unwrap();
    w.append(
        t,
        &Row {
            ts: 30,
            version: 2,
            schema_version: 1,
            values: vec![ColumnValue::I64(300)],
        },
    )
    .unwrap();
    w.finish().unwrap();

    let mut r = RowFileReader::open(&path).unwrap();
    assert_eq!(r.row_count(), 3);
    assert_eq!(r.tables(), &[TableIndexEntry { table: t, offset: 0, rows: 3 }]);

    let (t0, r0) = r.next_row().unwrap().unwrap();
    assert_eq!((t0, r0.ts, r0.version), (t, 10, 1));
    assert_eq!(r0.values, vec![ColumnValue::I64(100)]);
    assert_eq!(r.next_row().unwrap().unwrap().1.ts, 20);
    assert_eq!(r.next_row().unwrap().unwrap().1.ts, 30);
    assert!(r.next_row().unwrap().is_none());
    // Reader stays exhausted.
    assert!(r.next_row().unwrap().is_none());
}

#[test]
fn all_column_kinds_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cols.rows");
    let t = TableId::new(3, 7);
    let full = Row {
        ts: 5,
        version: 9,
        schema_version: 4,
        values: vec![
            ColumnValue::I64(-12),
            ColumnValue::F64(2.5),
            ColumnValue::Bytes(b"payload".to_vec()),
        ],
    };

    let mut w = RowFileWriter::create(&path).unwrap();
    w.append(t, &full).unwrap();
    w.finish().unwrap();

    let mut r = RowFileReader::open(&path).unwrap();
    let (_, got) = r.next_row().unwrap().unwrap();
    assert_eq!(got, full);
    assert_eq!(got.values[2].kind(), ColumnKind::Bytes);
}

#[test]
fn out_of_order_append_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("o.rows");
    let t = TableId::new(1, 1);

    let mut w = RowFileWriter::create(&path).unwrap();
    w.append(t, &row(20, 1, 1)).unwrap();
    assert!(matches!(
        w.append(t, &row(10, 1, 2)),
        Err(RowFileError::OutOfOrder { .. })
    ));
    // Equal key is also rejected (sources must be duplicate-free).
    assert!(matches!(
        w.append(t, &row(20, 1, 3)),
        Err(RowFileError::OutOfOrder { .. })
    ));
}

#[test]
fn seek_past_table_lands_on_next_table() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("s.rows");
    let t1 = TableId::new(1, 1);
    let t2 = TableId::new(1, 2);
    let t3 = TableId::new(2, 0);

    let mut w = RowFileWriter::create(&path).unwrap();
    for ts in [10, 20, 30] {
        w.append(t1, &row(ts, 1, ts)).unwrap();
    }
    w.append(t2, &row(5, 1, 5)).unwrap();
    w.append(t3, &row(7, 1, 7)).unwrap();
    w.finish().unwrap();

    let mut r = RowFileReader::open(&path).unwrap();
    assert_eq!(r.tables().len(), 3);
    r.seek_past_table(t1).unwrap();
    assert_eq!(r.next_row().unwrap().unwrap().0, t2);

    // Seeking past an already-passed table never rewinds.
    r.seek_past_table(t1).unwrap();
    assert_eq!(r.next_row().unwrap().unwrap().0, t3);

    // Skipping the last table exhausts the reader.
    r.seek_past_table(t3).unwrap();
    assert!(r.next_row().unwrap().is_none());
}

#[test]
fn seek_past_unknown_table_is_a_no_op() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("u.rows");
    let t = TableId::new(1, 1);

    let mut w = RowFileWriter::create(&path).unwrap();
    w.append(t, &row(10, 1, 1)).unwrap();
    w.finish().unwrap();

    let mut r = RowFileReader::open(&path).unwrap();
    r.seek_past_table(TableId::new(9, 9)).unwrap();
    assert_eq!(r.next_row().unwrap().unwrap().0, t);
}

#[test]
fn corrupt_record_is_detected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("c.rows");
    let t = TableId::new(1, 1);

    let mut w = RowFileWriter::create(&path).unwrap();
    w.append(t, &row(10, 1, 1)).unwrap();
    w.finish().unwrap();

    // Flip one byte inside the first record body.
    let mut bytes = std::fs::read(&path).unwrap();
    bytes[12] ^= 0xff;
    std::fs::write(&path, &bytes).unwrap();

    let mut r = RowFileReader::open(&path).unwrap();
    assert!(matches!(r.next_row(), Err(RowFileError::Corrupt(_))));
}

#[test]
fn unsealed_file_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("unsealed.rows");
    let t = TableId::new(1, 1);

    // Writer dropped without finish(): no trailer.
    let mut w = RowFileWriter::create(&path).unwrap();
    w.append(t, &row(10, 1, 1)).unwrap();
    drop(w);

    assert!(matches!(
        RowFileReader::open(&path),
        Err(RowFileError::Corrupt(_))
    ));
}

#[test]
fn empty_sealed_file_reads_as_empty() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("e.rows");
    RowFileWriter::create(&path).unwrap().finish().unwrap();

    let mut r = RowFileReader::open(&path).unwrap();
    assert_eq!(r.row_count(), 0);
    assert!(r.tables().is_empty());
    assert!(r.next_row().unwrap().is_none());
}
