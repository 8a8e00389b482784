use super::*;

#[test]
fn inserted_tables_are_found() {
    let mut bf = TableBloom::new(100, 0.01);
    for g in 0..10u64 {
        for s in 0..10u64 {
            bf.insert(g, s);
        }
    }
    for g in 0..10u64 {
        for s in 0..10u64 {
            assert!(bf.may_contain(g, s), "table ({g},{s}) lost");
        }
    }
}

#[test]
fn absent_tables_mostly_rejected() {
    let mut bf = TableBloom::new(1000, 0.01);
    for s in 0..1000u64 {
        bf.insert(1, s);
    }
    let false_positives = (10_000..20_000u64).filter(|&s| bf.may_contain(1, s)).count();
    // 1% target rate with generous slack.
    assert!(
        false_positives < 500,
        "false positive rate too high: {false_positives}/10000"
    );
}

#[test]
fn empty_filter_rejects_everything() {
    let bf = TableBloom::new(10, 0.01);
    assert!(!bf.may_contain(0, 0));
    assert!(!bf.may_contain(7, 42));
}

#[test]
fn encode_decode_preserves_membership() {
    let mut bf = TableBloom::new(50, 0.01);
    for s in 0..50u64 {
        bf.insert(9, s * 3);
    }
    let mut buf = Vec::new();
    bf.encode_into(&mut buf);
    assert_eq!(buf.len(), bf.encoded_len());

    let decoded = TableBloom::decode(&buf).unwrap();
    for s in 0..50u64 {
        assert!(decoded.may_contain(9, s * 3));
    }
}

#[test]
fn decode_rejects_truncated_and_garbage_input() {
    let mut bf = TableBloom::new(10, 0.01);
    bf.insert(1, 2);
    let mut buf = Vec::new();
    bf.encode_into(&mut buf);

    assert!(TableBloom::decode(&buf[..buf.len() - 3]).is_err());
    assert!(TableBloom::decode(&[0u8; 16]).is_err());
}

#[test]
fn distinct_table_ids_hash_differently() {
    // (group, sub) must not collide with (sub, group) by construction.
    let mut bf = TableBloom::new(2, 0.001);
    bf.insert(1, 2);
    assert!(bf.may_contain(1, 2));
    assert!(!bf.may_contain(2, 1));
}
