//! Result set and diff invariants
//!
//! Random batches over a small identity space, checked against the sort,
//! uniqueness, idempotence and diff roundtrip properties. Some records omit
//! the sort field, which makes the comparator chain non-transitive.

use liveset_core::{diff, Batch, OrderingSpec, Record, ResultSet, SectionLayout, Value};
use proptest::prelude::*;
use std::cmp::Ordering;
use std::collections::HashSet;

#[derive(Debug, Clone)]
enum Op {
    Insert(u8, Option<u8>, Option<i32>),
    Update(u8, Option<u8>, Option<i32>),
    Remove(u8),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..12u8, proptest::option::of(0..4u8), sort_field()).prop_map(|(id, cat, n)| Op::Insert(id, cat, n)),
        (0..12u8, proptest::option::of(0..4u8), sort_field()).prop_map(|(id, cat, n)| Op::Update(id, cat, n)),
        (0..12u8).prop_map(Op::Remove),
    ]
}

fn sort_field() -> impl Strategy<Value = Option<i32>> {
    proptest::option::weighted(0.7, 0..6i32)
}

fn record(id: u8, cat: Option<u8>, n: Option<i32>) -> Record {
    let mut value = Value::map();
    if let Some(n) = n {
        value = value.with("n", n);
    }
    if let Some(cat) = cat {
        value = value.with("cat", format!("c{cat}"));
    }
    Record::new(format!("r{id}"), value)
}

fn batch(ops: &[Op]) -> Batch {
    let mut batch = Batch::default();
    let mut seen = HashSet::new();
    // one entry per identity, like a reconciled batch
    for op in ops.iter().rev() {
        let id = match op {
            Op::Insert(id, ..) | Op::Update(id, ..) | Op::Remove(id) => *id,
        };
        if !seen.insert(id) {
            continue;
        }
        match *op {
            Op::Insert(id, cat, n) => batch.inserted.push(record(id, cat, n)),
            Op::Update(id, cat, n) => batch.updated.push(record(id, cat, n)),
            Op::Remove(id) => batch.removed.push(record(id, None, None)),
        }
    }
    batch
}

fn ordering() -> OrderingSpec {
    OrderingSpec::new()
        .with_section_key("cat".parse().unwrap())
        .descending_by("n".parse().unwrap())
}

fn assert_invariants(set: &ResultSet) {
    let concatenated: Vec<&Record> = set.sections().iter().flat_map(|s| s.records()).collect();
    let records: Vec<&Record> = set.records().iter().collect();
    assert_eq!(concatenated, records, "records must concatenate sections");

    // adjacent order is only guaranteed while every record carries the sort field
    let n = "n".parse().unwrap();
    if set.records().iter().all(|r| r.value().get_path(&n).is_some()) {
        for pair in set.records().windows(2) {
            assert_eq!(set.ordering().compare(&pair[0], &pair[1]), Ordering::Less);
        }
    }
    for pair in set.sections().windows(2) {
        assert!(pair[0].key() < pair[1].key(), "section keys must ascend");
    }
    assert!(set.sections().iter().all(|s| !s.is_empty()));

    let unique: HashSet<_> = set.records().iter().map(Record::identity).collect();
    assert_eq!(unique.len(), set.len(), "identities must be unique");
}

proptest! {
    #[test]
    fn prop_apply_preserves_sort_and_uniqueness(
        batches in prop::collection::vec(prop::collection::vec(op(), 0..10), 1..6)
    ) {
        let mut set = ResultSet::new(ordering());
        for ops in &batches {
            set.apply(&batch(ops));
            assert_invariants(&set);
        }
    }

    #[test]
    fn prop_reapplying_inserts_changes_nothing(
        seed in prop::collection::vec(op(), 0..12),
        ops in prop::collection::vec(op(), 0..12),
    ) {
        let mut set = ResultSet::new(ordering());
        set.apply(&batch(&seed));

        let inserts = Batch::inserts(batch(&ops).inserted);
        set.apply(&inserts);
        let once = SectionLayout::from_result_set(&set);
        set.apply(&inserts);
        prop_assert_eq!(SectionLayout::from_result_set(&set), once);
    }

    #[test]
    fn prop_diff_replay_reaches_after(
        seed in prop::collection::vec(op(), 0..16),
        ops in prop::collection::vec(op(), 0..16),
    ) {
        let mut before = ResultSet::new(ordering());
        before.apply(&batch(&seed));

        let change = batch(&ops);
        let mut after = before.clone();
        after.apply(&change);

        let script = diff(&before, &after, &change.changed_identities());

        let mut layout = SectionLayout::from_result_set(&before);
        prop_assert!(layout.apply(&script).is_ok());
        prop_assert_eq!(layout, SectionLayout::from_result_set(&after));

        let moved: HashSet<_> = script.moved_rows.iter().map(|m| m.record.identity()).collect();
        for update in &script.updated_rows {
            prop_assert!(!moved.contains(update.record.identity()));
            prop_assert_eq!(
                before.record_at(update.path).unwrap().identity(),
                update.record.identity()
            );
        }
    }
}

#[test]
fn missing_sort_fields_keep_records_aligned_with_sections() {
    let mut set = ResultSet::new(ordering());
    let mut before = set.clone();
    // linear congruential walk: one record per batch, n missing every third step
    let mut state: u32 = 7;
    for step in 0..60u32 {
        state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        let id = (state >> 8) % 26;
        let cat = (state >> 16) % 3;
        let mut value = Value::map().with("cat", format!("c{cat}"));
        if step % 3 != 0 {
            value = value.with("n", i64::from((state >> 4) % 5));
        }
        let change = Batch::inserts(vec![Record::new(format!("r{id:02}"), value)]);
        set.apply(&change);
        assert_invariants(&set);

        let script = diff(&before, &set, &change.changed_identities());
        let mut layout = SectionLayout::from_result_set(&before);
        assert!(layout.apply(&script).is_ok(), "step {step}");
        assert_eq!(layout, SectionLayout::from_result_set(&set), "step {step}");
        before = set.clone();
    }
}

#[test]
fn example_duplicate_insert_section_one() {
    let ordering = OrderingSpec::new()
        .with_section_key("cat".parse().unwrap())
        .ascending_by("n".parse().unwrap());
    let mut set = ResultSet::new(ordering);

    set.apply(&Batch::inserts(vec![
        Record::new("a", Value::map().with("cat", 1).with("n", 5)),
        Record::new("b", Value::map().with("cat", 1).with("n", 2)),
        Record::new("b", Value::map().with("cat", 1).with("n", 2)),
    ]));

    assert_eq!(set.sections().len(), 1);
    let section = &set.sections()[0];
    assert_eq!(section.key(), "1");
    let ids: Vec<&str> = section.records().iter().map(|r| r.identity().as_str()).collect();
    assert_eq!(ids, vec!["b", "a"]);
}
