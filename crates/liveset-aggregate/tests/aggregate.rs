//! Aggregate view tests
//!
//! A mirroring consumer replays every shifted member script onto one
//! combined layout, which must always equal the member layouts placed one
//! after another.

use liveset_aggregate::{AggregateDelegate, AggregateError, MemberDelegate, MemberId, ResultAggregator};
use liveset_core::{diff, Batch, ChangeScript, Record, ResultSet, SectionLayout};
use liveset_sync::{LiveResultsController, ResultSetDelegate};
use liveset_test_utils::{cat_ordering, cat_record, MemoryFeed};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Default)]
struct Mirror {
    layout: Mutex<SectionLayout>,
    log: Mutex<Vec<String>>,
    done: Mutex<Option<mpsc::UnboundedSender<()>>>,
}

impl Mirror {
    fn log(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    fn layout(&self) -> SectionLayout {
        self.layout.lock().clone()
    }
}

impl AggregateDelegate for Mirror {
    fn will_change_content(&self) {
        self.log.lock().push("will".into());
    }

    fn did_change_member(&self, member: MemberId, script: &ChangeScript) {
        self.layout
            .lock()
            .apply(script)
            .expect("shifted script addresses the combined layout");
        self.log.lock().push(member.to_string());
    }

    fn did_change_content(&self) {
        self.log.lock().push("did".into());
        if let Some(done) = self.done.lock().as_ref() {
            let _ = done.send(());
        }
    }
}

struct Member {
    set: ResultSet,
    delegate: MemberDelegate,
}

impl Member {
    fn new(delegate: MemberDelegate) -> Self {
        Self {
            set: ResultSet::new(cat_ordering()),
            delegate,
        }
    }

    fn transition(&mut self, batch: &Batch) -> ChangeScript {
        let mut after = self.set.clone();
        after.apply(batch);
        let script = diff(&self.set, &after, &batch.changed_identities());
        self.set = after;
        script
    }

    fn layout(&self) -> SectionLayout {
        SectionLayout::from_result_set(&self.set)
    }
}

fn combined(members: &[Member]) -> SectionLayout {
    let layouts: Vec<SectionLayout> = members.iter().map(Member::layout).collect();
    SectionLayout::concat(&layouts)
}

fn inserts(records: Vec<Record>) -> Batch {
    Batch::inserts(records)
}

#[test]
fn sequential_transitions_shift_by_preceding_sections() {
    let mirror = Arc::new(Mirror::default());
    let aggregator = ResultAggregator::new(mirror.clone());
    let mut a = Member::new(aggregator.attach());
    let mut b = Member::new(aggregator.attach());

    let script = a.transition(&inserts(vec![cat_record("a1", "m", 1), cat_record("a2", "n", 1)]));
    a.delegate.will_change_content();
    a.delegate.did_change_content(&script);

    let script = b.transition(&inserts(vec![cat_record("b1", "m", 1)]));
    b.delegate.will_change_content();
    b.delegate.did_change_content(&script);

    assert_eq!(mirror.layout(), combined(&[a, b]));
    assert_eq!(aggregator.section_count(), 3);
    assert_eq!(mirror.log().iter().filter(|l| *l == "will").count(), 2);
}

#[test]
fn overlapping_transitions_report_once_in_member_order() {
    let mirror = Arc::new(Mirror::default());
    let aggregator = ResultAggregator::new(mirror.clone());
    let mut a = Member::new(aggregator.attach());
    let mut b = Member::new(aggregator.attach());

    let script_a = a.transition(&inserts(vec![cat_record("a1", "m", 1)]));
    let script_b = b.transition(&inserts(vec![cat_record("b1", "k", 1), cat_record("b2", "z", 1)]));

    a.delegate.will_change_content();
    b.delegate.will_change_content();
    assert!(aggregator.is_changing());
    b.delegate.did_change_content(&script_b);
    assert_eq!(mirror.log(), vec!["will".to_string()]);
    a.delegate.did_change_content(&script_a);
    assert!(!aggregator.is_changing());

    assert_eq!(
        mirror.log(),
        vec![
            "will".to_string(),
            a.delegate.id().to_string(),
            b.delegate.id().to_string(),
            "did".to_string(),
        ]
    );
    assert_eq!(mirror.layout(), combined(&[a, b]));
}

#[test]
fn locate_and_global_section_follow_member_order() {
    let aggregator = ResultAggregator::new(Arc::new(Mirror::default()));
    let mut a = Member::new(aggregator.attach());
    let mut extra = Member::new(aggregator.attach_extra().unwrap());
    let mut b = Member::new(aggregator.attach());

    for (member, records) in [
        (&mut a, vec![cat_record("a1", "m", 1), cat_record("a2", "n", 1)]),
        (&mut extra, vec![cat_record("e1", "e", 1)]),
        (&mut b, vec![cat_record("b1", "m", 1)]),
    ] {
        let script = member.transition(&inserts(records));
        member.delegate.will_change_content();
        member.delegate.did_change_content(&script);
    }

    let (a, b, extra) = (a.delegate.id(), b.delegate.id(), extra.delegate.id());
    assert_eq!(aggregator.members(), vec![a, b, extra]);
    assert_eq!(aggregator.locate(0), Ok((a, 0)));
    assert_eq!(aggregator.locate(1), Ok((a, 1)));
    assert_eq!(aggregator.locate(2), Ok((b, 0)));
    assert_eq!(aggregator.locate(3), Ok((extra, 0)));
    assert_eq!(
        aggregator.locate(4),
        Err(AggregateError::SectionOutOfRange { section: 4, count: 4 })
    );
    assert_eq!(aggregator.global_section(extra, 0), Ok(3));
    assert_eq!(aggregator.global_section(b, 0), Ok(2));
    assert!(aggregator.global_section(b, 1).is_err());
}

#[derive(Debug, Clone)]
enum Op {
    Insert(u8, u8, i64),
    Update(u8, u8, i64),
    Remove(u8),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..8u8, 0..3u8, 0..4i64).prop_map(|(id, cat, n)| Op::Insert(id, cat, n)),
        (0..8u8, 0..3u8, 0..4i64).prop_map(|(id, cat, n)| Op::Update(id, cat, n)),
        (0..8u8).prop_map(Op::Remove),
    ]
}

fn batch(ops: &[Op]) -> Batch {
    let mut batch = Batch::default();
    let mut seen = std::collections::HashSet::new();
    for op in ops.iter().rev() {
        let id = match op {
            Op::Insert(id, ..) | Op::Update(id, ..) | Op::Remove(id) => *id,
        };
        if !seen.insert(id) {
            continue;
        }
        let record = |cat: u8, n: i64| cat_record(&format!("r{id}"), &format!("c{cat}"), n);
        match *op {
            Op::Insert(_, cat, n) => batch.inserted.push(record(cat, n)),
            Op::Update(_, cat, n) => batch.updated.push(record(cat, n)),
            Op::Remove(_) => batch.removed.push(record(0, 0)),
        }
    }
    batch
}

proptest! {
    #[test]
    fn prop_mirror_matches_members(
        rounds in prop::collection::vec(
            (prop::collection::vec(prop::collection::vec(op(), 0..6), 3), any::<bool>()),
            1..6,
        )
    ) {
        let mirror = Arc::new(Mirror::default());
        let aggregator = ResultAggregator::new(mirror.clone());
        let mut members = vec![
            Member::new(aggregator.attach()),
            Member::new(aggregator.attach_extra().unwrap()),
            Member::new(aggregator.attach()),
        ];
        // aggregate order puts the extra member last
        members.swap(1, 2);

        for (ops, overlap) in &rounds {
            let scripts: Vec<ChangeScript> = members
                .iter_mut()
                .zip(ops)
                .map(|(member, ops)| member.transition(&batch(ops)))
                .collect();

            if *overlap {
                for member in &members {
                    member.delegate.will_change_content();
                }
                for (member, script) in members.iter().zip(&scripts).rev() {
                    member.delegate.did_change_content(script);
                }
            } else {
                for (member, script) in members.iter().zip(&scripts) {
                    member.delegate.will_change_content();
                    member.delegate.did_change_content(script);
                }
            }

            prop_assert_eq!(mirror.layout(), combined(&members));
        }
    }
}

#[tokio::test(start_paused = true)]
async fn controllers_feed_one_aggregate() {
    let (done_tx, mut done) = mpsc::unbounded_channel();
    let mirror = Arc::new(Mirror::default());
    *mirror.done.lock() = Some(done_tx);
    let aggregator = ResultAggregator::new(mirror.clone());

    let first_feed = MemoryFeed::with_initial(vec![cat_record("a", "x", 1), cat_record("b", "y", 1)]);
    let second_feed = MemoryFeed::with_initial(vec![cat_record("c", "x", 1)]);
    let first = LiveResultsController::new(first_feed, cat_ordering(), Arc::new(aggregator.attach()));
    let second_member = aggregator.attach();
    let second_id = second_member.id();
    let second = LiveResultsController::new(second_feed.clone(), cat_ordering(), Arc::new(second_member));

    first.perform_fetch(&"first".to_string()).await.unwrap();
    second.perform_fetch(&"second".to_string()).await.unwrap();
    // the two initial loads may overlap into a single aggregate transition
    while aggregator.section_count() < 3 {
        tokio::time::timeout(Duration::from_secs(5), done.recv())
            .await
            .unwrap()
            .unwrap();
    }

    let expected = SectionLayout::concat([
        &SectionLayout::from_result_set(&first.snapshot()),
        &SectionLayout::from_result_set(&second.snapshot()),
    ]);
    assert_eq!(mirror.layout(), expected);
    assert_eq!(aggregator.locate(2), Ok((second_id, 0)));

    second_feed.add(cat_record("d", "w", 1));
    second.process_batch().unwrap();
    tokio::time::timeout(Duration::from_secs(5), done.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(aggregator.section_count(), 4);
    assert_eq!(aggregator.global_section(second_id, 0), Ok(2));
}
