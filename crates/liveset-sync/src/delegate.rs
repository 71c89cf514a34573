//! Change notification surface

use liveset_core::{ChangeScript, ChangeStep, IndexPath, Record};

/// Kind of structural section change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionChangeKind {
    /// Section appeared
    Insert,
    /// Section disappeared
    Delete,
}

/// Kind of row change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowChangeKind {
    /// Row appeared at `to`
    Insert,
    /// Row disappeared from `from`
    Delete,
    /// Row moved from `from` to `to`
    Move,
    /// Row content changed in place at `from`
    Update,
}

/// Consumer of result set transitions
///
/// Every transition is bracketed: one [`will_change_content`] call, then the
/// flattened per-section and per-row callbacks in [`ChangeScript::steps`]
/// order, then one [`did_change_content`] with the full script.
///
/// [`will_change_content`]: ResultSetDelegate::will_change_content
/// [`did_change_content`]: ResultSetDelegate::did_change_content
pub trait ResultSetDelegate: Send + Sync {
    /// A batch has started
    fn will_change_content(&self) {}

    /// A section was inserted or deleted
    fn did_change_section(&self, _key: &str, _index: usize, _kind: SectionChangeKind) {}

    /// A row was inserted, deleted, moved, or updated
    fn did_change_row(
        &self,
        _record: &Record,
        _from: Option<IndexPath>,
        _to: Option<IndexPath>,
        _kind: RowChangeKind,
    ) {
    }

    /// The batch is applied; `script` is the full transition
    fn did_change_content(&self, _script: &ChangeScript) {}
}

/// Delegate that ignores every notification
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDelegate;

impl ResultSetDelegate for NoopDelegate {}

/// Walk a script's steps as section and row callbacks
pub fn flatten<S, R>(script: &ChangeScript, mut on_section: S, mut on_row: R)
where
    S: FnMut(&str, usize, SectionChangeKind),
    R: FnMut(&Record, Option<IndexPath>, Option<IndexPath>, RowChangeKind),
{
    for step in script.steps() {
        match step {
            ChangeStep::UpdateRow(c) => on_row(&c.record, Some(c.path), None, RowChangeKind::Update),
            ChangeStep::RemoveRow(c) => on_row(&c.record, Some(c.path), None, RowChangeKind::Delete),
            ChangeStep::RemoveSection(s) => on_section(&s.key, s.index, SectionChangeKind::Delete),
            ChangeStep::InsertSection(s) => on_section(&s.key, s.index, SectionChangeKind::Insert),
            ChangeStep::InsertRow(c) => on_row(&c.record, None, Some(c.path), RowChangeKind::Insert),
            ChangeStep::MoveRow(m) => on_row(&m.record, Some(m.from), Some(m.to), RowChangeKind::Move),
        }
    }
}

/// Send a script's flattened callbacks followed by `did_change_content`
///
/// The caller is responsible for the preceding `will_change_content`.
pub fn deliver_script(delegate: &dyn ResultSetDelegate, script: &ChangeScript) {
    flatten(
        script,
        |key, index, kind| delegate.did_change_section(key, index, kind),
        |record, from, to, kind| delegate.did_change_row(record, from, to, kind),
    );
    delegate.did_change_content(script);
}

#[cfg(test)]
mod tests {
    use super::*;
    use liveset_core::{diff, Batch, OrderingSpec, ResultSet, Value};
    use parking_lot::Mutex;
    use std::collections::HashSet;

    #[derive(Default)]
    struct Calls(Mutex<Vec<String>>);

    impl ResultSetDelegate for Calls {
        fn did_change_section(&self, key: &str, index: usize, kind: SectionChangeKind) {
            self.0.lock().push(format!("section {kind:?} {key}@{index}"));
        }

        fn did_change_row(
            &self,
            record: &Record,
            from: Option<IndexPath>,
            to: Option<IndexPath>,
            kind: RowChangeKind,
        ) {
            let at = |p: Option<IndexPath>| p.map_or_else(|| "-".to_string(), |p| p.to_string());
            self.0
                .lock()
                .push(format!("row {kind:?} {} {} {}", record.identity(), at(from), at(to)));
        }

        fn did_change_content(&self, script: &ChangeScript) {
            self.0.lock().push(format!("done {}", script.len()));
        }
    }

    #[test]
    fn flattened_order_ends_with_content_change() {
        let ordering = OrderingSpec::new()
            .with_section_key("cat".parse().unwrap())
            .ascending_by("n".parse().unwrap());
        let mut before = ResultSet::new(ordering);
        before.apply(&Batch::inserts(vec![
            Record::new("p", Value::map().with("cat", "x").with("n", 1)),
            Record::new("q", Value::map().with("cat", "x").with("n", 2)),
        ]));

        let change = Batch {
            updated: vec![Record::new("q", Value::map().with("cat", "y").with("n", 2))],
            ..Batch::default()
        };
        let mut after = before.clone();
        after.apply(&change);
        let script = diff(&before, &after, &change.changed_identities());

        let calls = Calls::default();
        deliver_script(&calls, &script);

        assert_eq!(
            calls.0.into_inner(),
            vec![
                "row Delete q [0, 1] -".to_string(),
                "section Insert y@1".to_string(),
                "row Insert q - [1, 0]".to_string(),
                "done 3".to_string(),
            ]
        );
    }

    #[test]
    fn noop_delegate_accepts_everything() {
        let script = diff(
            &ResultSet::new(OrderingSpec::new()),
            &ResultSet::new(OrderingSpec::new()),
            &HashSet::new(),
        );
        deliver_script(&NoopDelegate, &script);
        assert!(script.is_empty());
    }
}
