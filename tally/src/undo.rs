use std::collections::VecDeque;

use crate::sheet::{Line, Sheet};

pub const DEFAULT_CAPACITY: usize = 50;

/// Deep copy of the user-visible sheet state. Evaluation state is not
/// captured; a restored sheet starts with every line idle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    pub expressions: Vec<String>,
    pub results: Vec<String>,
    pub failed: Vec<bool>,
    pub focus: usize,
    pub cursor: usize,
}

impl Snapshot {
    pub fn capture(sheet: &Sheet) -> Self {
        Self {
            expressions: sheet.lines().iter().map(|l| l.expression.clone()).collect(),
            results: sheet.results(),
            failed: sheet.lines().iter().map(|l| l.failed).collect(),
            focus: sheet.focus(),
            cursor: sheet.cursor(),
        }
    }
}

/// Bounded undo and redo stacks of [`Snapshot`]s. The oldest snapshot is
/// evicted once a stack reaches capacity.
#[derive(Debug)]
pub struct UndoEngine {
    undo: VecDeque<Snapshot>,
    redo: VecDeque<Snapshot>,
    capacity: usize,
}

impl Default for UndoEngine {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

fn push_bounded(stack: &mut VecDeque<Snapshot>, snapshot: Snapshot, capacity: usize) {
    stack.push_back(snapshot);
    while stack.len() > capacity {
        stack.pop_front();
    }
}

impl UndoEngine {
    pub fn new(capacity: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Record the state before a mutation. Clears the redo stack.
    pub fn save_state(&mut self, sheet: &Sheet) {
        push_bounded(&mut self.undo, Snapshot::capture(sheet), self.capacity);
        self.redo.clear();
    }

    pub fn undo(&mut self, sheet: &mut Sheet) -> bool {
        let Some(previous) = self.undo.pop_back() else {
            return false;
        };
        push_bounded(&mut self.redo, Snapshot::capture(sheet), self.capacity);
        Self::restore(sheet, &previous);
        true
    }

    pub fn redo(&mut self, sheet: &mut Sheet) -> bool {
        let Some(next) = self.redo.pop_back() else {
            return false;
        };
        push_bounded(&mut self.undo, Snapshot::capture(sheet), self.capacity);
        Self::restore(sheet, &next);
        true
    }

    /// Rebuild `sheet` from `snapshot`, every line idle, focus and cursor
    /// clamped into range.
    pub fn restore(sheet: &mut Sheet, snapshot: &Snapshot) {
        let lines = snapshot
            .expressions
            .iter()
            .enumerate()
            .map(|(i, expression)| Line {
                expression: expression.clone(),
                result: snapshot.results.get(i).cloned().unwrap_or_default(),
                failed: snapshot.failed.get(i).copied().unwrap_or_default(),
                ..Line::default()
            })
            .collect();
        sheet.reset(lines, snapshot.focus, snapshot.cursor);
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::EvalState;

    fn sheet(lines: &[&str]) -> Sheet {
        let mut s = Sheet::new();
        s.append_lines(lines.iter().map(|l| l.to_string()));
        s
    }

    #[test]
    fn undo_on_empty_stack_is_noop() {
        let mut engine = UndoEngine::default();
        let mut s = sheet(&["1"]);
        assert!(!engine.undo(&mut s));
        assert!(!engine.redo(&mut s));
        assert_eq!(s, sheet(&["1"]));
    }

    #[test]
    fn undo_restores_previous_state() {
        let mut engine = UndoEngine::default();
        let mut s = sheet(&["1"]);
        engine.save_state(&s);
        s.insert_after_focus();
        s.insert_at_cursor("2");

        assert!(engine.undo(&mut s));
        assert_eq!(Snapshot::capture(&s), Snapshot::capture(&sheet(&["1"])));
        assert!(engine.can_redo());
    }

    #[test]
    fn undo_then_redo_is_identity() {
        let mut engine = UndoEngine::default();
        let mut s = sheet(&["2+2"]);
        s.record_result(0, "4".into());
        engine.save_state(&s);
        s.insert_after_focus();
        s.insert_at_cursor("ans*2");
        let before = Snapshot::capture(&s);

        assert!(engine.undo(&mut s));
        assert!(engine.redo(&mut s));
        assert_eq!(Snapshot::capture(&s), before);
    }

    #[test]
    fn undo_keeps_error_flag() {
        let mut engine = UndoEngine::default();
        let mut s = sheet(&["1/x"]);
        s.record_failure(0, "error: undefined x".into());
        engine.save_state(&s);
        s.set_text(0, "1");
        s.record_result(0, "1".into());

        assert!(engine.undo(&mut s));
        assert!(s.lines()[0].failed);
        assert_eq!(s.result(0), "error: undefined x");
    }

    #[test]
    fn save_after_undo_clears_redo() {
        let mut engine = UndoEngine::default();
        let mut s = sheet(&["1"]);
        engine.save_state(&s);
        s.insert_after_focus();
        engine.undo(&mut s);
        assert_eq!(engine.redo_len(), 1);

        engine.save_state(&s);
        assert!(!engine.can_redo());
    }

    #[test]
    fn capacity_evicts_oldest_first() {
        let mut engine = UndoEngine::new(3);
        let mut s = Sheet::new();
        for i in 0..5 {
            s.set_text(0, &i.to_string());
            engine.save_state(&s);
        }
        assert_eq!(engine.undo_len(), 3);

        let mut seen = Vec::new();
        while engine.undo(&mut s) {
            seen.push(s.expression(0).to_string());
        }
        assert_eq!(seen, ["4", "3", "2"]);
    }

    #[test]
    fn default_capacity_is_fifty() {
        let mut engine = UndoEngine::default();
        let s = Sheet::new();
        for _ in 0..80 {
            engine.save_state(&s);
        }
        assert_eq!(engine.undo_len(), DEFAULT_CAPACITY);
    }

    #[test]
    fn restore_resets_state_and_clamps() {
        let mut s = sheet(&["1", "2"]);
        s.set_state(0, EvalState::Evaluating);
        let snapshot = Snapshot {
            expressions: vec!["héllo".into()],
            results: vec![],
            failed: vec![],
            focus: 4,
            cursor: 2,
        };
        UndoEngine::restore(&mut s, &snapshot);
        assert_eq!(s.len(), 1);
        assert_eq!(s.focus(), 0);
        assert_eq!(s.cursor(), 1);
        assert_eq!(s.lines()[0].state, EvalState::Idle);
        assert_eq!(s.result(0), "");
    }

    #[test]
    fn restore_of_empty_snapshot_yields_one_line() {
        let mut s = sheet(&["1"]);
        let snapshot = Snapshot {
            expressions: vec![],
            results: vec![],
            failed: vec![],
            focus: 0,
            cursor: 0,
        };
        UndoEngine::restore(&mut s, &snapshot);
        assert_eq!(s, Sheet::new());
    }
}
