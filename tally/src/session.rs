use std::sync::Arc;

use tokio::sync::mpsc;

use crate::catalog::SymbolCatalog;
use crate::completions::completion_candidates;
use crate::evaluator::Evaluator;
use crate::manager::{CalculationManager, Completion, CompletionSink};
use crate::sheet::Sheet;
use crate::undo::UndoEngine;

/// Lines inserted by [`Session::insert_template`].
pub const TEMPLATE: &str = "\
1450 * 12 // yearly rent
ans * 1.03 // next year
sqrt(144) + 2^3
ans1 / 365
250 € to $
";

/// One open calculation sheet: the lines, their evaluations and the undo
/// history. Every user intent goes through here; it must be driven from a
/// single event loop that also feeds back completions from the sink.
pub struct Session {
    sheet: Sheet,
    manager: CalculationManager,
    history: UndoEngine,
}

impl Session {
    pub async fn new(
        evaluator: Arc<Evaluator>,
        sink: Arc<dyn CompletionSink>,
        history_capacity: usize,
    ) -> Self {
        let catalog = evaluator.catalog().await;
        let mut manager = CalculationManager::new(evaluator, catalog, sink);
        let sheet = Sheet::new();
        manager.resize(sheet.len());
        Self {
            sheet,
            manager,
            history: UndoEngine::new(history_capacity),
        }
    }

    pub fn sheet(&self) -> &Sheet {
        &self.sheet
    }

    pub fn history(&self) -> &UndoEngine {
        &self.history
    }

    pub fn catalog(&self) -> &SymbolCatalog {
        self.manager.catalog()
    }

    pub fn in_flight(&self) -> usize {
        self.manager.in_flight()
    }

    pub fn handle_completion(&mut self, completion: Completion) -> bool {
        self.manager.complete(&mut self.sheet, completion)
    }

    /// Apply completions until no evaluation is in flight.
    pub async fn settle(&mut self, completions: &mut mpsc::UnboundedReceiver<Completion>) {
        while self.manager.in_flight() > 0 {
            let Some(completion) = completions.recv().await else {
                break;
            };
            self.handle_completion(completion);
        }
    }

    /// Completion candidates for the word before the cursor.
    pub fn completions(&self) -> Vec<String> {
        completion_candidates(
            self.sheet.text_before_cursor(),
            &self.sheet.results(),
            self.manager.catalog(),
        )
    }

    fn snapshot(&mut self) {
        self.history.save_state(&self.sheet);
    }

    fn submit_focused(&mut self) {
        let focus = self.sheet.focus();
        self.manager.submit(&mut self.sheet, focus);
    }

    // ── Typing (not undoable) ──

    /// Replace the focused line's text and put the cursor at its end.
    pub fn set_focused_text(&mut self, text: &str) {
        let focus = self.sheet.focus();
        self.edit_line(focus, text);
        self.sheet.cursor_end();
    }

    pub fn edit_line(&mut self, index: usize, text: &str) {
        if self.sheet.set_text(index, text) {
            self.manager.submit(&mut self.sheet, index);
        }
    }

    pub fn type_char(&mut self, c: char) {
        let mut buf = [0u8; 4];
        self.sheet.insert_at_cursor(c.encode_utf8(&mut buf));
        self.submit_focused();
    }

    /// Delete before the cursor. On an empty line of a multi-line sheet the
    /// line itself is deleted (undoably).
    pub fn backspace(&mut self) {
        if self.sheet.focused().expression.is_empty() && self.sheet.len() > 1 {
            self.delete_line();
        } else if self.sheet.delete_before_cursor() {
            self.submit_focused();
        }
    }

    pub fn delete_forward(&mut self) {
        if self.sheet.delete_at_cursor() {
            self.submit_focused();
        }
    }

    // ── Navigation (not undoable) ──

    pub fn focus_up(&mut self) {
        if self.sheet.focus() > 0 {
            self.sheet.set_focus(self.sheet.focus() - 1);
        }
    }

    pub fn focus_down(&mut self) {
        if self.sheet.focus() + 1 < self.sheet.len() {
            self.sheet.set_focus(self.sheet.focus() + 1);
        }
    }

    pub fn focus_first(&mut self) {
        self.sheet.set_focus(0);
    }

    pub fn focus_last(&mut self) {
        self.sheet.set_focus(self.sheet.len() - 1);
    }

    pub fn set_focus(&mut self, index: usize) {
        self.sheet.set_focus(index);
    }

    /// Focus 1-based `line`, clamped to the last line. Line 0 is ignored.
    pub fn go_to_line(&mut self, line: usize) -> bool {
        if line == 0 {
            return false;
        }
        self.sheet.set_focus(line - 1);
        true
    }

    pub fn set_cursor(&mut self, pos: usize) {
        self.sheet.set_cursor(pos);
    }

    pub fn cursor_left(&mut self) {
        self.sheet.cursor_left();
    }

    pub fn cursor_right(&mut self) {
        self.sheet.cursor_right();
    }

    pub fn cursor_home(&mut self) {
        self.sheet.cursor_home();
    }

    pub fn cursor_end(&mut self) {
        self.sheet.cursor_end();
    }

    // ── Undoable edits ──

    /// New empty line after the focused one.
    pub fn insert_line(&mut self) {
        self.snapshot();
        let at = self.sheet.insert_after_focus();
        self.manager.insert_slot(at);
        self.manager.resubmit_from(&mut self.sheet, at);
    }

    /// Remove the focused line, or clear it if it is the only one.
    pub fn delete_line(&mut self) {
        self.snapshot();
        let at = self.sheet.focus();
        if self.sheet.remove_focused() {
            self.manager.remove_slot(at);
        }
        self.manager.resubmit_from(&mut self.sheet, at);
    }

    pub fn clear_all(&mut self) {
        self.snapshot();
        self.manager.orphan_all();
        self.sheet.clear();
        self.manager.resize(self.sheet.len());
    }

    /// Paste clipboard text. Multi-line text is appended as new lines;
    /// single-line text is inserted at the cursor.
    pub fn paste(&mut self, text: &str) {
        let text = text.replace("\r\n", "\n").replace('\r', "\n");
        if text.contains('\n') {
            self.append_text(&text);
        } else if !text.is_empty() {
            self.snapshot();
            self.sheet.insert_at_cursor(&text);
            self.submit_focused();
        }
    }

    /// Append each non-blank line of `text` (trimmed) at the end of the sheet
    /// and focus the last one. Returns false if there was nothing to add.
    pub fn append_text(&mut self, text: &str) -> bool {
        let lines: Vec<String> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect();
        if lines.is_empty() {
            return false;
        }
        self.snapshot();
        let Some(first) = self.sheet.append_lines(lines) else {
            return false;
        };
        self.manager.resubmit_from(&mut self.sheet, first);
        true
    }

    pub fn insert_template(&mut self) {
        self.append_text(TEMPLATE);
    }

    pub fn insert_symbol(&mut self, symbol: &str) {
        self.snapshot();
        self.sheet.insert_at_cursor(symbol);
        self.submit_focused();
    }

    /// Replace the word before the cursor with `completion`.
    pub fn insert_completion(&mut self, completion: &str) {
        self.snapshot();
        self.sheet.replace_word_before_cursor(completion);
        self.submit_focused();
    }

    /// Insert a reference (`ansN`) to `line` at the cursor. Only lines with a
    /// result can be referenced.
    pub fn insert_reference(&mut self, line: usize) -> bool {
        if self.sheet.result(line).is_empty() {
            return false;
        }
        self.snapshot();
        self.sheet.insert_at_cursor(&format!("ans{}", line + 1));
        self.submit_focused();
        true
    }

    // ── History ──

    pub fn undo(&mut self) -> bool {
        let restored = self.history.undo(&mut self.sheet);
        if restored {
            self.after_restore();
        }
        restored
    }

    pub fn redo(&mut self) -> bool {
        let restored = self.history.redo(&mut self.sheet);
        if restored {
            self.after_restore();
        }
        restored
    }

    fn after_restore(&mut self) {
        self.manager.orphan_all();
        self.manager.resize(self.sheet.len());
    }
}
