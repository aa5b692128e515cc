const WORD_DELIMITERS: &[char] = &[' ', '+', '-', '*', '/', '=', '(', ')'];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EvalState {
    #[default]
    Idle,
    Evaluating,
    Done,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Line {
    pub expression: String,
    pub result: String,
    /// `result` is an error message rather than a value.
    pub failed: bool,
    pub state: EvalState,
}

impl Line {
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            ..Self::default()
        }
    }
}

/// The ordered lines of a calculation sheet plus the edit position.
///
/// Always holds at least one line. `cursor` is a byte offset into the focused
/// line's expression and always sits on a char boundary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sheet {
    lines: Vec<Line>,
    focus: usize,
    cursor: usize,
}

impl Default for Sheet {
    fn default() -> Self {
        Self::new()
    }
}

fn floor_char_boundary(s: &str, pos: usize) -> usize {
    let mut pos = pos.min(s.len());
    while !s.is_char_boundary(pos) {
        pos -= 1;
    }
    pos
}

impl Sheet {
    pub fn new() -> Self {
        Self {
            lines: vec![Line::default()],
            focus: 0,
            cursor: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Always false: a sheet holds at least one line.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn line(&self, index: usize) -> Option<&Line> {
        self.lines.get(index)
    }

    pub fn expression(&self, index: usize) -> &str {
        self.lines.get(index).map_or("", |l| l.expression.as_str())
    }

    pub fn result(&self, index: usize) -> &str {
        self.lines.get(index).map_or("", |l| l.result.as_str())
    }

    pub fn results(&self) -> Vec<String> {
        self.lines.iter().map(|l| l.result.clone()).collect()
    }

    pub fn focus(&self) -> usize {
        self.focus
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn focused(&self) -> &Line {
        &self.lines[self.focus]
    }

    /// Text of the focused line up to the cursor.
    pub fn text_before_cursor(&self) -> &str {
        &self.focused().expression[..self.cursor]
    }

    /// Replace every line, clamping focus and cursor into range.
    pub(crate) fn reset(&mut self, lines: Vec<Line>, focus: usize, cursor: usize) {
        self.lines = if lines.is_empty() {
            vec![Line::default()]
        } else {
            lines
        };
        self.focus = focus.min(self.lines.len() - 1);
        self.cursor = floor_char_boundary(&self.lines[self.focus].expression, cursor);
    }

    // ── Structure ──

    /// Insert an empty line after the focused one and focus it.
    pub fn insert_after_focus(&mut self) -> usize {
        let at = self.focus + 1;
        self.lines.insert(at, Line::default());
        self.focus = at;
        self.cursor = 0;
        at
    }

    /// Remove the focused line. The only line is cleared instead; returns
    /// whether a line was actually removed.
    pub fn remove_focused(&mut self) -> bool {
        if self.lines.len() == 1 {
            self.lines[0] = Line::default();
            self.cursor = 0;
            return false;
        }
        self.lines.remove(self.focus);
        if self.focus >= self.lines.len() {
            self.focus = self.lines.len() - 1;
        }
        self.cursor = self.focused().expression.len();
        true
    }

    pub fn clear(&mut self) {
        self.reset(Vec::new(), 0, 0);
    }

    /// Append lines at the end and focus the last one. A sheet holding a
    /// single empty line has that line replaced. Returns the index of the
    /// first new line, or `None` if `lines` was empty.
    pub fn append_lines<I>(&mut self, lines: I) -> Option<usize>
    where
        I: IntoIterator<Item = String>,
    {
        let new: Vec<Line> = lines.into_iter().map(Line::new).collect();
        if new.is_empty() {
            return None;
        }
        let lone_empty = self.lines.len() == 1 && self.lines[0].expression.is_empty();
        if lone_empty {
            self.lines.clear();
        }
        let first = self.lines.len();
        self.lines.extend(new);
        self.focus = self.lines.len() - 1;
        self.cursor = self.focused().expression.len();
        Some(first)
    }

    // ── Text ──

    /// Replace the text of line `index`. Returns false if nothing changed.
    pub fn set_text(&mut self, index: usize, text: &str) -> bool {
        let Some(line) = self.lines.get_mut(index) else {
            return false;
        };
        if line.expression == text {
            return false;
        }
        line.expression = text.to_string();
        if index == self.focus {
            self.cursor = floor_char_boundary(&self.lines[index].expression, self.cursor);
        }
        true
    }

    pub fn insert_at_cursor(&mut self, text: &str) {
        let cursor = self.cursor;
        self.lines[self.focus].expression.insert_str(cursor, text);
        self.cursor += text.len();
    }

    /// Replace the word ending at the cursor (delimited by a space or an
    /// operator) with `replacement`.
    pub fn replace_word_before_cursor(&mut self, replacement: &str) {
        let before = self.text_before_cursor();
        let start = before
            .char_indices()
            .rev()
            .find(|(_, c)| WORD_DELIMITERS.contains(c))
            .map_or(0, |(i, c)| i + c.len_utf8());
        let cursor = self.cursor;
        self.lines[self.focus]
            .expression
            .replace_range(start..cursor, replacement);
        self.cursor = start + replacement.len();
    }

    /// Delete the char before the cursor. Returns false at the start of line.
    pub fn delete_before_cursor(&mut self) -> bool {
        let Some((i, _)) = self.text_before_cursor().char_indices().next_back() else {
            return false;
        };
        self.lines[self.focus].expression.remove(i);
        self.cursor = i;
        true
    }

    /// Delete the char under the cursor. Returns false at the end of line.
    pub fn delete_at_cursor(&mut self) -> bool {
        let cursor = self.cursor;
        let line = &mut self.lines[self.focus].expression;
        if cursor >= line.len() {
            return false;
        }
        line.remove(cursor);
        true
    }

    // ── Focus & cursor ──

    /// Focus line `index` (clamped to the last line), cursor at end of line.
    pub fn set_focus(&mut self, index: usize) {
        self.focus = index.min(self.lines.len() - 1);
        self.cursor = self.focused().expression.len();
    }

    pub fn set_cursor(&mut self, pos: usize) {
        self.cursor = floor_char_boundary(&self.focused().expression, pos);
    }

    pub fn cursor_left(&mut self) {
        if let Some((i, _)) = self.text_before_cursor().char_indices().next_back() {
            self.cursor = i;
        }
    }

    pub fn cursor_right(&mut self) {
        if let Some(c) = self.focused().expression[self.cursor..].chars().next() {
            self.cursor += c.len_utf8();
        }
    }

    pub fn cursor_home(&mut self) {
        self.cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.cursor = self.focused().expression.len();
    }

    // ── Results ──

    pub fn record_result(&mut self, index: usize, result: String) {
        self.record(index, result, false);
    }

    pub fn record_failure(&mut self, index: usize, message: String) {
        self.record(index, message, true);
    }

    fn record(&mut self, index: usize, result: String, failed: bool) {
        if let Some(line) = self.lines.get_mut(index) {
            line.result = result;
            line.failed = failed;
            line.state = EvalState::Done;
        }
    }

    /// Clear the result of line `index`. Returns whether a non-empty result
    /// was removed.
    pub fn clear_result(&mut self, index: usize) -> bool {
        let Some(line) = self.lines.get_mut(index) else {
            return false;
        };
        line.state = EvalState::Idle;
        line.failed = false;
        !std::mem::take(&mut line.result).is_empty()
    }

    pub fn set_state(&mut self, index: usize, state: EvalState) {
        if let Some(line) = self.lines.get_mut(index) {
            line.state = state;
        }
    }
}
