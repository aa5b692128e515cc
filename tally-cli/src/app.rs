use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tally_core::Session;
use unicode_width::UnicodeWidthChar;

/// The popup drawn over the sheet, if any.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Overlay {
    None,
    Completions { items: Vec<String>, selected: usize },
    Help,
    /// Digits typed so far.
    GoToLine(String),
}

/// What the main loop should do after a key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Continue,
    Quit,
    CopyResult,
}

/// Where a mouse click landed on the sheet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Hit {
    /// Expression text of `line`, `column` cells after the gutter.
    Input { line: usize, column: usize },
    Result { line: usize },
}

/// Presentation state. The sheet itself lives in the [`Session`].
pub struct App {
    pub overlay: Overlay,
    /// First sheet line shown.
    pub scroll_offset: usize,
    /// Sheet rows visible in the last frame.
    pub viewport_rows: usize,
    pub tick: usize,
    /// One-shot message in the status bar, cleared by the next key.
    pub status: Option<String>,
    pub dirty: bool,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    pub fn new() -> Self {
        Self {
            overlay: Overlay::None,
            scroll_offset: 0,
            viewport_rows: 1,
            tick: 0,
            status: None,
            dirty: true,
        }
    }

    pub fn set_status(&mut self, msg: impl Into<String>) {
        self.status = Some(msg.into());
    }

    /// Scroll so `focus` is on screen and nothing past the last line is.
    pub fn ensure_visible(&mut self, focus: usize, len: usize) {
        let rows = self.viewport_rows.max(1);
        if focus < self.scroll_offset {
            self.scroll_offset = focus;
        } else if focus >= self.scroll_offset + rows {
            self.scroll_offset = focus + 1 - rows;
        }
        self.scroll_offset = self.scroll_offset.min(len.saturating_sub(rows));
    }

    pub fn scroll_up(&mut self, amount: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(amount);
    }

    pub fn scroll_down(&mut self, amount: usize, len: usize) {
        let max = len.saturating_sub(self.viewport_rows.max(1));
        self.scroll_offset = (self.scroll_offset + amount).min(max);
    }

    pub fn handle_key(&mut self, session: &mut Session, key: KeyEvent) -> Action {
        self.status = None;
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Action::Quit;
        }
        match &mut self.overlay {
            Overlay::None => self.handle_sheet_key(session, key),
            Overlay::Help => {
                self.overlay = Overlay::None;
                Action::Continue
            }
            Overlay::GoToLine(digits) => {
                match key.code {
                    KeyCode::Char(c) if c.is_ascii_digit() => digits.push(c),
                    KeyCode::Backspace => {
                        digits.pop();
                    }
                    KeyCode::Enter => {
                        let target = digits.parse::<usize>().unwrap_or(0);
                        self.overlay = Overlay::None;
                        if !session.go_to_line(target) {
                            self.set_status("No such line");
                        }
                    }
                    KeyCode::Esc => self.overlay = Overlay::None,
                    _ => {}
                }
                Action::Continue
            }
            Overlay::Completions { items, selected } => {
                let accept = matches!(key.code, KeyCode::Enter | KeyCode::Tab)
                    || (key.code == KeyCode::Char('y')
                        && key.modifiers.contains(KeyModifiers::CONTROL));
                if accept {
                    let choice = items[*selected].clone();
                    self.overlay = Overlay::None;
                    session.insert_completion(&choice);
                    return Action::Continue;
                }
                match key.code {
                    KeyCode::Up => *selected = selected.saturating_sub(1),
                    KeyCode::Down => *selected = (*selected + 1).min(items.len() - 1),
                    KeyCode::Esc => self.overlay = Overlay::None,
                    KeyCode::Char(c) if !has_command_modifier(key.modifiers) => {
                        session.type_char(c);
                        self.refresh_completions(session);
                    }
                    KeyCode::Backspace => {
                        session.backspace();
                        self.refresh_completions(session);
                    }
                    _ => {
                        self.overlay = Overlay::None;
                        return self.handle_sheet_key(session, key);
                    }
                }
                Action::Continue
            }
        }
    }

    fn handle_sheet_key(&mut self, session: &mut Session, key: KeyEvent) -> Action {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('h') => self.overlay = Overlay::Help,
                KeyCode::Char('r') => session.insert_symbol("√"),
                KeyCode::Char('a') => session.insert_symbol("ans"),
                KeyCode::Char('p') => session.insert_symbol("π"),
                KeyCode::Char('t') => session.insert_template(),
                KeyCode::Char('d') => session.delete_line(),
                KeyCode::Char('n') => session.clear_all(),
                KeyCode::Char('l') => self.overlay = Overlay::GoToLine(String::new()),
                KeyCode::Char('z') => {
                    if !session.undo() {
                        self.set_status("Nothing to undo");
                    }
                }
                KeyCode::Char('y') => {
                    if !session.redo() {
                        self.set_status("Nothing to redo");
                    }
                }
                KeyCode::Char('s') => return Action::CopyResult,
                KeyCode::Char(' ') => self.open_completions(session),
                _ => {}
            }
            return Action::Continue;
        }

        match key.code {
            KeyCode::Esc => return Action::Quit,
            KeyCode::F(1) => self.overlay = Overlay::Help,
            KeyCode::Tab => self.open_completions(session),
            KeyCode::Enter => session.insert_line(),
            KeyCode::Up => session.focus_up(),
            KeyCode::Down => session.focus_down(),
            KeyCode::PageUp => session.focus_first(),
            KeyCode::PageDown => session.focus_last(),
            KeyCode::Left => session.cursor_left(),
            KeyCode::Right => session.cursor_right(),
            KeyCode::Home => session.cursor_home(),
            KeyCode::End => session.cursor_end(),
            KeyCode::Backspace => session.backspace(),
            KeyCode::Delete => session.delete_forward(),
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::ALT) => {
                session.type_char(c)
            }
            _ => {}
        }
        Action::Continue
    }

    pub fn handle_click(&mut self, session: &mut Session, hit: Hit) {
        self.overlay = Overlay::None;
        match hit {
            Hit::Input { line, column } => {
                session.set_focus(line);
                let offset = byte_offset_at_column(session.sheet().expression(line), column);
                session.set_cursor(offset);
            }
            Hit::Result { line } => {
                if session.insert_reference(line) {
                    self.set_status(format!("Inserted ans{}", line + 1));
                }
            }
        }
    }

    fn open_completions(&mut self, session: &Session) {
        let items = session.completions();
        if items.is_empty() {
            self.set_status("No completions");
        } else {
            self.overlay = Overlay::Completions { items, selected: 0 };
        }
    }

    /// Recompute the open popup after the word before the cursor changed.
    fn refresh_completions(&mut self, session: &Session) {
        let items = session.completions();
        self.overlay = if items.is_empty() {
            Overlay::None
        } else {
            Overlay::Completions { items, selected: 0 }
        };
    }
}

fn has_command_modifier(modifiers: KeyModifiers) -> bool {
    modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
}

/// Byte offset of the char drawn at display `column` of `text`, or the end of
/// `text` when the column is past it.
pub fn byte_offset_at_column(text: &str, column: usize) -> usize {
    let mut width = 0;
    for (i, c) in text.char_indices() {
        let w = c.width().unwrap_or(0);
        if width + w > column {
            return i;
        }
        width += w;
    }
    text.len()
}
