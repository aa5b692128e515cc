use ratatui::{
    Frame,
    layout::{Constraint, Layout, Position, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
};
use tally_core::{EvalState, Session};
use unicode_width::UnicodeWidthStr;

use crate::app::{App, Hit, Overlay};
use crate::theme;

/// Most completion entries shown at once.
const POPUP_ROWS: usize = 8;

const HELP: &[(&str, &str)] = &[
    ("Enter", "new line below"),
    ("Ctrl+D", "delete line"),
    ("Ctrl+N", "clear sheet"),
    ("Ctrl+Z / Ctrl+Y", "undo / redo"),
    ("Tab / Ctrl+Space", "complete function or ans"),
    ("Ctrl+A", "insert ans"),
    ("Ctrl+R", "insert √"),
    ("Ctrl+P", "insert π"),
    ("Ctrl+T", "insert template"),
    ("Ctrl+L", "go to line"),
    ("Ctrl+S", "copy result"),
    ("Click result", "reference that line"),
    ("Up / Down", "previous / next line"),
    ("PgUp / PgDn", "first / last line"),
    ("Esc / Ctrl+C", "quit"),
];

pub struct SheetLayout {
    pub status: Rect,
    pub input: Rect,
    pub results: Rect,
    pub help: Rect,
}

pub fn sheet_layout(area: Rect) -> SheetLayout {
    let rows = Layout::vertical([
        Constraint::Length(1), // status bar
        Constraint::Min(1),    // sheet
        Constraint::Length(1), // help bar
    ])
    .split(area);
    let panes =
        Layout::horizontal([Constraint::Percentage(70), Constraint::Percentage(30)]).split(rows[1]);
    SheetLayout {
        status: rows[0],
        input: panes[0],
        results: panes[1],
        help: rows[2],
    }
}

/// Sheet lines that fit on screen.
pub fn sheet_rows(area: Rect) -> usize {
    sheet_layout(area).input.height as usize
}

/// Columns taken by the line-number gutter: a space, the right-aligned
/// number (at least two digits wide) and a separating space.
pub fn gutter_width(len: usize) -> u16 {
    let digits = len.max(1).to_string().len().max(2);
    digits as u16 + 2
}

/// Map a click at (`column`, `row`) to the sheet line under it.
pub fn hit_test(
    layout: &SheetLayout,
    scroll_offset: usize,
    len: usize,
    column: u16,
    row: u16,
) -> Option<Hit> {
    let pos = Position::new(column, row);
    if layout.input.contains(pos) {
        let line = scroll_offset + (row - layout.input.y) as usize;
        if line >= len {
            return None;
        }
        let column = (column - layout.input.x).saturating_sub(gutter_width(len)) as usize;
        Some(Hit::Input { line, column })
    } else if layout.results.contains(pos) {
        let line = scroll_offset + (row - layout.results.y) as usize;
        (line < len).then_some(Hit::Result { line })
    } else {
        None
    }
}

pub fn result_style(line: &tally_core::Line) -> Style {
    if line.failed {
        theme::result_error()
    } else {
        theme::result_value()
    }
}

pub fn draw(frame: &mut Frame, app: &App, session: &Session) {
    // Paint entire frame with FORM bg so no terminal background bleeds through
    frame.render_widget(Block::default().style(theme::sheet_bg()), frame.area());

    let layout = sheet_layout(frame.area());
    draw_status_bar(frame, app, session, layout.status);
    draw_input(frame, app, session, layout.input);
    draw_results(frame, app, session, layout.results);
    draw_help_bar(frame, layout.help);

    match &app.overlay {
        Overlay::None => {}
        Overlay::Completions { items, selected } => {
            draw_completions(frame, app, session, &layout, items, *selected)
        }
        Overlay::Help => draw_help(frame, layout.input.union(layout.results)),
        Overlay::GoToLine(digits) => {
            draw_go_to_line(frame, session, layout.input.union(layout.results), digits)
        }
    }
}

fn draw_status_bar(frame: &mut Frame, app: &App, session: &Session, area: Rect) {
    let sheet = session.sheet();
    let mut spans = vec![
        Span::styled(" tally", theme::app_title()),
        Span::styled(theme::STATUS_SEP, theme::status_separator()),
        Span::styled(
            format!("line {}/{}", sheet.focus() + 1, sheet.len()),
            theme::status_text(),
        ),
    ];
    if session.history().can_undo() {
        spans.push(Span::styled(theme::STATUS_SEP, theme::status_separator()));
        spans.push(Span::styled(
            format!("{} undo", session.history().undo_len()),
            theme::status_text(),
        ));
    }

    let right = if let Some(status) = &app.status {
        Some(Span::styled(format!("{status} "), theme::status_text()))
    } else if session.in_flight() > 0 {
        // Four angles of the slash mark rotating in place
        const ANGLES: &[char] = &['╲', '─', '╱', '│'];
        let lead = ANGLES[(app.tick / 2) % ANGLES.len()];
        Some(Span::styled(
            format!("{lead} evaluating {} ", session.in_flight()),
            theme::spinner(),
        ))
    } else {
        None
    };

    if let Some(right) = right {
        let left_width: usize = spans.iter().map(|s| s.content.width()).sum();
        let pad = (area.width as usize).saturating_sub(left_width + right.content.width());
        spans.push(Span::raw(" ".repeat(pad)));
        spans.push(right);
    }

    let bar = Paragraph::new(Line::from(spans)).style(theme::bar_bg());
    frame.render_widget(bar, area);
}

fn draw_input(frame: &mut Frame, app: &App, session: &Session, area: Rect) {
    let sheet = session.sheet();
    let gutter = gutter_width(sheet.len());
    let digits = gutter as usize - 2;

    let lines: Vec<Line> = sheet
        .lines()
        .iter()
        .enumerate()
        .skip(app.scroll_offset)
        .take(area.height as usize)
        .map(|(i, line)| {
            let number_style = if i == sheet.focus() {
                theme::gutter_focused()
            } else {
                theme::gutter()
            };
            let mut spans = vec![Span::styled(
                format!(" {:>digits$} ", i + 1),
                number_style,
            )];
            match line.expression.find(theme::COMMENT_MARK) {
                Some(at) => {
                    spans.push(Span::styled(&line.expression[..at], theme::expression()));
                    spans.push(Span::styled(&line.expression[at..], theme::comment()));
                }
                None => spans.push(Span::styled(&line.expression, theme::expression())),
            }
            Line::from(spans)
        })
        .collect();
    frame.render_widget(Paragraph::new(lines), area);
    highlight_focused_row(frame, app, session, area);

    if matches!(app.overlay, Overlay::None | Overlay::Completions { .. })
        && let Some(pos) = cursor_position(app, session, area)
    {
        frame.set_cursor_position(pos);
    }
}

fn draw_results(frame: &mut Frame, app: &App, session: &Session, area: Rect) {
    let lines: Vec<Line> = session
        .sheet()
        .lines()
        .iter()
        .skip(app.scroll_offset)
        .take(area.height as usize)
        .map(|line| {
            if line.state == EvalState::Evaluating {
                return Line::from(Span::styled(" …", theme::result_pending()));
            }
            Line::from(Span::styled(format!(" {}", line.result), result_style(line)))
        })
        .collect();
    let results = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::LEFT)
            .border_style(theme::pane_border()),
    );
    frame.render_widget(results, area);
    highlight_focused_row(frame, app, session, area);
}

fn highlight_focused_row(frame: &mut Frame, app: &App, session: &Session, area: Rect) {
    let Some(row) = session.sheet().focus().checked_sub(app.scroll_offset) else {
        return;
    };
    if row < area.height as usize {
        let row_area = Rect::new(area.x, area.y + row as u16, area.width, 1);
        frame.buffer_mut().set_style(row_area, theme::focused_row());
    }
}

/// Screen position of the text cursor, if the focused line is on screen.
fn cursor_position(app: &App, session: &Session, area: Rect) -> Option<(u16, u16)> {
    let sheet = session.sheet();
    let row = sheet.focus().checked_sub(app.scroll_offset)?;
    if row >= area.height as usize {
        return None;
    }
    let col = gutter_width(sheet.len()) as usize + sheet.text_before_cursor().width();
    let x = area.x + (col as u16).min(area.width.saturating_sub(1));
    Some((x, area.y + row as u16))
}

fn draw_help_bar(frame: &mut Frame, area: Rect) {
    let help = Line::from(vec![
        Span::styled(" Tab", theme::help_key()),
        Span::styled(" complete  ", theme::help_desc()),
        Span::styled("^Z/^Y", theme::help_key()),
        Span::styled(" undo/redo  ", theme::help_desc()),
        Span::styled("^D", theme::help_key()),
        Span::styled(" delete line  ", theme::help_desc()),
        Span::styled("^S", theme::help_key()),
        Span::styled(" copy  ", theme::help_desc()),
        Span::styled("^H", theme::help_key()),
        Span::styled(" help  ", theme::help_desc()),
        Span::styled("Esc", theme::help_key()),
        Span::styled(" quit", theme::help_desc()),
    ]);
    let bar = Paragraph::new(help).style(theme::bar_bg());
    frame.render_widget(bar, area);
}

/// Completion list anchored under the cursor, or above it when there is no
/// room below.
fn draw_completions(
    frame: &mut Frame,
    app: &App,
    session: &Session,
    layout: &SheetLayout,
    items: &[String],
    selected: usize,
) {
    let Some((cursor_x, cursor_y)) = cursor_position(app, session, layout.input) else {
        return;
    };
    let screen = frame.area();
    let visible = items.len().min(POPUP_ROWS);
    let height = visible as u16 + 2;
    let name_w = items.iter().map(|s| s.width()).max().unwrap_or(0);
    let width = (name_w as u16 + 4).min(screen.width);

    let sheet_bottom = layout.input.y + layout.input.height;
    let y = if cursor_y + 1 + height <= sheet_bottom {
        cursor_y + 1
    } else {
        cursor_y.saturating_sub(height)
    };
    let x = cursor_x.min(screen.width.saturating_sub(width));
    let popup_area = Rect::new(x, y, width, height).intersection(screen);

    // Keep the selection inside the visible window
    let first = selected.saturating_sub(visible.saturating_sub(1));
    let lines: Vec<Line> = items
        .iter()
        .enumerate()
        .skip(first)
        .take(visible)
        .map(|(i, name)| {
            let style = if i == selected {
                theme::popup_selected()
            } else {
                theme::popup_item()
            };
            Line::from(Span::styled(format!(" {:<name_w$} ", name), style))
        })
        .collect();

    frame.render_widget(Clear, popup_area);
    let popup = Paragraph::new(lines).style(theme::popup_bg()).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(theme::popup_border()),
    );
    frame.render_widget(popup, popup_area);
}

fn draw_help(frame: &mut Frame, area: Rect) {
    let key_w = HELP.iter().map(|(k, _)| k.width()).max().unwrap_or(0);
    let desc_w = HELP.iter().map(|(_, d)| d.width()).max().unwrap_or(0);
    let width = (key_w + desc_w + 7) as u16;
    let height = HELP.len() as u16 + 2;
    let popup_area = centered(area, width, height);

    let lines: Vec<Line> = HELP
        .iter()
        .map(|(key, desc)| {
            Line::from(vec![
                Span::styled(format!(" {:>key_w$}", key), theme::help_key()),
                Span::styled(format!("   {desc}"), theme::popup_item()),
            ])
        })
        .collect();

    frame.render_widget(Clear, popup_area);
    let popup = Paragraph::new(lines).style(theme::popup_bg()).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(theme::popup_border())
            .title(Span::styled(" keys ", theme::heading())),
    );
    frame.render_widget(popup, popup_area);
}

fn draw_go_to_line(frame: &mut Frame, session: &Session, area: Rect, digits: &str) {
    let prompt = format!(" Go to line (1-{}): ", session.sheet().len());
    let width = (prompt.width() + 8) as u16;
    let popup_area = centered(area, width, 3);

    let line = Line::from(vec![
        Span::styled(prompt.clone(), theme::heading()),
        Span::styled(digits, theme::expression()),
    ]);
    frame.render_widget(Clear, popup_area);
    let popup = Paragraph::new(line).style(theme::popup_bg()).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(theme::popup_border()),
    );
    frame.render_widget(popup, popup_area);

    let x = popup_area.x + 1 + (prompt.width() + digits.width()) as u16;
    if x < popup_area.right() {
        frame.set_cursor_position((x, popup_area.y + 1));
    }
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    let x = area.x + (area.width - width) / 2;
    let y = area.y + (area.height - height) / 2;
    Rect::new(x, y, width, height)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> SheetLayout {
        sheet_layout(Rect::new(0, 0, 100, 12))
    }

    #[test]
    fn layout_splits_seventy_thirty() {
        let l = layout();
        assert_eq!(l.status, Rect::new(0, 0, 100, 1));
        assert_eq!(l.help, Rect::new(0, 11, 100, 1));
        assert_eq!(l.input, Rect::new(0, 1, 70, 10));
        assert_eq!(l.results, Rect::new(70, 1, 30, 10));
        assert_eq!(sheet_rows(Rect::new(0, 0, 100, 12)), 10);
    }

    #[test]
    fn gutter_grows_with_line_count() {
        assert_eq!(gutter_width(1), 4);
        assert_eq!(gutter_width(99), 4);
        assert_eq!(gutter_width(100), 5);
    }

    #[test]
    fn clicks_map_to_lines() {
        let l = layout();
        assert_eq!(
            hit_test(&l, 0, 3, 6, 2),
            Some(Hit::Input { line: 1, column: 2 })
        );
        // Inside the gutter
        assert_eq!(
            hit_test(&l, 0, 3, 1, 1),
            Some(Hit::Input { line: 0, column: 0 })
        );
        assert_eq!(hit_test(&l, 4, 10, 80, 3), Some(Hit::Result { line: 6 }));
    }

    #[test]
    fn clicks_outside_lines_miss() {
        let l = layout();
        assert_eq!(hit_test(&l, 0, 3, 10, 5), None);
        assert_eq!(hit_test(&l, 0, 3, 80, 8), None);
        // Status and help bars
        assert_eq!(hit_test(&l, 0, 3, 10, 0), None);
        assert_eq!(hit_test(&l, 0, 3, 10, 11), None);
    }

    #[test]
    fn results_styled_by_failure_flag() {
        let mut sheet = tally_core::Sheet::new();
        sheet.record_result(0, "timeout failed".into());
        assert_eq!(result_style(sheet.focused()), theme::result_value());

        sheet.record_failure(0, "Calculation timeout".into());
        assert_eq!(result_style(sheet.focused()), theme::result_error());
    }
}
