use ratatui::style::{Color, Modifier, Style};

// ── Formwork: warm olive-tinted blacks ──────────────────────────────
pub const FORM: Color = Color::Rgb(14, 13, 11);
pub const FORM_DEEP: Color = Color::Rgb(8, 8, 7);
pub const FORM_RAISED: Color = Color::Rgb(20, 20, 18);

// ── Ash: structural greys ──────────────────────────────────────────
pub const ASH: Color = Color::Rgb(42, 42, 40);
pub const ASH_MID: Color = Color::Rgb(74, 74, 68);
pub const ASH_TEXT: Color = Color::Rgb(90, 90, 80);

// ── Chalk: text hierarchy ──────────────────────────────────────────
pub const CHALK_DIM: Color = Color::Rgb(122, 122, 112);
pub const CHALK_MID: Color = Color::Rgb(200, 196, 184);
pub const CHALK: Color = Color::Rgb(232, 228, 208);

// ── Accent colors ──────────────────────────────────────────────────
pub const SODIUM: Color = Color::Rgb(232, 163, 60);
pub const LICHEN: Color = Color::Rgb(138, 158, 108);
pub const ERROR: Color = Color::Rgb(204, 68, 68);

// ── Character constants ────────────────────────────────────────────
pub const STATUS_SEP: &str = " · ";
pub const COMMENT_MARK: &str = "//";

// ── Style helpers ──────────────────────────────────────────────────

/// "tally" title in status bar
pub fn app_title() -> Style {
    Style::default().fg(SODIUM).add_modifier(Modifier::BOLD)
}

/// Status bar separator ( · )
pub fn status_separator() -> Style {
    Style::default().fg(ASH_MID)
}

pub fn status_text() -> Style {
    Style::default().fg(CHALK_DIM)
}

pub fn spinner() -> Style {
    Style::default().fg(SODIUM)
}

/// Line numbers in the gutter
pub fn gutter() -> Style {
    Style::default().fg(ASH_TEXT)
}

/// Line number of the focused line
pub fn gutter_focused() -> Style {
    Style::default().fg(SODIUM).add_modifier(Modifier::BOLD)
}

/// Expression text in the input pane
pub fn expression() -> Style {
    Style::default().fg(CHALK_MID)
}

/// Trailing `// comment` in an expression
pub fn comment() -> Style {
    Style::default().fg(ASH_MID).add_modifier(Modifier::ITALIC)
}

/// Background of the focused row, both panes
pub fn focused_row() -> Style {
    Style::default().bg(FORM_RAISED)
}

/// A computed value in the results pane
pub fn result_value() -> Style {
    Style::default().fg(LICHEN)
}

/// An error message in the results pane
pub fn result_error() -> Style {
    Style::default().fg(ERROR)
}

/// Placeholder while a line is evaluating
pub fn result_pending() -> Style {
    Style::default().fg(ASH_MID)
}

/// Divider between the input and results panes
pub fn pane_border() -> Style {
    Style::default().fg(ASH)
}

/// Help bar key labels
pub fn help_key() -> Style {
    Style::default().fg(SODIUM).add_modifier(Modifier::BOLD)
}

/// Help bar descriptions
pub fn help_desc() -> Style {
    Style::default().fg(ASH_MID)
}

/// Status bar and help bar background
pub fn bar_bg() -> Style {
    Style::default().bg(FORM_RAISED)
}

/// Sheet background
pub fn sheet_bg() -> Style {
    Style::default().bg(FORM)
}

/// Popup background
pub fn popup_bg() -> Style {
    Style::default().bg(FORM_DEEP)
}

pub fn popup_border() -> Style {
    Style::default().fg(ASH)
}

/// Selected popup entry
pub fn popup_selected() -> Style {
    Style::default()
        .fg(SODIUM)
        .bg(FORM_RAISED)
        .add_modifier(Modifier::BOLD)
}

pub fn popup_item() -> Style {
    Style::default().fg(CHALK_DIM)
}

/// Popup titles and headings
pub fn heading() -> Style {
    Style::default().fg(CHALK).add_modifier(Modifier::BOLD)
}
