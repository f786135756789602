//! Theme and styling constants for the TUI.

use ratatui::style::{Color, Modifier, Style};

/// Primary foreground color.
pub const FG_PRIMARY: Color = Color::White;

/// Secondary foreground color (dimmed text).
pub const FG_SECONDARY: Color = Color::Gray;

/// Highlight color for focused elements.
pub const HIGHLIGHT: Color = Color::Cyan;

/// Connected backend indicator.
pub const SUCCESS: Color = Color::Green;

/// In-progress indicator ("Adding...", "Loading...").
pub const WARNING: Color = Color::Yellow;

/// Error messages.
pub const ERROR: Color = Color::Red;

/// Offline mode indicator.
pub const OFFLINE: Color = Color::DarkGray;

/// Panel title color for the auth panel.
pub const AUTH_TITLE: Color = Color::Blue;

/// Panel title color for the tasks panel.
pub const TASKS_TITLE: Color = Color::Green;

/// Normal text style.
#[must_use]
pub fn normal() -> Style {
    Style::default().fg(FG_PRIMARY)
}

/// Dimmed text style (timestamps, hints).
#[must_use]
pub fn dimmed() -> Style {
    Style::default().fg(FG_SECONDARY)
}

/// Bold text style.
#[must_use]
pub fn bold() -> Style {
    Style::default().fg(FG_PRIMARY).add_modifier(Modifier::BOLD)
}

/// Highlighted text style (focused panel borders).
#[must_use]
pub fn highlighted() -> Style {
    Style::default().fg(HIGHLIGHT).add_modifier(Modifier::BOLD)
}

/// Selected item style (in lists).
#[must_use]
pub fn selected() -> Style {
    Style::default()
        .fg(Color::Black)
        .bg(HIGHLIGHT)
        .add_modifier(Modifier::BOLD)
}

/// Completed task text (dim, struck through).
#[must_use]
pub fn completed() -> Style {
    dimmed().add_modifier(Modifier::CROSSED_OUT)
}

/// Error message style.
#[must_use]
pub fn error() -> Style {
    Style::default().fg(ERROR)
}

/// Style for timestamps (dark gray).
#[must_use]
pub fn timestamp() -> Style {
    Style::default().fg(Color::Rgb(120, 120, 120))
}

/// Style for the input cursor (bright white, bold).
#[must_use]
pub fn input_cursor() -> Style {
    Style::default()
        .fg(Color::White)
        .add_modifier(Modifier::BOLD)
}

/// Style for the status bar background (dark background with white foreground).
#[must_use]
pub fn status_bar_bg() -> Style {
    Style::default().fg(Color::White).bg(Color::Rgb(30, 30, 50))
}

/// Style for panel titles with a given color (bold).
#[must_use]
pub fn panel_title(color: Color) -> Style {
    Style::default().fg(color).add_modifier(Modifier::BOLD)
}

/// Border style for a panel, highlighted when it has focus.
#[must_use]
pub fn border(focused: bool) -> Style {
    if focused { highlighted() } else { normal() }
}
