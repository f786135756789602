//! Status bar rendering.

use ratatui::{
    Frame,
    layout::Rect,
    text::{Line, Span},
    widgets::Paragraph,
};

use super::theme;
use crate::app::{App, Focus, Screen};
use crate::identity::IdentityProvider;
use crate::service::TaskService;

/// Render the status bar at the bottom of the screen.
pub fn render<S, P>(frame: &mut Frame, area: Rect, app: &App<S, P>)
where
    S: TaskService + 'static,
    P: IdentityProvider + 'static,
{
    let help_text = match app.screen() {
        Screen::Loading => "Ctrl-C: quit",
        Screen::Login | Screen::Signup => {
            "Tab: next field | Enter: submit | Ctrl-G: federated | Ctrl-N: switch | Esc: quit"
        }
        Screen::Tasks if app.editing().is_some() => "Enter: save | Esc: cancel",
        Screen::Tasks => match app.focus() {
            Focus::NewTask => "Enter: add | Tab: list | Ctrl-O: log out | Esc: quit",
            Focus::List => {
                "↑↓/jk: select | Space: toggle | e: edit | d: delete | r: reload | Tab: input | Ctrl-O: log out"
            }
        },
    };

    let dot_color = if app.mode_label().starts_with("offline") {
        theme::OFFLINE
    } else {
        theme::SUCCESS
    };

    let status_line = Line::from(vec![
        Span::styled(concat!("tasklist v", env!("CARGO_PKG_VERSION")), theme::bold()),
        Span::raw(" | "),
        Span::styled("●", theme::normal().fg(dot_color)),
        Span::raw(format!(" {}", app.mode_label())),
        Span::raw(" | "),
        Span::styled(help_text, theme::dimmed()),
    ]);

    let paragraph = Paragraph::new(status_line).style(theme::status_bar_bg());
    frame.render_widget(paragraph, area);
}
