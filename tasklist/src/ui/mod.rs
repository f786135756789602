//! Terminal UI rendering.

pub mod auth_panel;
pub mod status_bar;
pub mod task_panel;
pub mod theme;

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};

use crate::app::{App, Screen};
use crate::forms::TextInput;
use crate::identity::IdentityProvider;
use crate::service::TaskService;

/// Shown while the session waits for its first identity notification.
pub const LOADING_AUTH: &str = "Loading authentication status...";

/// Main draw function for the entire UI.
pub fn draw<S, P>(frame: &mut Frame, app: &App<S, P>)
where
    S: TaskService + 'static,
    P: IdentityProvider + 'static,
{
    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(frame.area());

    let content_area = main_chunks[0];
    let status_area = main_chunks[1];

    match app.screen() {
        Screen::Loading => render_loading(frame, content_area),
        Screen::Login | Screen::Signup => auth_panel::render(frame, content_area, app),
        Screen::Tasks => task_panel::render(frame, content_area, app),
    }

    status_bar::render(frame, status_area, app);
}

fn render_loading(frame: &mut Frame, area: Rect) {
    let block = Block::default().borders(Borders::ALL);
    let paragraph =
        Paragraph::new(Line::from(Span::styled(LOADING_AUTH, theme::dimmed()))).block(block);
    frame.render_widget(paragraph, area);
}

/// Renders a text input as spans, with a block cursor when focused.
fn input_line(input: &TextInput, focused: bool) -> Line<'static> {
    let text = input.display();
    if !focused {
        return Line::from(Span::styled(text, theme::normal()));
    }
    let split = text
        .char_indices()
        .nth(input.cursor())
        .map_or(text.len(), |(i, _)| i);
    let (before, after) = text.split_at(split);
    Line::from(vec![
        Span::styled(before.to_string(), theme::normal()),
        Span::styled("\u{2588}", theme::input_cursor()),
        Span::styled(after.to_string(), theme::normal()),
    ])
}
