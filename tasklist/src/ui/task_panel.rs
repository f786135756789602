//! Task screen rendering: welcome line, new-task input and the list.

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
};

use super::{input_line, theme};
use crate::app::{App, Focus};
use crate::identity::IdentityProvider;
use crate::service::TaskService;

/// Shown while the list is being fetched.
pub const LOADING_TASKS: &str = "Loading tasks...";

/// Shown when the list is empty.
pub const EMPTY_LIST: &str = "You have no tasks yet. Add one above!";

/// Render the tasks screen.
pub fn render<S, P>(frame: &mut Frame, area: Rect, app: &App<S, P>)
where
    S: TaskService + 'static,
    P: IdentityProvider + 'static,
{
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(3),
            Constraint::Min(3),
        ])
        .split(area);

    render_header(frame, chunks[0], app);
    render_input(frame, chunks[1], app);
    render_list(frame, chunks[2], app);
}

fn render_header<S, P>(frame: &mut Frame, area: Rect, app: &App<S, P>)
where
    S: TaskService + 'static,
    P: IdentityProvider + 'static,
{
    let email = app.identity().map(|i| i.email).unwrap_or_default();
    let mut spans = vec![
        Span::styled("Welcome, ", theme::normal()),
        Span::styled(email, theme::bold()),
    ];
    if let Some(error) = app.logout_error() {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(error, theme::error()));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_input<S, P>(frame: &mut Frame, area: Rect, app: &App<S, P>)
where
    S: TaskService + 'static,
    P: IdentityProvider + 'static,
{
    let form = app.add_form();
    let focused = app.focus() == Focus::NewTask && app.editing().is_none();

    let title = if form.is_submitting() {
        Span::styled("Adding...", theme::normal().fg(theme::WARNING))
    } else {
        Span::styled("New task", theme::panel_title(theme::TASKS_TITLE))
    };

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(theme::border(focused));

    let paragraph = Paragraph::new(input_line(&form.input, focused)).block(block);
    frame.render_widget(paragraph, area);
}

fn render_list<S, P>(frame: &mut Frame, area: Rect, app: &App<S, P>)
where
    S: TaskService + 'static,
    P: IdentityProvider + 'static,
{
    let controller = app.controller();
    let focused = app.focus() == Focus::List;

    let block = Block::default()
        .title(Span::styled("Tasks", theme::panel_title(theme::TASKS_TITLE)))
        .borders(Borders::ALL)
        .border_style(theme::border(focused));

    let mut items: Vec<ListItem> = Vec::new();

    // The add form owns its own error; the list error covers the rest.
    if let Some(error) = app.add_form().error().or(controller.error()) {
        items.push(ListItem::new(Span::styled(error.to_string(), theme::error())));
    }

    if controller.is_loading() {
        items.push(ListItem::new(Span::styled(LOADING_TASKS, theme::dimmed())));
    } else if controller.tasks().is_empty() && controller.error().is_none() {
        items.push(ListItem::new(Span::styled(EMPTY_LIST, theme::dimmed())));
    } else {
        for (index, task) in controller.tasks().iter().enumerate() {
            let selected = focused && index == app.selected();
            let editing = app.editing().filter(|(id, _)| **id == task.id);

            let checkbox = if task.completed { "[✓]" } else { "[ ]" };
            let style = if selected {
                theme::selected()
            } else if task.completed {
                theme::completed()
            } else {
                theme::normal()
            };

            let mut spans = vec![Span::styled(checkbox, style), Span::raw(" ")];
            if let Some((_, input)) = editing {
                spans.extend(input_line(input, true).spans);
            } else {
                spans.push(Span::styled(task.text.clone(), style));
                spans.push(Span::raw("  "));
                spans.push(Span::styled(
                    format_timestamp_ms(task.created_at, app.timestamp_format()),
                    theme::timestamp(),
                ));
            }

            let mut lines = vec![Line::from(spans)];
            if let Some(error) = controller.edit_error(&task.id) {
                lines.push(Line::from(Span::styled(
                    format!("    {error}"),
                    theme::error(),
                )));
            }
            items.push(ListItem::new(lines));
        }
    }

    frame.render_widget(List::new(items).block(block), area);
}

/// Formats an epoch-millisecond timestamp with a chrono format string.
#[must_use]
pub fn format_timestamp_ms(ms: u64, format: &str) -> String {
    use chrono::{Local, TimeZone};
    let secs = (ms / 1000).cast_signed();
    let nsecs = u32::try_from((ms % 1000) * 1_000_000).unwrap_or(0);
    match Local.timestamp_opt(secs, nsecs) {
        chrono::LocalResult::Single(dt) => dt.format(format).to_string(),
        _ => "??:??".to_string(),
    }
}
