//! Login and signup screens.

use ratatui::{
    Frame,
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
};

use super::{input_line, theme};
use crate::app::App;
use crate::forms::{AuthField, AuthMode, TextInput};
use crate::identity::IdentityProvider;
use crate::service::TaskService;

/// Render the auth form for the current mode.
pub fn render<S, P>(frame: &mut Frame, area: Rect, app: &App<S, P>)
where
    S: TaskService + 'static,
    P: IdentityProvider + 'static,
{
    let form = app.auth_form();
    let (title, switch_hint) = match form.mode() {
        AuthMode::Login => ("Login", "Ctrl-N: create an account"),
        AuthMode::Signup => ("Sign Up", "Ctrl-N: back to login"),
    };

    let mut lines = vec![
        field("Email", &form.email, form.focus() == AuthField::Email),
        field("Password", &form.password, form.focus() == AuthField::Password),
    ];
    if form.mode() == AuthMode::Signup {
        lines.push(field(
            "Confirm",
            &form.confirm,
            form.focus() == AuthField::Confirm,
        ));
    }
    lines.push(Line::raw(""));

    if form.is_submitting() {
        lines.push(Line::from(Span::styled(
            "Signing in...",
            theme::normal().fg(theme::WARNING),
        )));
    } else if let Some(error) = form.error() {
        lines.push(Line::from(Span::styled(error.to_string(), theme::error())));
    }

    lines.push(Line::raw(""));
    lines.push(Line::from(Span::styled(
        "Ctrl-G: sign in with federated provider",
        theme::dimmed(),
    )));
    lines.push(Line::from(Span::styled(switch_hint, theme::dimmed())));

    let block = Block::default()
        .title(Span::styled(title, theme::panel_title(theme::AUTH_TITLE)))
        .borders(Borders::ALL)
        .border_style(theme::border(true));

    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn field(label: &'static str, input: &TextInput, focused: bool) -> Line<'static> {
    let label_style = if focused {
        theme::highlighted()
    } else {
        theme::dimmed()
    };
    let mut spans = vec![Span::styled(format!("{label:>9}: "), label_style)];
    spans.extend(input_line(input, focused).spans);
    Line::from(spans)
}
