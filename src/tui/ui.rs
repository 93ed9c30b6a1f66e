//! UI rendering for the TUI

use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget},
    Frame,
};

use super::app::{App, Pane};
use super::compose;
use super::help;
use super::messages;
use super::picker;
use super::sidebar;

/// Main render function
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();

    // Layout: header (1 line) + main content + status bar (1 line)
    let [header_area, main_area, status_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Fill(1),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(header_area, frame.buffer_mut(), app);

    let [sidebar_area, content_area] =
        Layout::horizontal([Constraint::Length(28), Constraint::Fill(1)]).areas(main_area);

    sidebar::render(
        sidebar_area,
        frame.buffer_mut(),
        &app.sidebar,
        &app.directory,
        app.thread.as_ref().map(|t| t.peer().uid.as_str()),
        app.active_pane == Pane::Sidebar,
    );

    let [messages_area, compose_area] = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(compose::COMPOSE_HEIGHT),
    ])
    .areas(content_area);

    messages::render(
        messages_area,
        frame.buffer_mut(),
        &app.messages,
        app.thread.as_ref(),
        app.active_pane == Pane::Messages,
    );

    compose::render(
        compose_area,
        frame,
        &app.compose,
        app.peer_name(),
        app.active_pane == Pane::Compose && !app.picker.active,
    );

    render_status(status_area, frame.buffer_mut(), app);

    if app.picker.active {
        picker::render_picker_overlay(frame, &app.picker);
    }

    if app.show_help {
        help::render_help_popup(frame);
    }
}

fn render_header(area: Rect, buf: &mut Buffer, app: &App) {
    let left = " Messenger";
    let right = format!("[?] Help  {} ", app.me.username);
    let padding = (area.width as usize).saturating_sub(left.len() + right.chars().count());

    let header_line = Line::from(vec![
        Span::styled(
            left,
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" ".repeat(padding)),
        Span::styled("[?] Help  ", Style::default().fg(Color::Gray)),
        Span::styled(
            format!("{} ", app.me.username),
            Style::default().fg(Color::Cyan),
        ),
    ]);

    Paragraph::new(header_line)
        .style(Style::default().bg(Color::DarkGray))
        .render(area, buf);
}

/// Status line text and whether it is an error.
///
/// An explicit status message wins, then the open thread's error, then the
/// conversation list's error.
fn status_text(app: &App) -> Option<(String, bool)> {
    if let Some(ref msg) = app.status_message {
        return Some((msg.clone(), app.status_is_error));
    }
    if let Some(status) = app.thread.as_ref().and_then(|t| t.status()) {
        return Some((status.to_string(), true));
    }
    app.directory
        .status()
        .map(|status| (status.to_string(), true))
}

fn render_status(area: Rect, buf: &mut Buffer, app: &App) {
    if let Some((msg, is_error)) = status_text(app) {
        let style = if is_error {
            Style::default().fg(Color::Red).bg(Color::DarkGray)
        } else {
            Style::default().fg(Color::Green).bg(Color::DarkGray)
        };
        Paragraph::new(Line::from(Span::styled(format!(" {} ", msg), style)))
            .style(Style::default().bg(Color::DarkGray))
            .render(area, buf);
        return;
    }

    let sep_style = Style::default().fg(Color::DarkGray);
    let chat = Span::styled(
        app.peer_name().unwrap_or("(no chat)").to_string(),
        Style::default().fg(Color::Yellow),
    );
    let status_line = Line::from(vec![
        Span::raw(" "),
        chat,
        Span::styled(" | ", sep_style),
        Span::styled(
            format!("Tab: {} ", app.active_pane.as_str()),
            Style::default().fg(Color::Cyan),
        ),
        Span::styled("| ", sep_style),
        Span::styled("n: new  Esc: close  ?: help  q: quit", Style::default().fg(Color::Gray)),
    ]);

    Paragraph::new(status_line)
        .style(Style::default().bg(Color::DarkGray))
        .render(area, buf);
}
