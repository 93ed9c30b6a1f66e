//! New-message overlay: pick a user to start a conversation with.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Widget},
    Frame,
};

use super::help::centered_rect;
use crate::models::ChatUser;

const POPUP_WIDTH: u16 = 56;
const POPUP_HEIGHT: u16 = 16;

/// State for the new-message picker.
#[derive(Default)]
pub struct PickerState {
    pub active: bool,
    pub query: String,
    users: Vec<ChatUser>,
    matches: Vec<usize>,
    pub selected: usize,
}

impl PickerState {
    /// Open the picker over `users`.
    pub fn activate(&mut self, users: Vec<ChatUser>) {
        self.active = true;
        self.query.clear();
        self.users = users;
        self.update_matches();
    }

    pub fn deactivate(&mut self) {
        self.active = false;
        self.query.clear();
        self.users.clear();
        self.matches.clear();
        self.selected = 0;
    }

    pub fn insert_char(&mut self, c: char) {
        self.query.push(c);
        self.update_matches();
    }

    pub fn backspace(&mut self) {
        self.query.pop();
        self.update_matches();
    }

    pub fn select_previous(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn select_next(&mut self) {
        if self.selected + 1 < self.matches.len() {
            self.selected += 1;
        }
    }

    pub fn selected_user(&self) -> Option<&ChatUser> {
        self.matches
            .get(self.selected)
            .and_then(|&idx| self.users.get(idx))
    }

    pub fn matches(&self) -> impl Iterator<Item = &ChatUser> {
        self.matches.iter().filter_map(|&idx| self.users.get(idx))
    }

    /// Case-insensitive substring match on username and email.
    fn update_matches(&mut self) {
        let query = self.query.to_lowercase();
        self.matches = self
            .users
            .iter()
            .enumerate()
            .filter(|(_, user)| {
                query.is_empty()
                    || user.username.to_lowercase().contains(&query)
                    || user.email.to_lowercase().contains(&query)
            })
            .map(|(idx, _)| idx)
            .collect();
        self.selected = 0;
    }
}

/// Draw the picker on top of the current screen.
pub fn render_picker_overlay(frame: &mut Frame, state: &PickerState) {
    let area = frame.area();
    let popup_area = centered_rect(
        POPUP_WIDTH.min(area.width.saturating_sub(2)),
        POPUP_HEIGHT.min(area.height.saturating_sub(2)),
        area,
    );
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(Span::styled(
            " New Message ",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ))
        .title_bottom(Line::from(Span::styled(
            " Enter: open  Esc: cancel ",
            Style::default().fg(Color::Gray),
        )));
    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    if inner.height < 2 || inner.width == 0 {
        return;
    }

    let query_area = Rect::new(inner.x, inner.y, inner.width, 1);
    let query_line = Line::from(vec![
        Span::styled(" To: ", Style::default().fg(Color::Yellow)),
        Span::styled(state.query.clone(), Style::default().fg(Color::White)),
    ]);
    frame.render_widget(Paragraph::new(query_line), query_area);
    let cursor_x = query_area.x + 5 + state.query.chars().count() as u16;
    frame.set_cursor_position((cursor_x.min(query_area.right().saturating_sub(1)), query_area.y));

    let list_area = Rect::new(inner.x, inner.y + 1, inner.width, inner.height - 1);
    render_matches(list_area, frame.buffer_mut(), state);
}

fn render_matches(area: Rect, buf: &mut Buffer, state: &PickerState) {
    if state.matches.is_empty() {
        let text = if state.users.is_empty() {
            " No other users yet"
        } else {
            " No matching users"
        };
        Paragraph::new(Line::from(Span::styled(
            text,
            Style::default().fg(Color::DarkGray),
        )))
        .render(Rect::new(area.x, area.y, area.width, 1), buf);
        return;
    }

    let height = area.height as usize;
    let offset = state.selected.saturating_sub(height.saturating_sub(1));
    for (row, (idx, user)) in state
        .matches()
        .enumerate()
        .skip(offset)
        .take(height)
        .enumerate()
    {
        let selected = idx == state.selected;
        let style = if selected {
            Style::default()
                .fg(Color::White)
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        let cursor = if selected { "\u{25BA}" } else { " " };
        let line = Line::from(vec![
            Span::styled(format!("{}{}", cursor, user.username), style),
            Span::styled(format!("  {}", user.email), Style::default().fg(Color::DarkGray)),
        ]);
        Paragraph::new(line).render(Rect::new(area.x, area.y + row as u16, area.width, 1), buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> Vec<ChatUser> {
        vec![
            ChatUser::new("u1", "ana@example.com", ""),
            ChatUser::new("u2", "ben@example.com", ""),
            ChatUser::new("echo", "echo@messenger.local", ""),
        ]
    }

    #[test]
    fn test_filter_by_username_and_email() {
        let mut state = PickerState::default();
        state.activate(users());
        assert_eq!(state.matches().count(), 3);

        state.insert_char('B');
        let names: Vec<_> = state.matches().map(|u| u.uid.as_str()).collect();
        assert_eq!(names, vec!["u2"]);

        state.backspace();
        for c in "messenger".chars() {
            state.insert_char(c);
        }
        assert_eq!(state.selected_user().unwrap().uid, "echo");
    }

    #[test]
    fn test_selection_bounds_and_reset() {
        let mut state = PickerState::default();
        state.activate(users());
        state.select_next();
        state.select_next();
        state.select_next();
        assert_eq!(state.selected_user().unwrap().uid, "echo");

        state.insert_char('a');
        assert_eq!(state.selected, 0);

        state.deactivate();
        assert!(!state.active);
        assert!(state.selected_user().is_none());
    }
}
