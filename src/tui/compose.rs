//! Compose box: single-line input for the open conversation.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Widget},
    Frame,
};
use unicode_width::UnicodeWidthChar;

/// State for the compose box.
#[derive(Default)]
pub struct ComposeState {
    /// Current input text.
    pub input: String,
    /// Cursor position (character offset into `input`).
    pub cursor_pos: usize,
}

impl ComposeState {
    /// Insert a character at the cursor.
    pub fn insert_char(&mut self, c: char) {
        let byte_pos = self.char_to_byte(self.cursor_pos);
        self.input.insert(byte_pos, c);
        self.cursor_pos += 1;
    }

    /// Delete the character before the cursor.
    pub fn backspace(&mut self) {
        if self.cursor_pos == 0 {
            return;
        }
        let start = self.char_to_byte(self.cursor_pos - 1);
        let end = self.char_to_byte(self.cursor_pos);
        self.input.drain(start..end);
        self.cursor_pos -= 1;
    }

    /// Delete the character under the cursor.
    pub fn delete(&mut self) {
        if self.cursor_pos >= self.input.chars().count() {
            return;
        }
        let start = self.char_to_byte(self.cursor_pos);
        let end = self.char_to_byte(self.cursor_pos + 1);
        self.input.drain(start..end);
    }

    pub fn move_left(&mut self) {
        self.cursor_pos = self.cursor_pos.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        self.cursor_pos = (self.cursor_pos + 1).min(self.input.chars().count());
    }

    pub fn move_home(&mut self) {
        self.cursor_pos = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor_pos = self.input.chars().count();
    }

    pub fn clear(&mut self) {
        self.input.clear();
        self.cursor_pos = 0;
    }

    fn char_to_byte(&self, char_pos: usize) -> usize {
        self.input
            .char_indices()
            .nth(char_pos)
            .map(|(i, _)| i)
            .unwrap_or(self.input.len())
    }
}

/// Height of the compose box: border + input + border.
pub const COMPOSE_HEIGHT: u16 = 3;

/// Render the compose box. `peer_name` is `None` when no conversation is open.
pub fn render(
    area: Rect,
    frame: &mut Frame,
    state: &ComposeState,
    peer_name: Option<&str>,
    focused: bool,
) {
    let (border_style, border_type) = if focused {
        (Style::default().fg(Color::Yellow), BorderType::Double)
    } else {
        (Style::default().fg(Color::DarkGray), BorderType::Plain)
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(border_type)
        .border_style(border_style);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    let input_area = Rect::new(inner.x, inner.y, inner.width, 1);
    let cursor = render_input(input_area, frame.buffer_mut(), state, peer_name);
    if focused && peer_name.is_some() {
        frame.set_cursor_position(cursor);
    }
}

/// Draw the input line and return where the cursor belongs.
fn render_input(
    area: Rect,
    buf: &mut Buffer,
    state: &ComposeState,
    peer_name: Option<&str>,
) -> (u16, u16) {
    let width = area.width.saturating_sub(1) as usize;

    if state.input.is_empty() {
        let placeholder = match peer_name {
            Some(name) => format!(" Send a message to {}...", name),
            None => " Open a conversation to start typing".to_string(),
        };
        let truncated: String = placeholder.chars().take(area.width as usize).collect();
        Paragraph::new(Line::from(Span::styled(
            truncated,
            Style::default().fg(Color::DarkGray),
        )))
        .render(area, buf);
        return (area.x + 1, area.y);
    }

    let (visible, cursor_col) = visible_window(&state.input, state.cursor_pos, width);
    Paragraph::new(Line::from(Span::styled(
        format!(" {}", visible),
        Style::default().fg(Color::White),
    )))
    .render(area, buf);
    (area.x + 1 + cursor_col as u16, area.y)
}

/// Slice of `input` that fits in `width` columns with the cursor visible.
///
/// Returns the visible text and the cursor's column inside it.
fn visible_window(input: &str, cursor_pos: usize, width: usize) -> (String, usize) {
    if width == 0 {
        return (String::new(), 0);
    }

    let chars: Vec<char> = input.chars().collect();
    let col = |range: &[char]| -> usize { range.iter().map(|c| c.width().unwrap_or(0)).sum() };

    // Scroll so the cursor column stays inside the window.
    let mut start = 0;
    while col(&chars[start..cursor_pos.min(chars.len())]) >= width && start < cursor_pos {
        start += 1;
    }

    let mut visible = String::new();
    let mut used = 0;
    for c in &chars[start..] {
        let w = c.width().unwrap_or(0);
        if used + w > width {
            break;
        }
        visible.push(*c);
        used += w;
    }

    let cursor_col = col(&chars[start..cursor_pos.min(chars.len())]);
    (visible, cursor_col)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typed(text: &str) -> ComposeState {
        let mut state = ComposeState::default();
        for c in text.chars() {
            state.insert_char(c);
        }
        state
    }

    #[test]
    fn test_editing_at_cursor() {
        let mut state = typed("helo");
        state.move_left();
        state.insert_char('l');
        assert_eq!(state.input, "hello");

        state.move_home();
        state.delete();
        assert_eq!(state.input, "ello");

        state.move_end();
        state.backspace();
        assert_eq!(state.input, "ell");
        assert_eq!(state.cursor_pos, 3);

        state.clear();
        assert_eq!(state.input, "");
        assert_eq!(state.cursor_pos, 0);
    }

    #[test]
    fn test_multibyte_editing() {
        let mut state = typed("héé");
        state.move_left();
        state.backspace();
        assert_eq!(state.input, "hé");
        state.move_right();
        state.move_right();
        assert_eq!(state.cursor_pos, 2);
    }

    #[test]
    fn test_visible_window_short_input() {
        assert_eq!(visible_window("hello", 5, 20), ("hello".to_string(), 5));
    }

    #[test]
    fn test_visible_window_scrolls_to_cursor() {
        let (visible, col) = visible_window("abcdefghij", 10, 4);
        assert_eq!(visible, "hij");
        assert_eq!(col, 3);

        let (visible, col) = visible_window("abcdefghij", 0, 4);
        assert_eq!(visible, "abcd");
        assert_eq!(col, 0);
    }
}
