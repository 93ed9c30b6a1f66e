//! Thread pane: message history of the open conversation.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Widget},
};
use unicode_width::UnicodeWidthStr;

use crate::api::format_time;
use crate::sync::ThreadSync;

/// Scroll state for the thread pane.
///
/// `scroll_offset` counts lines up from the newest message, so new messages
/// stay in view while it is 0.
#[derive(Default)]
pub struct MessagesState {
    pub scroll_offset: usize,
}

impl MessagesState {
    pub fn scroll_up(&mut self, lines: usize) {
        self.scroll_offset = self.scroll_offset.saturating_add(lines);
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(lines);
    }

    pub fn reset(&mut self) {
        self.scroll_offset = 0;
    }
}

pub fn render(
    area: Rect,
    buf: &mut Buffer,
    state: &MessagesState,
    thread: Option<&ThreadSync>,
    focused: bool,
) {
    let (border_style, border_type) = if focused {
        (Style::default().fg(Color::Yellow), BorderType::Double)
    } else {
        (Style::default().fg(Color::DarkGray), BorderType::Plain)
    };

    let title = match thread {
        Some(thread) => format!(" {} ", thread.peer().username),
        None => " Messages ".to_string(),
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_type(border_type)
        .border_style(border_style);

    let inner = block.inner(area);
    block.render(area, buf);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    let Some(thread) = thread else {
        let line = Line::from(Span::styled(
            " Select a chat and press Enter, or press n for a new message",
            Style::default().fg(Color::DarkGray),
        ));
        Paragraph::new(line).render(Rect::new(inner.x, inner.y, inner.width, 1), buf);
        return;
    };

    let lines = build_lines(thread, inner.width as usize);
    if lines.is_empty() {
        let line = Line::from(Span::styled(
            " No messages yet",
            Style::default().fg(Color::DarkGray),
        ));
        Paragraph::new(line).render(Rect::new(inner.x, inner.y, inner.width, 1), buf);
        return;
    }

    let height = inner.height as usize;
    let start = visible_start(lines.len(), height, state.scroll_offset);
    let visible: Vec<Line> = lines.into_iter().skip(start).take(height).collect();
    Paragraph::new(visible).render(inner, buf);
}

/// First visible line when showing `height` lines, `offset` lines up from the bottom.
fn visible_start(total: usize, height: usize, offset: usize) -> usize {
    let bottom_start = total.saturating_sub(height);
    bottom_start.saturating_sub(offset)
}

fn build_lines(thread: &ThreadSync, width: usize) -> Vec<Line<'static>> {
    let me = thread.me();
    let peer = thread.peer();
    let text_width = width.saturating_sub(2);
    let mut lines = Vec::new();

    for message in thread.messages() {
        let (name, color) = if message.is_from(&me.uid) {
            (me.username.as_str(), Color::Cyan)
        } else {
            (peer.username.as_str(), Color::Yellow)
        };
        lines.push(Line::from(vec![
            Span::styled(
                format!(" {}", name),
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!("  {}", format_time(message.timestamp)),
                Style::default().fg(Color::DarkGray),
            ),
        ]));
        for text_line in wrap_text(&message.text, text_width) {
            lines.push(Line::from(Span::raw(format!("  {}", text_line))));
        }
        lines.push(Line::default());
    }

    // No gap after the newest message.
    lines.pop();
    lines
}

/// Word-wrap by display width; words longer than a line are split.
fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    if max_width == 0 {
        return vec![];
    }
    let mut result = Vec::new();
    for line in text.lines() {
        let mut current = String::new();
        for word in line.split_whitespace() {
            let needed = if current.is_empty() {
                word.width()
            } else {
                current.width() + 1 + word.width()
            };
            if needed <= max_width {
                if !current.is_empty() {
                    current.push(' ');
                }
                current.push_str(word);
                continue;
            }
            if !current.is_empty() {
                result.push(std::mem::take(&mut current));
            }
            for c in word.chars() {
                if current.width() + c.to_string().width() > max_width {
                    result.push(std::mem::take(&mut current));
                }
                current.push(c);
            }
        }
        result.push(current);
    }
    result
}
