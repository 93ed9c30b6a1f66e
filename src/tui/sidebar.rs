//! Sidebar widget: the signed-in user's conversations, newest first.

use chrono::{DateTime, Utc};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Widget},
};

use crate::api::{format_age, preview};
use crate::models::ConversationSummary;
use crate::sync::ConversationDirectory;

/// Rows per conversation: name line + preview line.
const ROWS_PER_ITEM: usize = 2;

/// Sidebar navigation state.
///
/// The selection follows the counterparty, not the row, so it stays on the
/// same conversation when the directory re-sorts.
#[derive(Default)]
pub struct SidebarState {
    pub selected: usize,
    selected_id: Option<String>,
}

impl SidebarState {
    pub fn move_up(&mut self, summaries: &[ConversationSummary]) {
        if self.selected > 0 {
            self.select(self.selected - 1, summaries);
        }
    }

    pub fn move_down(&mut self, summaries: &[ConversationSummary]) {
        if self.selected + 1 < summaries.len() {
            self.select(self.selected + 1, summaries);
        }
    }

    fn select(&mut self, index: usize, summaries: &[ConversationSummary]) {
        self.selected = index;
        self.selected_id = summaries
            .get(index)
            .map(|s| s.counterparty_id().to_string());
    }

    /// Re-find the selected conversation after the directory changed.
    pub fn sync(&mut self, summaries: &[ConversationSummary]) {
        let found = self
            .selected_id
            .as_deref()
            .and_then(|id| summaries.iter().position(|s| s.counterparty_id() == id));
        let index = match found {
            Some(index) => index,
            None => self.selected.min(summaries.len().saturating_sub(1)),
        };
        self.select(index, summaries);
    }

    pub fn selected_summary<'a>(
        &self,
        summaries: &'a [ConversationSummary],
    ) -> Option<&'a ConversationSummary> {
        summaries.get(self.selected)
    }
}

/// Render the sidebar into the given area.
pub fn render(
    area: Rect,
    buf: &mut Buffer,
    state: &SidebarState,
    directory: &ConversationDirectory,
    open_peer: Option<&str>,
    focused: bool,
) {
    let (border_style, border_type) = if focused {
        (Style::default().fg(Color::Yellow), BorderType::Double)
    } else {
        (Style::default().fg(Color::DarkGray), BorderType::Plain)
    };

    let block = Block::default()
        .title(" Chats ")
        .borders(Borders::ALL)
        .border_type(border_type)
        .border_style(border_style);

    let inner = block.inner(area);
    block.render(area, buf);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    let summaries = directory.summaries();
    if summaries.is_empty() {
        let text = if directory.loaded() {
            " No chats yet. Press n"
        } else {
            " Loading..."
        };
        let line = Line::from(Span::styled(text, Style::default().fg(Color::DarkGray)));
        Paragraph::new(line).render(Rect::new(inner.x, inner.y, inner.width, 1), buf);
        return;
    }

    let visible = (inner.height as usize / ROWS_PER_ITEM).max(1);
    let scroll_offset = compute_scroll_offset(state.selected, visible, summaries.len());
    let now = Utc::now();

    for (slot, index) in (scroll_offset..summaries.len()).take(visible).enumerate() {
        let y = inner.y + (slot * ROWS_PER_ITEM) as u16;
        if y >= inner.y + inner.height {
            break;
        }
        let summary = &summaries[index];
        let row = RowCtx {
            area: Rect::new(inner.x, y, inner.width, 1),
            selected: index == state.selected,
            open: open_peer == Some(summary.counterparty_id()),
        };
        let preview_area = (y + 1 < inner.y + inner.height)
            .then(|| Rect::new(inner.x, y + 1, inner.width, 1));
        render_item(buf, &row, preview_area, summary, directory.user_id(), now);
    }
}

/// Simple scroll offset: keep selected item visible.
fn compute_scroll_offset(selected: usize, height: usize, total: usize) -> usize {
    if total <= height || selected < height {
        return 0;
    }
    let max_offset = total.saturating_sub(height);
    selected.saturating_sub(height - 1).min(max_offset)
}

struct RowCtx {
    area: Rect,
    selected: bool,
    open: bool,
}

fn item_style(selected: bool, open: bool) -> Style {
    if selected {
        Style::default()
            .fg(Color::White)
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD)
    } else if open {
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Gray)
    }
}

fn render_item(
    buf: &mut Buffer,
    row: &RowCtx,
    preview_area: Option<Rect>,
    summary: &ConversationSummary,
    me: &str,
    now: DateTime<Utc>,
) {
    let cursor = if row.selected { "\u{25BA}" } else { " " };
    let label = format!("{}{}", cursor, summary.username);
    let age = format_age(summary.timestamp, now);
    let style = item_style(row.selected, row.open);
    render_row(buf, row.area, &label, &age, style, Style::default().fg(Color::DarkGray));

    if let Some(area) = preview_area {
        let prefix = if summary.from_id == me { "you: " } else { "" };
        let max = (area.width as usize).saturating_sub(2 + prefix.len());
        let text = format!("  {}{}", prefix, preview(&summary.text, max));
        render_row(buf, area, &text, "", Style::default().fg(Color::DarkGray), Style::default());
    }
}

/// Render a row with left-aligned text and an optional right-aligned badge.
fn render_row(
    buf: &mut Buffer,
    area: Rect,
    left: &str,
    badge: &str,
    text_style: Style,
    badge_style: Style,
) {
    let width = area.width as usize;
    if width == 0 {
        return;
    }

    let badge_len = badge.chars().count();
    let max_left = if badge_len > 0 {
        width.saturating_sub(badge_len + 1)
    } else {
        width
    };

    let left_truncated: String = left.chars().take(max_left).collect();
    let pad = width.saturating_sub(left_truncated.chars().count() + badge_len);

    let line = Line::from(vec![
        Span::styled(left_truncated, text_style),
        Span::styled(" ".repeat(pad), text_style),
        Span::styled(badge.to_string(), badge_style),
    ]);
    Paragraph::new(line).render(area, buf);
}
