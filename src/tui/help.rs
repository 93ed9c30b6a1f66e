//! Help popup overlay: keyboard shortcuts by category.

use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

const POPUP_WIDTH: u16 = 52;
const POPUP_HEIGHT: u16 = 24;

struct Shortcut {
    key: &'static str,
    desc: &'static str,
}

struct Category {
    title: &'static str,
    shortcuts: &'static [Shortcut],
}

const CATEGORIES: &[Category] = &[
    Category {
        title: "NAVIGATION",
        shortcuts: &[
            Shortcut { key: "Tab", desc: "Cycle focus forward" },
            Shortcut { key: "Shift+Tab", desc: "Cycle focus backward" },
            Shortcut { key: "Up/Down", desc: "Move or scroll within pane" },
            Shortcut { key: "Enter", desc: "Open selected chat" },
            Shortcut { key: "Esc", desc: "Close chat or overlay" },
        ],
    },
    Category {
        title: "MESSAGING",
        shortcuts: &[
            Shortcut { key: "n", desc: "New message" },
            Shortcut { key: "i", desc: "Focus compose box" },
            Shortcut { key: "Enter", desc: "Send (compose box)" },
            Shortcut { key: "Ctrl+U", desc: "Clear compose box" },
        ],
    },
    Category {
        title: "MISC",
        shortcuts: &[
            Shortcut { key: "?", desc: "Toggle this help" },
            Shortcut { key: "q", desc: "Quit" },
            Shortcut { key: "Ctrl+C", desc: "Quit from anywhere" },
        ],
    },
];

/// Render the help popup centered on screen.
pub fn render_help_popup(frame: &mut Frame) {
    let area = frame.area();
    let popup_w = POPUP_WIDTH.min(area.width.saturating_sub(2));
    let popup_h = POPUP_HEIGHT.min(area.height.saturating_sub(2));
    let popup_area = centered_rect(popup_w, popup_h, area);

    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(Span::styled(
            " HELP ",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ))
        .title_bottom(Line::from(Span::styled(
            " Press any key to close ",
            Style::default().fg(Color::Gray),
        )));

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    frame.render_widget(Paragraph::new(build_lines()), inset(inner, 1, 1));
}

fn build_lines<'a>() -> Vec<Line<'a>> {
    let mut lines: Vec<Line<'a>> = Vec::new();

    for (idx, cat) in CATEGORIES.iter().enumerate() {
        if idx > 0 {
            lines.push(Line::from(""));
        }
        lines.push(Line::from(Span::styled(
            cat.title,
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        )));
        for sc in cat.shortcuts {
            lines.push(Line::from(vec![
                Span::styled(format!("{:<12}", sc.key), Style::default().fg(Color::Yellow)),
                Span::styled(sc.desc, Style::default().fg(Color::Gray)),
            ]));
        }
    }

    lines
}

/// Return a centered sub-rect of the given size within `area`.
pub fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    Rect::new(x, y, width.min(area.width), height.min(area.height))
}

fn inset(area: Rect, h: u16, v: u16) -> Rect {
    Rect::new(
        area.x + h,
        area.y + v,
        area.width.saturating_sub(h * 2),
        area.height.saturating_sub(v * 2),
    )
}
