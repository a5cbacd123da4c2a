//! Conversation view widget

use ratatui::{
    layout::Rect,
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::app::{ConversationEntry, Role};

use super::{styles, RenderState};

/// Build the lines for a list of conversation entries
pub fn conversation_lines(messages: &[ConversationEntry]) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    for entry in messages {
        let (prefix, style) = match entry.role {
            Role::User => ("You", styles::user_style()),
            Role::Assistant => ("Companion", styles::assistant_style()),
            Role::System => ("System", styles::system_style()),
        };

        let time = entry
            .timestamp
            .with_timezone(&chrono::Local)
            .format("%H:%M")
            .to_string();
        lines.push(Line::from(vec![
            Span::styled(format!("{}: ", prefix), style),
            Span::styled(time, styles::empty_style()),
        ]));
        for line in entry.text.lines() {
            lines.push(Line::from(Span::styled(line.to_string(), styles::text_style())));
        }
        lines.push(Line::from(""));
    }

    lines
}

/// Draw the conversation area
pub fn draw_conversation(frame: &mut Frame, area: Rect, state: &RenderState) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style())
        .title(" Conversation ");

    let inner = block.inner(area);

    let mut lines = conversation_lines(state.messages);

    if state.awaiting_reply {
        lines.push(Line::from(Span::styled("Companion is typing...", styles::busy_style())));
    }

    // Calculate scroll
    let visible_height = inner.height as usize;
    let total_lines = lines.len();
    let scroll = if total_lines > visible_height {
        let max_scroll = total_lines.saturating_sub(visible_height);
        max_scroll.saturating_sub(state.scroll_offset)
    } else {
        0
    };

    let paragraph = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((scroll as u16, 0));

    frame.render_widget(paragraph, area);
}
