//! Input field widget

use ratatui::{
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::assistant::Phase;

use super::{styles, RenderState};

/// Draw the input area
pub fn draw_input(frame: &mut Frame, area: Rect, state: &RenderState) {
    let (title, border_style) = match state.phase {
        Phase::Recording => (
            " Listening... (Ctrl+R to send, Esc to cancel) ",
            styles::recording_style(),
        ),
        Phase::Processing | Phase::Speaking => (" Message ", styles::busy_style()),
        Phase::Idle => (" Message (Ctrl+R to talk) ", styles::border_style()),
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(title);

    // Build input line with vertical bar cursor
    let input = state.input;
    let cursor_pos = state.cursor_position.min(input.len());
    let (before_cursor, after_cursor) = input.split_at(cursor_pos);

    let line = Line::from(vec![
        Span::styled("  ", styles::input_style()), // Left padding
        Span::styled(before_cursor, styles::input_style()),
        Span::styled("│", styles::cursor_style()),
        Span::styled(after_cursor, styles::input_style()),
    ]);

    let paragraph = Paragraph::new(line).block(block);

    frame.render_widget(paragraph, area);

    // Set cursor position (accounting for border + padding)
    let x = area.x + 1 + 2 + before_cursor.chars().count() as u16;
    let y = area.y + 1;
    if x < area.x + area.width.saturating_sub(1) {
        frame.set_cursor_position((x, y));
    }
}
