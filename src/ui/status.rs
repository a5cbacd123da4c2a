//! Status bar widget

use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::assistant::Phase;

use super::{styles, RenderState};

fn phase_style(phase: Phase) -> Style {
    match phase {
        Phase::Recording => styles::recording_style(),
        phase if phase.is_busy() => styles::busy_style(),
        _ => styles::ready_style(),
    }
}

/// Draw the status bar
pub fn draw_status(frame: &mut Frame, area: Rect, state: &RenderState) {
    let mut spans = vec![Span::styled(
        format!(" {} ", state.status),
        phase_style(state.phase),
    )];

    if state.awaiting_reply {
        spans.push(Span::styled(" | ", styles::status_style()));
        spans.push(Span::styled("waiting for reply", styles::busy_style()));
    }

    // Backend (right aligned)
    let backend_info = format!("{} ", state.api_url);

    let left_len: usize = spans.iter().map(|s| s.content.chars().count()).sum();
    let padding = (area.width as usize).saturating_sub(left_len + backend_info.len());
    if padding > 0 {
        spans.push(Span::raw(" ".repeat(padding)));
    }
    spans.push(Span::styled(backend_info, styles::url_style()));

    let paragraph = Paragraph::new(Line::from(spans));

    frame.render_widget(paragraph, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_styles() {
        assert_eq!(phase_style(Phase::Idle), styles::ready_style());
        assert_eq!(phase_style(Phase::Recording), styles::recording_style());
        assert_eq!(phase_style(Phase::Processing), styles::busy_style());
        assert_eq!(phase_style(Phase::Speaking), styles::busy_style());
    }
}
