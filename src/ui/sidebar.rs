//! Tasks, memory notes and the caregiver alert banner

use ratatui::{
    layout::Rect,
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::api::{Note, Task};

use super::{styles, RenderState};

pub fn task_lines(tasks: &[Task]) -> Vec<Line<'static>> {
    if tasks.is_empty() {
        return vec![Line::from(Span::styled("No tasks yet", styles::empty_style()))];
    }

    tasks
        .iter()
        .enumerate()
        .map(|(i, task)| {
            let (mark, style) = if task.completed {
                ("✓", styles::task_done_style())
            } else {
                (" ", styles::task_style())
            };
            Line::from(vec![
                Span::styled(format!("{:>2}. [{}] ", i + 1, mark), style),
                Span::styled(task.display_name(), style),
                Span::styled(format!("  {}", task.scheduled_time), styles::time_style()),
            ])
        })
        .collect()
}

pub fn note_lines(notes: &[Note]) -> Vec<Line<'static>> {
    if notes.is_empty() {
        return vec![Line::from(Span::styled("No memories yet", styles::empty_style()))];
    }

    let mut lines = Vec::new();
    for note in notes {
        lines.push(Line::from(Span::styled(note.note_text.clone(), styles::text_style())));
        lines.push(Line::from(Span::styled(note.display_time(), styles::time_style())));
    }
    lines
}

pub fn draw_tasks(frame: &mut Frame, area: Rect, state: &RenderState) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style())
        .title(" Today's tasks (/done n) ");

    let paragraph = Paragraph::new(Text::from(task_lines(state.tasks)))
        .block(block)
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
}

pub fn draw_notes(frame: &mut Frame, area: Rect, state: &RenderState) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style())
        .title(" Memories ");

    let paragraph = Paragraph::new(Text::from(note_lines(state.notes)))
        .block(block)
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
}

pub fn draw_alert(frame: &mut Frame, area: Rect, alert: &str) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::recording_style())
        .title(" Caregiver alert ");

    let paragraph = Paragraph::new(Line::from(Span::styled(
        format!(" {} ", alert),
        styles::alert_style(),
    )))
    .block(block);
    frame.render_widget(paragraph, area);
}
