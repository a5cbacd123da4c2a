//! Layout definitions

use ratatui::layout::{Constraint, Direction, Layout, Rect};

/// Screen regions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Areas {
    pub alert: Option<Rect>,
    pub conversation: Rect,
    pub tasks: Rect,
    pub notes: Rect,
    pub input: Rect,
    pub status: Rect,
}

/// Alert banner on top, conversation beside tasks/notes, then input and status
pub fn create_layout(area: Rect, show_alert: bool) -> Areas {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(if show_alert { 3 } else { 0 }), // Caregiver alert
            Constraint::Min(5),                                  // Main (expandable)
            Constraint::Length(3),                               // Input (fixed height)
            Constraint::Length(1),                               // Status bar
        ])
        .split(area);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
        .split(rows[1]);

    let sidebar = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(columns[1]);

    Areas {
        alert: show_alert.then_some(rows[0]),
        conversation: columns[0],
        tasks: sidebar[0],
        notes: sidebar[1],
        input: rows[2],
        status: rows[3],
    }
}
