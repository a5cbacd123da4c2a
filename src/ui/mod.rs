//! UI components using ratatui

mod conversation;
mod input;
mod layout;
mod sidebar;
mod status;
mod styles;

pub use conversation::*;
pub use input::*;
pub use layout::*;
pub use sidebar::*;
pub use status::*;

use ratatui::Frame;

use crate::api::{Note, Task};
use crate::app::ConversationEntry;
use crate::assistant::Phase;

/// State needed for rendering (borrowed references)
pub struct RenderState<'a> {
    pub messages: &'a [ConversationEntry],
    pub tasks: &'a [Task],
    pub notes: &'a [Note],
    pub alert: Option<&'a str>,
    pub input: &'a str,
    pub cursor_position: usize,
    pub phase: Phase,
    pub awaiting_reply: bool,
    pub status: &'a str,
    pub api_url: &'a str,
    pub scroll_offset: usize,
}

/// Main draw function
pub fn draw(frame: &mut Frame, state: &RenderState) {
    let areas = create_layout(frame.area(), state.alert.is_some());

    if let (Some(area), Some(alert)) = (areas.alert, state.alert) {
        draw_alert(frame, area, alert);
    }
    draw_conversation(frame, areas.conversation, state);
    draw_tasks(frame, areas.tasks, state);
    draw_notes(frame, areas.notes, state);
    draw_input(frame, areas.input, state);
    draw_status(frame, areas.status, state);
}
