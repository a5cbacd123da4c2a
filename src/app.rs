//! Main application state and event loop

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::{
    api::{AlertState, ApiClient, ChatResponse, HistoryEntry, Note, Task},
    assistant::{Controller, ControllerConfig, Phase, TurnKind},
    config::Config,
    ui::{self, RenderState},
    voice::{SpeakerPlayer, VoiceRecorder},
};

/// Results reported back to the event loop by background tasks
#[derive(Debug)]
pub enum AppMessage {
    /// `/chat` answered
    ChatReply { kind: TurnKind, response: ChatResponse },
    /// `/chat` failed (network or non-success status)
    ChatFailed { kind: TurnKind, error: String },
    /// Speech playback ended, successfully or not
    PlaybackFinished(Result<(), String>),
    /// Fresh task list
    TasksLoaded(Vec<Task>),
    /// Fresh notes
    NotesLoaded(Vec<Note>),
    /// Caregiver alert poll result
    AlertChecked(AlertState),
    /// Conversation history replayed on startup
    HistoryLoaded(Vec<HistoryEntry>),
    /// Outcome of `/call`, with the caller name on success
    CallRecorded(Result<String, String>),
    /// Transient status expired
    StatusReset(u64),
}

/// A single entry in the conversation
#[derive(Debug, Clone)]
pub struct ConversationEntry {
    pub role: Role,
    pub text: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
    System,
}

const HELP: &str = r#"Commands:
  /done <n>      Toggle task n
  /call <name>   Record a call from a contact
  /refresh       Reload tasks, notes and alerts
  /clear         Clear conversation
  /quit          Exit
  Ctrl+R         Start / stop voice recording
  Esc            Cancel recording
  Ctrl+C         Clear input
  Ctrl+Q         Quit"#;

/// Ctrl+R starts and stops recording; printable keys stay typeable
pub fn is_voice_toggle(key: &KeyEvent) -> bool {
    key.modifiers.contains(KeyModifiers::CONTROL) && matches!(key.code, KeyCode::Char('r' | 'R'))
}

/// Application state
pub struct App {
    /// Terminal handle
    terminal: Terminal<CrosstermBackend<Stdout>>,
    /// Conversation, tasks, notes, alert and phase
    controller: Controller,
    /// App message receiver
    message_rx: mpsc::Receiver<AppMessage>,
    /// Backend shown in the status bar
    api_url: String,
    /// Current input text
    input: String,
    /// Input cursor position (byte offset)
    cursor_position: usize,
    /// Scroll offset for conversation view
    scroll_offset: usize,
    /// Input history
    input_history: Vec<String>,
    /// Current position in input history
    history_index: Option<usize>,
    /// Should quit
    should_quit: bool,
}

impl App {
    pub fn new(config: &Config) -> Result<Self> {
        let backend = Arc::new(ApiClient::new(&config.api_url, config.request_timeout)?);
        let api_url = backend.base_url().to_string();

        // Create message channel
        let (message_tx, message_rx) = mpsc::channel(100);

        let controller = Controller::new(
            backend,
            Arc::new(SpeakerPlayer::new()),
            Box::new(VoiceRecorder::new()),
            message_tx,
            ControllerConfig {
                alert_interval: config.alert_interval,
                status_reset_delay: config.status_reset_delay,
            },
        );

        // Set up terminal
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;

        Ok(Self {
            terminal,
            controller,
            message_rx,
            api_url,
            input: String::new(),
            cursor_position: 0,
            scroll_offset: 0,
            input_history: Vec::new(),
            history_index: None,
            should_quit: false,
        })
    }

    /// Run until quit, restoring the terminal either way
    pub async fn run(&mut self) -> Result<()> {
        tracing::info!(api = %self.api_url, "starting companion client");
        self.controller.startup();

        let result = self.event_loop().await;
        self.cleanup()?;
        result
    }

    async fn event_loop(&mut self) -> Result<()> {
        loop {
            // Draw UI
            self.draw()?;

            tokio::select! {
                // Check for terminal events
                _ = tokio::time::sleep(Duration::from_millis(16)) => {
                    if event::poll(Duration::from_millis(0))? {
                        if let Event::Key(key) = event::read()? {
                            if key.kind != KeyEventKind::Release {
                                self.handle_key_event(key).await;
                            }
                        }
                    }
                }

                // Check for app messages
                Some(msg) = self.message_rx.recv() => {
                    self.controller.handle(msg);
                }
            }

            if self.should_quit {
                return Ok(());
            }
        }
    }

    fn draw(&mut self) -> Result<()> {
        let state = RenderState {
            messages: self.controller.messages(),
            tasks: self.controller.tasks(),
            notes: self.controller.notes(),
            alert: self.controller.alert(),
            input: &self.input,
            cursor_position: self.cursor_position,
            phase: self.controller.phase(),
            awaiting_reply: self.controller.awaiting_reply(),
            status: self.controller.status(),
            api_url: &self.api_url,
            scroll_offset: self.scroll_offset,
        };

        self.terminal.draw(|frame| {
            ui::draw(frame, &state);
        })?;
        Ok(())
    }

    async fn handle_key_event(&mut self, key: KeyEvent) {
        match self.controller.phase() {
            Phase::Recording => self.handle_recording_key(key).await,
            _ => self.handle_normal_key(key).await,
        }
    }

    async fn handle_normal_key(&mut self, key: KeyEvent) {
        match (key.modifiers, key.code) {
            // Quit
            (KeyModifiers::CONTROL, KeyCode::Char('q')) => {
                self.should_quit = true;
            }
            (KeyModifiers::CONTROL, KeyCode::Char('c')) => {
                self.input.clear();
                self.cursor_position = 0;
            }
            // Submit input
            (_, KeyCode::Enter) => {
                self.submit_input();
            }
            // Voice toggle
            _ if is_voice_toggle(&key) => {
                self.controller.toggle_recording().await;
            }
            // Character input
            (KeyModifiers::NONE | KeyModifiers::SHIFT, KeyCode::Char(c)) => {
                self.input.insert(self.cursor_position, c);
                self.cursor_position += c.len_utf8();
            }
            (_, KeyCode::Backspace) => {
                if let Some(c) = self.input[..self.cursor_position].chars().next_back() {
                    self.cursor_position -= c.len_utf8();
                    self.input.remove(self.cursor_position);
                }
            }
            (_, KeyCode::Delete) => {
                if self.cursor_position < self.input.len() {
                    self.input.remove(self.cursor_position);
                }
            }
            // Cursor movement
            (_, KeyCode::Left) => {
                if let Some(c) = self.input[..self.cursor_position].chars().next_back() {
                    self.cursor_position -= c.len_utf8();
                }
            }
            (_, KeyCode::Right) => {
                if let Some(c) = self.input[self.cursor_position..].chars().next() {
                    self.cursor_position += c.len_utf8();
                }
            }
            (_, KeyCode::Home) => {
                self.cursor_position = 0;
            }
            (_, KeyCode::End) => {
                self.cursor_position = self.input.len();
            }
            // History navigation
            (_, KeyCode::Up) => {
                self.navigate_history(-1);
            }
            (_, KeyCode::Down) => {
                self.navigate_history(1);
            }
            // Scroll conversation
            (_, KeyCode::PageUp) => {
                self.scroll_offset = self.scroll_offset.saturating_add(10);
            }
            (_, KeyCode::PageDown) => {
                self.scroll_offset = self.scroll_offset.saturating_sub(10);
            }
            _ => {}
        }
    }

    async fn handle_recording_key(&mut self, key: KeyEvent) {
        match key.code {
            // Stop and send
            _ if is_voice_toggle(&key) => {
                self.controller.toggle_recording().await;
                self.scroll_offset = 0;
            }
            KeyCode::Esc => {
                self.controller.cancel_recording();
            }
            _ => {}
        }
    }

    fn submit_input(&mut self) {
        let input = std::mem::take(&mut self.input);
        self.cursor_position = 0;

        if input.trim().is_empty() {
            return;
        }

        self.input_history.push(input.clone());
        self.history_index = None;

        if let Some(command) = input.trim_start().strip_prefix('/') {
            self.handle_slash_command(command);
        } else if self.controller.submit_text(&input) {
            // Reset scroll to see new messages
            self.scroll_offset = 0;
        } else {
            // Rejected while busy; keep the text for another try
            self.cursor_position = input.len();
            self.input = input;
        }
    }

    fn handle_slash_command(&mut self, input: &str) {
        let (command, args) = match input.split_once(' ') {
            Some((command, args)) => (command, args.trim()),
            None => (input, ""),
        };

        match command {
            "quit" | "q" => {
                self.should_quit = true;
            }
            "clear" => {
                self.controller.clear_conversation();
                self.scroll_offset = 0;
            }
            "refresh" => {
                self.controller.refresh_tasks();
                self.controller.refresh_notes();
                self.controller.check_alert();
            }
            "done" => match args.parse::<usize>() {
                Ok(n) if n >= 1 => {
                    self.controller.toggle_task(n - 1);
                }
                _ => self.controller.flash_status("Usage: /done <task number>"),
            },
            "call" => {
                if args.is_empty() {
                    self.controller.flash_status("Usage: /call <name>");
                } else {
                    self.controller.record_call(args);
                }
            }
            "help" => {
                self.controller.push_system(HELP);
            }
            _ => {
                self.controller
                    .flash_status(format!("Unknown command: /{}", command));
            }
        }
    }

    fn navigate_history(&mut self, direction: i32) {
        if self.input_history.is_empty() {
            return;
        }

        let new_index = match self.history_index {
            None if direction < 0 => Some(self.input_history.len() - 1),
            Some(i) if direction < 0 && i > 0 => Some(i - 1),
            Some(i) if direction > 0 && i < self.input_history.len() - 1 => Some(i + 1),
            Some(_) if direction > 0 => None,
            idx => idx,
        };

        self.history_index = new_index;
        self.input = match new_index {
            Some(i) => self.input_history[i].clone(),
            None => String::new(),
        };
        self.cursor_position = self.input.len();
    }

    fn cleanup(&mut self) -> Result<()> {
        self.controller.shutdown();

        // Restore terminal
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_toggle_is_ctrl_r() {
        assert!(is_voice_toggle(&KeyEvent::new(KeyCode::Char('r'), KeyModifiers::CONTROL)));
        assert!(!is_voice_toggle(&KeyEvent::new(KeyCode::Char('r'), KeyModifiers::NONE)));
    }

    #[test]
    fn test_asterisk_is_plain_text() {
        assert!(!is_voice_toggle(&KeyEvent::new(KeyCode::Char('*'), KeyModifiers::NONE)));
        assert!(!is_voice_toggle(&KeyEvent::new(KeyCode::Char('*'), KeyModifiers::SHIFT)));
    }

    #[test]
    fn test_help_names_voice_key() {
        assert!(HELP.contains("Ctrl+R"));
        assert!(!HELP.contains("\n  *"));
    }
}
