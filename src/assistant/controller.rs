//! Client state and the operations that drive a conversation

use std::sync::Arc;
use std::time::Duration;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::api::{Backend, ChatInput, ChatResponse, HistoryEntry, Note, Task};
use crate::app::{AppMessage, ConversationEntry, Role};
use crate::voice::{Microphone, Player};

use super::poller::spawn_alert_poller;
use super::state::{
    Phase, Transition, FALLBACK_REPLY, STATUS_AUDIO_FAILED, STATUS_BUSY, STATUS_MIC_DENIED,
    STATUS_THINKING, STATUS_TEXT_FAILED,
};

/// Notes beyond this are not rendered
pub const MAX_NOTES: usize = 10;

/// How the user produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnKind {
    Voice,
    Typed,
}

/// Timing knobs for the controller
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub alert_interval: Duration,
    pub status_reset_delay: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            alert_interval: super::poller::DEFAULT_ALERT_INTERVAL,
            status_reset_delay: Duration::from_millis(2000),
        }
    }
}

/// Owns everything the client knows between events
pub struct Controller {
    backend: Arc<dyn Backend>,
    player: Arc<dyn Player>,
    microphone: Box<dyn Microphone>,
    message_tx: mpsc::Sender<AppMessage>,
    config: ControllerConfig,
    phase: Phase,
    status: String,
    /// Bumped on every status change so stale resets can be ignored
    status_generation: u64,
    awaiting_reply: bool,
    messages: Vec<ConversationEntry>,
    tasks: Vec<Task>,
    notes: Vec<Note>,
    alert: Option<String>,
    poller: Option<JoinHandle<()>>,
}

impl Controller {
    pub fn new(
        backend: Arc<dyn Backend>,
        player: Arc<dyn Player>,
        microphone: Box<dyn Microphone>,
        message_tx: mpsc::Sender<AppMessage>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            backend,
            player,
            microphone,
            message_tx,
            config,
            phase: Phase::Idle,
            status: Phase::Idle.status().to_string(),
            status_generation: 0,
            awaiting_reply: false,
            messages: Vec::new(),
            tasks: Vec::new(),
            notes: Vec::new(),
            alert: None,
            poller: None,
        }
    }

    /// Initial loads and the alert poller
    pub fn startup(&mut self) {
        self.refresh_tasks();
        self.refresh_notes();
        self.load_history();
        if self.poller.is_none() {
            self.poller = Some(spawn_alert_poller(
                self.backend.clone(),
                self.message_tx.clone(),
                self.config.alert_interval,
            ));
        }
    }

    /// Stop polling and release the microphone
    pub fn shutdown(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.abort();
        }
        if self.phase == Phase::Recording {
            self.microphone.cancel();
            self.phase = Phase::Idle;
        }
        tracing::debug!("controller shut down");
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn awaiting_reply(&self) -> bool {
        self.awaiting_reply
    }

    pub fn messages(&self) -> &[ConversationEntry] {
        &self.messages
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn alert(&self) -> Option<&str> {
        self.alert.as_deref()
    }

    pub fn clear_conversation(&mut self) {
        self.messages.clear();
    }

    pub fn push_system(&mut self, text: impl Into<String>) {
        self.push(Role::System, text);
    }

    /// Show a status until the next change
    pub fn set_status(&mut self, text: impl Into<String>) {
        self.status = text.into();
        self.status_generation += 1;
    }

    /// Show a status and fall back to the phase status after the reset delay
    pub fn flash_status(&mut self, text: impl Into<String>) {
        self.set_status(text);
        let generation = self.status_generation;
        let delay = self.config.status_reset_delay;
        let tx = self.message_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(AppMessage::StatusReset(generation)).await;
        });
    }

    fn transition(&mut self, transition: Transition) -> bool {
        match self.phase.next(transition) {
            Some(next) => {
                tracing::debug!(from = ?self.phase, to = ?next, ?transition, "phase change");
                self.phase = next;
                true
            }
            None => {
                tracing::debug!(phase = ?self.phase, ?transition, "transition rejected");
                false
            }
        }
    }

    fn reject_busy(&mut self) {
        tracing::info!(phase = ?self.phase, "ignoring input while a turn is in flight");
        self.flash_status(STATUS_BUSY);
    }

    fn push(&mut self, role: Role, text: impl Into<String>) {
        self.messages.push(ConversationEntry {
            role,
            text: text.into(),
            timestamp: chrono::Utc::now(),
        });
    }

    /// Send a typed message. Returns whether a request was issued.
    pub fn submit_text(&mut self, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }
        if !self.transition(Transition::SubmitText) {
            self.reject_busy();
            return false;
        }

        self.push(Role::User, text);
        self.set_status(STATUS_THINKING);
        self.send_chat(ChatInput::Text(text.to_string()), TurnKind::Typed);
        true
    }

    /// Voice key: start capturing when idle, finish and send when recording
    pub async fn toggle_recording(&mut self) {
        match self.phase {
            Phase::Idle => self.start_recording().await,
            Phase::Recording => self.stop_recording().await,
            Phase::Processing | Phase::Speaking => self.reject_busy(),
        }
    }

    pub async fn start_recording(&mut self) {
        if self.phase != Phase::Idle {
            self.reject_busy();
            return;
        }

        match self.microphone.start().await {
            Ok(()) => {
                self.transition(Transition::StartRecording);
                self.set_status(self.phase.status());
            }
            Err(e) => {
                tracing::error!(error = %e, "microphone error");
                self.flash_status(STATUS_MIC_DENIED);
            }
        }
    }

    pub async fn stop_recording(&mut self) {
        if !self.transition(Transition::StopRecording) {
            return;
        }
        self.set_status(self.phase.status());

        match self.microphone.finish().await {
            Ok(blob) => self.send_chat(ChatInput::Audio(blob), TurnKind::Voice),
            Err(e) => {
                tracing::warn!(error = %e, "capture produced nothing to send");
                self.transition(Transition::RequestFailed);
                self.flash_status(STATUS_AUDIO_FAILED);
            }
        }
    }

    /// Discard the current capture
    pub fn cancel_recording(&mut self) {
        if self.transition(Transition::CancelRecording) {
            self.microphone.cancel();
            self.flash_status("Recording cancelled");
        }
    }

    fn send_chat(&mut self, input: ChatInput, kind: TurnKind) {
        self.awaiting_reply = true;
        let backend = self.backend.clone();
        let tx = self.message_tx.clone();
        tokio::spawn(async move {
            tracing::debug!(input = input.kind(), "sending chat turn");
            let msg = match backend.chat(input).await {
                Ok(response) => AppMessage::ChatReply { kind, response },
                Err(e) => AppMessage::ChatFailed {
                    kind,
                    error: e.to_string(),
                },
            };
            let _ = tx.send(msg).await;
        });
    }

    fn on_chat_reply(&mut self, kind: TurnKind, response: ChatResponse) {
        self.awaiting_reply = false;

        if kind == TurnKind::Voice {
            if let Some(transcript) = response.transcript.as_deref().filter(|t| !t.is_empty()) {
                self.push(Role::User, transcript);
            }
        }
        self.push(Role::Assistant, response.response);

        match response.audio {
            Some(audio) if self.transition(Transition::ReplyWithAudio) => {
                self.set_status(self.phase.status());
                self.spawn_playback(audio);
            }
            Some(_) => {
                tracing::warn!(phase = ?self.phase, "dropping reply audio, not awaiting a reply");
            }
            None => {
                tracing::debug!("reply carried no audio");
                self.transition(Transition::ReplyWithoutAudio);
                self.set_status(self.phase.status());
            }
        }

        self.refresh_tasks();
        self.refresh_notes();
    }

    fn on_chat_failed(&mut self, kind: TurnKind, error: &str) {
        tracing::error!(%error, ?kind, "chat request failed");
        self.awaiting_reply = false;
        self.transition(Transition::RequestFailed);
        match kind {
            TurnKind::Typed => {
                self.push(Role::Assistant, FALLBACK_REPLY);
                self.flash_status(STATUS_TEXT_FAILED);
            }
            TurnKind::Voice => self.flash_status(STATUS_AUDIO_FAILED),
        }
    }

    fn spawn_playback(&self, audio: String) {
        let player = self.player.clone();
        let tx = self.message_tx.clone();
        tokio::spawn(async move {
            let result = player.play(&audio).await.map_err(|e| e.to_string());
            let _ = tx.send(AppMessage::PlaybackFinished(result)).await;
        });
    }

    pub fn refresh_tasks(&self) {
        let backend = self.backend.clone();
        let tx = self.message_tx.clone();
        tokio::spawn(async move { load_tasks(backend.as_ref(), &tx).await });
    }

    pub fn refresh_notes(&self) {
        let backend = self.backend.clone();
        let tx = self.message_tx.clone();
        tokio::spawn(async move {
            match backend.notes().await {
                Ok(notes) => {
                    let _ = tx.send(AppMessage::NotesLoaded(notes)).await;
                }
                Err(e) => tracing::warn!(error = %e, "failed to load notes"),
            }
        });
    }

    pub fn check_alert(&self) {
        let backend = self.backend.clone();
        let tx = self.message_tx.clone();
        tokio::spawn(async move {
            match backend.caregiver_alert().await {
                Ok(alert) => {
                    let _ = tx.send(AppMessage::AlertChecked(alert)).await;
                }
                Err(e) => tracing::warn!(error = %e, "caregiver alert check failed"),
            }
        });
    }

    fn load_history(&self) {
        let backend = self.backend.clone();
        let tx = self.message_tx.clone();
        tokio::spawn(async move {
            match backend.history().await {
                Ok(history) => {
                    let _ = tx.send(AppMessage::HistoryLoaded(history)).await;
                }
                Err(e) => tracing::warn!(error = %e, "failed to load history"),
            }
        });
    }

    /// Flip completion of the task at `index` (0-based) and reload the list
    pub fn toggle_task(&mut self, index: usize) -> bool {
        let Some(task) = self.tasks.get(index) else {
            self.flash_status(format!("No task #{}", index + 1));
            return false;
        };

        let id = task.id;
        let completed = !task.completed;
        let backend = self.backend.clone();
        let tx = self.message_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = backend.set_task_completed(id, completed).await {
                tracing::warn!(error = %e, task = id, "failed to update task");
            }
            load_tasks(backend.as_ref(), &tx).await;
        });
        true
    }

    /// Tell the backend a contact just called
    pub fn record_call(&mut self, caller_name: &str) {
        let caller = caller_name.trim().to_string();
        let backend = self.backend.clone();
        let tx = self.message_tx.clone();
        tokio::spawn(async move {
            let outcome = backend.record_call(&caller).await;
            let result = outcome.map(|()| caller).map_err(|e| e.to_string());
            let _ = tx.send(AppMessage::CallRecorded(result)).await;
        });
    }

    fn on_history(&mut self, history: Vec<HistoryEntry>) {
        if history.is_empty() {
            return;
        }
        self.messages.clear();
        for entry in history {
            self.push(Role::User, entry.user_message);
            self.push(Role::Assistant, entry.agent_response);
        }
    }

    /// Apply a result reported by a background task
    pub fn handle(&mut self, msg: AppMessage) {
        match msg {
            AppMessage::ChatReply { kind, response } => self.on_chat_reply(kind, response),
            AppMessage::ChatFailed { kind, error } => self.on_chat_failed(kind, &error),
            AppMessage::PlaybackFinished(result) => {
                if let Err(e) = result {
                    tracing::error!(error = %e, "audio playback failed");
                }
                if self.transition(Transition::PlaybackEnded) {
                    self.set_status(self.phase.status());
                }
            }
            AppMessage::TasksLoaded(tasks) => {
                self.tasks = tasks;
            }
            AppMessage::NotesLoaded(mut notes) => {
                notes.truncate(MAX_NOTES);
                self.notes = notes;
            }
            AppMessage::AlertChecked(state) => {
                self.alert = state.alert.filter(|a| !a.is_empty());
            }
            AppMessage::HistoryLoaded(history) => self.on_history(history),
            AppMessage::CallRecorded(result) => match result {
                Ok(caller) => self.flash_status(format!("Recorded call from {}", caller)),
                Err(e) => {
                    tracing::warn!(error = %e, "failed to record call");
                    self.flash_status("Could not record call");
                }
            },
            AppMessage::StatusReset(generation) => {
                if generation == self.status_generation {
                    self.set_status(self.phase.status());
                }
            }
        }
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.abort();
        }
    }
}

async fn load_tasks(backend: &dyn Backend, tx: &mpsc::Sender<AppMessage>) {
    match backend.tasks().await {
        Ok(tasks) => {
            let _ = tx.send(AppMessage::TasksLoaded(tasks)).await;
        }
        Err(e) => tracing::warn!(error = %e, "failed to load tasks"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::AlertState;
    use crate::assistant::state::{STATUS_IDLE, STATUS_LISTENING, STATUS_SPEAKING};
    use crate::assistant::testing::{MicLog, MockBackend, MockMicrophone, MockPlayer};
    use std::sync::atomic::Ordering;

    struct Harness {
        controller: Controller,
        rx: mpsc::Receiver<AppMessage>,
        backend: Arc<MockBackend>,
        player: Arc<MockPlayer>,
        mic: Arc<MicLog>,
    }

    fn harness_with(backend: MockBackend, mic: (MockMicrophone, Arc<MicLog>)) -> Harness {
        let backend = Arc::new(backend);
        let player = Arc::new(MockPlayer::default());
        let (tx, rx) = mpsc::channel(64);
        let (microphone, mic) = mic;
        let controller = Controller::new(
            backend.clone(),
            player.clone(),
            Box::new(microphone),
            tx,
            ControllerConfig::default(),
        );
        Harness {
            controller,
            rx,
            backend,
            player,
            mic,
        }
    }

    fn harness(backend: MockBackend) -> Harness {
        harness_with(backend, MockMicrophone::new(b"RIFFfakeWAVE"))
    }

    fn reply(audio: Option<&str>) -> ChatResponse {
        ChatResponse {
            transcript: Some("what's on today".to_string()),
            response: "You have a walk at five.".to_string(),
            audio: audio.map(str::to_string),
        }
    }

    fn task(id: i64, name: &str, completed: bool) -> Task {
        Task {
            id,
            task_name: name.to_string(),
            scheduled_time: "09:00".to_string(),
            completed,
        }
    }

    impl Harness {
        /// Feed messages back into the controller until one matches
        async fn pump_until(&mut self, pred: impl Fn(&AppMessage) -> bool) {
            loop {
                let msg = self.rx.recv().await.expect("channel closed");
                let done = pred(&msg);
                self.controller.handle(msg);
                if done {
                    return;
                }
            }
        }

        async fn pump_for(&mut self, duration: Duration) {
            let deadline = tokio::time::Instant::now() + duration;
            while let Ok(Some(msg)) = tokio::time::timeout_at(deadline, self.rx.recv()).await {
                self.controller.handle(msg);
            }
        }

        fn texts(&self) -> Vec<(Role, String)> {
            self.controller
                .messages()
                .iter()
                .map(|m| (m.role, m.text.clone()))
                .collect()
        }
    }

    #[tokio::test]
    async fn test_whitespace_text_sends_nothing() {
        let mut h = harness(MockBackend::replying(reply(None)));

        assert!(!h.controller.submit_text("   \n\t "));
        assert!(!h.controller.submit_text(""));
        tokio::task::yield_now().await;

        assert!(h.backend.calls().is_empty());
        assert_eq!(h.controller.phase(), Phase::Idle);
        assert!(h.controller.messages().is_empty());
    }

    #[tokio::test]
    async fn test_reply_with_audio_plays_it() {
        let mut h = harness(MockBackend::replying(reply(Some("SUQzBAA="))));

        assert!(h.controller.submit_text("  hello  "));
        assert_eq!(h.controller.phase(), Phase::Processing);
        assert_eq!(h.controller.status(), STATUS_THINKING);
        assert!(h.controller.awaiting_reply());

        h.pump_until(|m| matches!(m, AppMessage::ChatReply { .. })).await;
        assert_eq!(h.controller.phase(), Phase::Speaking);
        assert_eq!(h.controller.status(), STATUS_SPEAKING);
        assert!(!h.controller.awaiting_reply());

        h.pump_until(|m| matches!(m, AppMessage::PlaybackFinished(_))).await;
        assert_eq!(h.player.played(), vec!["SUQzBAA=".to_string()]);
        assert_eq!(h.controller.phase(), Phase::Idle);
        assert_eq!(h.controller.status(), STATUS_IDLE);

        // Typed turns show what was typed, not the transcript
        assert_eq!(
            h.texts(),
            vec![
                (Role::User, "hello".to_string()),
                (Role::Assistant, "You have a walk at five.".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_reply_without_audio_goes_idle() {
        let mut h = harness(MockBackend::replying(reply(None)));

        h.controller.submit_text("hello");
        h.pump_until(|m| matches!(m, AppMessage::ChatReply { .. })).await;

        assert_eq!(h.controller.phase(), Phase::Idle);
        assert_eq!(h.controller.status(), STATUS_IDLE);
        h.pump_for(Duration::from_millis(50)).await;
        assert!(h.player.played().is_empty());
    }

    #[tokio::test]
    async fn test_successful_turn_refreshes_tasks_and_notes() {
        let backend = MockBackend::replying(reply(None));
        backend.tasks.lock().unwrap().push(task(1, "take_medicine", false));
        let mut h = harness(backend);

        h.controller.submit_text("I took my pills");
        h.pump_until(|m| matches!(m, AppMessage::ChatReply { .. })).await;
        h.pump_for(Duration::from_millis(50)).await;

        assert_eq!(h.backend.count("tasks"), 1);
        assert_eq!(h.backend.count("notes"), 1);
        assert_eq!(h.controller.tasks().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_text_turn_shows_fallback_and_resets() {
        let mut h = harness(MockBackend::default());

        h.controller.submit_text("hello");
        h.pump_until(|m| matches!(m, AppMessage::ChatFailed { .. })).await;

        assert_eq!(h.controller.phase(), Phase::Idle);
        assert_eq!(h.controller.status(), STATUS_TEXT_FAILED);
        assert_eq!(
            h.texts().last(),
            Some(&(Role::Assistant, FALLBACK_REPLY.to_string()))
        );
        // No refresh after a failed turn
        assert_eq!(h.backend.count("tasks"), 0);

        h.pump_until(|m| matches!(m, AppMessage::StatusReset(_))).await;
        assert_eq!(h.controller.status(), STATUS_IDLE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_voice_turn_resets_status() {
        let mut h = harness(MockBackend::default());

        h.controller.toggle_recording().await;
        h.controller.toggle_recording().await;
        h.pump_until(|m| matches!(m, AppMessage::ChatFailed { .. })).await;

        assert_eq!(h.controller.status(), STATUS_AUDIO_FAILED);
        assert!(h.controller.messages().is_empty());

        h.pump_until(|m| matches!(m, AppMessage::StatusReset(_))).await;
        assert_eq!(h.controller.status(), STATUS_IDLE);
    }

    #[tokio::test]
    async fn test_second_submission_while_processing_is_rejected() {
        let mut h = harness(MockBackend::replying(reply(None)));

        assert!(h.controller.submit_text("first"));
        assert!(!h.controller.submit_text("second"));
        h.controller.toggle_recording().await;

        assert_eq!(h.controller.status(), STATUS_BUSY);
        assert_eq!(h.mic.started.load(Ordering::SeqCst), 0);

        h.pump_until(|m| matches!(m, AppMessage::ChatReply { .. })).await;
        assert_eq!(h.backend.count("chat text"), 1);
    }

    #[tokio::test]
    async fn test_voice_turn_uploads_blob_and_shows_transcript() {
        let mut h = harness(MockBackend::replying(reply(Some("AAAA"))));

        h.controller.toggle_recording().await;
        assert_eq!(h.controller.phase(), Phase::Recording);
        assert_eq!(h.controller.status(), STATUS_LISTENING);

        h.controller.toggle_recording().await;
        assert_eq!(h.controller.phase(), Phase::Processing);
        h.pump_until(|m| matches!(m, AppMessage::PlaybackFinished(_))).await;

        let inputs = h.backend.inputs.lock().unwrap().clone();
        assert!(matches!(&inputs[..], [ChatInput::Audio(blob)] if blob == b"RIFFfakeWAVE"));
        assert_eq!(h.mic.finished.load(Ordering::SeqCst), 1);
        assert_eq!(
            h.texts(),
            vec![
                (Role::User, "what's on today".to_string()),
                (Role::Assistant, "You have a walk at five.".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_transcript_not_rendered() {
        let backend = MockBackend::replying(ChatResponse {
            transcript: Some(String::new()),
            response: "I didn't catch that clearly.".to_string(),
            audio: None,
        });
        let mut h = harness(backend);

        h.controller.toggle_recording().await;
        h.controller.toggle_recording().await;
        h.pump_until(|m| matches!(m, AppMessage::ChatReply { .. })).await;

        assert_eq!(h.texts().len(), 1);
        assert_eq!(h.texts()[0].0, Role::Assistant);
    }

    #[tokio::test(start_paused = true)]
    async fn test_microphone_denied_stays_idle() {
        let mut h = harness_with(MockBackend::replying(reply(None)), MockMicrophone::denied());

        h.controller.toggle_recording().await;

        assert_eq!(h.controller.phase(), Phase::Idle);
        assert_eq!(h.controller.status(), STATUS_MIC_DENIED);

        h.pump_until(|m| matches!(m, AppMessage::StatusReset(_))).await;
        assert_eq!(h.controller.status(), STATUS_IDLE);
        assert!(h.backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_late_reply_audio_not_played() {
        let mut h = harness(MockBackend::default());

        h.controller.handle(AppMessage::ChatReply {
            kind: TurnKind::Typed,
            response: reply(Some("AAAA")),
        });
        h.pump_for(Duration::from_millis(50)).await;

        assert_eq!(h.controller.phase(), Phase::Idle);
        assert!(h.player.played().is_empty());
        assert_eq!(h.texts().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_capture_sends_nothing() {
        let mut h = harness_with(MockBackend::replying(reply(None)), MockMicrophone::new(&[]));

        h.controller.toggle_recording().await;
        h.controller.toggle_recording().await;

        assert_eq!(h.controller.phase(), Phase::Idle);
        assert_eq!(h.controller.status(), STATUS_AUDIO_FAILED);
        h.pump_until(|m| matches!(m, AppMessage::StatusReset(_))).await;
        assert_eq!(h.backend.count("chat audio"), 0);
    }

    #[tokio::test]
    async fn test_cancel_recording_releases_microphone() {
        let mut h = harness(MockBackend::replying(reply(None)));

        h.controller.toggle_recording().await;
        h.controller.cancel_recording();

        assert_eq!(h.controller.phase(), Phase::Idle);
        assert_eq!(h.mic.cancelled.load(Ordering::SeqCst), 1);
        tokio::task::yield_now().await;
        assert!(h.backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_playback_failure_still_returns_to_idle() {
        let mut h = harness(MockBackend::replying(reply(Some("AAAA"))));
        h.player.fail.store(true, Ordering::SeqCst);

        h.controller.submit_text("hello");
        h.pump_until(|m| matches!(m, AppMessage::PlaybackFinished(_))).await;

        assert_eq!(h.controller.phase(), Phase::Idle);
        assert_eq!(h.controller.status(), STATUS_IDLE);
    }

    #[tokio::test]
    async fn test_toggle_task_always_refreshes() {
        let backend = MockBackend::default();
        backend.tasks.lock().unwrap().push(task(3, "walk", false));
        let mut h = harness(backend);
        h.controller.handle(AppMessage::TasksLoaded(vec![task(3, "walk", false)]));

        assert!(h.controller.toggle_task(0));
        h.pump_until(|m| matches!(m, AppMessage::TasksLoaded(_))).await;
        assert_eq!(h.backend.calls(), vec!["set_task 3 true", "tasks"]);
        assert!(h.controller.tasks()[0].completed);

        h.backend.fail_task_update.store(true, Ordering::SeqCst);
        assert!(h.controller.toggle_task(0));
        h.pump_until(|m| matches!(m, AppMessage::TasksLoaded(_))).await;
        assert_eq!(
            h.backend.calls(),
            vec!["set_task 3 true", "tasks", "set_task 3 false", "tasks"]
        );
    }

    #[tokio::test]
    async fn test_toggle_unknown_task() {
        let mut h = harness(MockBackend::default());
        assert!(!h.controller.toggle_task(4));
        assert_eq!(h.controller.status(), "No task #5");
    }

    #[tokio::test]
    async fn test_stale_status_reset_ignored() {
        let mut h = harness(MockBackend::default());

        h.controller.flash_status("Recorded call from Anna");
        let stale = h.controller.status_generation;
        h.controller.set_status("Newer status");

        h.controller.handle(AppMessage::StatusReset(stale));
        assert_eq!(h.controller.status(), "Newer status");
    }

    #[tokio::test]
    async fn test_history_replaces_conversation() {
        let mut h = harness(MockBackend::default());
        h.controller.push_system("welcome");

        h.controller.handle(AppMessage::HistoryLoaded(Vec::new()));
        assert_eq!(h.texts().len(), 1);

        h.controller.handle(AppMessage::HistoryLoaded(vec![HistoryEntry {
            user_message: "Where are my keys?".to_string(),
            agent_response: "In the drawer.".to_string(),
        }]));
        assert_eq!(
            h.texts(),
            vec![
                (Role::User, "Where are my keys?".to_string()),
                (Role::Assistant, "In the drawer.".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_alert_shown_and_cleared() {
        let mut h = harness(MockBackend::default());

        h.controller.handle(AppMessage::AlertChecked(AlertState {
            alert: Some("Patient missed: lunch".to_string()),
            tasks: vec!["lunch".to_string()],
        }));
        assert_eq!(h.controller.alert(), Some("Patient missed: lunch"));

        h.controller.handle(AppMessage::AlertChecked(AlertState::default()));
        assert_eq!(h.controller.alert(), None);
    }

    #[tokio::test]
    async fn test_notes_capped() {
        let mut h = harness(MockBackend::default());
        let notes = (0..15)
            .map(|i| Note {
                note_text: format!("note {}", i),
                created_at: "2024-01-01 00:00:00".to_string(),
            })
            .collect();

        h.controller.handle(AppMessage::NotesLoaded(notes));
        assert_eq!(h.controller.notes().len(), MAX_NOTES);
        assert_eq!(h.controller.notes()[0].note_text, "note 0");
    }

    #[tokio::test]
    async fn test_startup_loads_everything_and_shutdown_stops_polling() {
        let mut h = harness(MockBackend::default());

        h.controller.startup();
        h.pump_for(Duration::from_millis(50)).await;

        for call in ["tasks", "notes", "history", "caregiver_alert"] {
            assert_eq!(h.backend.count(call), 1, "{} not loaded", call);
        }

        h.controller.shutdown();
        assert!(h.controller.poller.is_none());
    }

    #[tokio::test]
    async fn test_record_call_reports_outcome() {
        let mut h = harness(MockBackend::default());

        h.controller.record_call(" Anna ");
        h.pump_until(|m| matches!(m, AppMessage::CallRecorded(_))).await;
        assert_eq!(h.controller.status(), "Recorded call from Anna");

        h.controller.record_call("");
        h.pump_until(|m| matches!(m, AppMessage::CallRecorded(_))).await;
        assert_eq!(h.controller.status(), "Could not record call");
    }
}
