//! In-memory stand-ins for the backend and audio devices

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::api::{AlertState, Backend, ChatInput, ChatResponse, HistoryEntry, Note, Task};
use crate::error::{Error, Result};
use crate::voice::{Microphone, Player};

fn server_error() -> Error {
    Error::Status {
        status: 500,
        message: "internal error".to_string(),
    }
}

/// Records every call; `reply: None` makes `/chat` fail with a 500
#[derive(Default)]
pub struct MockBackend {
    pub calls: Mutex<Vec<String>>,
    pub inputs: Mutex<Vec<ChatInput>>,
    pub reply: Mutex<Option<ChatResponse>>,
    pub tasks: Mutex<Vec<Task>>,
    pub notes: Mutex<Vec<Note>>,
    pub history: Mutex<Vec<HistoryEntry>>,
    pub alert: Mutex<AlertState>,
    /// Number of leading alert checks that fail
    pub failing_alerts: AtomicUsize,
    pub fail_task_update: AtomicBool,
}

impl MockBackend {
    pub fn replying(reply: ChatResponse) -> Self {
        let backend = Self::default();
        *backend.reply.lock().unwrap() = Some(reply);
        backend
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == call).count()
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn chat(&self, input: ChatInput) -> Result<ChatResponse> {
        self.record(format!("chat {}", input.kind()));
        self.inputs.lock().unwrap().push(input);
        self.reply.lock().unwrap().clone().ok_or_else(server_error)
    }

    async fn tasks(&self) -> Result<Vec<Task>> {
        self.record("tasks");
        Ok(self.tasks.lock().unwrap().clone())
    }

    async fn set_task_completed(&self, id: i64, completed: bool) -> Result<()> {
        self.record(format!("set_task {} {}", id, completed));
        if self.fail_task_update.load(Ordering::SeqCst) {
            return Err(server_error());
        }
        if let Some(task) = self.tasks.lock().unwrap().iter_mut().find(|t| t.id == id) {
            task.completed = completed;
        }
        Ok(())
    }

    async fn notes(&self) -> Result<Vec<Note>> {
        self.record("notes");
        Ok(self.notes.lock().unwrap().clone())
    }

    async fn caregiver_alert(&self) -> Result<AlertState> {
        self.record("caregiver_alert");
        let failing = self.failing_alerts.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_alerts.store(failing - 1, Ordering::SeqCst);
            return Err(server_error());
        }
        Ok(self.alert.lock().unwrap().clone())
    }

    async fn history(&self) -> Result<Vec<HistoryEntry>> {
        self.record("history");
        Ok(self.history.lock().unwrap().clone())
    }

    async fn record_call(&self, caller_name: &str) -> Result<()> {
        self.record(format!("record_call {}", caller_name));
        if caller_name.is_empty() {
            return Err(server_error());
        }
        Ok(())
    }
}

/// Remembers what it was asked to play
#[derive(Default)]
pub struct MockPlayer {
    pub played: Mutex<Vec<String>>,
    pub fail: AtomicBool,
}

impl MockPlayer {
    pub fn played(&self) -> Vec<String> {
        self.played.lock().unwrap().clone()
    }
}

#[async_trait]
impl Player for MockPlayer {
    async fn play(&self, audio_base64: &str) -> Result<()> {
        self.played.lock().unwrap().push(audio_base64.to_string());
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Audio("device gone".to_string()));
        }
        Ok(())
    }
}

/// Counters shared with the test after the microphone is boxed
#[derive(Default)]
pub struct MicLog {
    pub started: AtomicUsize,
    pub finished: AtomicUsize,
    pub cancelled: AtomicUsize,
}

pub struct MockMicrophone {
    pub deny: bool,
    pub blob: Vec<u8>,
    pub log: Arc<MicLog>,
}

impl MockMicrophone {
    pub fn new(blob: &[u8]) -> (Self, Arc<MicLog>) {
        let log = Arc::new(MicLog::default());
        let mic = Self {
            deny: false,
            blob: blob.to_vec(),
            log: log.clone(),
        };
        (mic, log)
    }

    pub fn denied() -> (Self, Arc<MicLog>) {
        let (mut mic, log) = Self::new(&[]);
        mic.deny = true;
        (mic, log)
    }
}

#[async_trait]
impl Microphone for MockMicrophone {
    async fn start(&mut self) -> Result<()> {
        if self.deny {
            return Err(Error::Microphone("permission denied".to_string()));
        }
        self.log.started.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn finish(&mut self) -> Result<Vec<u8>> {
        self.log.finished.fetch_add(1, Ordering::SeqCst);
        if self.blob.is_empty() {
            return Err(Error::Microphone("no audio recorded".to_string()));
        }
        Ok(self.blob.clone())
    }

    fn cancel(&mut self) {
        self.log.cancelled.fetch_add(1, Ordering::SeqCst);
    }
}
