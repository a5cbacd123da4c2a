//! Types exchanged with the assistant backend

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};

/// What the user said, either recorded or typed
#[derive(Debug, Clone)]
pub enum ChatInput {
    /// Encoded WAV blob from the microphone
    Audio(Vec<u8>),
    /// Typed message
    Text(String),
}

impl ChatInput {
    pub fn kind(&self) -> &'static str {
        match self {
            ChatInput::Audio(_) => "audio",
            ChatInput::Text(_) => "text",
        }
    }
}

/// Reply to `POST /chat`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatResponse {
    /// What the backend heard (audio turns only)
    #[serde(default)]
    pub transcript: Option<String>,
    pub response: String,
    /// Base64 encoded speech for the response
    #[serde(default)]
    pub audio: Option<String>,
}

/// Body of a text `POST /chat`
#[derive(Debug, Serialize)]
pub struct TextMessage<'a> {
    pub message: &'a str,
}

/// A scheduled reminder
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Task {
    pub id: i64,
    pub task_name: String,
    pub scheduled_time: String,
    #[serde(deserialize_with = "bool_or_int")]
    pub completed: bool,
}

impl Task {
    /// `take_medicine` -> `Take Medicine`
    pub fn display_name(&self) -> String {
        self.task_name
            .split(['_', ' '])
            .filter(|w| !w.is_empty())
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            })
            .collect::<Vec<String>>()
            .join(" ")
    }
}

/// Body of `PUT /tasks/{id}`
#[derive(Debug, Serialize)]
pub struct TaskUpdate {
    pub completed: bool,
}

/// A memory note saved by the assistant
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Note {
    pub note_text: String,
    pub created_at: String,
}

impl Note {
    /// Short human timestamp, or the raw value if it doesn't parse
    pub fn display_time(&self) -> String {
        let raw = self.created_at.trim();
        let parsed = DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.naive_local())
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f"));

        match parsed {
            Ok(dt) => dt.format("%b %-d, %H:%M").to_string(),
            Err(_) => raw.to_string(),
        }
    }
}

/// Reply to `GET /caregiver-alert`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AlertState {
    #[serde(default)]
    pub alert: Option<String>,
    /// Names of the missed tasks behind the alert
    #[serde(default)]
    pub tasks: Vec<String>,
}

/// One replayed turn from `GET /history`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HistoryEntry {
    pub user_message: String,
    pub agent_response: String,
}

/// Body of `POST /record-call`
#[derive(Debug, Serialize)]
pub struct CallRecord<'a> {
    pub caller_name: &'a str,
}

/// Error body the backend sends with non-success statuses
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// SQLite rows carry booleans as 0/1
fn bool_or_int<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Int(i) => i != 0,
    })
}
