//! HTTP client for the assistant backend

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::error::{Error, Result};

use super::types::{
    AlertState, CallRecord, ChatInput, ChatResponse, ErrorBody, HistoryEntry, Note, Task,
    TaskUpdate, TextMessage,
};

/// Default backend location
pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";

/// Everything the client needs from the backend
#[async_trait]
pub trait Backend: Send + Sync {
    /// `POST /chat` with either an audio blob or a typed message
    async fn chat(&self, input: ChatInput) -> Result<ChatResponse>;
    /// `GET /tasks`
    async fn tasks(&self) -> Result<Vec<Task>>;
    /// `PUT /tasks/{id}`
    async fn set_task_completed(&self, id: i64, completed: bool) -> Result<()>;
    /// `GET /notes`
    async fn notes(&self) -> Result<Vec<Note>>;
    /// `GET /caregiver-alert`
    async fn caregiver_alert(&self) -> Result<AlertState>;
    /// `GET /history`
    async fn history(&self) -> Result<Vec<HistoryEntry>>;
    /// `POST /record-call`
    async fn record_call(&self, caller_name: &str) -> Result<()>;
}

/// `reqwest` implementation of [`Backend`]
pub struct ApiClient {
    http: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Send a request and fail on non-success statuses
    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|e| e.error)
            .unwrap_or(body);
        tracing::debug!(status = status.as_u16(), %message, "backend returned error");

        Err(Error::Status {
            status: status.as_u16(),
            message,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send(self.http.get(self.url(path))).await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl Backend for ApiClient {
    async fn chat(&self, input: ChatInput) -> Result<ChatResponse> {
        let request = self.http.post(self.url("chat"));
        let request = match input {
            ChatInput::Audio(wav) => {
                tracing::debug!(bytes = wav.len(), "uploading audio");
                let part = Part::bytes(wav)
                    .file_name("audio.wav")
                    .mime_str("audio/wav")?;
                request.multipart(Form::new().part("audio", part))
            }
            ChatInput::Text(text) => request.json(&TextMessage { message: &text }),
        };

        let response = self.send(request).await?;
        Ok(response.json().await?)
    }

    async fn tasks(&self) -> Result<Vec<Task>> {
        self.get_json("tasks").await
    }

    async fn set_task_completed(&self, id: i64, completed: bool) -> Result<()> {
        let request = self
            .http
            .put(self.url(&format!("tasks/{}", id)))
            .json(&TaskUpdate { completed });
        self.send(request).await?;
        Ok(())
    }

    async fn notes(&self) -> Result<Vec<Note>> {
        self.get_json("notes").await
    }

    async fn caregiver_alert(&self) -> Result<AlertState> {
        self.get_json("caregiver-alert").await
    }

    async fn history(&self) -> Result<Vec<HistoryEntry>> {
        self.get_json("history").await
    }

    async fn record_call(&self, caller_name: &str) -> Result<()> {
        let request = self
            .http
            .post(self.url("record-call"))
            .json(&CallRecord { caller_name });
        self.send(request).await?;
        Ok(())
    }
}
