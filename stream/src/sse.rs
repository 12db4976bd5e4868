//! Server-sent-events implementation of the push channel.
//!
//! The server exposes one long-lived `text/event-stream` endpoint per
//! session. Each event is a `data:` line holding a JSON
//! [`PushEnvelope`]; comment lines (heartbeats) and field lines other than
//! `data:` are ignored.

use crate::source::{EventSource, EventStream, StreamError};
use async_stream::try_stream;
use futures::StreamExt;
use shopsync_core::event::PushEnvelope;
use shopsync_core::role::Role;
use shopsync_core::session::AccessToken;

/// Push channel over SSE.
#[derive(Debug, Clone)]
pub struct SseEventSource {
    client: reqwest::Client,
    base_url: String,
}

impl SseEventSource {
    /// Creates a source connecting to `{base_url}/events`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Extracts the JSON payload from one SSE line, if it carries one.
    fn data_line(line: &str) -> Option<&str> {
        let data = line.strip_prefix("data:")?.trim_start();
        if data.is_empty() { None } else { Some(data) }
    }
}

impl EventSource for SseEventSource {
    async fn connect(&self, token: &AccessToken, role: Role) -> Result<EventStream, StreamError> {
        let url = format!("{}/events", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .get(url)
            .query(&[("scope", role.to_string())])
            .bearer_auth(token.as_str())
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| StreamError::Connect(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StreamError::Connect(format!(
                "Server refused push channel: HTTP {status}"
            )));
        }

        let mut bytes = response.bytes_stream();
        let stream = try_stream! {
            let mut buffer = String::new();
            while let Some(chunk) = bytes.next().await {
                let chunk = chunk.map_err(|e| StreamError::Protocol(e.to_string()))?;
                buffer.push_str(&String::from_utf8_lossy(&chunk));
                while let Some(newline) = buffer.find('\n') {
                    let line = buffer[..newline].trim_end_matches('\r').to_string();
                    buffer.drain(..=newline);
                    if let Some(data) = Self::data_line(&line) {
                        let envelope: PushEnvelope = serde_json::from_str(data)
                            .map_err(|e| StreamError::Protocol(format!("Bad envelope: {e}")))?;
                        yield envelope;
                    }
                }
            }
            // The server ended the stream; the subscriber will reconnect.
            Err(StreamError::Closed)?;
        };
        Ok(stream.boxed())
    }
}
