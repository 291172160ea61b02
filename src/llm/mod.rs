//! LLM chat client.
//!
//! `LLM_PROVIDER=ollama` talks to Ollama's streaming `/api/chat` endpoint,
//! which returns newline-delimited JSON objects
//! (`{"message":{"content":"..."},"done":false}`) rather than an SSE
//! stream; each line carries one more token/fragment of the response.

pub mod prompt_manager;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use prompt_manager::{ChatEntry, Role};

#[allow(async_fn_in_trait)]
pub trait LlmClient: Send + Sync {
    /// Stream a chat completion. Chunks are sent on `tx` as they arrive;
    /// the channel is closed once the response is complete.
    async fn chat_stream(
        &self,
        system_prompt: &str,
        history: &[ChatEntry],
        tx: mpsc::Sender<anyhow::Result<String>>,
    );
}

pub struct OllamaClient {
    endpoint: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaClient {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            model: model.into(),
            client: reqwest::Client::new(),
        }
    }
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

impl LlmClient for OllamaClient {
    async fn chat_stream(
        &self,
        system_prompt: &str,
        history: &[ChatEntry],
        tx: mpsc::Sender<anyhow::Result<String>>,
    ) {
        let mut messages = vec![serde_json::json!({"role": "system", "content": system_prompt})];
        for entry in history {
            messages.push(serde_json::json!({"role": role_str(entry.role), "content": entry.content}));
        }

        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "stream": true,
        });

        let url = format!("{}/api/chat", self.endpoint.trim_end_matches('/'));
        debug!(url = %url, model = %self.model, "llm chat request");

        let resp = match self.client.post(&url).json(&body).send().await {
            Ok(r) => r,
            Err(e) => {
                let _ = tx.send(Err(anyhow::anyhow!("LLM request failed: {e}"))).await;
                return;
            }
        };

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            let _ = tx.send(Err(anyhow::anyhow!("LLM endpoint error {status}: {text}"))).await;
            return;
        }

        let mut stream = resp.bytes_stream();
        let mut leftover = String::new();
        while let Some(chunk) = stream.next().await {
            let bytes = match chunk {
                Ok(b) => b,
                Err(e) => {
                    let _ = tx.send(Err(anyhow::anyhow!("LLM stream error: {e}"))).await;
                    return;
                }
            };
            leftover.push_str(&String::from_utf8_lossy(&bytes));
            while let Some(pos) = leftover.find('\n') {
                let line = leftover[..pos].trim().to_string();
                leftover.drain(..=pos);
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<serde_json::Value>(&line) {
                    Ok(value) => {
                        if let Some(content) = value.get("message").and_then(|m| m.get("content")).and_then(|c| c.as_str()) {
                            if !content.is_empty() && tx.send(Ok(content.to_string())).await.is_err() {
                                return;
                            }
                        }
                        if value.get("done").and_then(|d| d.as_bool()).unwrap_or(false) {
                            return;
                        }
                    }
                    Err(e) => warn!(error = %e, line, "malformed LLM stream line"),
                }
            }
        }
    }
}
