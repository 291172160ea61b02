//! Streaming speech-to-text client.
//!
//! Opens a single WebSocket connection per utterance and streams raw PCM16
//! mono audio to `STT_ENDPOINT`, yielding incremental transcript deltas as
//! the backend returns them. This replaces a record-then-POST batch call
//! with a duplex stream so the orchestrator can react to partial text (and
//! so the backend can start decoding before the user stops talking).

pub mod bias;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::audio::device::AudioFrame;

/// One incremental update from the STT backend.
#[derive(Debug, Clone)]
pub enum SttEvent {
    /// Newly recognized text since the last delta (already bias-filtered).
    Delta(String),
    /// The backend closed the connection (end of utterance, or error).
    Closed,
}

/// Streaming STT session bound to a single `STT_ENDPOINT`.
pub struct SttStreamClient {
    ws_url: String,
}

impl SttStreamClient {
    /// `endpoint` is the HTTP(S) base URL from configuration; the `http`
    /// scheme is swapped for `ws` (or `https` for `wss`) to reach the
    /// streaming path.
    pub fn new(endpoint: &str) -> Self {
        let ws_url = if let Some(rest) = endpoint.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = endpoint.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            endpoint.to_string()
        };
        Self { ws_url }
    }

    /// Stream `audio` frames to the backend and yield transcript deltas on
    /// `events_tx` until the audio source is exhausted or the connection
    /// closes. `on_open` fires once the handshake completes (used by the
    /// speech agent to play a short acknowledgement cue); `on_close` fires
    /// once, however the session ends.
    pub async fn transcribe_stream(
        &self,
        mut audio: mpsc::Receiver<AudioFrame>,
        events_tx: mpsc::Sender<SttEvent>,
        on_open: impl FnOnce() + Send + 'static,
        on_close: impl FnOnce() + Send + 'static,
    ) -> anyhow::Result<()> {
        info!(url = %self.ws_url, "connecting to STT endpoint");
        let (ws_stream, _resp) = tokio_tungstenite::connect_async(&self.ws_url).await?;
        on_open();
        let (mut write, mut read) = ws_stream.split();

        let send_task = tokio::spawn(async move {
            while let Some(frame) = audio.recv().await {
                let mut bytes = Vec::with_capacity(frame.samples.len() * 2);
                for s in &frame.samples {
                    bytes.extend_from_slice(&s.to_le_bytes());
                }
                if write.send(Message::Binary(bytes)).await.is_err() {
                    break;
                }
            }
            let _ = write.close().await;
        });

        let mut old_full_text = String::new();
        while let Some(msg) = read.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    let cleaned = bias::strip_bias(&text);
                    if let Ok(value) = serde_json::from_str::<serde_json::Value>(&cleaned) {
                        if let Some(full) = value.get("text").and_then(|v| v.as_str()) {
                            if full.trim().is_empty() {
                                continue;
                            }
                            let delta = if full.len() > old_full_text.len()
                                && full.starts_with(old_full_text.as_str())
                            {
                                full[old_full_text.len()..].to_string()
                            } else {
                                full.to_string()
                            };
                            old_full_text = full.to_string();
                            debug!(delta = %delta, "stt delta");
                            if events_tx.send(SttEvent::Delta(delta)).await.is_err() {
                                break;
                            }
                        }
                    } else {
                        warn!(raw = %cleaned, "non-JSON STT message ignored");
                    }
                }
                Ok(Message::Close(_)) => break,
                Err(e) => {
                    warn!(error = %e, "STT websocket error");
                    break;
                }
                _ => {}
            }
        }

        send_task.abort();
        let _ = events_tx.send(SttEvent::Closed).await;
        on_close();
        Ok(())
    }
}

/// Transcribe a single pre-recorded clip in one shot: opens a session, sends
/// all audio, and returns the final accumulated text once the backend closes
/// the connection. Used by the VAD-gated wake-word backend, where a whole
/// utterance is already buffered before transcription starts.
pub async fn transcribe_once(endpoint: &str, samples: &[i16]) -> anyhow::Result<String> {
    let client = SttStreamClient::new(endpoint);
    let (audio_tx, audio_rx) = mpsc::channel(4);
    let (events_tx, mut events_rx) = mpsc::channel(16);

    const CHUNK: usize = 1024;
    let chunks: Vec<AudioFrame> = samples
        .chunks(CHUNK)
        .map(|c| AudioFrame { samples: c.to_vec() })
        .collect();

    let feeder = tokio::spawn(async move {
        for frame in chunks {
            if audio_tx.send(frame).await.is_err() {
                break;
            }
        }
    });

    let session = tokio::spawn(async move {
        client.transcribe_stream(audio_rx, events_tx, || {}, || {}).await
    });

    let mut full = String::new();
    while let Some(event) = events_rx.recv().await {
        match event {
            SttEvent::Delta(d) => full.push_str(&d),
            SttEvent::Closed => break,
        }
    }
    feeder.abort();
    session.await.ok();
    Ok(full)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_http_scheme_to_ws() {
        let c = SttStreamClient::new("http://127.0.0.1:8765");
        assert_eq!(c.ws_url, "ws://127.0.0.1:8765");
    }

    #[test]
    fn rewrites_https_scheme_to_wss() {
        let c = SttStreamClient::new("https://stt.example.com");
        assert_eq!(c.ws_url, "wss://stt.example.com");
    }
}
