//! Wake-word detection.
//!
//! The detector is a pluggable policy rather than a fixed model binding:
//! what backend actually decides "the user said the wake word" is
//! implementation detail behind [`WakeWordDetector`]. Three policies are
//! provided, matching the three ways the original assistant could be
//! triggered:
//!
//! - [`KeywordSpotterDetector`]: a lightweight always-on scorer function is
//!   run over every captured frame; no remote call per frame.
//! - [`SpeechRecognizerDetector`]: the microphone is streamed continuously
//!   to the STT backend and every delta is checked for the wake word as a
//!   case-insensitive substring.
//! - [`VadSttDetector`]: an energy-based VAD gates when to start/stop
//!   buffering, then the buffered clip is transcribed once and checked the
//!   same way.

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::audio::device::{pcm16_to_f32, AudioDevice, AudioFrame};
use crate::stt;
use crate::vad::{self, energy};

/// Common contract: block until the configured wake word is heard, then
/// return. Implementations own how they read from the microphone.
#[allow(async_fn_in_trait)]
pub trait WakeWordDetector {
    async fn wait_for_wake_word(&mut self, device: &AudioDevice) -> anyhow::Result<()>;
}

fn contains_wakeword(text: &str, wakeword: &str) -> bool {
    text.to_lowercase().contains(&wakeword.to_lowercase())
}

/// Scores a frame of PCM16 samples against a single always-resident model.
/// No concrete model ships with this crate; callers without one should use
/// [`SpeechRecognizerDetector`] or [`VadSttDetector`] instead, both of which
/// only need the already-required STT endpoint.
pub type ScoreFn = Box<dyn Fn(&[i16]) -> f32 + Send + Sync>;

pub struct KeywordSpotterDetector {
    score: ScoreFn,
    threshold: f32,
}

impl KeywordSpotterDetector {
    pub fn new(threshold: f32, score: ScoreFn) -> Self {
        Self { score, threshold }
    }
}

impl WakeWordDetector for KeywordSpotterDetector {
    async fn wait_for_wake_word(&mut self, device: &AudioDevice) -> anyhow::Result<()> {
        loop {
            let frame = device.next_frame().await;
            let score = (self.score)(&frame.samples);
            if score >= self.threshold {
                info!(score, "keyword spotter triggered");
                return Ok(());
            }
        }
    }
}

/// Continuously streams the microphone to the STT backend and watches every
/// delta for the configured wake word.
pub struct SpeechRecognizerDetector {
    stt_endpoint: String,
    wakeword: String,
}

impl SpeechRecognizerDetector {
    pub fn new(stt_endpoint: impl Into<String>, wakeword: impl Into<String>) -> Self {
        Self {
            stt_endpoint: stt_endpoint.into(),
            wakeword: wakeword.into(),
        }
    }
}

impl WakeWordDetector for SpeechRecognizerDetector {
    async fn wait_for_wake_word(&mut self, device: &AudioDevice) -> anyhow::Result<()> {
        let client = stt::SttStreamClient::new(&self.stt_endpoint);
        let (audio_tx, audio_rx) = mpsc::channel::<AudioFrame>(8);
        let (events_tx, mut events_rx) = mpsc::channel(16);

        let wakeword = self.wakeword.clone();
        let session = tokio::spawn(async move {
            client.transcribe_stream(audio_rx, events_tx, || {}, || {}).await
        });

        let result = loop {
            tokio::select! {
                frame = device.next_frame() => {
                    if audio_tx.send(frame).await.is_err() {
                        break Ok(());
                    }
                }
                event = events_rx.recv() => {
                    match event {
                        Some(stt::SttEvent::Delta(text)) => {
                            debug!(text = %text, "speech-recognizer wake-word delta");
                            if contains_wakeword(&text, &wakeword) {
                                break Ok(());
                            }
                        }
                        Some(stt::SttEvent::Closed) | None => break Ok(()),
                    }
                }
            }
        };

        drop(audio_tx);
        session.abort();
        result
    }
}

/// Energy-gated VAD followed by a single one-shot transcription of the
/// buffered utterance.
pub struct VadSttDetector {
    stt_endpoint: String,
    wakeword: String,
    threshold: f32,
}

impl VadSttDetector {
    pub fn new(stt_endpoint: impl Into<String>, wakeword: impl Into<String>) -> Self {
        Self {
            stt_endpoint: stt_endpoint.into(),
            wakeword: wakeword.into(),
            threshold: vad::DEFAULT_SPEECH_THRESHOLD,
        }
    }
}

/// Runtime-selected detector, chosen by `WAKEWORD_PROVIDER` at startup. Lets
/// `main` pick a backend from configuration without making the whole
/// orchestrator generic over every detector implementation at once.
pub enum AnyDetector {
    KeywordSpotter(KeywordSpotterDetector),
    SpeechRecognizer(SpeechRecognizerDetector),
    VadStt(VadSttDetector),
}

impl WakeWordDetector for AnyDetector {
    async fn wait_for_wake_word(&mut self, device: &AudioDevice) -> anyhow::Result<()> {
        match self {
            AnyDetector::KeywordSpotter(d) => d.wait_for_wake_word(device).await,
            AnyDetector::SpeechRecognizer(d) => d.wait_for_wake_word(device).await,
            AnyDetector::VadStt(d) => d.wait_for_wake_word(device).await,
        }
    }
}

impl WakeWordDetector for VadSttDetector {
    async fn wait_for_wake_word(&mut self, device: &AudioDevice) -> anyhow::Result<()> {
        loop {
            // Wait for speech to start.
            let mut buf: Vec<i16> = Vec::new();
            loop {
                let frame = device.next_frame().await;
                let as_f32 = pcm16_to_f32(&frame.samples);
                if energy::is_speech(&as_f32, self.threshold) {
                    buf.extend_from_slice(&frame.samples);
                    break;
                }
            }
            // Buffer until speech ends (energy drops below threshold for a
            // full frame) or a hard cap is hit.
            const MAX_FRAMES: usize = 200; // ~12.8s at 64ms/frame
            for _ in 0..MAX_FRAMES {
                let frame = device.next_frame().await;
                let as_f32 = pcm16_to_f32(&frame.samples);
                let speaking = energy::is_speech(&as_f32, self.threshold);
                buf.extend_from_slice(&frame.samples);
                if !speaking {
                    break;
                }
            }
            let text = stt::transcribe_once(&self.stt_endpoint, &buf).await?;
            debug!(text = %text, "vad+stt wake-word candidate");
            if contains_wakeword(&text, &self.wakeword) {
                return Ok(());
            }
        }
    }
}
