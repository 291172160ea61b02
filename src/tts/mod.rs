//! Sentence-granular text-to-speech queue.
//!
//! Sentences are pushed onto a FIFO; a single worker task renders (or pulls
//! from the warm cache) and plays them back one at a time through
//! [`crate::audio::AudioDevice`]. A shared stop flag lets a caller (the
//! speech-interrupt watcher, see `speech_agent`) cut off the remainder of
//! the queue the moment the user starts talking over the assistant.

pub mod cache;
pub mod synth;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::audio::AudioDevice;
use cache::TtsCache;
use synth::{decode_mp3, TtsSynth};

pub struct TtsQueue {
    device: Arc<AudioDevice>,
    synth: Arc<TtsSynth>,
    cache: Arc<TtsCache>,
    stop_signal: Arc<AtomicBool>,
    tx: mpsc::UnboundedSender<String>,
}

impl TtsQueue {
    pub fn new(device: Arc<AudioDevice>, endpoint: impl Into<String>, voice: impl Into<String>, cache_dir: impl Into<std::path::PathBuf>) -> Self {
        let synth = Arc::new(TtsSynth::new(endpoint, voice));
        let cache = Arc::new(TtsCache::new(cache_dir));
        let stop_signal = Arc::new(AtomicBool::new(false));
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();

        let worker_device = Arc::clone(&device);
        let worker_synth = Arc::clone(&synth);
        let worker_cache = Arc::clone(&cache);
        let worker_stop = Arc::clone(&stop_signal);
        tokio::spawn(async move {
            while let Some(sentence) = rx.recv().await {
                if worker_stop.load(Ordering::SeqCst) {
                    debug!(sentence, "skipping queued sentence, stop signal set");
                    continue;
                }
                match synthesize(&worker_synth, &worker_cache, &sentence).await {
                    Ok((sample_rate, samples)) => {
                        if worker_stop.load(Ordering::SeqCst) {
                            continue;
                        }
                        worker_device.play(sample_rate, samples);
                        worker_device.wait_until_playback_finished().await;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, sentence, "tts synthesis failed");
                    }
                }
            }
        });

        Self { device, synth, cache, stop_signal, tx }
    }

    /// Queue a sentence for playback. Non-blocking.
    pub fn speak(&self, sentence: impl Into<String>) {
        let _ = self.tx.send(sentence.into());
    }

    /// Stop whatever is playing right now and drop everything still queued.
    pub fn clear_and_stop(&self) {
        self.stop_signal.store(true, Ordering::SeqCst);
        self.device.stop_playback();
    }

    /// Re-arm the queue after `clear_and_stop` so future `speak` calls play.
    pub fn clear_stop_signal(&self) {
        self.stop_signal.store(false, Ordering::SeqCst);
    }

    pub fn stop_signal(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop_signal)
    }

    pub async fn wait_until_done(&self) {
        self.device.wait_until_playback_finished().await;
    }

    pub fn is_playing(&self) -> bool {
        self.device.is_playing()
    }

    /// Render `text` to MP3 bytes without enqueueing playback (used to
    /// return audio bytes over a future audio-out contract, and for cache
    /// warm-up).
    pub async fn render(&self, text: &str) -> anyhow::Result<Vec<u8>> {
        self.synth.render(text).await
    }

    pub fn cache(&self) -> Arc<TtsCache> {
        Arc::clone(&self.cache)
    }

    pub fn synth(&self) -> Arc<TtsSynth> {
        Arc::clone(&self.synth)
    }
}

async fn synthesize(synth: &TtsSynth, cache: &TtsCache, sentence: &str) -> anyhow::Result<(u32, Vec<f32>)> {
    if let Some(mp3) = cache.get(sentence).await {
        info!(sentence, "tts cache hit");
        return decode_mp3(&mp3);
    }
    synth.speak(sentence).await
}
