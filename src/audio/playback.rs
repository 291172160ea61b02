//! Audio playback via rodio.
//!
//! Plays f32 PCM audio through the default (or named) output device with
//! volume control and interruptible playback. A small worker task owns a
//! FIFO queue of clips so callers can enqueue sentence-sized chunks without
//! blocking on the previous one finishing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait};
use rodio::{OutputStream, OutputStreamHandle, Sink};
use tokio::sync::{mpsc, Notify};
use tracing::info;

/// A single clip queued for playback.
pub struct Clip {
    pub sample_rate: u32,
    pub samples: Vec<f32>,
}

/// Audio player that plays f32 PCM samples through an output device.
pub struct AudioPlayer {
    _stream: OutputStream,
    _stream_handle: OutputStreamHandle,
    sink: Arc<Sink>,
    playing: Arc<AtomicBool>,
    queue_tx: mpsc::UnboundedSender<Clip>,
    idle: Arc<Notify>,
}

impl AudioPlayer {
    /// Open an audio output device. If `device_name` is provided, try to find
    /// that specific device; otherwise fall back to the system default.
    pub fn new(device_name: Option<&str>) -> anyhow::Result<Self> {
        let (stream, stream_handle) = if let Some(name) = device_name {
            let host = cpal::default_host();
            let device = host
                .output_devices()
                .map_err(|e| anyhow::anyhow!("Failed to enumerate output devices: {e}"))?
                .find(|d| d.name().map(|n| n == name).unwrap_or(false));

            match device {
                Some(dev) => {
                    let dev_name = dev.name().unwrap_or_else(|_| "unknown".into());
                    info!(device = %dev_name, "Selected output device");
                    OutputStream::try_from_device(&dev)
                        .map_err(|e| anyhow::anyhow!("Failed to open output device '{}': {}", name, e))?
                }
                None => {
                    info!(requested = %name, "Output device not found, falling back to default");
                    OutputStream::try_default()
                        .map_err(|e| anyhow::anyhow!("Failed to open default audio output: {}", e))?
                }
            }
        } else {
            OutputStream::try_default()
                .map_err(|e| anyhow::anyhow!("Failed to open audio output: {}", e))?
        };

        let sink = Arc::new(
            Sink::try_new(&stream_handle)
                .map_err(|e| anyhow::anyhow!("Failed to create audio sink: {}", e))?,
        );
        let playing = Arc::new(AtomicBool::new(false));
        let idle = Arc::new(Notify::new());

        let (queue_tx, mut queue_rx) = mpsc::unbounded_channel::<Clip>();
        let worker_sink = Arc::clone(&sink);
        let worker_playing = Arc::clone(&playing);
        let worker_idle = Arc::clone(&idle);
        tokio::spawn(async move {
            while let Some(clip) = queue_rx.recv().await {
                worker_playing.store(true, Ordering::SeqCst);
                let source = rodio::buffer::SamplesBuffer::new(1, clip.sample_rate, clip.samples);
                worker_sink.append(source);
                // Short silence pad so back-to-back sentences don't click.
                let pad = rodio::buffer::SamplesBuffer::new(
                    1,
                    clip.sample_rate,
                    vec![0.0f32; (clip.sample_rate / 50) as usize],
                );
                worker_sink.append(pad);
                let sink = Arc::clone(&worker_sink);
                tokio::task::spawn_blocking(move || sink.sleep_until_end()).await.ok();
                worker_playing.store(false, Ordering::SeqCst);
                worker_idle.notify_waiters();
            }
        });

        Ok(Self {
            _stream: stream,
            _stream_handle: stream_handle,
            sink,
            playing,
            queue_tx,
            idle,
        })
    }

    /// Enqueue a clip for playback. Returns immediately.
    pub fn enqueue(&self, sample_rate: u32, samples: Vec<f32>) {
        let _ = self.queue_tx.send(Clip { sample_rate, samples });
    }

    /// Set playback volume (0.0 = silent, 1.0 = full volume).
    pub fn set_volume(&self, volume: f32) {
        self.sink.set_volume(volume.clamp(0.0, 1.0));
    }

    /// Get a clonable handle to the underlying sink (for external stop).
    pub fn sink_handle(&self) -> Arc<Sink> {
        Arc::clone(&self.sink)
    }

    /// Stop current playback immediately and drop anything queued.
    pub fn stop(&self) {
        self.sink.stop();
        self.playing.store(false, Ordering::SeqCst);
    }

    /// Check if audio is currently playing.
    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst) || !self.sink.empty()
    }

    /// Resolve once playback is fully drained.
    pub async fn wait_until_finished(&self) {
        while self.is_playing() {
            self.idle.notified().await;
        }
    }
}

// SAFETY: OutputStream is marked !Send/!Sync due to a PhantomData<*mut ()> in
// cpal's platform abstraction. We only construct and drive it from the task
// that owns the AudioPlayer, so moving the struct across an await point, or
// sharing a reference to it across one, is safe.
unsafe impl Send for AudioPlayer {}
unsafe impl Sync for AudioPlayer {}
