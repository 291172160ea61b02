//! Process-wide audio device singleton.
//!
//! `AudioDevice` is the only thing in the process that touches `cpal`
//! directly for input, and the only thing that touches [`playback::AudioPlayer`]
//! for output. Capture and playback are independent: the microphone is
//! always running (feeding wake-word/STT consumers) while playback happens
//! on its own FIFO queue, so barge-in (stopping playback while capture
//! keeps running) is just calling `stop_playback`.

use cpal::Stream;
use tokio::sync::Mutex;
use tracing::info;

use super::capture;
use super::playback::AudioPlayer;
use super::ring_buffer::{audio_ring_buffer, AudioConsumer};

/// Pairs the ring-buffer consumer with the leftover tail from the last call
/// to [`next_frame`](AudioDevice::next_frame) that didn't divide evenly
/// into whole frames, so that audio isn't dropped when the consumer polls
/// less often than the producer fills a frame.
struct FrameAssembler {
    consumer: AudioConsumer,
    pending: Vec<f32>,
}

impl FrameAssembler {
    fn new(consumer: AudioConsumer) -> Self {
        Self { consumer, pending: Vec::with_capacity(FRAME_SAMPLES) }
    }

    fn try_take_frame(&mut self) -> Option<Vec<f32>> {
        if self.pending.len() < FRAME_SAMPLES && self.consumer.has_frame() {
            self.pending.extend(self.consumer.drain_all());
        }
        if self.pending.len() >= FRAME_SAMPLES {
            Some(self.pending.drain(..FRAME_SAMPLES).collect())
        } else {
            None
        }
    }
}

/// A fixed-size chunk of 16 kHz mono PCM16 audio, the unit wake-word and STT
/// consumers operate on.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    pub samples: Vec<i16>,
}

pub const FRAME_SAMPLES: usize = 1024;
pub const SAMPLE_RATE: u32 = 16_000;

pub struct AudioDevice {
    // Held only to keep the cpal stream alive; never read directly.
    _capture_stream: Stream,
    assembler: Mutex<FrameAssembler>,
    player: AudioPlayer,
}

// cpal::Stream is !Send on some platforms; AudioDevice is only ever driven
// from the task that constructs it in `main`, matching the constraint the
// teacher's AudioPlayer documents for the same reason.
unsafe impl Send for AudioDevice {}
unsafe impl Sync for AudioDevice {}

impl AudioDevice {
    pub fn open(mic_device: Option<&str>, playback_device: Option<&str>) -> anyhow::Result<Self> {
        let (producer, consumer) = audio_ring_buffer(None);
        let capture_stream = capture::start_capture(producer, mic_device)
            .map_err(|e| anyhow::anyhow!(e))?;
        let player = AudioPlayer::new(playback_device)?;
        info!("audio device ready");
        Ok(Self {
            _capture_stream: capture_stream,
            assembler: Mutex::new(FrameAssembler::new(consumer)),
            player,
        })
    }

    /// Read the next frame of captured audio, polling until `FRAME_SAMPLES`
    /// worth of i16 samples are available. Converts from the f32 ring buffer
    /// representation at the boundary so every downstream consumer works in
    /// PCM16, matching the wire format STT expects. Any samples drained past
    /// a whole frame are kept for the next call instead of being discarded.
    pub async fn next_frame(&self) -> AudioFrame {
        let samples = loop {
            {
                let mut assembler = self.assembler.lock().await;
                if let Some(samples) = assembler.try_take_frame() {
                    break samples;
                }
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        };
        let frame: Vec<i16> = samples
            .into_iter()
            .map(|s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
            .collect();
        AudioFrame { samples: frame }
    }

    /// Enqueue a clip of f32 PCM audio for playback. Returns immediately;
    /// clips play back-to-back in submission order.
    pub fn play(&self, sample_rate: u32, samples: Vec<f32>) {
        self.player.enqueue(sample_rate, samples);
    }

    /// Stop playback immediately (used for barge-in). Capture is unaffected.
    pub fn stop_playback(&self) {
        self.player.stop();
    }

    pub fn is_playing(&self) -> bool {
        self.player.is_playing()
    }

    pub async fn wait_until_playback_finished(&self) {
        self.player.wait_until_finished().await;
    }

    pub fn set_volume(&self, volume: f32) {
        self.player.set_volume(volume);
    }
}

pub fn pcm16_to_f32(samples: &[i16]) -> Vec<f32> {
    samples.iter().map(|&s| s as f32 / i16::MAX as f32).collect()
}
