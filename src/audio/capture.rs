//! Audio capture via cpal.
//!
//! Opens the default (or named) input device, captures audio at its native
//! sample rate, resamples to [`SAMPLE_RATE`](super::device::SAMPLE_RATE)
//! mono f32 with a resampler that carries its fractional position across
//! cpal callbacks (a device buffering at e.g. 480-sample ALSA periods would
//! otherwise get a phase glitch at every callback boundary), and writes
//! [`FRAME_SAMPLES`](super::device::FRAME_SAMPLES)-sized chunks into the
//! ring buffer [`AudioDevice::next_frame`](super::device::AudioDevice::next_frame)
//! polls.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Stream, StreamConfig};
use tracing::{error, info, warn};

use super::device::{FRAME_SAMPLES, SAMPLE_RATE};
use super::ring_buffer::AudioProducer;

const TARGET_SAMPLE_RATE: u32 = SAMPLE_RATE;

/// List available input device names.
pub fn list_devices() -> Vec<String> {
    let host = cpal::default_host();
    let mut names = Vec::new();
    if let Ok(devices) = host.input_devices() {
        for dev in devices {
            if let Ok(name) = dev.name() {
                names.push(name);
            }
        }
    }
    names
}

/// List available output device names.
pub fn list_output_devices() -> Vec<String> {
    let host = cpal::default_host();
    let mut names = Vec::new();
    if let Ok(devices) = host.output_devices() {
        for dev in devices {
            if let Ok(name) = dev.name() {
                names.push(name);
            }
        }
    }
    names
}

/// Resolved info about the audio input we will use.
struct CaptureConfig {
    device: cpal::Device,
    stream_config: StreamConfig,
    native_rate: u32,
}

/// Find and configure the input device.
fn resolve_device(device_name: Option<&str>) -> Result<CaptureConfig, String> {
    let host = cpal::default_host();

    // "default" (case-insensitive) is treated the same as unset.
    let wanted = device_name.filter(|n| !n.eq_ignore_ascii_case("default"));

    let device = if let Some(name) = wanted {
        let found = host
            .input_devices()
            .map_err(|e| format!("Failed to enumerate input devices: {e}"))?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false));
        match found {
            Some(d) => d,
            None => {
                warn!(requested = %name, available = ?list_devices(), "microphone device not found, falling back to default");
                host.default_input_device()
                    .ok_or_else(|| "No default input device available".to_string())?
            }
        }
    } else {
        host.default_input_device()
            .ok_or_else(|| "No default input device available".to_string())?
    };

    let dev_name = device.name().unwrap_or_else(|_| "unknown".into());
    info!(device = %dev_name, "Selected input device");

    // Prefer 16 kHz if supported, otherwise use default config and resample.
    let default_config = device
        .default_input_config()
        .map_err(|e| format!("Failed to get default input config: {e}"))?;

    let native_rate = default_config.sample_rate().0;
    let channels = default_config.channels();

    // We always request f32 format. Use 1 channel if possible.
    let stream_config = StreamConfig {
        channels,
        sample_rate: cpal::SampleRate(native_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    info!(
        native_rate,
        channels,
        "Input device config (will resample to {}Hz mono if needed)",
        TARGET_SAMPLE_RATE,
    );

    Ok(CaptureConfig {
        device,
        stream_config,
        native_rate,
    })
}

/// Linear resampler that carries its fractional read position and unused
/// input tail across calls, so feeding it a stream of cpal callback buffers
/// one at a time produces the same output as resampling the whole stream at
/// once — unlike resampling each callback's buffer independently, which
/// introduces a phase discontinuity every time the input chunk boundary
/// doesn't land on an exact output sample.
struct StreamResampler {
    ratio: f64,
    pos: f64,
    pending: Vec<f32>,
}

impl StreamResampler {
    fn new(from_rate: u32, to_rate: u32) -> Self {
        Self { ratio: from_rate as f64 / to_rate as f64, pos: 0.0, pending: Vec::new() }
    }

    /// Feed the next batch of mono input samples, returning however many
    /// resampled output samples that batch made available.
    fn push(&mut self, input: &[f32]) -> Vec<f32> {
        self.pending.extend_from_slice(input);
        let mut output = Vec::new();
        while (self.pos.floor() as usize) + 1 < self.pending.len() {
            let idx0 = self.pos.floor() as usize;
            let frac = (self.pos - idx0 as f64) as f32;
            let s0 = self.pending[idx0];
            let s1 = self.pending[idx0 + 1];
            output.push(s0 + frac * (s1 - s0));
            self.pos += self.ratio;
        }
        let consumed = self.pos.floor() as usize;
        if consumed > 0 {
            self.pending.drain(..consumed.min(self.pending.len()));
            self.pos -= consumed as f64;
        }
        output
    }
}

/// Down-mix multi-channel audio to mono by averaging channels.
fn to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let ch = channels as usize;
    samples
        .chunks_exact(ch)
        .map(|frame| frame.iter().sum::<f32>() / ch as f32)
        .collect()
}

/// Start audio capture. Returns the cpal `Stream` (must be kept alive).
///
/// Audio is downmixed, resampled to `SAMPLE_RATE` mono, and pushed into the
/// ring buffer in exact `FRAME_SAMPLES` chunks. `device_name` of `None`
/// uses the system default input.
pub fn start_capture(
    mut producer: AudioProducer,
    device_name: Option<&str>,
) -> Result<Stream, String> {
    let cfg = resolve_device(device_name)?;
    let native_rate = cfg.native_rate;
    let channels = cfg.stream_config.channels;
    let needs_downmix = channels > 1;

    let mut resampler = StreamResampler::new(native_rate, TARGET_SAMPLE_RATE);
    // Leftover resampled samples that didn't fill a whole frame yet.
    let mut frame_buf: Vec<f32> = Vec::with_capacity(FRAME_SAMPLES * 2);

    let stream = cfg
        .device
        .build_input_stream(
            &cfg.stream_config,
            move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                let mono = if needs_downmix {
                    to_mono(data, channels)
                } else {
                    data.to_vec()
                };

                let resampled = resampler.push(&mono);
                frame_buf.extend_from_slice(&resampled);

                while frame_buf.len() >= FRAME_SAMPLES {
                    let frame: Vec<f32> = frame_buf.drain(..FRAME_SAMPLES).collect();
                    let written = producer.push_frame(&frame);
                    if written < FRAME_SAMPLES {
                        warn!(written, wanted = FRAME_SAMPLES, "ring buffer full, dropping captured audio");
                    }
                }
            },
            move |err| {
                error!("Audio input stream error: {}", err);
            },
            None, // no timeout
        )
        .map_err(|e| format!("Failed to build input stream: {e}"))?;

    stream.play().map_err(|e| format!("Failed to start input stream: {e}"))?;

    info!("Audio capture started");

    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_resampler_passes_through_when_rates_match() {
        let mut r = StreamResampler::new(16_000, 16_000);
        let input = vec![0.1, 0.2, 0.3, 0.4, 0.5];
        let out = r.push(&input);
        assert_eq!(out.len(), input.len() - 1); // last sample held back pending idx0+1
    }

    #[test]
    fn stream_resampler_is_continuous_across_pushes() {
        let input: Vec<f32> = (0..480).map(|i| (i as f32 / 480.0).sin()).collect();
        let mut whole = StreamResampler::new(48_000, 16_000);
        let one_shot = whole.push(&input);

        let mut split = StreamResampler::new(48_000, 16_000);
        let mut incremental = split.push(&input[..240]);
        incremental.extend(split.push(&input[240..]));

        assert_eq!(one_shot, incremental);
    }
}
