//! Network text-to-speech synthesis client.
//!
//! Speaks to an OpenAI-speech-compatible REST endpoint (`TTS_ENDPOINT`):
//! `POST {endpoint}/audio/speech` with `{"input": text, "voice": ...}`,
//! returning MP3 bytes that are decoded to f32 PCM via `symphonia`. This
//! mirrors the only concrete backend in scope per the synthesis contract —
//! the vendor-specific local engines (Kokoro, ElevenLabs, …) are not
//! reimplemented, only the shape of a plain HTTP TTS call.

use std::io::Cursor;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, info};

pub struct TtsSynth {
    endpoint: String,
    voice: String,
    client: reqwest::Client,
}

impl TtsSynth {
    pub fn new(endpoint: impl Into<String>, voice: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            voice: voice.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Render `text` to MP3 bytes without playing it. Used both for direct
    /// playback and to populate the warm phrase cache.
    pub async fn render(&self, text: &str) -> anyhow::Result<Vec<u8>> {
        let url = format!("{}/audio/speech", self.endpoint.trim_end_matches('/'));
        debug!(url = %url, voice = %self.voice, "tts render request");
        let body = serde_json::json!({
            "input": text,
            "voice": self.voice,
            "response_format": "mp3",
        });
        let resp = self.client.post(&url).json(&body).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("TTS endpoint error {}: {}", status, text);
        }
        let bytes = resp.bytes().await?.to_vec();
        Ok(bytes)
    }

    /// Render and decode to 1-channel f32 PCM, returning `(sample_rate, samples)`.
    pub async fn speak(&self, text: &str) -> anyhow::Result<(u32, Vec<f32>)> {
        let mp3 = self.render(text).await?;
        let decoded = decode_mp3(&mp3)?;
        info!(samples = decoded.1.len(), sample_rate = decoded.0, "tts synthesis complete");
        Ok(decoded)
    }
}

/// Decode an in-memory MP3 buffer to mono f32 PCM.
pub fn decode_mp3(mp3: &[u8]) -> anyhow::Result<(u32, Vec<f32>)> {
    let cursor = Cursor::new(mp3.to_vec());
    let mss = MediaSourceStream::new(Box::new(cursor), Default::default());
    let mut hint = Hint::new();
    hint.with_extension("mp3");

    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;

    let mut format = probed.format;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .ok_or_else(|| anyhow::anyhow!("no decodable audio track in TTS response"))?;
    let track_id = track.id;
    let sample_rate = track.codec_params.sample_rate.unwrap_or(24_000);
    let channels = track
        .codec_params
        .channels
        .map(|c| c.count())
        .unwrap_or(1);

    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut samples = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(symphonia::core::errors::Error::IoError(_)) => break,
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }
        let decoded = decoder.decode(&packet)?;
        let spec = *decoded.spec();
        let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buf.copy_interleaved_ref(decoded);
        if channels > 1 {
            samples.extend(buf.samples().chunks_exact(channels).map(|f| {
                f.iter().sum::<f32>() / channels as f32
            }));
        } else {
            samples.extend_from_slice(buf.samples());
        }
    }

    Ok((sample_rate, samples))
}
