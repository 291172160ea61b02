//! Configuration reading and data directory paths.
//!
//! The agent has no settings panel writing a JSON file to disk; every knob
//! is an environment variable read once at startup. Defaults keep the
//! process runnable against a local Ollama + a matching STT/TTS endpoint
//! pair without any configuration at all.

pub mod paths;

use std::env;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Fully resolved runtime configuration, read once in `main` and shared by
/// reference through the rest of the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub audio_microphone_device: Option<String>,
    pub audio_playback_device: Option<String>,

    pub wakeword: String,
    pub wakeword_threshold: u32,
    pub wakeword_provider: String,

    pub stt_provider: String,
    pub stt_endpoint: String,

    pub tts_provider: String,
    pub tts_endpoint: String,
    pub tts_voice: String,

    pub llm_provider: String,
    pub llm_endpoint: String,
    pub llm_provider_model: String,

    pub led_endpoint: Option<String>,

    pub picovoice_access_key: Option<String>,

    /// Number of consecutive "we didn't understand you" retries before the
    /// orchestrator falls back to `exit_mode`. See `orchestrator`.
    pub retry_budget: u32,
}

impl Config {
    /// Read configuration from the process environment, falling back to
    /// defaults documented in the module doc comment for anything unset.
    pub fn from_env() -> Self {
        let cfg = Self {
            audio_microphone_device: env_opt("AUDIO_MICROPHONE_DEVICE"),
            audio_playback_device: env_opt("AUDIO_PLAYBACK_DEVICE"),

            wakeword: env_or("WAKEWORD", "computer"),
            wakeword_threshold: env_or("WAKEWORD_THRESHOLD", "250")
                .parse()
                .unwrap_or(250),
            wakeword_provider: env_or("WAKEWORD_PROVIDER", "speech-recognizer"),

            stt_provider: env_or("STT_PROVIDER", "whisper-remote"),
            stt_endpoint: env_or("STT_ENDPOINT", "http://127.0.0.1:8765"),

            tts_provider: env_or("TTS_PROVIDER", "openedai"),
            tts_endpoint: env_or("TTS_ENDPOINT", "http://127.0.0.1:8000/v1"),
            tts_voice: env_or("TTS_VOICE", "alloy"),

            llm_provider: env_or("LLM_PROVIDER", "ollama"),
            llm_endpoint: env_or("LLM_ENDPOINT", "http://127.0.0.1:11434"),
            llm_provider_model: env_or("LLM_PROVIDER_MODEL", "llama3.1"),

            led_endpoint: env_opt("LED_ENDPOINT"),

            picovoice_access_key: env_opt("PICOVOICE_ACCESS_KEY"),

            retry_budget: env_or("RETRY_BUDGET", "3").parse().unwrap_or(3),
        };
        debug!(?cfg, "resolved configuration");
        cfg
    }
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_string())
}

/// Wake-word threshold mapped onto the detector's native `[0.0, 1.0]` score
/// range. `WAKEWORD_THRESHOLD` is expressed on a friendlier `0..=500` scale.
pub fn wakeword_threshold_fraction(cfg: &Config) -> f32 {
    (cfg.wakeword_threshold as f32 / 500.0).clamp(0.0, 1.0)
}
