//! Hands-free German-language voice assistant core.
//!
//! A single always-running process: listen for the wake word, stream the
//! following utterance to a remote speech-to-text backend, classify intent,
//! dispatch to a chat/LED handler, and speak the response back through a
//! remote text-to-speech backend. Every heavy model lives behind a network
//! call; this binary owns only the pipeline that connects them.

mod audio;
mod config;
mod intents;
mod llm;
mod orchestrator;
mod speech_agent;
mod stt;
mod tts;
mod util;
mod vad;
mod wake_word;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use audio::AudioDevice;
use config::paths::get_data_dir;
use config::Config;
use intents::HttpLedClient;
use llm::OllamaClient;
use orchestrator::Orchestrator;
use speech_agent::{HumanSpeechAgent, BYE_CHOICES, EXPLAIN_SENTENCE, HI_CHOICES, INIT_GREETINGS};
use wake_word::{AnyDetector, KeywordSpotterDetector, SpeechRecognizerDetector, VadSttDetector};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let data_dir = get_data_dir();
    let use_file = std::fs::create_dir_all(&data_dir).is_ok();

    let _guard: Option<tracing_appender::non_blocking::WorkerGuard>;
    if use_file {
        let file_appender = tracing_appender::rolling::never(&data_dir, "vocal-core.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        _guard = Some(guard);
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(non_blocking)
            .with_ansi(false)
            .init();
    } else {
        _guard = None;
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    }

    let cfg = Config::from_env();
    info!(wakeword = %cfg.wakeword, wakeword_provider = %cfg.wakeword_provider, "starting");

    let device = Arc::new(AudioDevice::open(
        cfg.audio_microphone_device.as_deref(),
        cfg.audio_playback_device.as_deref(),
    )?);

    let cache_dir = config::paths::get_tts_cache_dir();
    let tts = Arc::new(tts::TtsQueue::new(
        Arc::clone(&device),
        cfg.tts_endpoint.clone(),
        cfg.tts_voice.clone(),
        cache_dir,
    ));

    info!("warming tts phrase cache");
    let warm_phrases: Vec<&str> = HI_CHOICES
        .iter()
        .chain(BYE_CHOICES.iter())
        .chain(INIT_GREETINGS.iter())
        .chain(std::iter::once(&EXPLAIN_SENTENCE))
        .copied()
        .collect();
    tts.cache().warm(&tts.synth(), &warm_phrases).await?;

    let speech = HumanSpeechAgent::new(Arc::clone(&device), Arc::clone(&tts), cfg.stt_endpoint.clone(), cfg.wakeword.clone());

    let detector = match cfg.wakeword_provider.as_str() {
        "keyword-spotter" => {
            tracing::warn!(
                "WAKEWORD_PROVIDER=keyword-spotter has no bundled model; falling back to a scorer \
                 that never fires. Supply a real ScoreFn and rebuild, or use speech-recognizer/vad-stt."
            );
            let threshold = config::wakeword_threshold_fraction(&cfg);
            AnyDetector::KeywordSpotter(KeywordSpotterDetector::new(threshold, Box::new(|_frame| 0.0)))
        }
        "vad-stt" => AnyDetector::VadStt(VadSttDetector::new(cfg.stt_endpoint.clone(), cfg.wakeword.clone())),
        _ => AnyDetector::SpeechRecognizer(SpeechRecognizerDetector::new(cfg.stt_endpoint.clone(), cfg.wakeword.clone())),
    };

    let llm = OllamaClient::new(cfg.llm_endpoint.clone(), cfg.llm_provider_model.clone());
    let led = HttpLedClient::new(cfg.led_endpoint.clone().unwrap_or_else(|| "http://127.0.0.1:38899/state".to_string()));

    let orchestrator = Orchestrator::new(speech, detector, llm, led, cfg.retry_budget);
    orchestrator.run().await
}
