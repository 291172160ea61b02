//! Human speech agent: the façade the orchestrator actually talks to.
//!
//! Composes the audio device, wake-word detector, STT client and TTS queue
//! into the handful of calls the state machine needs: play a canned
//! greeting, listen for the next utterance, speak a response sentence by
//! sentence, and interrupt itself the moment the user starts talking again.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::Rng;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::audio::device::{pcm16_to_f32, AudioFrame};
use crate::audio::AudioDevice;
use crate::stt::{SttEvent, SttStreamClient};
use crate::tts::TtsQueue;
use crate::vad::{self, energy};
use crate::wake_word::WakeWordDetector;

/// Ported verbatim from the original agent's phrase banks so the cached
/// MP3s on disk (keyed by phrase text) keep matching across rewrites.
pub const HI_CHOICES: &[&str] = &[
    "ja, hi", "schiess los!", "was gibts?", "hi, was?", "leg los!",
    "was willst du?", "sprechen Sie", "jo bro", "Moin!", "Na?",
];

pub const BYE_CHOICES: &[&str] = &[
    "Tschüss!", "Bis bald!", "Mach's gut!", "Wir sehen uns!", "Ciao!",
    "Bis später!", "Man sieht sich!", "Alles klar, bis dann!", "Schönen Tag noch!",
    "Pass auf dich auf!", "Bis zum nächsten Mal!", "Halt die Ohren steif!",
    "Auf Wiedersehen!", "Bleib gesund!", "Gute Reise!", "Man liest sich!",
    "Machs gut, bis dann!", "Viel Spaß noch!", "Bis später, Alligator!",
];

pub const INIT_GREETINGS: &[&str] = &[
    "Hallo, ich bin bereit.", "Hi, wie kann ich helfen?", "Servus, was gibt's?",
    "Guten Tag, wie kann ich dir helfen?", "Na, was liegt an?", "Hallo zusammen!",
    "Ich höre zu.", "Bereit für deine Frage.", "Hey, was brauchst du?",
    "Sag einfach Bescheid.", "Worum geht's?", "Ich bin ganz Ohr.",
    "Womit kann ich dienen?", "Schieß los, ich höre.", "Alles bereit hier.",
    "Was kann ich für dich tun?", "Hallo, sprich einfach los.", "Bereit, wenn du es bist.",
    "Hi, leg los.", "Guten Morgen, wie kann ich helfen?", "Ich bin online.",
    "Was möchtest du wissen?", "Nur zu, ich höre dir zu.", "Frag mich einfach.",
    "Bin startklar.", "Ich bin da, was gibt's?", "Hallo, ich lausche.",
];

pub const EXPLAIN_SENTENCE: &str = "Sag das Wort Computer um zu starten.";

pub struct HumanSpeechAgent {
    device: Arc<AudioDevice>,
    tts: Arc<TtsQueue>,
    stt_endpoint: String,
    wakeword: String,
}

fn random_choice<'a>(choices: &'a [&'a str]) -> &'a str {
    let idx = rand::thread_rng().gen_range(0..choices.len());
    choices[idx]
}

impl HumanSpeechAgent {
    pub fn new(device: Arc<AudioDevice>, tts: Arc<TtsQueue>, stt_endpoint: impl Into<String>, wakeword: impl Into<String>) -> Self {
        Self { device, tts, stt_endpoint: stt_endpoint.into(), wakeword: wakeword.into() }
    }

    pub fn say_init_greeting(&self) {
        self.say(random_choice(INIT_GREETINGS));
        self.say(EXPLAIN_SENTENCE);
    }

    pub fn say_hi(&self) {
        self.say(random_choice(HI_CHOICES));
    }

    pub fn say_bye(&self) {
        self.say(random_choice(BYE_CHOICES));
    }

    pub fn say(&self, text: &str) {
        info!(text, "speaking");
        self.tts.speak(text.to_string());
    }

    /// Stop whatever is queued/playing and immediately speak `text`. Used
    /// for the first sentence of a response so the assistant starts
    /// talking without waiting on anything already in flight.
    pub fn skip_all_and_say(&self, text: &str) {
        self.tts.clear_and_stop();
        self.tts.clear_stop_signal();
        self.say(text);
    }

    pub async fn wait_until_talking_finished(&self) {
        self.tts.wait_until_done().await;
    }

    /// Block until the wake word is heard. Detector selection is the
    /// caller's responsibility (see `wake_word`); this just drives it.
    pub async fn wait_for_wake_word(&self, detector: &mut impl WakeWordDetector) -> anyhow::Result<()> {
        detector.wait_for_wake_word(&self.device).await
    }

    /// Record and transcribe one utterance after the wake word has fired.
    /// Plays a short acknowledgement (`say_hi`) once the STT connection
    /// opens, mirroring the behaviour that told the user "I'm listening."
    /// Returns the full accumulated transcript.
    pub async fn get_human_input(&self) -> anyhow::Result<String> {
        let client = SttStreamClient::new(&self.stt_endpoint);
        let (audio_tx, audio_rx) = mpsc::channel::<AudioFrame>(8);
        let (events_tx, mut events_rx) = mpsc::channel(16);

        let closed = Arc::new(AtomicBool::new(false));
        let closed_writer = Arc::clone(&closed);

        let device = Arc::clone(&self.device);
        let feeder = tokio::spawn(async move {
            loop {
                let frame = device.next_frame().await;
                if audio_tx.send(frame).await.is_err() {
                    break;
                }
            }
        });

        let session = tokio::spawn({
            let on_open_agent = self.announcer();
            async move {
                client
                    .transcribe_stream(
                        audio_rx,
                        events_tx,
                        move || on_open_agent.say_hi(),
                        move || closed_writer.store(true, Ordering::SeqCst),
                    )
                    .await
            }
        });

        let mut full_text = String::new();
        while let Some(event) = events_rx.recv().await {
            match event {
                SttEvent::Delta(delta) => full_text.push_str(&delta),
                SttEvent::Closed => break,
            }
        }

        feeder.abort();
        session.await.ok();
        Ok(full_text)
    }

    /// A lightweight handle carrying just enough to play the "I'm
    /// listening" cue from inside the STT `on_open` callback, which must be
    /// `'static` + `Send`.
    fn announcer(&self) -> Announcer {
        Announcer { tts: Arc::clone(&self.tts) }
    }

    pub fn wakeword(&self) -> &str {
        &self.wakeword
    }

    /// Watch the microphone while the assistant is talking and cut playback
    /// short the moment the user starts speaking over it (barge-in). Only
    /// meaningful in CHAT mode, where the user is expected to interrupt
    /// mid-sentence; LED/exit responses are short enough not to need it.
    pub fn start_speech_interrupt_watcher(&self) -> SpeechInterruptWatcher {
        let device = Arc::clone(&self.device);
        let tts = Arc::clone(&self.tts);
        let stop = Arc::new(AtomicBool::new(false));
        let stop_reader = Arc::clone(&stop);

        let handle = tokio::spawn(async move {
            while !stop_reader.load(Ordering::SeqCst) {
                let frame = device.next_frame().await;
                if !tts.is_playing() {
                    continue;
                }
                let as_f32 = pcm16_to_f32(&frame.samples);
                if energy::is_speech(&as_f32, vad::DEFAULT_SPEECH_THRESHOLD) {
                    info!("barge-in detected, interrupting playback");
                    tts.clear_and_stop();
                }
            }
        });

        SpeechInterruptWatcher { stop, handle }
    }
}

/// Handle returned by [`HumanSpeechAgent::start_speech_interrupt_watcher`].
/// Dropping it leaks the background task; callers should always `stop()` it.
pub struct SpeechInterruptWatcher {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl SpeechInterruptWatcher {
    pub fn stop(self) {
        self.stop.store(true, Ordering::SeqCst);
        self.handle.abort();
    }
}

struct Announcer {
    tts: Arc<TtsQueue>,
}

impl Announcer {
    fn say_hi(&self) {
        self.tts.speak(random_choice(HI_CHOICES).to_string());
    }
}
