//! The conversation state machine.
//!
//! Every turn starts by re-running intent classification (the
//! MODUS_SELECTION prompt) against the freshly transcribed utterance, then
//! routes to a mode-specific handler. This is a native reimplementation of
//! an action-graph state machine: an explicit enum of states, a
//! per-state async function, and guarded transitions — no external
//! workflow engine.

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::intents::{self, LedClient};
use crate::llm::prompt_manager::{mode_from_str, Mode, PromptManager};
use crate::llm::LlmClient;
use crate::speech_agent::{HumanSpeechAgent, SpeechInterruptWatcher};
use crate::util;
use crate::wake_word::WakeWordDetector;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    EntryPoint,
    WaitForUserInput,
    ChooseMode,
    WeDidNotUnderstand,
    HumanInput,
    AiResponse,
    AiResponseFinished,
    /// CHAT-mode continuation: get the next utterance without re-running
    /// MODUS_SELECTION, since the mode was already pinned by a prior turn.
    ContinueChatInput,
    ExitMode,
}

pub struct Orchestrator<D: WakeWordDetector, L: LlmClient, C: LedClient> {
    speech: HumanSpeechAgent,
    detector: D,
    llm: L,
    led: C,
    prompt_manager: PromptManager,
    retry_budget: u32,
    input_loop_counter: u32,
    transcription: String,
    state: State,
    interrupt_watcher: Option<SpeechInterruptWatcher>,
    /// Whether the last mode-specific action (currently only LEDCONTROL)
    /// actually succeeded. Drives the `AiResponseFinished` branch.
    input_ok: bool,
}

impl<D: WakeWordDetector, L: LlmClient, C: LedClient> Orchestrator<D, L, C> {
    pub fn new(speech: HumanSpeechAgent, detector: D, llm: L, led: C, retry_budget: u32) -> Self {
        Self {
            speech,
            detector,
            llm,
            led,
            prompt_manager: PromptManager::new(Mode::ModusSelection),
            retry_budget,
            input_loop_counter: 0,
            transcription: String::new(),
            state: State::EntryPoint,
            interrupt_watcher: None,
            input_ok: true,
        }
    }

    /// Drive the state machine forever (until the process is killed).
    pub async fn run(mut self) -> anyhow::Result<()> {
        loop {
            self.state = self.step().await?;
        }
    }

    async fn step(&mut self) -> anyhow::Result<State> {
        match self.state {
            State::EntryPoint => {
                self.prompt_manager = PromptManager::new(Mode::ModusSelection);
                self.input_loop_counter = 0;
                info!("listening for wake word");
                self.speech.wait_for_wake_word(&mut self.detector).await?;
                self.speech.say_init_greeting();
                self.speech.wait_until_talking_finished().await;
                Ok(State::WaitForUserInput)
            }

            State::WaitForUserInput => {
                let text = self.speech.get_human_input().await?;
                info!(text = %text, "user utterance");
                self.transcription = text;
                Ok(State::ChooseMode)
            }

            State::ContinueChatInput => {
                let text = self.speech.get_human_input().await?;
                info!(text = %text, "user utterance (chat continuation)");
                self.transcription = text;
                Ok(State::HumanInput)
            }

            State::ChooseMode => {
                if !util::is_sane_input_german(&self.transcription) {
                    return Ok(State::WeDidNotUnderstand);
                }

                let template = crate::llm::prompt_manager::base_template(Mode::ModusSelection);
                let (tx, mut rx) = mpsc::channel(64);
                let history = vec![crate::llm::prompt_manager::ChatEntry {
                    role: crate::llm::prompt_manager::Role::User,
                    content: self.transcription.clone(),
                }];
                self.llm.chat_stream(&template.system_prompt, &history, tx).await;
                let mut classification = String::new();
                while let Some(chunk) = rx.recv().await {
                    match chunk {
                        Ok(piece) => classification.push_str(&piece),
                        Err(e) => warn!(error = %e, "mode classification request failed"),
                    }
                }

                match mode_from_str(&classification) {
                    None | Some(Mode::GarbageInput) => Ok(State::WeDidNotUnderstand),
                    Some(Mode::Exit) => {
                        self.prompt_manager.set_mode(Mode::Exit);
                        Ok(State::ExitMode)
                    }
                    Some(mode) => {
                        if mode != self.prompt_manager.mode() {
                            self.prompt_manager.set_mode(mode);
                            self.prompt_manager.empty_history();
                        }
                        self.input_loop_counter = 0;
                        Ok(State::HumanInput)
                    }
                }
            }

            State::WeDidNotUnderstand => {
                self.input_loop_counter += 1;
                if self.input_loop_counter >= self.retry_budget {
                    return Ok(State::ExitMode);
                }
                self.speech.say("Das habe ich leider nicht verstanden.");
                self.speech.wait_until_talking_finished().await;
                Ok(State::WaitForUserInput)
            }

            State::HumanInput => {
                let mut prompt = self.transcription.clone();
                if self.prompt_manager.mode() == Mode::LedControl {
                    match self.led.get_state().await {
                        Ok(state) => {
                            let json = serde_json::to_string(&state).unwrap_or_default();
                            prompt = format!("Aktueller Licht status: {json}\n\n{prompt}");
                        }
                        Err(e) => warn!(error = %e, "failed to fetch current LED state"),
                    }
                }
                self.prompt_manager.add_user_entry(prompt);
                Ok(State::AiResponse)
            }

            State::AiResponse => {
                let system_prompt = self.prompt_manager.get_system_prompt();
                let history = self.prompt_manager.get_history().to_vec();
                let (tx, mut rx) = mpsc::channel(64);
                self.llm.chat_stream(&system_prompt, &history, tx).await;

                let mode = self.prompt_manager.mode();
                if mode == Mode::Chat {
                    self.interrupt_watcher = Some(self.speech.start_speech_interrupt_watcher());
                }

                let mut full_response = String::new();
                let mut buffer = String::new();
                let mut first_sentence = true;

                while let Some(chunk) = rx.recv().await {
                    let piece = match chunk {
                        Ok(p) => p,
                        Err(e) => {
                            warn!(error = %e, "llm stream error");
                            break;
                        }
                    };
                    full_response.push_str(&piece);
                    buffer.push_str(&piece);

                    if mode == Mode::Chat {
                        let sentences = util::split_sentences_german(&buffer);
                        if sentences.len() > 1 {
                            for sentence in &sentences[..sentences.len() - 1] {
                                self.speak_sentence(sentence, &mut first_sentence);
                            }
                            buffer = sentences.last().cloned().unwrap_or_default();
                        }
                    }
                }

                if mode == Mode::Chat && !buffer.trim().is_empty() {
                    self.speak_sentence(&buffer, &mut first_sentence);
                }

                if mode == Mode::LedControl {
                    let result = intents::handle_led_control(&self.led, &full_response).await;
                    self.speech.skip_all_and_say(&result.message);
                    self.input_ok = result.success;
                } else {
                    self.input_ok = true;
                }

                self.prompt_manager.add_assistant_entry(full_response);
                self.input_loop_counter = 0;
                Ok(State::AiResponseFinished)
            }

            State::AiResponseFinished => {
                self.speech.wait_until_talking_finished().await;
                if let Some(watcher) = self.interrupt_watcher.take() {
                    watcher.stop();
                }
                match self.prompt_manager.mode() {
                    Mode::Chat => {
                        if util::is_conversation_ending(&self.transcription, 0.8) {
                            Ok(State::ExitMode)
                        } else {
                            Ok(State::ContinueChatInput)
                        }
                    }
                    Mode::LedControl => {
                        if self.input_ok {
                            Ok(State::ExitMode)
                        } else {
                            Ok(State::WeDidNotUnderstand)
                        }
                    }
                    _ => Ok(State::WaitForUserInput),
                }
            }

            State::ExitMode => {
                if self.prompt_manager.mode() == Mode::Chat || self.prompt_manager.mode() == Mode::Exit {
                    self.speech.say_bye();
                    self.speech.wait_until_talking_finished().await;
                }
                Ok(State::EntryPoint)
            }
        }
    }

    fn speak_sentence(&self, sentence: &str, first_sentence: &mut bool) {
        let cleaned = util::clean_str_from_markdown(sentence);
        if !cleaned.chars().any(|c| c.is_alphanumeric()) {
            return;
        }
        if *first_sentence {
            self.speech.skip_all_and_say(&cleaned);
            *first_sentence = false;
        } else {
            self.speech.say(&cleaned);
        }
    }
}
