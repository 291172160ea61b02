//! Conversation mode, prompt templates, and per-mode chat history.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Conversation mode. Declaration order doubles as the tie-break order for
/// [`mode_from_str`] substring matching, so EXIT/GARBAGEINPUT/LEDCONTROL
/// are checked before the much more common CHAT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    Exit,
    GarbageInput,
    LedControl,
    Chat,
    ModusSelection,
}

impl Mode {
    pub fn name(&self) -> &'static str {
        match self {
            Mode::Exit => "EXIT",
            Mode::GarbageInput => "GARBAGEINPUT",
            Mode::LedControl => "LEDCONTROL",
            Mode::Chat => "CHAT",
            Mode::ModusSelection => "MODUS_SELECTION",
        }
    }

    pub fn all() -> [Mode; 5] {
        [
            Mode::Exit,
            Mode::GarbageInput,
            Mode::LedControl,
            Mode::Chat,
            Mode::ModusSelection,
        ]
    }
}

/// Locate the mode whose name appears as a substring of `text`, scanning in
/// declaration order. The LLM is instructed to begin its response with the
/// mode name in capitals; this tolerates it padding the response with
/// extra words around that token.
pub fn mode_from_str(text: &str) -> Option<Mode> {
    let upper = text.to_uppercase();
    Mode::all()
        .into_iter()
        .filter(|m| *m != Mode::ModusSelection)
        .find(|m| upper.contains(m.name()))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub mode: Mode,
    pub description: &'static str,
    pub system_prompt: String,
    pub user_say_str: &'static str,
}

/// Per-mode system prompt text, ported from the original prompt manager.
pub fn base_template(mode: Mode) -> PromptTemplate {
    match mode {
        Mode::ModusSelection => {
            let other_modes: Vec<&str> = Mode::all()
                .into_iter()
                .filter(|m| *m != Mode::ModusSelection)
                .map(|m| m.name())
                .collect();
            let rules = [
                "Wähle EXIT wenn der User das Gespräch beenden oder abbrechen will oder sich verabschiedet hat.",
                "Wähle GARBAGEINPUT wenn die Anfrage unverständlich oder unvollständig erscheint.",
                "Wähle LEDCONTROL wenn der User die Beleuchtung verändern oder eine Farbe haben will.",
                "Wähle CHAT wenn der User eine andere bisher nicht genannte Frage gestellt hat.",
            ];
            let system_prompt = format!(
                "Du musst genau einen der folgenden Modi (GROSSBUCHSTABEN) wählen: {}\n\
                 Beginne deine Antwort, indem du den gewählten Modus in GROSSBUCHSTABEN nennst (z. B. \"EXIT\"). \
                 Beende deine Antwort danach. Keine weiteren Erklärungen, Haftungsausschlüsse oder zusätzlicher Text.\n\n\
                 Befolge diese Regeln strikt:\n- {}",
                other_modes.join(", "),
                rules.join("\n- "),
            );
            PromptTemplate {
                mode,
                description: "Modus Auswahl",
                system_prompt,
                user_say_str: "",
            }
        }
        Mode::Chat => PromptTemplate {
            mode,
            description: "Live Chat Modus",
            system_prompt: "Beantworte die Fragen als freundlicher und zuvorkommender Helfer. \
                 Antworte kindergerecht für Kinder ab acht Jahren. \
                 Antworte maximal mit 1 bis 3 kurzen Sätzen und stelle Gegenfragen, wenn der Sachverhalt unklar ist."
                .to_string(),
            user_say_str: "Lass uns etwas plaudern, Modus ist nun CHAT",
        },
        Mode::LedControl => PromptTemplate {
            mode,
            description: "LED Kontroll Modus",
            system_prompt: "Du steuerst LED-Lichter über eine REST-API. \
                 Der User möchte sie möglicherweise ein- oder ausschalten oder die Farbe oder Helligkeit ändern. \
                 Parameter und mögliche Werte:\n\
                 action: on, off oder invalid wenn User prompt keinen Sinn ergibt.\n\
                 rgb: Array mit drei Elementen, jeweils von 0 bis 255.\n\
                 colortemp: Farbtemperatur setzen (2200K bis 6500K).\n\
                 brightness: Helligkeit anpassen (Wertebereich 10–255).\n\n\
                 Stelle sicher, dass deine endgültige Ausgabe ein kurzes JSON-Snippet im folgendem Format ist:\n\
                 { 'action': 'on', 'rgb': [255, 0, 0], 'brightness': 128, 'colortemp': 3000, 'scene': 1}\n\
                 Der action parameter ist mandatory, andere parameter sind optional. \
                 Beende deine Antwort danach. Keine weiteren Erklärungen, Haftungsausschlüsse oder zusätzlicher Text."
                .to_string(),
            user_say_str: "",
        },
        Mode::GarbageInput => PromptTemplate {
            mode,
            description: "Unverständlicher Input",
            system_prompt: "Die Benutzereingabe ist unverständlich oder unvollständig. \
                 Bitte fordere den Benutzer auf, die Anfrage zu präzisieren."
                .to_string(),
            user_say_str: "",
        },
        Mode::Exit => PromptTemplate {
            mode,
            description: "Beenden",
            system_prompt: String::new(),
            user_say_str: "",
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatEntry {
    pub role: Role,
    pub content: String,
}

pub trait ReductionStrategy: Send + Sync {
    /// Remove entries from `history` in place until its token count is at
    /// or below `token_limit`.
    fn reduce(&self, history: &mut Vec<ChatEntry>, token_limit: usize, count_tokens: &dyn Fn(&str) -> usize);
}

/// Drops the oldest entries first. The default and only strategy shipped —
/// `PromptManager` accepts any `ReductionStrategy` so a caller can supply
/// a different one without touching this module.
pub struct RemoveOldestStrategy;

impl ReductionStrategy for RemoveOldestStrategy {
    fn reduce(&self, history: &mut Vec<ChatEntry>, token_limit: usize, count_tokens: &dyn Fn(&str) -> usize) {
        let total = |h: &Vec<ChatEntry>| h.iter().map(|e| count_tokens(&e.content)).sum::<usize>();
        while total(history) > token_limit && !history.is_empty() {
            history.remove(0);
        }
    }
}

/// Mode-scoped chat history plus the system prompt for the active mode.
pub struct PromptManager {
    current_mode: Mode,
    histories: HashMap<Mode, Vec<ChatEntry>>,
    reduction_strategy: Box<dyn ReductionStrategy>,
}

impl PromptManager {
    pub fn new(initial_mode: Mode) -> Self {
        let mut histories = HashMap::new();
        for mode in Mode::all() {
            histories.insert(mode, Vec::new());
        }
        Self {
            current_mode: initial_mode,
            histories,
            reduction_strategy: Box::new(RemoveOldestStrategy),
        }
    }

    pub fn with_reduction_strategy(mut self, strategy: Box<dyn ReductionStrategy>) -> Self {
        self.reduction_strategy = strategy;
        self
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.current_mode = mode;
    }

    pub fn mode(&self) -> Mode {
        self.current_mode
    }

    pub fn set_history(&mut self, history: Vec<ChatEntry>) {
        self.histories.insert(self.current_mode, history);
    }

    pub fn empty_history(&mut self) {
        self.histories.insert(self.current_mode, Vec::new());
    }

    pub fn get_history(&self) -> &[ChatEntry] {
        self.histories.get(&self.current_mode).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn get_last_entry(&self) -> Option<&ChatEntry> {
        self.histories.get(&self.current_mode).and_then(|h| h.last())
    }

    pub fn add_user_entry(&mut self, content: impl Into<String>) {
        self.histories.entry(self.current_mode).or_default().push(ChatEntry {
            role: Role::User,
            content: content.into(),
        });
    }

    pub fn add_assistant_entry(&mut self, content: impl Into<String>) {
        self.histories.entry(self.current_mode).or_default().push(ChatEntry {
            role: Role::Assistant,
            content: content.into(),
        });
    }

    /// Whitespace-delimited word count, the same coarse approximation used
    /// throughout the original implementation in place of a real tokenizer.
    pub fn count_tokens(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }

    pub fn count_history_tokens(&self) -> usize {
        self.get_history().iter().map(|e| self.count_tokens(&e.content)).sum()
    }

    pub fn reduce_history(&mut self, token_limit: usize) {
        let count_tokens = |s: &str| s.split_whitespace().count();
        if let Some(history) = self.histories.get_mut(&self.current_mode) {
            self.reduction_strategy.reduce(history, token_limit, &count_tokens);
        }
    }

    pub fn get_system_prompt(&self) -> String {
        base_template(self.current_mode).system_prompt
    }

    pub fn get_timestamp(&self) -> String {
        let now = chrono::Utc::now();
        format!(
            "Es ist {}, der {} um {} UTC. ",
            now.format("%A"),
            now.format("%d.%m.%Y"),
            now.format("%H:%M"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_from_str_matches_declaration_order() {
        assert_eq!(mode_from_str("EXIT, der Nutzer verabschiedet sich"), Some(Mode::Exit));
        assert_eq!(mode_from_str("Ich denke CHAT passt hier"), Some(Mode::Chat));
        assert_eq!(mode_from_str("keine Ahnung was das ist"), None);
    }

    #[test]
    fn remove_oldest_strategy_trims_to_limit() {
        let mut history = vec![
            ChatEntry { role: Role::User, content: "eins zwei drei".into() },
            ChatEntry { role: Role::Assistant, content: "vier fünf".into() },
        ];
        RemoveOldestStrategy.reduce(&mut history, 2, &|s| s.split_whitespace().count());
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content, "vier fünf");
    }

    #[test]
    fn per_mode_history_is_isolated() {
        let mut pm = PromptManager::new(Mode::Chat);
        pm.add_user_entry("hallo");
        pm.set_mode(Mode::LedControl);
        assert!(pm.get_history().is_empty());
        pm.set_mode(Mode::Chat);
        assert_eq!(pm.get_history().len(), 1);
    }
}
