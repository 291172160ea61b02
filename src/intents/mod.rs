//! Mode-specific action handlers invoked once the orchestrator has settled
//! on a [`Mode`](crate::llm::prompt_manager::Mode) for the current turn.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Wire shape for a lighting command, matching the Wiz-compatible JSON
/// schema the LLM is instructed to emit in LEDCONTROL mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedCommand {
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rgb: Option<[u8; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rgbww: Option<[u8; 5]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colortemp: Option<u32>,
    /// `scene: 0` means "no scene" on the wire and is sent as `null`, not
    /// `0` — the downstream bulb firmware treats `0` as a real scene index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene: Option<u32>,
}

impl LedCommand {
    /// Parse a command the LLM produced. The model is asked for JSON but
    /// reliably emits single-quoted Python-dict syntax instead, so quotes
    /// are normalized before parsing.
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let json_like = raw.replace('\'', "\"");
        let start = json_like.find('{').ok_or_else(|| anyhow::anyhow!("no JSON object in LED response"))?;
        let end = json_like.rfind('}').ok_or_else(|| anyhow::anyhow!("unterminated JSON object in LED response"))?;
        let cmd: LedCommand = serde_json::from_str(&json_like[start..=end])?;
        Ok(cmd)
    }

    pub fn is_valid(&self) -> bool {
        self.action != "invalid"
    }

    /// `scene: Some(0)` is normalized to `None` (serialized as JSON `null`)
    /// to match the bulb's state-setter semantics.
    fn wire_scene(&self) -> Option<u32> {
        self.scene.filter(|&s| s != 0)
    }
}

/// Wire shape for the bulb's current state, as reported by the bridge.
/// Field names match `wiz_get_state()`'s dict in the original Wiz client so
/// the JSON handed back to the LLM in `human_input` is self-describing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warm_white: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cold_white: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rgb: Option<[u8; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rgbww: Option<[u8; 5]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rgbw: Option<[u8; 4]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ratio: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colortemp: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<u8>,
}

#[allow(async_fn_in_trait)]
pub trait LedClient: Send + Sync {
    async fn set_state(&self, command: &LedCommand) -> anyhow::Result<()>;

    /// Fetch the bulb's current state, synchronously, for the orchestrator
    /// to fold into the prompt before asking the LLM to change it.
    async fn get_state(&self) -> anyhow::Result<LedState>;
}

/// Outcome of [`handle_led_control`]: whether the bulb actually changed
/// state, plus the sentence the speech agent should say about it. The
/// orchestrator branches its next state on `success`.
pub struct LedControlResult {
    pub success: bool,
    pub message: String,
}

/// HTTP client for a Wiz-compatible bulb bridge. The original talks UDP
/// directly to the bulb (`pywizlight`); this assumes a small HTTP bridge
/// sits in front of it at `LED_ENDPOINT`, exposing the same state shape —
/// the UDP protocol itself is out of scope here, only the JSON contract.
pub struct HttpLedClient {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpLedClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self { endpoint: endpoint.into(), client: reqwest::Client::new() }
    }
}

impl LedClient for HttpLedClient {
    async fn set_state(&self, command: &LedCommand) -> anyhow::Result<()> {
        let state = command.action == "on";
        let body = serde_json::json!({
            "state": state,
            "rgb": command.rgb,
            "rgbww": command.rgbww,
            "brightness": command.brightness,
            "colortemp": command.colortemp,
            "scene": command.wire_scene(),
        });
        let resp = self.client.post(&self.endpoint).json(&body).send().await?;
        if !resp.status().is_success() {
            anyhow::bail!("LED endpoint returned {}", resp.status());
        }
        Ok(())
    }

    async fn get_state(&self) -> anyhow::Result<LedState> {
        let resp = self.client.get(&self.endpoint).send().await?;
        if !resp.status().is_success() {
            anyhow::bail!("LED endpoint returned {}", resp.status());
        }
        Ok(resp.json::<LedState>().await?)
    }
}

/// Apply a parsed LED command, logging success/failure, and report whether
/// it actually took effect so the orchestrator can decide between
/// `exit_mode` and `we_did_not_understand`.
pub async fn handle_led_control(client: &impl LedClient, raw_response: &str) -> LedControlResult {
    match LedCommand::parse(raw_response) {
        Ok(cmd) if cmd.is_valid() => match client.set_state(&cmd).await {
            Ok(()) => {
                info!(action = %cmd.action, "LED state applied");
                LedControlResult { success: true, message: "Beleuchtung wurde angepasst.".to_string() }
            }
            Err(e) => {
                warn!(error = %e, "LED state update failed");
                LedControlResult { success: false, message: "Entschuldigung, das hat leider nicht geklappt.".to_string() }
            }
        },
        Ok(_) => LedControlResult { success: false, message: "Entschuldigung, das habe ich nicht verstanden.".to_string() },
        Err(e) => {
            warn!(error = %e, raw = raw_response, "failed to parse LED command");
            LedControlResult { success: false, message: "Entschuldigung, das habe ich nicht verstanden.".to_string() }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_quoted_json_like_dict() {
        let raw = "{ 'action': 'on', 'rgb': [255, 0, 0], 'brightness': 128, 'colortemp': 3000, 'scene': 1}";
        let cmd = LedCommand::parse(raw).unwrap();
        assert_eq!(cmd.action, "on");
        assert_eq!(cmd.rgb, Some([255, 0, 0]));
        assert_eq!(cmd.scene, Some(1));
    }

    #[test]
    fn scene_zero_normalizes_to_none_on_wire() {
        let cmd = LedCommand { action: "on".into(), rgb: None, rgbww: None, brightness: None, colortemp: None, scene: Some(0) };
        assert_eq!(cmd.wire_scene(), None);
    }

    #[test]
    fn invalid_action_is_rejected() {
        let cmd = LedCommand { action: "invalid".into(), rgb: None, rgbww: None, brightness: None, colortemp: None, scene: None };
        assert!(!cmd.is_valid());
    }
}
