//! Voice Runtime Seam
//!
//! The media side of a conversation (room transport, speech-to-text,
//! text-to-speech, voice activity and turn detection) lives behind
//! `VoiceRuntime`. The agent only configures it, reacts to completed user
//! turns, and hands back text to speak.

use crate::metrics::MetricSample;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const GROQ_API_BASE: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_LLM_MODEL: &str = "llama-3.3-70b-versatile";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SttOptions {
    pub provider: String,
    pub model: String,
    pub language: String,
}

impl Default for SttOptions {
    fn default() -> Self {
        Self {
            provider: "deepgram".to_string(),
            model: "nova-3".to_string(),
            language: "multi".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TtsOptions {
    pub provider: String,
    pub model: String,
    pub voice: String,
}

impl Default for TtsOptions {
    fn default() -> Self {
        Self {
            provider: "cartesia".to_string(),
            model: "sonic-2".to_string(),
            voice: "f786b574-daa5-4673-aa0c-cbe3e8534c02".to_string(),
        }
    }
}

/// Recorded for the runtime's benefit; the agent makes the LLM calls itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmOptions {
    pub model: String,
    pub api_base: String,
}

impl Default for LlmOptions {
    fn default() -> Self {
        Self {
            model: DEFAULT_LLM_MODEL.to_string(),
            api_base: GROQ_API_BASE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VadModel {
    Silero,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnDetection {
    /// Multilingual end-of-turn model.
    Multilingual,
    /// Fall back to VAD silence only.
    Vad,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseCancellation {
    Bvc,
    Off,
}

/// The provider handles a session is started with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionOptions {
    pub stt: SttOptions,
    pub tts: TtsOptions,
    pub llm: LlmOptions,
    pub vad: VadModel,
    pub turn_detection: TurnDetection,
    pub noise_cancellation: NoiseCancellation,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            stt: SttOptions::default(),
            tts: TtsOptions::default(),
            llm: LlmOptions::default(),
            vad: VadModel::Silero,
            turn_detection: TurnDetection::Multilingual,
            noise_cancellation: NoiseCancellation::Bvc,
        }
    }
}

/// Where and as whom the runtime should join.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomJoin {
    pub url: String,
    pub room: String,
    pub token: String,
}

/// Events the runtime delivers to the agent.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeEvent {
    /// The user finished a turn; `speech_id` ties later metrics to it.
    UserTurn { speech_id: String, transcript: String },
    /// A partial latency measurement for some turn.
    Metrics(MetricSample),
}

/// An external voice runtime the agent drives.
#[async_trait]
pub trait VoiceRuntime: Send {
    /// Joins the room and starts the media pipeline.
    async fn start(&mut self, join: &RoomJoin, options: &SessionOptions) -> Result<()>;

    /// Waits for the next event; `Ok(None)` means the runtime has closed.
    async fn next_event(&mut self) -> Result<Option<RuntimeEvent>>;

    /// Speaks `text`. `speech_id` is the turn being answered, if any.
    async fn say(&mut self, speech_id: Option<&str>, text: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_provider_handles() {
        let options = SessionOptions::default();
        assert_eq!(options.stt.model, "nova-3");
        assert_eq!(options.stt.language, "multi");
        assert_eq!(options.tts.model, "sonic-2");
        assert_eq!(options.llm.api_base, GROQ_API_BASE);
        assert_eq!(options.turn_detection, TurnDetection::Multilingual);
    }

    #[test]
    fn test_options_wire_format() {
        let json = serde_json::to_value(SessionOptions::default()).unwrap();
        assert_eq!(json["vad"], "silero");
        assert_eq!(json["turn_detection"], "multilingual");
        assert_eq!(json["noise_cancellation"], "bvc");
        assert_eq!(json["stt"]["provider"], "deepgram");
        assert_eq!(json["tts"]["voice"], "f786b574-daa5-4673-aa0c-cbe3e8534c02");
    }
}
