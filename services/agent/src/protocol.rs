//! JSON messages exchanged with the voice bridge over WebSocket.

use finbot_core::{
    metrics::{MetricKind, MetricSample},
    session::{RoomJoin, RuntimeEvent, SessionOptions},
};
use serde::{Deserialize, Serialize};

/// Messages sent from the agent to the bridge.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentMessage {
    /// Join the room and start the media pipeline. Must be sent first.
    Start {
        join: RoomJoin,
        options: SessionOptions,
    },
    /// Synthesize and play `text` in the room.
    Say {
        speech_id: Option<String>,
        text: String,
    },
}

/// Messages sent from the bridge to the agent.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeMessage {
    /// The pipeline is running.
    Started,
    /// The user finished speaking; `transcript` is the final STT text.
    UserTurn { speech_id: String, transcript: String },
    /// A partial latency measurement, in seconds.
    Metrics {
        speech_id: String,
        kind: MetricKind,
        value: f64,
    },
    /// A fatal bridge-side failure.
    Error { message: String },
    /// The room session ended.
    Closed,
}

impl BridgeMessage {
    /// The runtime event this message carries, if any.
    pub fn into_event(self) -> Option<RuntimeEvent> {
        match self {
            BridgeMessage::UserTurn {
                speech_id,
                transcript,
            } => Some(RuntimeEvent::UserTurn {
                speech_id,
                transcript,
            }),
            BridgeMessage::Metrics {
                speech_id,
                kind,
                value,
            } => Some(RuntimeEvent::Metrics(MetricSample::new(speech_id, kind, value))),
            BridgeMessage::Started | BridgeMessage::Error { .. } | BridgeMessage::Closed => None,
        }
    }
}
