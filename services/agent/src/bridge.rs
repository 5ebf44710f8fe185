//! `VoiceRuntime` backed by a voice bridge reached over WebSocket.
//!
//! The bridge owns the room connection and the speech providers; this side
//! only exchanges the JSON messages defined in `protocol`.

use crate::protocol::{AgentMessage, BridgeMessage};
use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use finbot_core::session::{RoomJoin, RuntimeEvent, SessionOptions, VoiceRuntime};
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::protocol::Message as WsMessage,
};
use tracing::{debug, info, warn};

type BridgeStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct BridgeRuntime {
    tx: SplitSink<BridgeStream, WsMessage>,
    rx: SplitStream<BridgeStream>,
}

impl BridgeRuntime {
    pub async fn connect(url: &str) -> Result<Self> {
        let (ws_stream, _) = connect_async(url)
            .await
            .with_context(|| format!("Failed to connect to voice bridge at {url}"))?;
        let (tx, rx) = ws_stream.split();
        info!(%url, "Connected to voice bridge.");
        Ok(Self { tx, rx })
    }

    async fn send(&mut self, msg: &AgentMessage) -> Result<()> {
        let serialized = serde_json::to_string(msg)?;
        self.tx.send(WsMessage::Text(serialized.into())).await?;
        Ok(())
    }

    /// Reads the next protocol message; `None` once the socket closes.
    async fn recv(&mut self) -> Result<Option<BridgeMessage>> {
        while let Some(frame) = self.rx.next().await {
            match frame.context("Voice bridge connection failed")? {
                WsMessage::Text(text) => match serde_json::from_str::<BridgeMessage>(&text) {
                    Ok(msg) => return Ok(Some(msg)),
                    Err(e) => warn!(error = %e, "Ignoring malformed bridge message"),
                },
                WsMessage::Close(_) => return Ok(None),
                _ => {}
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl VoiceRuntime for BridgeRuntime {
    async fn start(&mut self, join: &RoomJoin, options: &SessionOptions) -> Result<()> {
        self.send(&AgentMessage::Start {
            join: join.clone(),
            options: options.clone(),
        })
        .await?;

        match self.recv().await? {
            Some(BridgeMessage::Started) => {
                info!(room = %join.room, "Voice bridge session started.");
                Ok(())
            }
            Some(BridgeMessage::Error { message }) => bail!("Voice bridge refused to start: {message}"),
            Some(other) => bail!("Expected `started` from voice bridge, got {other:?}"),
            None => bail!("Voice bridge closed before the session started"),
        }
    }

    async fn next_event(&mut self) -> Result<Option<RuntimeEvent>> {
        loop {
            let Some(msg) = self.recv().await? else {
                return Ok(None);
            };
            match msg {
                BridgeMessage::Error { message } => {
                    return Err(anyhow!("Voice bridge error: {message}"));
                }
                BridgeMessage::Closed => return Ok(None),
                BridgeMessage::Started => debug!("Ignoring repeated `started` message"),
                other => {
                    if let Some(event) = other.into_event() {
                        return Ok(Some(event));
                    }
                }
            }
        }
    }

    async fn say(&mut self, speech_id: Option<&str>, text: &str) -> Result<()> {
        self.send(&AgentMessage::Say {
            speech_id: speech_id.map(str::to_string),
            text: text.to_string(),
        })
        .await
    }
}
