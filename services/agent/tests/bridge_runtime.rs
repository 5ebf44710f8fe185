//! `BridgeRuntime` against an in-process WebSocket peer speaking the bridge
//! protocol.

use finbot_agent::{
    bridge::BridgeRuntime,
    protocol::{AgentMessage, BridgeMessage},
};
use finbot_core::{
    metrics::{MetricKind, MetricSample},
    session::{RoomJoin, RuntimeEvent, SessionOptions, VoiceRuntime},
};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::protocol::Message};

/// Starts a one-connection bridge that answers `start`, then sends `script`
/// and forwards everything the agent sends to the returned receiver.
async fn spawn_bridge(
    start_reply: BridgeMessage,
    script: Vec<BridgeMessage>,
) -> (String, mpsc::UnboundedReceiver<AgentMessage>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let (seen_tx, seen_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();

        let first = ws.next().await.unwrap().unwrap();
        let msg: AgentMessage = serde_json::from_str(first.to_text().unwrap()).unwrap();
        let _ = seen_tx.send(msg);

        let reply = serde_json::to_string(&start_reply).unwrap();
        ws.send(Message::Text(reply.into())).await.unwrap();
        for msg in script {
            let text = serde_json::to_string(&msg).unwrap();
            ws.send(Message::Text(text.into())).await.unwrap();
        }

        while let Some(Ok(frame)) = ws.next().await {
            if let Message::Text(text) = frame {
                if let Ok(msg) = serde_json::from_str::<AgentMessage>(&text) {
                    let _ = seen_tx.send(msg);
                }
            }
        }
    });

    (url, seen_rx)
}

fn join() -> RoomJoin {
    RoomJoin {
        url: "wss://example.livekit.cloud".into(),
        room: "my-room".into(),
        token: "jwt".into(),
    }
}

#[tokio::test]
async fn test_bridge_session_round_trip() {
    let (url, mut seen) = spawn_bridge(
        BridgeMessage::Started,
        vec![
            BridgeMessage::UserTurn {
                speech_id: "speech_7".into(),
                transcript: "How much interest will I pay?".into(),
            },
            BridgeMessage::Metrics {
                speech_id: "speech_7".into(),
                kind: MetricKind::Eou,
                value: 0.61,
            },
            BridgeMessage::Closed,
        ],
    )
    .await;

    let mut runtime = BridgeRuntime::connect(&url).await.unwrap();
    runtime.start(&join(), &SessionOptions::default()).await.unwrap();

    match seen.recv().await.unwrap() {
        AgentMessage::Start { join, options } => {
            assert_eq!(join.room, "my-room");
            assert_eq!(options, SessionOptions::default());
        }
        other => panic!("Expected start, got {:?}", other),
    }

    assert_eq!(
        runtime.next_event().await.unwrap(),
        Some(RuntimeEvent::UserTurn {
            speech_id: "speech_7".into(),
            transcript: "How much interest will I pay?".into(),
        })
    );
    runtime.say(Some("speech_7"), "Let me work that out.").await.unwrap();
    assert_eq!(
        runtime.next_event().await.unwrap(),
        Some(RuntimeEvent::Metrics(MetricSample::new(
            "speech_7",
            MetricKind::Eou,
            0.61
        )))
    );
    assert_eq!(runtime.next_event().await.unwrap(), None);

    assert_eq!(
        seen.recv().await.unwrap(),
        AgentMessage::Say {
            speech_id: Some("speech_7".into()),
            text: "Let me work that out.".into(),
        }
    );
}

#[tokio::test]
async fn test_bridge_start_refused() {
    let (url, _seen) = spawn_bridge(
        BridgeMessage::Error {
            message: "invalid token".into(),
        },
        vec![],
    )
    .await;

    let mut runtime = BridgeRuntime::connect(&url).await.unwrap();
    let err = runtime
        .start(&join(), &SessionOptions::default())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("invalid token"));
}

#[tokio::test]
async fn test_bridge_error_event_is_fatal() {
    let (url, _seen) = spawn_bridge(
        BridgeMessage::Started,
        vec![BridgeMessage::Error {
            message: "room deleted".into(),
        }],
    )
    .await;

    let mut runtime = BridgeRuntime::connect(&url).await.unwrap();
    runtime.start(&join(), &SessionOptions::default()).await.unwrap();
    let err = runtime.next_event().await.unwrap_err();
    assert!(err.to_string().contains("room deleted"));
}
