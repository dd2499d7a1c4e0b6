//! Drives `LlmSession` against an in-process WebSocket server standing in
//! for the realtime LLM endpoint: asserts the `session.update` wire shape
//! sent on connect, and that audio-delta/tool-result events round-trip
//! through the event bus correctly.

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

use vb_llm_session::LlmSession;
use vb_protocol::{
    InputAudioTranscription, LlmEvent, SessionConfig, ToolDefinition, TurnDetectionConfig,
};

async fn spawn_echo_server() -> (String, tokio::task::JoinHandle<Vec<Value>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let url = format!("ws://{addr}");

    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let (mut sink, mut source) = ws.split();
        let mut received = Vec::new();

        // First inbound message from the client should be `session.update`.
        if let Some(Ok(Message::Text(text))) = source.next().await {
            received.push(serde_json::from_str(&text).unwrap());
        }

        // Push a couple of synthetic inbound events the bridge should see.
        sink.send(Message::Text(
            json!({"type": "session.updated"}).to_string(),
        ))
        .await
        .unwrap();
        sink.send(Message::Text(
            json!({
                "type": "response.audio.delta",
                "response_id": "resp-1",
                "delta": "AAAA",
            })
            .to_string(),
        ))
        .await
        .unwrap();
        sink.send(Message::Text(
            json!({"type": "response.audio.done", "response_id": "resp-1"}).to_string(),
        ))
        .await
        .unwrap();

        // Then read back whatever the bridge sends next (the tool result).
        if let Some(Ok(Message::Text(text))) = source.next().await {
            received.push(serde_json::from_str(&text).unwrap());
        }

        received
    });

    (url, handle)
}

fn sample_session_config() -> SessionConfig {
    SessionConfig {
        modalities: vec!["audio".into(), "text".into()],
        instructions: "You are a helpful support agent.".into(),
        voice: "alloy".into(),
        input_audio_format: "g711_ulaw".into(),
        output_audio_format: "g711_ulaw".into(),
        input_audio_transcription: InputAudioTranscription { model: "whisper-1".into() },
        turn_detection: TurnDetectionConfig {
            kind: "server_vad".into(),
            threshold: 0.8,
            prefix_padding_ms: 600,
            silence_duration_ms: 1000,
        },
        tools: vec![ToolDefinition {
            kind: "function".into(),
            name: "check_order_status".into(),
            description: "look up an order".into(),
            parameters: json!({"type": "object", "properties": {}}),
        }],
        tool_choice: "auto".into(),
    }
}

#[tokio::test]
async fn session_update_is_sent_and_events_are_delivered() {
    let (url, server) = spawn_echo_server().await;
    let session = LlmSession::connect(&url, "test-key", "realtime=v1").await.unwrap();

    let (_id, mut rx) = session.subscribe_all();

    session.update_session(sample_session_config()).await.unwrap();
    assert!(session.wait_for_session_updated().await);

    let delta = rx.recv().await.unwrap();
    assert!(matches!(delta, LlmEvent::ResponseAudioDelta { .. }));

    let done = rx.recv().await.unwrap();
    match done {
        LlmEvent::ResponseAudioDone { response_id } => assert_eq!(response_id, "resp-1"),
        other => panic!("expected ResponseAudioDone, got {other:?}"),
    }

    session
        .send_tool_result("call-1".to_string(), "注文は発送済みです。".to_string())
        .await
        .unwrap();

    let received = server.await.unwrap();
    session.disconnect().await;

    assert_eq!(received.len(), 2);
    assert_eq!(received[0]["type"], "session.update");
    assert_eq!(received[0]["session"]["voice"], "alloy");
    assert_eq!(received[1]["type"], "conversation.item.create");
    assert_eq!(received[1]["item"]["call_id"], "call-1");
}
