//! Carrier media-stream endpoint (C3, §4.3): `GET /media-stream`. Shaped
//! after the teacher's `nodes::ws::node_ws` — wait for a handshake frame
//! with a timeout, split the socket, spawn a writer task fed by a channel,
//! then loop reading inbound frames. The handshake here is the carrier's
//! `start` event rather than a `node_hello`, and once it arrives the rest
//! of the call is handed off to [`crate::mediator::run_call`] instead of
//! being driven inline.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use vb_domain::call::{CallIdentity, IdentificationContext};
use vb_protocol::carrier::StartPayload;
use vb_protocol::{CarrierCommand, CarrierEvent};

use crate::mediator;
use crate::state::AppState;

const START_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

pub async fn media_stream(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut ws_sink, mut ws_stream) = socket.split();

    let (stream_id, start) = match wait_for_start(&mut ws_stream).await {
        Some(pair) => pair,
        None => {
            tracing::warn!("carrier disconnected before sending a start event");
            return;
        }
    };

    let identification = match IdentificationContext::from_base64(&start.custom_parameters.customer_context) {
        Ok(ctx) => ctx,
        Err(e) => {
            tracing::warn!(error = %e, "malformed customerContext parameter, using unidentified context");
            IdentificationContext::unidentified_error()
        }
    };

    let identity = CallIdentity {
        call_id: start.call_sid.clone(),
        caller_number: start.custom_parameters.caller_phone.clone(),
        started_at: Utc::now(),
    };

    let span = tracing::info_span!("media_stream", call_id = %identity.call_id);
    let _enter = span.enter();
    tracing::info!("carrier media stream started");

    let (outbound_tx, mut outbound_rx) = mpsc::channel::<CarrierCommand>(64);

    let writer = tokio::spawn(async move {
        while let Some(cmd) = outbound_rx.recv().await {
            if send_ws_command(&mut ws_sink, &cmd).await.is_err() {
                break;
            }
        }
    });

    let (event_tx, event_rx) = mpsc::channel::<CarrierEvent>(256);

    let mediator_task = tokio::spawn(mediator::run_call(
        identity,
        stream_id,
        identification,
        state.config.clone(),
        state.tool_dispatcher.clone(),
        state.tool_defs.clone(),
        state.transcript_sink.clone(),
        outbound_tx,
        event_rx,
    ));

    while let Some(Ok(msg)) = ws_stream.next().await {
        match msg {
            Message::Text(text) => match serde_json::from_str::<CarrierEvent>(&text) {
                Ok(event) => {
                    if event_tx.send(event).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!(error = %e, "ignoring malformed carrier frame");
                }
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    drop(event_tx);
    writer.abort();
    let _ = mediator_task.await;
    tracing::info!("carrier media stream ended");
}

async fn wait_for_start(
    stream: &mut (impl StreamExt<Item = Result<Message, axum::Error>> + Unpin),
) -> Option<(String, StartPayload)> {
    let result = tokio::time::timeout(START_TIMEOUT, async {
        while let Some(Ok(msg)) = stream.next().await {
            if let Message::Text(text) = msg {
                if let Ok(CarrierEvent::Start { stream_id, start }) =
                    serde_json::from_str::<CarrierEvent>(&text)
                {
                    return Some((stream_id, start));
                }
            }
        }
        None
    })
    .await;

    result.unwrap_or(None)
}

async fn send_ws_command(
    sink: &mut (impl SinkExt<Message> + Unpin),
    cmd: &CarrierCommand,
) -> Result<(), ()> {
    let json = serde_json::to_string(cmd).map_err(|_| ())?;
    sink.send(Message::Text(json)).await.map_err(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_timeout_matches_the_documented_ten_seconds() {
        assert_eq!(START_TIMEOUT, std::time::Duration::from_secs(10));
    }
}
