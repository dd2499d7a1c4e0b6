//! `LlmSession` (C2): the bridge's only outbound connection to the streaming
//! LLM. Split sink/writer-task/reader-loop shape mirrors the teacher's node
//! client; the handshake, heartbeat, and reconnect-backoff machinery it used
//! for gateway tool registration don't apply here — §4.2 calls for a single
//! connect per call, no mid-call auto-retry ("barge-in + fresh response is
//! the retry mechanism").

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;

use vb_domain::error::{Error, Result};
use vb_protocol::{LlmCommand, LlmEvent, SessionConfig, ToolResultItem, BENIGN_ERROR_CODE};

use crate::events::{EventBus, SubscriptionId};

/// An open connection to the LLM realtime session, plus the event bus
/// subscribers read from.
pub struct LlmSession {
    outbound: mpsc::Sender<LlmCommand>,
    bus: std::sync::Arc<EventBus>,
    reader_task: JoinHandle<()>,
    writer_task: JoinHandle<()>,
}

impl LlmSession {
    /// `Connect()`: open the LLM WebSocket with auth and protocol-version
    /// headers; resolves when the socket is open.
    pub async fn connect(ws_url: &str, api_key: &str, beta_header: &str) -> Result<Self> {
        let mut request = ws_url
            .into_client_request()
            .map_err(|e| Error::Other(format!("invalid LLM websocket url: {e}")))?;

        let auth = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|e| Error::Config(format!("invalid api key header: {e}")))?;
        let beta = HeaderValue::from_str(beta_header)
            .map_err(|e| Error::Config(format!("invalid beta header: {e}")))?;
        request.headers_mut().insert("Authorization", auth);
        request.headers_mut().insert("OpenAI-Beta", beta);

        let (ws, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| Error::Other(format!("LLM websocket connect failed: {e}")))?;

        let (mut sink, mut stream) = ws.split();
        let bus = std::sync::Arc::new(EventBus::new());

        let (outbound_tx, mut outbound_rx) = mpsc::channel::<LlmCommand>(64);

        let writer_task = tokio::spawn(async move {
            while let Some(cmd) = outbound_rx.recv().await {
                let json = match serde_json::to_string(&cmd) {
                    Ok(j) => j,
                    Err(e) => {
                        tracing::error!(error = %e, "failed to serialize LLM command");
                        continue;
                    }
                };
                if sink.send(Message::Text(json)).await.is_err() {
                    break;
                }
            }
        });

        let reader_bus = bus.clone();
        let reader_task = tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                let msg = match msg {
                    Ok(m) => m,
                    Err(e) => {
                        tracing::warn!(error = %e, "LLM websocket read error");
                        break;
                    }
                };
                let text = match msg {
                    Message::Text(t) => t,
                    Message::Close(_) => {
                        tracing::info!("LLM closed the session");
                        break;
                    }
                    _ => continue,
                };

                let event: LlmEvent = match serde_json::from_str(&text) {
                    Ok(e) => e,
                    Err(e) => {
                        tracing::debug!(error = %e, "failed to parse LLM event, ignoring");
                        continue;
                    }
                };

                if let LlmEvent::Error { ref error } = event {
                    if error.code == BENIGN_ERROR_CODE {
                        tracing::debug!("discarding benign response_cancel_not_active race");
                        continue;
                    }
                    tracing::warn!(code = %error.code, message = %error.message, "LLM reported an error");
                }

                reader_bus.publish(event);
            }
        });

        Ok(Self {
            outbound: outbound_tx,
            bus,
            reader_task,
            writer_task,
        })
    }

    async fn send(&self, cmd: LlmCommand) -> Result<()> {
        self.outbound
            .send(cmd)
            .await
            .map_err(|_| Error::Other("LLM session writer has shut down".into()))
    }

    /// `UpdateSession(config)`.
    pub async fn update_session(&self, session: SessionConfig) -> Result<()> {
        self.send(LlmCommand::SessionUpdate { session }).await
    }

    /// `SendAudio(base64Frame)`: append one caller audio frame.
    pub async fn send_audio(&self, base64_frame: String) -> Result<()> {
        self.send(LlmCommand::InputAudioBufferAppend { audio: base64_frame })
            .await
    }

    /// `CreateResponse()`: request a new assistant response.
    pub async fn create_response(&self) -> Result<()> {
        self.send(LlmCommand::ResponseCreate).await
    }

    /// `CancelResponse()`: abort the currently generating response (barge-in).
    pub async fn cancel_response(&self, response_id: String) -> Result<()> {
        self.send(LlmCommand::ResponseCancel { response_id }).await
    }

    pub async fn clear_input_buffer(&self) -> Result<()> {
        self.send(LlmCommand::InputAudioBufferClear).await
    }

    pub async fn commit_input_buffer(&self) -> Result<()> {
        self.send(LlmCommand::InputAudioBufferCommit).await
    }

    /// `SendToolResult(callId, result)`: materialize a tool-output
    /// conversation item and immediately request a follow-up response.
    pub async fn send_tool_result(&self, call_id: String, result: String) -> Result<()> {
        self.send(LlmCommand::ConversationItemCreate {
            item: ToolResultItem::for_tool_call(call_id, result),
        })
        .await?;
        self.create_response().await
    }

    /// Wildcard subscription for diagnostics.
    pub fn subscribe_all(&self) -> (SubscriptionId, mpsc::UnboundedReceiver<LlmEvent>) {
        self.bus.subscribe_all()
    }

    /// Subscribe to a single event kind, removable by identity.
    pub fn subscribe_kind(&self, kind: &'static str) -> (SubscriptionId, mpsc::UnboundedReceiver<LlmEvent>) {
        self.bus.subscribe_kind(kind)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.bus.unsubscribe(id);
    }

    /// Block until the session acknowledges a prior `UpdateSession` call.
    pub async fn wait_for_session_updated(&self) -> bool {
        self.bus.wait_once("session.updated").await.is_some()
    }

    /// `Disconnect()`: tear down both directions of the connection.
    pub async fn disconnect(self) {
        self.reader_task.abort();
        self.writer_task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_url_is_rejected_before_any_io() {
        let result = "not a url".into_client_request();
        assert!(result.is_err());
    }
}
